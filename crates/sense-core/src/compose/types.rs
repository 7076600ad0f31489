//! Typed, read-only view of `agent-compose.yaml`.
//!
//! Unknown keys are ignored. Agent order follows the document.

use super::{ComposeDocument, ComposeError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<ComposePaths>,
    #[serde(default)]
    pub agents: IndexMap<String, ComposeAgent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposePaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeAgent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_config: Option<ComposeLoop>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cron: Vec<ComposeCron>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perception: Option<ComposePerception>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeLoop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, rename = "activeHours", skip_serializing_if = "Option::is_none")]
    pub active_hours: Option<ActiveHours>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHours {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeCron {
    pub schedule: String,
    pub task: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposePerception {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub builtin: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<PerceptionPlugin>,
}

/// One entry of `perception.custom`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptionPlugin {
    pub name: String,
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl PerceptionPlugin {
    /// An absent `enabled` key counts as enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<PerceptionPlugin>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<PerceptionPlugin>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ComposeFile {
    /// Decode the typed view of a parsed document.
    pub fn from_document(doc: &ComposeDocument) -> Result<Self, ComposeError> {
        if doc.root().is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(doc.text()).map_err(|e| ComposeError::Malformed {
            path: doc.path().to_path_buf(),
            line: e.location().map(|l| l.line()),
            reason: e.to_string(),
        })
    }

    /// Name and definition of the first agent in document order.
    pub fn first_agent(&self) -> Option<(&str, &ComposeAgent)> {
        self.agents.first().map(|(k, v)| (k.as_str(), v))
    }

    /// Plugin entries of the first agent.
    pub fn custom_perceptions(&self) -> &[PerceptionPlugin] {
        self.first_agent()
            .and_then(|(_, agent)| agent.perception.as_ref())
            .map(|p| p.custom.as_slice())
            .unwrap_or(&[])
    }

    /// Names of plugins of the first agent that are currently enabled.
    pub fn enabled_plugin_names(&self) -> Vec<String> {
        self.custom_perceptions()
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const TEXT: &str = "\
version: \"1\"
paths:
  memory: ./memory
agents:
  kuro:
    name: Kuro
    port: 3001
    loop:
      enabled: true
      interval: 5m
      activeHours: { start: 8, end: 23 }
    cron:
      - schedule: \"0 * * * *\"
        task: tidy
    perception:
      builtin: [chrome]
      custom:
        - name: docker-status
          script: ./plugins/docker-status.sh
          enabled: false
        - name: git-status
          script: ./plugins/git-status.sh
          timeout: 3000
  mini:
    name: Mini
";

    #[test]
    fn test_typed_view() {
        let doc = ComposeDocument::parse(TEXT, Path::new("agent-compose.yaml")).unwrap();
        let file = ComposeFile::from_document(&doc).unwrap();
        assert_eq!(file.version.as_deref(), Some("1"));
        assert_eq!(file.agents.len(), 2);
        let (name, agent) = file.first_agent().unwrap();
        assert_eq!(name, "kuro");
        assert_eq!(agent.port, Some(3001));
        assert_eq!(
            agent.loop_config.as_ref().and_then(|l| l.active_hours.as_ref()).and_then(|h| h.end),
            Some(23)
        );
        assert_eq!(file.custom_perceptions().len(), 2);
        assert_eq!(file.custom_perceptions()[1].timeout, Some(3000));
        assert_eq!(file.enabled_plugin_names(), vec!["git-status".to_string()]);
    }

    #[test]
    fn test_empty_document_is_default() {
        let doc = ComposeDocument::parse("# nothing\n", Path::new("agent-compose.yaml")).unwrap();
        let file = ComposeFile::from_document(&doc).unwrap();
        assert!(file.agents.is_empty());
        assert!(file.enabled_plugin_names().is_empty());
    }

    #[test]
    fn test_null_custom_is_empty() {
        let doc = ComposeDocument::parse(
            "agents:\n  kuro:\n    perception:\n      custom:\n",
            Path::new("agent-compose.yaml"),
        )
        .unwrap();
        let file = ComposeFile::from_document(&doc).unwrap();
        assert!(file.custom_perceptions().is_empty());
    }
}
