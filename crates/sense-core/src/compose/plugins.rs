//! Typed access to the plugin sequence of the first agent.

use super::document::{ComposeDocument, Edit, Node, NodeKind, Span};

/// Why the plugin sequence could not be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTarget {
    pub reason: String,
}

impl MissingTarget {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for MissingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// State of an entry's `enabled` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnabledField {
    /// No `enabled` key. The entry counts as enabled.
    Absent,
    /// Key present. `value` is `None` for null or non-boolean values.
    Present {
        value: Option<bool>,
        /// Span of the value text, or an empty span after the colon.
        span: Span,
        /// The key has no value text at all (`enabled:`).
        empty: bool,
    },
}

/// One element of the plugin sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub index: usize,
    pub name: Option<String>,
    pub script: Option<String>,
    pub enabled: EnabledField,
    /// Block mappings can be edited in place. Flow mappings and scalars cannot.
    pub editable: bool,
    pub(crate) key_indent: usize,
    pub(crate) end: usize,
    /// Span of a flow mapping item (`- {name: a}`) in a block sequence.
    pub(crate) flow_span: Option<Span>,
}

impl PluginEntry {
    /// Effective enablement: absent or null counts as enabled.
    pub fn is_enabled(&self) -> bool {
        match &self.enabled {
            EnabledField::Absent => true,
            EnabledField::Present { value, .. } => value.unwrap_or(true),
        }
    }

    /// Edit that rewrites a flow mapping item as a block mapping with
    /// `enabled` set. The first key stays on the `- ` line.
    pub(crate) fn flow_rewrite(&self, doc: &ComposeDocument, enabled: bool) -> Option<Edit> {
        let span = self.flow_span.as_ref()?;
        let decoded: serde_yaml::Value = serde_yaml::from_str(&doc.text()[span.clone()]).ok()?;
        let serde_yaml::Value::Mapping(mut map) = decoded else {
            return None;
        };
        map.insert(
            serde_yaml::Value::String("enabled".to_string()),
            serde_yaml::Value::Bool(enabled),
        );
        let mut text = String::new();
        push_block_mapping(&mut text, &map, "", &" ".repeat(self.key_indent), doc.newline());
        Some(Edit::replace(span.clone(), text))
    }
}

/// How the sequence is written, which decides how edits are made.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceShape {
    /// Block sequence. Entries are edited in place; new items go at
    /// `insert_at`.
    Block { insert_at: usize },
    /// Flow sequence such as `custom: []` or `custom: [{name: a}]`. Any
    /// change removes `span` (from the colon through `]`) and writes the
    /// whole list as a block sequence at `insert_at`.
    Flow {
        span: Span,
        insert_at: usize,
        items: Vec<serde_yaml::Value>,
    },
}

/// The located plugin sequence of the first agent.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSequence {
    pub agent: String,
    pub entries: Vec<PluginEntry>,
    pub shape: SequenceShape,
    pub(crate) dash_indent: usize,
    pub(crate) key_gap: usize,
}

impl PluginSequence {
    pub fn find(&self, name: &str) -> Option<&PluginEntry> {
        self.entries.iter().find(|e| e.name.as_deref() == Some(name))
    }

    /// Render block items for `names`, matching the layout of existing items.
    pub(crate) fn render_items(&self, names: &[String], newline: &str) -> String {
        let dash = " ".repeat(self.dash_indent);
        let key = " ".repeat(self.dash_indent + self.key_gap);
        let gap = " ".repeat(self.key_gap.saturating_sub(1));
        let mut out = String::new();
        for name in names {
            let script = format!("./plugins/{}.sh", name);
            out.push_str(&format!(
                "{dash}-{gap}name: {}{newline}{key}script: {}{newline}",
                yaml_scalar(name),
                yaml_scalar(&script)
            ));
        }
        out
    }

    /// Render flow items as block items, applying `overrides` of the
    /// `enabled` key by item index.
    pub(crate) fn render_flow_items(
        &self,
        items: &[serde_yaml::Value],
        overrides: &[(usize, bool)],
        newline: &str,
    ) -> String {
        let dash = " ".repeat(self.dash_indent);
        let key = " ".repeat(self.dash_indent + self.key_gap);
        let gap = " ".repeat(self.key_gap.saturating_sub(1));
        let mut out = String::new();
        for (index, item) in items.iter().enumerate() {
            let override_value = overrides.iter().find(|(i, _)| *i == index).map(|(_, v)| *v);
            let serde_yaml::Value::Mapping(map) = item else {
                out.push_str(&format!("{dash}-{gap}{}{newline}", yaml_value(item)));
                continue;
            };
            let mut map = map.clone();
            if let Some(enabled) = override_value {
                map.insert(
                    serde_yaml::Value::String("enabled".to_string()),
                    serde_yaml::Value::Bool(enabled),
                );
            }
            if map.is_empty() {
                out.push_str(&format!("{dash}-{gap}{{}}{newline}"));
                continue;
            }
            push_block_mapping(&mut out, &map, &format!("{dash}-{gap}"), &key, newline);
            out.push_str(newline);
        }
        out
    }
}

/// Append `map` as block mapping lines without a final line break. The
/// first line starts with `first`, later lines with `rest`.
fn push_block_mapping(
    out: &mut String,
    map: &serde_yaml::Mapping,
    first: &str,
    rest: &str,
    newline: &str,
) {
    for (position, (k, v)) in map.iter().enumerate() {
        if position > 0 {
            out.push_str(newline);
        }
        let prefix = if position == 0 { first } else { rest };
        out.push_str(&format!("{prefix}{}: {}", yaml_value(k), yaml_value(v)));
    }
}

/// Render `value` as a plain scalar when that reads back as the same string.
pub(crate) fn yaml_scalar(value: &str) -> String {
    if is_plain_safe(value) {
        value.to_string()
    } else {
        let mut escaped = String::with_capacity(value.len() + 2);
        for c in value.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
                c => escaped.push(c),
            }
        }
        format!("\"{}\"", escaped)
    }
}

/// Single-line rendering of a decoded value. Collections use flow style.
fn yaml_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => yaml_scalar(s),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
    }
}

fn is_plain_safe(value: &str) -> bool {
    if value.is_empty() || value.trim() != value {
        return false;
    }
    if matches!(
        value,
        "true" | "false" | "True" | "False" | "TRUE" | "FALSE" | "yes" | "no" | "on" | "off"
            | "null" | "Null" | "NULL" | "~"
    ) {
        return false;
    }
    if value.parse::<f64>().is_ok() {
        return false;
    }
    let bytes = value.as_bytes();
    if b"?:,[]{}#&*!|>'\"%@`".contains(&bytes[0]) {
        return false;
    }
    if bytes[0] == b'-' && (bytes.len() == 1 || bytes[1] == b' ') {
        return false;
    }
    !value.contains(": ") && !value.contains(" #") && !value.ends_with(':') && !value.contains(['\n', '\r', '\t'])
}

impl ComposeDocument {
    /// Node of the plugin sequence, if the document has one.
    pub fn locate_plugin_sequence(&self) -> Option<&Node> {
        let (_, agent) = first_agent(self.root()).ok()?;
        let custom = agent.get("perception")?.get("custom")?;
        custom.is_sequence().then_some(custom)
    }

    /// Locate and decode the plugin sequence of the first agent.
    pub fn plugin_sequence(&self) -> Result<PluginSequence, MissingTarget> {
        let (agent_name, agent) = first_agent(self.root())?;

        let perception = match agent.entry("perception") {
            Some(entry) if entry.value.is_mapping() => &entry.value,
            Some(_) => {
                return Err(MissingTarget::new(format!(
                    "agent `{}`: perception is not a mapping",
                    agent_name
                )))
            }
            None => {
                return Err(MissingTarget::new(format!(
                    "agent `{}` has no perception section",
                    agent_name
                )))
            }
        };

        let custom = match perception.entry("custom") {
            Some(entry) => entry,
            None => {
                return Err(MissingTarget::new(format!(
                    "agent `{}` has no perception.custom list",
                    agent_name
                )))
            }
        };

        match &custom.value.kind {
            NodeKind::Sequence(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    entries.push(decode_entry(index, &item.node, item.end));
                }
                let (dash_indent, key_gap) = match items.first() {
                    Some(first) => {
                        let gap = first.node.indent.saturating_sub(first.dash_indent).max(1);
                        (first.dash_indent, gap)
                    }
                    None => (custom.indent + 2, 2),
                };
                Ok(PluginSequence {
                    agent: agent_name,
                    entries,
                    shape: SequenceShape::Block {
                        insert_at: custom.value.span.end,
                    },
                    dash_indent,
                    key_gap,
                })
            }
            NodeKind::Flow(raw) if raw.starts_with('[') => {
                let items: Vec<serde_yaml::Value> = serde_yaml::from_str(raw).map_err(|e| {
                    MissingTarget::new(format!(
                        "agent `{}`: perception.custom cannot be decoded: {}",
                        agent_name, e
                    ))
                })?;
                let entries = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| decode_flow_item(index, item, &custom.value))
                    .collect();
                Ok(PluginSequence {
                    agent: agent_name,
                    entries,
                    shape: SequenceShape::Flow {
                        span: custom.value_start..custom.value.span.end,
                        insert_at: custom.end,
                        items,
                    },
                    dash_indent: custom.indent + 2,
                    key_gap: 2,
                })
            }
            NodeKind::Null => Err(MissingTarget::new(format!(
                "agent `{}`: perception.custom is empty",
                agent_name
            ))),
            _ => Err(MissingTarget::new(format!(
                "agent `{}`: perception.custom is not a list",
                agent_name
            ))),
        }
    }
}

fn first_agent(root: &Node) -> Result<(String, &Node), MissingTarget> {
    let agents = match root.entry("agents") {
        Some(entry) if entry.value.is_mapping() => &entry.value,
        Some(_) => return Err(MissingTarget::new("`agents` is not a mapping")),
        None => return Err(MissingTarget::new("no `agents` section")),
    };
    match agents.entries().first() {
        Some(entry) if entry.value.is_mapping() => Ok((entry.key.value.clone(), &entry.value)),
        Some(entry) => Err(MissingTarget::new(format!(
            "agent `{}` is not a mapping",
            entry.key.value
        ))),
        None => Err(MissingTarget::new("`agents` is empty")),
    }
}

fn decode_entry(index: usize, node: &Node, end: usize) -> PluginEntry {
    match &node.kind {
        NodeKind::Mapping(_) => {
            let enabled = match node.entry("enabled") {
                None => EnabledField::Absent,
                Some(entry) => EnabledField::Present {
                    value: entry.value.as_scalar().and_then(|s| s.as_bool()),
                    span: entry.value.span.clone(),
                    empty: matches!(entry.value.kind, NodeKind::Null),
                },
            };
            PluginEntry {
                index,
                name: node.get("name").and_then(Node::as_str).map(str::to_string),
                script: node.get("script").and_then(Node::as_str).map(str::to_string),
                enabled,
                editable: true,
                key_indent: node.indent,
                end,
                flow_span: None,
            }
        }
        NodeKind::Flow(raw) => {
            let decoded: Option<FlowPlugin> = serde_yaml::from_str(raw).ok();
            let (name, script, enabled) = match decoded {
                Some(p) => (p.name, p.script, p.enabled),
                None => (None, None, None),
            };
            PluginEntry {
                index,
                name,
                script,
                enabled: match enabled {
                    Some(value) => EnabledField::Present {
                        value: Some(value),
                        span: node.span.clone(),
                        empty: false,
                    },
                    None => EnabledField::Absent,
                },
                editable: false,
                key_indent: node.indent,
                end,
                flow_span: raw.starts_with('{').then(|| node.span.clone()),
            }
        }
        _ => PluginEntry {
            index,
            name: None,
            script: None,
            enabled: EnabledField::Absent,
            editable: false,
            key_indent: node.indent,
            end,
            flow_span: None,
        },
    }
}

/// An item of a flow sequence. Edits go through a rewrite of the whole
/// sequence, so the entry carries the sequence span.
fn decode_flow_item(index: usize, item: &serde_yaml::Value, sequence: &Node) -> PluginEntry {
    let field = |key: &str| item.get(key);
    let enabled = match field("enabled") {
        None => EnabledField::Absent,
        Some(value) => EnabledField::Present {
            value: value.as_bool(),
            span: sequence.span.clone(),
            empty: false,
        },
    };
    PluginEntry {
        index,
        name: field("name").and_then(|v| v.as_str()).map(str::to_string),
        script: field("script").and_then(|v| v.as_str()).map(str::to_string),
        enabled,
        editable: item.is_mapping(),
        key_indent: sequence.indent,
        end: sequence.span.end,
        flow_span: None,
    }
}

#[derive(serde::Deserialize)]
struct FlowPlugin {
    name: Option<String>,
    script: Option<String>,
    enabled: Option<bool>,
}
