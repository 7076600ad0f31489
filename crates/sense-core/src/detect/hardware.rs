//! Perception-relevant hardware: cameras, microphones, speakers, displays.
//!
//! macOS answers everything with one `system_profiler -json` call. Linux is
//! read from `/dev`, `/proc/asound/cards`, and `xrandr` with a DRM fallback
//! for machines without an X display. Other systems report nothing.

use crate::probe::runner::run_with_timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::trace;

/// `system_profiler` can take several seconds on a cold cache.
pub const SYSTEM_PROFILER_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for `xrandr --query`.
pub const DISPLAY_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub cameras: Vec<HardwareDevice>,
    pub microphones: Vec<HardwareDevice>,
    pub speakers: Vec<HardwareDevice>,
    pub displays: Vec<Display>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareDevice {
    pub name: String,
}

impl HardwareDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Scan the running machine.
pub fn detect_hardware() -> HardwareInfo {
    match std::env::consts::OS {
        "macos" => detect_macos(),
        "linux" => detect_linux(),
        _ => HardwareInfo::default(),
    }
}

fn detect_macos() -> HardwareInfo {
    let args = [
        "SPCameraDataType",
        "SPAudioDataType",
        "SPDisplaysDataType",
        "-json",
    ];
    match run_with_timeout("system_profiler", &args, SYSTEM_PROFILER_TIMEOUT) {
        Ok(out) if out.success() => parse_system_profiler(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            trace!(exit_code = ?out.exit_code, "system_profiler failed");
            HardwareInfo::default()
        }
        Err(e) => {
            trace!(error = %e, "system_profiler failed");
            HardwareInfo::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SystemProfiler {
    #[serde(rename = "SPCameraDataType", default)]
    cameras: Vec<ProfilerItem>,
    #[serde(rename = "SPAudioDataType", default)]
    audio: Vec<AudioGroup>,
    #[serde(rename = "SPDisplaysDataType", default)]
    graphics: Vec<GraphicsItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilerItem {
    #[serde(rename = "_name", default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AudioGroup {
    #[serde(rename = "_name", default)]
    name: String,
    #[serde(rename = "_items", default)]
    items: Vec<AudioDevice>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioDevice {
    #[serde(rename = "_name", default)]
    name: String,
    #[serde(default)]
    coreaudio_device_input: Option<serde_json::Value>,
    #[serde(default)]
    coreaudio_input_source: Option<String>,
    #[serde(default)]
    coreaudio_device_output: Option<serde_json::Value>,
    #[serde(default)]
    coreaudio_output_source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphicsItem {
    #[serde(rename = "spdisplays_ndrvs", default)]
    monitors: Vec<Monitor>,
}

#[derive(Debug, Default, Deserialize)]
struct Monitor {
    #[serde(rename = "_name", default)]
    name: String,
    #[serde(rename = "_spdisplays_resolution", default)]
    resolution: Option<String>,
}

/// Decode `system_profiler SPCameraDataType SPAudioDataType SPDisplaysDataType -json`.
pub fn parse_system_profiler(json: &str) -> HardwareInfo {
    let profile: SystemProfiler = match serde_json::from_str(json) {
        Ok(profile) => profile,
        Err(e) => {
            trace!(error = %e, "unparsable system_profiler output");
            return HardwareInfo::default();
        }
    };

    let mut info = HardwareInfo {
        cameras: profile
            .cameras
            .iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| HardwareDevice::new(&c.name))
            .collect(),
        ..HardwareInfo::default()
    };

    for device in profile.audio.iter().flat_map(|group| &group.items) {
        let has_input = device.coreaudio_device_input.is_some()
            || device.coreaudio_input_source.as_deref().is_some_and(|s| !s.is_empty());
        let has_output = device.coreaudio_device_output.is_some()
            || device.coreaudio_output_source.as_deref().is_some_and(|s| !s.is_empty());
        if has_input {
            info.microphones.push(HardwareDevice::new(&device.name));
        }
        if has_output {
            info.speakers.push(HardwareDevice::new(&device.name));
        }
    }
    // Older releases list only the audio controller; assume it has both ends.
    if info.microphones.is_empty() && info.speakers.is_empty() {
        for group in profile.audio.iter().filter(|g| !g.name.is_empty()) {
            info.microphones.push(HardwareDevice::new(&group.name));
            info.speakers.push(HardwareDevice::new(&group.name));
        }
    }

    info.displays = profile
        .graphics
        .iter()
        .flat_map(|gpu| &gpu.monitors)
        .map(|m| Display {
            name: m.name.clone(),
            resolution: m.resolution.clone().filter(|r| !r.is_empty()),
        })
        .collect();
    info
}

fn detect_linux() -> HardwareInfo {
    let cameras = match std::fs::read_dir("/dev") {
        Ok(entries) => video_devices(
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned()),
        ),
        Err(e) => {
            trace!(error = %e, "cannot list /dev");
            Vec::new()
        }
    };

    let cards = std::fs::read_to_string("/proc/asound/cards")
        .map(|text| parse_asound_cards(&text))
        .unwrap_or_default();

    let mut displays = match run_with_timeout("xrandr", &["--query"], DISPLAY_QUERY_TIMEOUT) {
        Ok(out) if out.success() => parse_xrandr(&String::from_utf8_lossy(&out.stdout)),
        _ => Vec::new(),
    };
    if displays.is_empty() {
        displays = drm_displays(Path::new("/sys/class/drm"));
    }

    HardwareInfo {
        cameras,
        microphones: cards.iter().map(HardwareDevice::new).collect(),
        speakers: cards.iter().map(HardwareDevice::new).collect(),
        displays,
    }
}

/// Camera nodes among `/dev` entry names (`video0`, `video1`, ...), sorted.
pub fn video_devices(names: impl IntoIterator<Item = String>) -> Vec<HardwareDevice> {
    let mut found: Vec<(u32, String)> = names
        .into_iter()
        .filter_map(|name| {
            let index = name.strip_prefix("video")?.parse::<u32>().ok()?;
            Some((index, format!("/dev/{}", name)))
        })
        .collect();
    found.sort();
    found.into_iter().map(|(_, path)| HardwareDevice::new(path)).collect()
}

/// Card names from `/proc/asound/cards`.
///
/// ```text
///  0 [PCH            ]: HDA-Intel - HDA Intel PCH
///                       HDA Intel PCH at 0xf7f10000 irq 32
/// ```
pub fn parse_asound_cards(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
        .filter_map(|line| line.split_once("]: ").map(|(_, name)| name.trim().to_string()))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Connected outputs from `xrandr --query`.
pub fn parse_xrandr(text: &str) -> Vec<Display> {
    text.lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            if fields.next()? != "connected" {
                return None;
            }
            let resolution = line
                .split_whitespace()
                .filter_map(|token| token.split('+').next())
                .find(|token| is_resolution(token))
                .map(str::to_string);
            Some(Display {
                name: name.to_string(),
                resolution,
            })
        })
        .collect()
}

fn is_resolution(token: &str) -> bool {
    match token.split_once('x') {
        Some((w, h)) => {
            !w.is_empty()
                && !h.is_empty()
                && w.bytes().all(|b| b.is_ascii_digit())
                && h.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Connected DRM connectors under `root` (`card0-HDMI-A-1/status`).
fn drm_displays(root: &Path) -> Vec<Display> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut connectors: Vec<(String, String)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let status = std::fs::read_to_string(entry.path().join("status")).ok()?;
            Some((name, status))
        })
        .collect();
    connectors.sort();
    connectors
        .iter()
        .filter_map(|(name, status)| drm_connector(name, status))
        .collect()
}

/// A DRM connector directory counts as a display when its status reads
/// `connected`. The card prefix is dropped from the name.
pub fn drm_connector(entry: &str, status: &str) -> Option<Display> {
    if status.trim() != "connected" {
        return None;
    }
    let (_, connector) = entry.split_once('-')?;
    Some(Display {
        name: connector.to_string(),
        resolution: None,
    })
}
