//! Hardware and network parsing against captured command output.
//!
//! The fixtures are trimmed copies of what `system_profiler`, `/proc`,
//! `xrandr`, and `tailscale` print, so no device or network is touched.

use sense_core::detect::hardware::{
    drm_connector, parse_asound_cards, parse_system_profiler, parse_xrandr, video_devices,
};
use sense_core::detect::network::{
    lan_ipv4, tailscale_status_online, vpn_from_interfaces, InterfaceAddr,
};
use sense_core::detect::{Display, HardwareDevice};
use std::net::Ipv4Addr;

const SYSTEM_PROFILER: &str = r#"{
  "SPCameraDataType": [
    { "_name": "FaceTime HD Camera", "spcamera_model-id": "UVC Camera VendorID_1452" }
  ],
  "SPAudioDataType": [
    {
      "_name": "coreaudio_device",
      "_items": [
        {
          "_name": "MacBook Pro Microphone",
          "coreaudio_device_input": 1,
          "coreaudio_device_manufacturer": "Apple Inc.",
          "coreaudio_input_source": "MacBook Pro Microphone"
        },
        {
          "_name": "MacBook Pro Speakers",
          "coreaudio_device_output": 2,
          "coreaudio_output_source": "MacBook Pro Speakers"
        },
        {
          "_name": "USB Headset",
          "coreaudio_device_input": 1,
          "coreaudio_device_output": 2
        }
      ]
    }
  ],
  "SPDisplaysDataType": [
    {
      "_name": "Apple M2 Pro",
      "spdisplays_ndrvs": [
        { "_name": "Color LCD", "_spdisplays_resolution": "3024 x 1964 Retina" },
        { "_name": "DELL U2720Q" }
      ]
    }
  ]
}"#;

const ASOUND_CARDS: &str = " 0 [PCH            ]: HDA-Intel - HDA Intel PCH
                      HDA Intel PCH at 0xf7f10000 irq 32
 1 [Headset        ]: USB-Audio - USB Headset
                      Logitech USB Headset at usb-0000:00:14.0-2, full speed
";

const XRANDR: &str = "Screen 0: minimum 320 x 200, current 3840 x 1080, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 309mm x 174mm
   1920x1080     60.01*+  59.97    59.96    59.93
   1680x1050     59.95    59.88
HDMI-1 connected 1920x1080+1920+0 (normal left inverted right x axis y axis) 527mm x 296mm
   1920x1080     60.00*+  50.00    59.94
DP-1 disconnected (normal left inverted right x axis y axis)
HDMI-2 connected (normal left inverted right x axis y axis)
";

fn names(devices: &[HardwareDevice]) -> Vec<&str> {
    devices.iter().map(|d| d.name.as_str()).collect()
}

fn iface(name: &str, up: bool, ipv4: Option<[u8; 4]>) -> InterfaceAddr {
    InterfaceAddr {
        name: name.to_string(),
        up,
        ipv4: ipv4.map(Ipv4Addr::from),
    }
}

#[test]
fn system_profiler_splits_audio_by_direction() {
    let info = parse_system_profiler(SYSTEM_PROFILER);
    assert_eq!(names(&info.cameras), ["FaceTime HD Camera"]);
    assert_eq!(
        names(&info.microphones),
        ["MacBook Pro Microphone", "USB Headset"]
    );
    assert_eq!(names(&info.speakers), ["MacBook Pro Speakers", "USB Headset"]);
    assert_eq!(
        info.displays,
        vec![
            Display {
                name: "Color LCD".to_string(),
                resolution: Some("3024 x 1964 Retina".to_string()),
            },
            Display {
                name: "DELL U2720Q".to_string(),
                resolution: None,
            },
        ]
    );
}

#[test]
fn system_profiler_without_device_details_counts_controller_both_ways() {
    let json = r#"{ "SPAudioDataType": [ { "_name": "Built-in Audio" } ] }"#;
    let info = parse_system_profiler(json);
    assert_eq!(names(&info.microphones), ["Built-in Audio"]);
    assert_eq!(names(&info.speakers), ["Built-in Audio"]);
    assert!(info.cameras.is_empty());
    assert!(info.displays.is_empty());
}

#[test]
fn asound_cards_skip_description_lines() {
    assert_eq!(
        parse_asound_cards(ASOUND_CARDS),
        ["HDA Intel PCH", "USB Headset"]
    );
    assert!(parse_asound_cards("--- no soundcards ---\n").is_empty());
}

#[test]
fn xrandr_keeps_connected_outputs_only() {
    let displays = parse_xrandr(XRANDR);
    let summary: Vec<(&str, Option<&str>)> = displays
        .iter()
        .map(|d| (d.name.as_str(), d.resolution.as_deref()))
        .collect();
    assert_eq!(
        summary,
        [
            ("eDP-1", Some("1920x1080")),
            ("HDMI-1", Some("1920x1080")),
            ("HDMI-2", None),
        ]
    );
}

#[test]
fn video_devices_are_ordered_numerically() {
    let entries = ["video10", "null", "video1", "videocard", "video0", "tty0"]
        .iter()
        .map(|s| s.to_string());
    assert_eq!(
        names(&video_devices(entries)),
        ["/dev/video0", "/dev/video1", "/dev/video10"]
    );
}

#[test]
fn drm_connector_requires_connected_status() {
    assert_eq!(
        drm_connector("card1-eDP-1", "connected\n"),
        Some(Display {
            name: "eDP-1".to_string(),
            resolution: None,
        })
    );
    assert_eq!(drm_connector("card1-DP-2", "disconnected\n"), None);
    assert_eq!(drm_connector("version", "connected"), None);
}

#[test]
fn lan_addresses_exclude_loopback_and_repeats() {
    let interfaces = [
        iface("lo", true, Some([127, 0, 0, 1])),
        iface("eth0", true, None),
        iface("eth0", true, Some([192, 168, 1, 20])),
        iface("wlan0", true, Some([10, 0, 0, 7])),
        iface("br0", true, Some([192, 168, 1, 20])),
    ];
    assert_eq!(lan_ipv4(&interfaces), ["192.168.1.20", "10.0.0.7"]);
}

#[test]
fn vpn_interfaces_must_be_up() {
    let interfaces = [
        iface("en0", true, Some([192, 168, 1, 5])),
        iface("utun3", true, None),
        iface("utun3", true, Some([100, 64, 0, 2])),
        iface("wg0", false, None),
        iface("Tailscale0", true, None),
    ];
    let vpn = vpn_from_interfaces(&interfaces);
    assert!(vpn.active);
    assert_eq!(vpn.interfaces, ["utun3", "Tailscale0"]);

    let vpn = vpn_from_interfaces(&[iface("wg0", false, None)]);
    assert!(!vpn.active);
    assert!(vpn.interfaces.is_empty());
}

#[test]
fn tailscale_status_reads_backend_state() {
    assert!(tailscale_status_online(r#"{"BackendState":"Running","Self":{"Online":false}}"#));
    assert!(tailscale_status_online(r#"{"BackendState":"Starting","Self":{"Online":true}}"#));
    assert!(!tailscale_status_online(r#"{"BackendState":"Stopped","Self":{"Online":false}}"#));
    assert!(!tailscale_status_online("tailscale: not running"));
}
