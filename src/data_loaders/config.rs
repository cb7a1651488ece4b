use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use super::yaml::load_yaml;
use crate::utility::deskloop_media_dir;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub media_folder: Option<PathBuf>,
    pub settings: AppSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub playback: PlaybackSettings,
    pub pausing: PausingSettings,
    pub interactions: InteractionSettings,
    pub watcher: WatcherSettings,
    pub runtime: RuntimeSettings,
    pub diagnostics: DiagnosticsSettings,
}

#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub advance_interval_secs: u64,
    pub aspect_ratios: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PausingSettings {
    pub user_poll_interval_ms: u64,
    pub system_poll_interval_ms: u64,
    pub battery: BatterySignalSettings,
    pub fullscreen: FullscreenSignalSettings,
    pub cpu: CpuSignalSettings,
}

#[derive(Debug, Clone)]
pub struct BatterySignalSettings {
    pub enabled: bool,
    pub threshold_percent: u8,
}

#[derive(Debug, Clone)]
pub struct FullscreenSignalSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CpuSignalSettings {
    pub enabled: bool,
    pub threshold_percent: u8,
}

#[derive(Debug, Clone)]
pub struct InteractionSettings {
    pub send_move: bool,
    pub send_click: bool,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub enabled: bool,
    pub scan_interval_ms: u64,
    pub debounce_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub tick_sleep_ms: u64,
    pub topology_check_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsSettings {
    pub log_pause_state_changes: bool,
    pub log_watcher_reloads: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            playback: PlaybackSettings::default(),
            pausing: PausingSettings::default(),
            interactions: InteractionSettings::default(),
            watcher: WatcherSettings::default(),
            runtime: RuntimeSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            advance_interval_secs: 300,
            aspect_ratios: vec![16.0 / 9.0, 16.0 / 10.0, 4.0 / 3.0, 21.0 / 9.0],
        }
    }
}

impl Default for PausingSettings {
    fn default() -> Self {
        Self {
            user_poll_interval_ms: 250,
            system_poll_interval_ms: 3000,
            battery: BatterySignalSettings::default(),
            fullscreen: FullscreenSignalSettings::default(),
            cpu: CpuSignalSettings::default(),
        }
    }
}

impl Default for BatterySignalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: 25,
        }
    }
}

impl Default for FullscreenSignalSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for CpuSignalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_percent: 85,
        }
    }
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            send_move: true,
            send_click: true,
            poll_interval_ms: 10,
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: 2000,
            debounce_secs: 30,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_sleep_ms: 8,
            topology_check_interval_ms: 2000,
        }
    }
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            log_pause_state_changes: true,
            log_watcher_reloads: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            media_folder: deskloop_media_dir(),
            settings: AppSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Option<Self> {
        let value = load_yaml(path)?;
        Self::from_yaml(&value)
    }

    pub fn from_yaml(root: &Value) -> Option<Self> {
        let map = root.as_mapping()?;

        let settings = parse_settings(map);
        let debug = bool_at(map, "debug").unwrap_or(false);
        let media_folder = str_at(map, "media_folder")
            .map(|s| PathBuf::from(s.trim()))
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(deskloop_media_dir);

        Some(Self {
            debug,
            media_folder,
            settings,
        })
    }
}

fn parse_settings(root: &Mapping) -> AppSettings {
    let mut settings = AppSettings::default();

    let settings_map = mapping_at(root, "settings");
    let playback_map = settings_map.and_then(|v| mapping_at(v, "playback"));
    let pausing_map = settings_map.and_then(|v| mapping_at(v, "pausing"));
    let interactions_map = settings_map.and_then(|v| mapping_at(v, "interactions"));
    let watcher_map = settings_map.and_then(|v| mapping_at(v, "watcher"));
    let runtime_map = settings_map.and_then(|v| mapping_at(v, "runtime"));
    let diagnostics_map = settings_map.and_then(|v| mapping_at(v, "diagnostics"));

    if let Some(playback) = playback_map {
        settings.playback.advance_interval_secs =
            u64_any(playback, &["advance_interval_secs", "interval_secs", "cycle_secs"])
                .unwrap_or(settings.playback.advance_interval_secs)
                .max(5);
        if let Some(ratios) = f64_list_at(playback, "aspect_ratios") {
            if !ratios.is_empty() {
                settings.playback.aspect_ratios = ratios;
            }
        }
    }

    if let Some(pausing) = pausing_map {
        settings.pausing.user_poll_interval_ms =
            u64_at(pausing, "user_poll_interval_ms")
                .unwrap_or(settings.pausing.user_poll_interval_ms)
                .max(50);
        settings.pausing.system_poll_interval_ms =
            u64_any(pausing, &["system_poll_interval_ms", "check_interval_ms"])
                .unwrap_or(settings.pausing.system_poll_interval_ms)
                .max(500);

        if let Some(battery) = mapping_at(pausing, "battery") {
            settings.pausing.battery.enabled =
                bool_at(battery, "enabled").unwrap_or(settings.pausing.battery.enabled);
            settings.pausing.battery.threshold_percent =
                u64_any(battery, &["threshold_percent", "threshold"])
                    .map(|v| v.min(100) as u8)
                    .unwrap_or(settings.pausing.battery.threshold_percent);
        }

        if let Some(fullscreen) = mapping_at(pausing, "fullscreen") {
            settings.pausing.fullscreen.enabled =
                bool_at(fullscreen, "enabled").unwrap_or(settings.pausing.fullscreen.enabled);
        }

        if let Some(cpu) = mapping_at(pausing, "cpu") {
            settings.pausing.cpu.enabled =
                bool_at(cpu, "enabled").unwrap_or(settings.pausing.cpu.enabled);
            settings.pausing.cpu.threshold_percent =
                u64_any(cpu, &["threshold_percent", "threshold"])
                    .map(|v| v.min(100) as u8)
                    .unwrap_or(settings.pausing.cpu.threshold_percent);
        }
    }

    if let Some(interactions) = interactions_map {
        settings.interactions.send_move = bool_any(
            interactions,
            &["send_move", "pointer_move", "track_pointer"],
        )
        .unwrap_or(settings.interactions.send_move);
        settings.interactions.send_click = bool_any(
            interactions,
            &["send_click", "pointer_click"],
        )
        .unwrap_or(settings.interactions.send_click);
        settings.interactions.poll_interval_ms =
            u64_any(interactions, &["poll_interval_ms", "sample_interval_ms"])
                .unwrap_or(settings.interactions.poll_interval_ms)
                .max(1);
    }

    if let Some(watcher) = watcher_map {
        settings.watcher.enabled = bool_any(watcher, &["enabled", "auto_reload", "watch_files"])
            .unwrap_or(settings.watcher.enabled);
        settings.watcher.scan_interval_ms =
            u64_any(watcher, &["scan_interval_ms", "interval_ms"])
                .unwrap_or(settings.watcher.scan_interval_ms)
                .max(200);
        settings.watcher.debounce_secs = u64_any(watcher, &["debounce_secs", "quiet_secs"])
            .unwrap_or(settings.watcher.debounce_secs)
            .max(1);
    }

    if let Some(runtime) = runtime_map {
        settings.runtime.tick_sleep_ms = u64_at(runtime, "tick_sleep_ms")
            .unwrap_or(settings.runtime.tick_sleep_ms)
            .max(1);
        settings.runtime.topology_check_interval_ms =
            u64_at(runtime, "topology_check_interval_ms")
                .unwrap_or(settings.runtime.topology_check_interval_ms)
                .max(500);
    }

    if let Some(diag) = diagnostics_map {
        settings.diagnostics.log_pause_state_changes =
            bool_any(diag, &["log_pause_state_changes", "log_pause_changes"])
                .unwrap_or(settings.diagnostics.log_pause_state_changes);
        settings.diagnostics.log_watcher_reloads =
            bool_any(diag, &["log_watcher_reloads", "log_live_reload"])
                .unwrap_or(settings.diagnostics.log_watcher_reloads);
    }

    settings
}

fn bool_at(map: &Mapping, key: &str) -> Option<bool> {
    map.get(Value::String(key.to_string()))?.as_bool()
}

fn bool_any(map: &Mapping, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| bool_at(map, k))
}

fn str_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(Value::String(key.to_string()))?.as_str()
}

fn mapping_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(Value::String(key.to_string()))?.as_mapping()
}

fn u64_at(map: &Mapping, key: &str) -> Option<u64> {
    map.get(Value::String(key.to_string()))?
        .as_i64()
        .and_then(|v| if v >= 0 { Some(v as u64) } else { None })
}

fn u64_any(map: &Mapping, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| u64_at(map, k))
}

fn f64_list_at(map: &Mapping, key: &str) -> Option<Vec<f64>> {
    let list = map.get(Value::String(key.to_string()))?.as_sequence()?;
    let parsed: Vec<f64> = list.iter().filter_map(|v| v.as_f64()).collect();

    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(text: &str) -> AppConfig {
        let value: Value = serde_yaml::from_str(text).unwrap();
        AppConfig::from_yaml(&value).unwrap()
    }

    #[test]
    fn defaults_when_sections_missing() {
        let config = config_from("debug: false\n");
        assert_eq!(config.settings.playback.advance_interval_secs, 300);
        assert_eq!(config.settings.pausing.battery.threshold_percent, 25);
        assert!(config.settings.pausing.fullscreen.enabled);
        assert!(!config.settings.pausing.cpu.enabled);
        assert_eq!(config.settings.watcher.debounce_secs, 30);
    }

    #[test]
    fn parses_nested_settings() {
        let config = config_from(
            r#"
debug: true
media_folder: "C:/Wallpapers"
settings:
  playback:
    advance_interval_secs: 60
    aspect_ratios: [1.7777, 1.6]
  pausing:
    system_poll_interval_ms: 5000
    battery:
      enabled: false
      threshold_percent: 40
    cpu:
      enabled: true
      threshold: 90
  watcher:
    debounce_secs: 10
"#,
        );

        assert!(config.debug);
        assert_eq!(
            config.media_folder.as_deref(),
            Some(Path::new("C:/Wallpapers"))
        );
        assert_eq!(config.settings.playback.advance_interval_secs, 60);
        assert_eq!(config.settings.playback.aspect_ratios.len(), 2);
        assert_eq!(config.settings.pausing.system_poll_interval_ms, 5000);
        assert!(!config.settings.pausing.battery.enabled);
        assert_eq!(config.settings.pausing.battery.threshold_percent, 40);
        assert!(config.settings.pausing.cpu.enabled);
        assert_eq!(config.settings.pausing.cpu.threshold_percent, 90);
        assert_eq!(config.settings.watcher.debounce_secs, 10);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let config = config_from(
            r#"
settings:
  playback:
    advance_interval_secs: 1
  pausing:
    battery:
      threshold_percent: 250
  runtime:
    tick_sleep_ms: 0
"#,
        );

        assert_eq!(config.settings.playback.advance_interval_secs, 5);
        assert_eq!(config.settings.pausing.battery.threshold_percent, 100);
        assert_eq!(config.settings.runtime.tick_sleep_ms, 1);
    }
}
