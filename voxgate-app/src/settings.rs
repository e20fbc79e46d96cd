//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use voxgate_core::{voice::notes::solfege_scale, GameConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub game: GameConfig,
}

impl AppSettings {
    /// Clamp tunables into ranges the engine accepts.
    ///
    /// Values that are still inconsistent afterwards are left for
    /// `GameConfig::validate` to report.
    pub fn normalize(&mut self) {
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let voice = &mut self.game.voice;
        voice.min_frequency = voice.min_frequency.clamp(20.0, 2_000.0);
        voice.max_frequency = voice.max_frequency.clamp(40.0, 4_000.0);
        if voice.max_frequency <= voice.min_frequency {
            voice.max_frequency = voice.min_frequency * 10.0;
        }
        voice.volume_threshold = voice.volume_threshold.clamp(0.0, 0.5);
        voice.volume_gain = voice.volume_gain.clamp(0.5, 50.0);
        voice.pitch_smoothing = voice.pitch_smoothing.clamp(0.01, 1.0);
        voice.silence_frames_before_drop = voice.silence_frames_before_drop.min(600);
        voice.silence_decay = voice.silence_decay.clamp(0.0, 0.99);
        voice.frame_size = voice.frame_size.clamp(256, 8_192);

        let motion = &mut self.game.motion;
        motion.forward_speed = motion.forward_speed.clamp(0.001, 1.0);
        motion.backward_speed = motion.backward_speed.clamp(0.0, 1.0);
        motion.height_lerp_speed = motion.height_lerp_speed.clamp(0.01, 1.0);

        self.game.ticks_per_second = self.game.ticks_per_second.clamp(10, 240);

        self.game
            .notes
            .retain(|n| n.frequency_hz.is_finite() && n.frequency_hz > 0.0);
        if self.game.notes.is_empty() {
            self.game.notes = solfege_scale();
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Voxgate")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("voxgate")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring corrupt settings file: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("voxgate-settings-{}-{name}", std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings(Path::new("/definitely/missing/settings.json"));
        assert!(settings.preferred_input_device.is_none());
        assert_eq!(settings.game, GameConfig::default());
    }

    #[test]
    fn normalize_clamps_and_restores_notes() {
        let mut settings = AppSettings {
            preferred_input_device: Some("   ".into()),
            game: GameConfig::default(),
        };
        settings.game.voice.pitch_smoothing = 5.0;
        settings.game.ticks_per_second = 1;
        settings.game.notes.clear();
        settings.normalize();

        assert!(settings.preferred_input_device.is_none());
        assert_eq!(settings.game.voice.pitch_smoothing, 1.0);
        assert_eq!(settings.game.ticks_per_second, 10);
        assert_eq!(settings.game.notes.len(), 8);
        settings.game.validate().expect("normalized settings are valid");
    }

    #[test]
    fn save_then_load_keeps_device_choice() {
        let path = temp_path("roundtrip");
        let settings = AppSettings {
            preferred_input_device: Some("USB Mic".into()),
            game: GameConfig::default(),
        };
        save_settings(&path, &settings).expect("save");
        let loaded = load_settings(&path);
        if let Some(dir) = path.parent() {
            fs::remove_dir_all(dir).ok();
        }
        assert_eq!(loaded.preferred_input_device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).expect("dir");
        }
        fs::write(&path, "{ not json").expect("write");
        let loaded = load_settings(&path);
        if let Some(dir) = path.parent() {
            fs::remove_dir_all(dir).ok();
        }
        assert_eq!(loaded.game.ticks_per_second, 60);
    }
}
