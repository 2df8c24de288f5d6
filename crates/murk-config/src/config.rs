//! Top-level config file with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::settings::FogSettings;

const CONFIG_FILE: &str = "murk.ron";

/// Everything persisted in `murk.ron`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MurkConfig {
    /// Fog look and quality.
    pub fog: FogSettings,
    /// Headless demo host settings.
    pub demo: DemoConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Settings for the headless demo host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
    /// Number of frames to render before exiting.
    pub frames: u32,
    /// Simulated seconds per frame.
    pub frame_time: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 240,
            frame_time: 1.0 / 60.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for murk, e.g. `~/.config/murk`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("murk"))
}

// --- Load / Save / Reload ---

impl MurkConfig {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: MurkConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = MurkConfig::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `murk.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: MurkConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LogBlur, VolumeResolution};

    #[test]
    fn test_default_config_serializes() {
        let config = MurkConfig::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("volume_resolution: Tier7"));
        assert!(ron_str.contains("frames: 240"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = MurkConfig::default();
        config.fog.log_blur = LogBlur::Strong;
        config.fog.ambient_color = [0.1, 0.2, 0.3];
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: MurkConfig = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: MurkConfig = ron::from_str("(debug: (log_level: \"warn\"))").unwrap();
        assert_eq!(config.fog, FogSettings::default());
        assert_eq!(config.debug.log_level, "warn");
    }

    #[test]
    fn test_partial_fog_section_keeps_other_defaults() {
        let config: MurkConfig =
            ron::from_str("(fog: (global_density: 12.5, volume_resolution: Tier15))").unwrap();
        assert_eq!(config.fog.global_density, 12.5);
        assert_eq!(config.fog.volume_resolution, VolumeResolution::Tier15);
        assert_eq!(config.fog.anisotropy_sun, 0.585);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MurkConfig::default();
        config.fog.clouds = true;
        config.demo.frames = 10;

        config.save(dir.path()).unwrap();
        let loaded = MurkConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = MurkConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, MurkConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = MurkConfig::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.fog.clouds_density_scale = 2.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().fog.clouds_density_scale, 2.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = MurkConfig::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<MurkConfig, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
