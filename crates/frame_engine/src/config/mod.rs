//! Configuration system
//!
//! File-backed configuration (TOML or RON, picked by extension) plus the
//! frame resource settings consumed by [`crate::render::FrameResources`].

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Frame Resource Configuration
///
/// Sizing for the per-frame uniform arenas.
///
/// `frame_slot_count` is the number of frames the CPU may run ahead of the
/// GPU. Each slot is a full copy of the pass and object constants, so total
/// uniform memory grows linearly with it. One slot is legal but serializes
/// CPU and GPU on every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameResourceConfig {
    /// Name reported in logs
    pub application_name: String,
    /// Number of independent frame slots (frames in flight)
    pub frame_slot_count: usize,
    /// Objects reserved in the per-object arena
    pub max_objects: usize,
    /// Overrides the device's minimum uniform offset alignment when larger
    pub min_uniform_alignment: Option<u64>,
}

impl FrameResourceConfig {
    /// Default number of frames in flight
    pub const DEFAULT_FRAME_SLOTS: usize = 3;

    /// Create a configuration with default sizing
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Set the number of frame slots
    #[must_use]
    pub fn with_frame_slot_count(mut self, count: usize) -> Self {
        self.frame_slot_count = count;
        self
    }

    /// Set the number of objects reserved per frame slot
    #[must_use]
    pub fn with_max_objects(mut self, count: usize) -> Self {
        self.max_objects = count;
        self
    }

    /// Force a minimum uniform alignment
    #[must_use]
    pub fn with_min_uniform_alignment(mut self, alignment: u64) -> Self {
        self.min_uniform_alignment = Some(alignment);
        self
    }

    /// Check the values before any device memory is sized from them
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_slot_count == 0 {
            return Err(ConfigError::Invalid("frame_slot_count must be at least 1".to_string()));
        }
        if self.max_objects == 0 {
            return Err(ConfigError::Invalid("max_objects must be at least 1".to_string()));
        }
        if let Some(alignment) = self.min_uniform_alignment {
            if !alignment.is_power_of_two() {
                return Err(ConfigError::Invalid(format!(
                    "min_uniform_alignment {alignment} is not a power of two"
                )));
            }
        }
        if self.frame_slot_count == 1 {
            log::warn!(
                "{}: a single frame slot forces a GPU wait before every frame",
                self.application_name
            );
        }
        Ok(())
    }
}

impl Default for FrameResourceConfig {
    fn default() -> Self {
        Self {
            application_name: "Frame Engine".to_string(),
            frame_slot_count: Self::DEFAULT_FRAME_SLOTS,
            max_objects: 44,
            min_uniform_alignment: None,
        }
    }
}

impl Config for FrameResourceConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_triple_buffered() {
        let config = FrameResourceConfig::default();
        assert_eq!(config.frame_slot_count, 3);
        assert_eq!(config.max_objects, 44);
        assert!(config.min_uniform_alignment.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: FrameResourceConfig = toml::from_str(
            "frame_slot_count = 2\nmin_uniform_alignment = 64\n",
        ).expect("valid toml");

        assert_eq!(config.frame_slot_count, 2);
        assert_eq!(config.min_uniform_alignment, Some(64));
        assert_eq!(config.max_objects, 44);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_slots = FrameResourceConfig::default().with_frame_slot_count(0);
        assert!(matches!(zero_slots.validate(), Err(ConfigError::Invalid(_))));

        let zero_objects = FrameResourceConfig::default().with_max_objects(0);
        assert!(matches!(zero_objects.validate(), Err(ConfigError::Invalid(_))));

        let odd_alignment = FrameResourceConfig::default().with_min_uniform_alignment(48);
        assert!(matches!(odd_alignment.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = std::env::temp_dir().join(format!("frame_engine_config_{}.ron", std::process::id()));
        let path = path.to_str().expect("utf-8 temp path").to_string();

        let config = FrameResourceConfig::new("ron test").with_max_objects(8);
        config.save_to_file(&path).expect("save");
        let loaded = FrameResourceConfig::load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = FrameResourceConfig::load_from_file("settings.ini");
        assert!(matches!(result, Err(ConfigError::Io(_)) | Err(ConfigError::UnsupportedFormat(_))));
    }
}
