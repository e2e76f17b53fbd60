use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// --- Configuration Sections ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSettings {
    pub width: u32,
    pub height: u32,
}

// --- Top-Level Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_entity_count")]
    pub entity_count: usize,
    pub viewport: ViewportSettings,
    /// Half-open range entity sizes are drawn from.
    #[serde(default = "default_size_range")]
    pub size_range: (i32, i32),
    #[serde(default = "default_initial_velocity")]
    pub initial_velocity: (i32, i32),
    /// Half-open range each velocity component is drawn from on start.
    #[serde(default = "default_velocity_range")]
    pub velocity_range: (i32, i32),
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often the presentation loop redraws.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Re-randomise every entity's speed this often, if set.
    #[serde(default)]
    pub speed_change_secs: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_entity_count() -> usize { 3 } // ball, rectangle, triangle
fn default_size_range() -> (i32, i32) { (50, 100) }
fn default_initial_velocity() -> (i32, i32) { (6, 4) }
fn default_velocity_range() -> (i32, i32) { (2, 12) }
fn default_tick_interval_ms() -> u64 { 40 }
fn default_frame_rate() -> u32 { 25 }

impl Default for Config {
    fn default() -> Self {
        Self {
            entity_count: default_entity_count(),
            viewport: ViewportSettings { width: 1000, height: 1000 },
            size_range: default_size_range(),
            initial_velocity: default_initial_velocity(),
            velocity_range: default_velocity_range(),
            tick_interval_ms: default_tick_interval_ms(),
            frame_rate: default_frame_rate(),
            speed_change_secs: None,
            seed: None,
        }
    }
}

// --- Loading Functions ---

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.entity_count == 0 {
        return Err(ConfigError::ValidationError(
            "Entity count must be greater than 0".to_string(),
        ));
    }

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err(ConfigError::ValidationError(
            "Viewport dimensions must be positive".to_string(),
        ));
    }

    // Entity coordinates are i32.
    if config.viewport.width > i32::MAX as u32 || config.viewport.height > i32::MAX as u32 {
        return Err(ConfigError::ValidationError(format!(
            "Viewport {}x{} exceeds the signed coordinate range",
            config.viewport.width, config.viewport.height
        )));
    }

    let (low, high) = config.size_range;
    if low <= 0 || low >= high {
        return Err(ConfigError::ValidationError(format!(
            "Size range [{}, {}) must be non-empty with a positive minimum",
            low, high
        )));
    }

    let (low, high) = config.velocity_range;
    if low >= high {
        return Err(ConfigError::ValidationError(format!(
            "Velocity range [{}, {}) must be non-empty",
            low, high
        )));
    }

    if config.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Tick interval must be greater than 0".to_string(),
        ));
    }

    if config.frame_rate == 0 {
        return Err(ConfigError::ValidationError(
            "Frame rate must be greater than 0".to_string(),
        ));
    }

    if let Some(secs) = config.speed_change_secs {
        if !(secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()) {
            return Err(ConfigError::ValidationError(
                "Speed change interval must be a positive number of seconds".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn load_full_config() {
        let file = write_config(
            r#"{
              "entity_count": 5,
              "viewport": { "width": 800, "height": 600 },
              "size_range": [20, 40],
              "initial_velocity": [3, -2],
              "velocity_range": [1, 8],
              "tick_interval_ms": 20,
              "frame_rate": 60,
              "speed_change_secs": 2.5,
              "seed": 42
            }"#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.entity_count, 5);
        assert_eq!(config.viewport, ViewportSettings { width: 800, height: 600 });
        assert_eq!(config.size_range, (20, 40));
        assert_eq!(config.initial_velocity, (3, -2));
        assert_eq!(config.velocity_range, (1, 8));
        assert_eq!(config.tick_interval_ms, 20);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.speed_change_secs, Some(2.5));
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let file = write_config(r#"{ "viewport": { "width": 1000, "height": 1000 } }"#);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_viewport_is_a_parse_error() {
        let result = parse_config(r#"{ "entity_count": 3 }"#);
        assert!(matches!(result, Err(ConfigError::JsonParseError(_))));
    }

    #[test]
    fn negative_viewport_is_a_parse_error() {
        let result = parse_config(r#"{ "viewport": { "width": -10, "height": 100 } }"#);
        assert!(matches!(result, Err(ConfigError::JsonParseError(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = load_config(Path::new("/definitely/not/here/kaleidoscope.json"));
        assert!(matches!(result, Err(ConfigError::FileReadError(_))));
    }

    #[test]
    fn rejects_invalid_values() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c: &mut Config| c.entity_count = 0),
            Box::new(|c: &mut Config| c.viewport.height = 0),
            Box::new(|c: &mut Config| c.viewport.width = i32::MAX as u32 + 1),
            Box::new(|c: &mut Config| c.size_range = (0, 10)),
            Box::new(|c: &mut Config| c.size_range = (60, 60)),
            Box::new(|c: &mut Config| c.velocity_range = (12, 2)),
            Box::new(|c: &mut Config| c.tick_interval_ms = 0),
            Box::new(|c: &mut Config| c.frame_rate = 0),
            Box::new(|c: &mut Config| c.speed_change_secs = Some(-1.0)),
            Box::new(|c: &mut Config| c.speed_change_secs = Some(f64::NAN)),
            Box::new(|c: &mut Config| c.speed_change_secs = Some(1e20)),
        ];
        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(
                matches!(validate(&config), Err(ConfigError::ValidationError(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn large_speed_change_interval_is_accepted() {
        let config = Config {
            speed_change_secs: Some(1e9),
            ..Config::default()
        };
        validate(&config).unwrap();
    }

    #[test]
    fn oversized_viewport_fails_on_load() {
        let file = write_config(r#"{ "viewport": { "width": 3000000000, "height": 100 } }"#);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn invalid_file_fails_validation_on_load() {
        let file = write_config(r#"{ "viewport": { "width": 100, "height": 100 }, "frame_rate": 0 }"#);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
