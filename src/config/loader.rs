use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file and validate it
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    // An empty file deserializes to unit, not a map
    let config: AppConfig = if content.trim().is_empty() {
        AppConfig::default()
    } else {
        serde_yaml::from_str(&content)?
    };
    config.validate()?;

    Ok(config)
}
