use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Glob patterns, matched against root-relative paths, excluded from the catalog.
    pub ignore_patterns: Vec<String>,
    /// Upper bound on `_N` candidates tried for a single destination.
    pub max_suffix_attempts: u32,
    /// Fall back to copy + remove when a rename crosses filesystems.
    pub cross_device_copy: bool,
    /// Fingerprint sources before moving and re-check destinations afterwards.
    pub verify_after_move: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            max_suffix_attempts: DEFAULT_MAX_SUFFIX_ATTEMPTS,
            cross_device_copy: true,
            verify_after_move: false,
        }
    }
}

/// Reads `Config.toml` from the working directory when present.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Config")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
