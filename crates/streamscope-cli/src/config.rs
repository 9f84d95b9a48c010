use config::{Config as ConfigLoader, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::path::Path;
use streamscope_types::{BridgeConfig, CaptureConfig, FilterConfig, RelayConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Prefix of environment overrides; `__` separates nesting levels.
const ENV_PREFIX: &str = "STREAMSCOPE";

/// Keys whose environment value is a comma-separated list.
const LIST_KEYS: &[&str] = &["filter.extra_allow", "filter.extra_deny"];

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (`STREAMSCOPE_RELAY__MAX_RECONNECT_ATTEMPTS=4`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("config"), &env, std::env::vars())
    }

    /// Same layering with an explicit config directory and variable set.
    pub fn load_from(
        dir: &Path,
        env: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&dir.join(env).to_string_lossy()).required(false))
            // 3. Environment variables override everything
            .add_source(environment(vars.into_iter().collect()));

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }
}

fn environment(vars: Map<String, String>) -> Environment {
    LIST_KEYS.iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .source(Some(vars)),
        |env, key| env.with_list_parse_key(key),
    )
}
