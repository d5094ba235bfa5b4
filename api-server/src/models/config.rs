use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::path::PathBuf;
use strum_macros::{Display, EnumString};

pub const CONFIG_PATH_VAR: &str = "MOVIEDB_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const ENV_PREFIX: &str = "MOVIEDB_";
pub const API_KEY_VAR: &str = "OMDB_API_KEY";

const DEFAULT_BASE_URL: &str = "http://www.omdbapi.com/";
const DEFAULT_STORE_PATH: &str = "movies.db";
const DEFAULT_INITIAL_SWEEP_DELAY_SECS: u64 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[serde_inline_default]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OmdbConfig {
    #[serde_inline_default(String::new())]
    pub api_key: String,
    #[serde_inline_default(DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    #[serde_inline_default(StoreBackend::Memory)]
    pub backend: StoreBackend,
    #[serde_inline_default(PathBuf::from(DEFAULT_STORE_PATH))]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LifecycleSection {
    /// Run the sweep and statistics schedules in this process.
    #[serde_inline_default(true)]
    pub owns_schedules: bool,
    #[serde_inline_default(DEFAULT_INITIAL_SWEEP_DELAY_SECS)]
    pub initial_sweep_delay_secs: u64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            owns_schedules: true,
            initial_sweep_delay_secs: DEFAULT_INITIAL_SWEEP_DELAY_SECS,
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogConfig {
    #[serde_inline_default(DEFAULT_LOG_LEVEL.to_string())]
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde_inline_default(OmdbConfig::default())]
    pub omdb: OmdbConfig,
    #[serde_inline_default(StoreConfig::default())]
    pub store: StoreConfig,
    #[serde_inline_default(LifecycleSection::default())]
    pub lifecycle: LifecycleSection,
    #[serde_inline_default(LogConfig::default())]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            omdb: OmdbConfig::default(),
            store: StoreConfig::default(),
            lifecycle: LifecycleSection::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Reads the YAML file named by `MOVIEDB_CONFIG` (or `config.yaml`), then
    /// `MOVIEDB_*` environment overrides and `OMDB_API_KEY`.
    pub fn load() -> Result<Self, figment::Error> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::figment(Yaml::file(path)).extract()
    }

    pub fn figment(file: impl figment::Provider) -> Figment {
        Figment::new()
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&[API_KEY_VAR]).map(|_| "omdb.api_key".into()))
    }
}
