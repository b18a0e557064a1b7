use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub heuristics: HeuristicConfig,
    pub database: DatabaseConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_cooldown_secs: u64,
    pub gateway_backoff_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeuristicConfig {
    pub mixer_incoming_threshold: usize,
    pub fanout_note_threshold: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub graph_path: String,
    pub report_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            heuristics: HeuristicConfig::default(),
            database: DatabaseConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.xrpscan.com/api/v1".into(),
            page_size: 200,
            timeout_secs: 10,
            max_retries: 5,
            rate_limit_cooldown_secs: 60,
            gateway_backoff_secs: 30,
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            mixer_incoming_threshold: 10,
            fanout_note_threshold: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/tags.db".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            graph_path: "trace_graph.dot".into(),
            report_path: "trace_report.txt".into(),
        }
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }
}
