use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Service wiring read from the YAML document: CORS origins and the per-process
/// logging level. Kept intentionally small — the read API and logging sinks
/// are external collaborators, this crate's own concern stops at the pipeline.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceSection {
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    10
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
        }
    }
}

/// A `(contest number, start instant)` pair the dispatcher anchors its
/// weeks-since arithmetic to. See `dispatcher::weeks_since`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ContestReference {
    pub number: i64,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct YamlConfig {
    #[serde(default)]
    service: ServiceSection,
    #[serde(default)]
    store: StoreSection,
    weekly_contest_ref: Option<ContestReference>,
    biweekly_contest_ref: Option<ContestReference>,
}

pub struct Config {
    pub service: ServiceSection,
    pub database_url: String,
    pub pool_size: usize,
    pub weekly_contest_ref: ContestReference,
    pub biweekly_contest_ref: ContestReference,
}

fn var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) => Some(v),
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            tracing::warn!("environment variable `{key}` is not valid unicode");
            None
        }
    }
}

impl Config {
    /// Loads the YAML config at `path` (if present), then overlays environment
    /// variables. `DATABASE_URL`, when set, always wins over the YAML-supplied
    /// store URI — the one environment override the spec calls out explicitly.
    pub fn load(path: &str) -> crate::error::Result<Self> {
        let yaml = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str::<YamlConfig>(&contents)
                .map_err(|e| crate::error::Error::Config(format!("invalid config YAML: {e}")))?,
            Err(_) => {
                tracing::warn!(path, "no config file found, relying on defaults/env");
                YamlConfig::default()
            }
        };

        let database_url = var("DATABASE_URL")
            .or(yaml.store.url)
            .ok_or_else(|| crate::error::Error::Config("no store URI configured".into()))?;

        let weekly_contest_ref = yaml.weekly_contest_ref.unwrap_or(ContestReference {
            number: 294,
            start_time: DateTime::parse_from_rfc3339("2022-05-22T02:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        });

        let biweekly_contest_ref = yaml.biweekly_contest_ref.unwrap_or(ContestReference {
            number: 78,
            start_time: DateTime::parse_from_rfc3339("2022-05-14T14:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        });

        Ok(Config {
            service: yaml.service,
            database_url,
            pool_size: yaml.store.pool_size,
            weekly_contest_ref,
            biweekly_contest_ref,
        })
    }

    /// Fails the process at startup rather than limping along without a store.
    pub fn load_or_exit(path: &str) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "fatal config error, exiting");
                std::process::exit(1)
            }
        }
    }
}
