use clap::Parser;
use lib_common::aggregator::{SourceSpec, SourceSpecError, DEFAULT_HISTORY_CAPACITY, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "server_aggregator.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Weather station aggregator: polls the fog worker and sensor bridge, serves status and history", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "AGGREGATOR_HOST", help = "Address to bind the HTTP API to.")]
    pub host: Option<String>,

    #[clap(long, env = "AGGREGATOR_PORT", help = "Port to listen on for API clients.")]
    pub port: Option<u16>,

    #[clap(long, env = "AGGREGATOR_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "AGGREGATOR_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "AGGREGATOR_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, fatal).")]
    pub log_level: Option<String>,

    #[clap(long, env = "AGGREGATOR_FOG_URL", help = "Base URL of the vision worker (serves /api/fog).")]
    pub fog_url: Option<String>,

    #[clap(long, env = "AGGREGATOR_SENSOR_URL", help = "Base URL of the sensor bridge (serves /api/pm25 and /api/temp).")]
    pub sensor_url: Option<String>,

    #[clap(long, env = "AGGREGATOR_POLL_INTERVAL_MS", help = "Milliseconds between two collection cycles.")]
    pub poll_interval_ms: Option<u64>,

    #[clap(long, env = "AGGREGATOR_SOURCE_TIMEOUT_MS", help = "Per-source request timeout in milliseconds.")]
    pub source_timeout_ms: Option<u64>,

    #[clap(long, env = "AGGREGATOR_HISTORY_CAPACITY", help = "Number of snapshots kept in the rolling history.")]
    pub history_capacity: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            fog_url: other.fog_url.or(self.fog_url),
            sensor_url: other.sensor_url.or(self.sensor_url),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            source_timeout_ms: other.source_timeout_ms.or(self.source_timeout_ms),
            history_capacity: other.history_capacity.or(self.history_capacity),
        }
    }

    fn defaults() -> Config {
        Config {
            host: Some("0.0.0.0".to_string()),
            port: Some(5000),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            fog_url: Some("http://localhost:8084".to_string()),
            sensor_url: Some("http://localhost:8085".to_string()),
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL.as_millis() as u64),
            source_timeout_ms: Some(2000),
            history_capacity: Some(DEFAULT_HISTORY_CAPACITY),
            config_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("invalid listen host '{0}'")]
    InvalidHost(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("sourceTimeoutMs ({timeout_ms}) must not exceed pollIntervalMs ({interval_ms})")]
    TimeoutExceedsInterval { timeout_ms: u64, interval_ms: u64 },

    #[error("missing setting '{0}'")]
    Missing(&'static str),

    #[error(transparent)]
    Source(#[from] SourceSpecError),
}

/// Fully resolved and validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub sources: Vec<SourceSpec>,
    pub poll_interval: Duration,
    pub history_capacity: usize,
    /// Config file that contributed to these settings, if any.
    pub config_file: Option<PathBuf>,
}

/// Defaults < config file < environment / CLI.
pub fn load_config() -> Result<Settings, ConfigError> {
    resolve_config(Config::parse())
}

pub fn resolve_config(cli: Config) -> Result<Settings, ConfigError> {
    let explicit_path = cli.config_path.is_some();
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    let mut config_file = None;

    // A missing default file is fine; a missing explicit one is an error.
    if explicit_path || config_file_path.exists() {
        let config_str = fs::read_to_string(&config_file_path).map_err(|source| ConfigError::Read {
            path: config_file_path.clone(),
            source,
        })?;
        let file_config: Config = serde_json::from_str(&config_str).map_err(|source| ConfigError::Parse {
            path: config_file_path.clone(),
            source,
        })?;
        current_config = current_config.merge(file_config);
        config_file = Some(config_file_path);
    }

    current_config = current_config.merge(cli);
    validate(current_config, config_file)
}

fn validate(config: Config, config_file: Option<PathBuf>) -> Result<Settings, ConfigError> {
    let host = config.host.ok_or(ConfigError::Missing("host"))?;
    let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidHost(host.clone()))?;
    let port = config.port.ok_or(ConfigError::Missing("port"))?;

    let poll_interval_ms = positive(config.poll_interval_ms, "pollIntervalMs")?;
    let source_timeout_ms = positive(config.source_timeout_ms, "sourceTimeoutMs")?;
    let history_capacity = positive(config.history_capacity.map(|c| c as u64), "historyCapacity")? as usize;
    // A hung source may hold a cycle open for at most one tick.
    if source_timeout_ms > poll_interval_ms {
        return Err(ConfigError::TimeoutExceedsInterval {
            timeout_ms: source_timeout_ms,
            interval_ms: poll_interval_ms,
        });
    }

    let fog_url = config.fog_url.ok_or(ConfigError::Missing("fogUrl"))?;
    let sensor_url = config.sensor_url.ok_or(ConfigError::Missing("sensorUrl"))?;
    let sources = SourceSpec::station(&fog_url, &sensor_url, Duration::from_millis(source_timeout_ms))?;

    Ok(Settings {
        listen_addr: SocketAddr::new(ip, port),
        log_dir: config.log_dir.ok_or(ConfigError::Missing("logDir"))?,
        log_level: config.log_level.ok_or(ConfigError::Missing("logLevel"))?,
        sources,
        poll_interval: Duration::from_millis(poll_interval_ms),
        history_capacity,
        config_file,
    })
}

fn positive(value: Option<u64>, name: &'static str) -> Result<u64, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Zero(name)),
        Some(v) => Ok(v),
        None => Err(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_match_station_layout() {
        let settings = resolve_config(Config {
            config_path: None,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(settings.listen_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.history_capacity, 50);
        let urls: Vec<_> = settings.sources.iter().map(|s| s.endpoint().to_string()).collect();
        assert_eq!(
            urls,
            [
                "http://localhost:8084/api/fog",
                "http://localhost:8085/api/pm25",
                "http://localhost:8085/api/temp"
            ]
        );
        assert!(settings.sources.iter().all(|s| s.timeout() == Duration::from_secs(2)));
    }

    #[test]
    fn test_cli_overrides_file_overrides_defaults() {
        let file = write_config(r#"{"port": 6000, "historyCapacity": 10, "sensorUrl": "http://bridge.local:9000"}"#);
        let settings = resolve_config(Config {
            config_path: Some(file.path().to_path_buf()),
            port: Some(7000),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(settings.listen_addr.port(), 7000);
        assert_eq!(settings.history_capacity, 10);
        assert_eq!(settings.sources[1].endpoint().as_str(), "http://bridge.local:9000/api/pm25");
        assert_eq!(settings.config_file.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_rejects_zero_capacity_and_interval() {
        let err = resolve_config(Config {
            history_capacity: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Zero("historyCapacity")));

        let err = resolve_config(Config {
            poll_interval_ms: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Zero("pollIntervalMs")));
    }

    #[test]
    fn test_rejects_timeout_longer_than_interval() {
        let err = resolve_config(Config {
            poll_interval_ms: Some(5000),
            source_timeout_ms: Some(60_000),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TimeoutExceedsInterval {
                timeout_ms: 60_000,
                interval_ms: 5000
            }
        ));

        let settings = resolve_config(Config {
            poll_interval_ms: Some(5000),
            source_timeout_ms: Some(5000),
            ..Default::default()
        })
        .unwrap();
        assert!(settings.sources.iter().all(|s| s.timeout() == settings.poll_interval));
    }

    #[test]
    fn test_explicit_missing_file_and_bad_json() {
        let err = resolve_config(Config {
            config_path: Some(PathBuf::from("/nonexistent/server_aggregator.conf")),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let file = write_config("{ not json");
        let err = resolve_config(Config {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_rejects_bad_host_and_url() {
        let err = resolve_config(Config {
            host: Some("localhost:80".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHost(_)));

        let err = resolve_config(Config {
            fog_url: Some("fog-worker".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Source(SourceSpecError::InvalidUrl { .. })));
    }
}
