use ::config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::{collections::HashMap, env, fs, path::Path, time::Duration};

use crate::errors::{AppError, Result};

pub const DEFAULT_LISTEN_IP: &str = "127.0.0.1";
pub const DEFAULT_LISTEN_PORT: u16 = 9240;

/// Environment variables read into `Config`, besides `RGW_ENDPOINT`.
const ENV_KEYS: &[&str] = &[
    "ACCESS_KEY",
    "SECRET_KEY",
    "REGION",
    "CLUSTER_NAME",
    "PUB_ENDPOINT",
    "LISTEN_IP",
    "LISTEN_PORT",
    "USAGE_COLLECTOR_INTERVAL",
    "BUCKETS_COLLECTOR_INTERVAL",
    "USERS_COLLECTOR_INTERVAL",
    "RGW_CONNECTION_TIMEOUT",
    "START_DELAY",
    "INSECURE",
    "SKIP_WITHOUT_BUCKET",
    "USERS_COLLECTOR_ENABLE",
    "SIGNING_REGION",
    "LOG_FORMAT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub access_key: String,
    pub secret_key: String,
    /// Admin endpoint of the gateway, e.g. `https://rgw.example.net:8443`.
    pub endpoint: String,
    pub region: String,
    pub cluster_name: String,
    /// Endpoint identity attached to every sample as the `endpoint` label.
    pub pub_endpoint: String,
    pub listen_ip: String,
    pub listen_port: u16,
    /// Poll intervals, in seconds.
    pub usage_collector_interval: u64,
    pub buckets_collector_interval: u64,
    pub users_collector_interval: u64,
    pub rgw_connection_timeout: u64,
    pub start_delay: u64,
    pub insecure: bool,
    pub skip_without_bucket: bool,
    pub users_collector_enable: bool,
    pub signing_region: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Defaults, then process environment, then the YAML file if one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_sources(env::vars().collect(), path)
    }

    pub fn from_sources(vars: HashMap<String, String>, path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?
            .add_source(Environment::default().source(Some(Self::environment(vars))));

        if let Some(path) = path {
            let meta = fs::metadata(path)?;
            if meta.is_dir() {
                return Err(AppError::Config(format!(
                    "'{}' is a directory, not a normal file",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Keeps only the documented variables. The endpoint comes from
    /// `RGW_ENDPOINT`; a bare `ENDPOINT` is ignored.
    fn environment(vars: HashMap<String, String>) -> HashMap<String, String> {
        vars.into_iter()
            .filter_map(|(key, value)| {
                if key == "RGW_ENDPOINT" {
                    Some(("ENDPOINT".to_string(), value))
                } else if ENV_KEYS.contains(&key.as_str()) {
                    Some((key, value))
                } else {
                    None
                }
            })
            .collect()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = ::config::Config::builder()
            .set_default("access_key", "")?
            .set_default("secret_key", "")?
            .set_default("endpoint", "")?
            .set_default("region", "")?
            .set_default("cluster_name", "")?
            .set_default("pub_endpoint", "")?
            .set_default("listen_ip", DEFAULT_LISTEN_IP)?
            .set_default("listen_port", DEFAULT_LISTEN_PORT as i64)?
            .set_default("usage_collector_interval", 30_i64)?
            .set_default("buckets_collector_interval", 300_i64)?
            .set_default("users_collector_interval", 3600_i64)?
            .set_default("rgw_connection_timeout", 10_i64)?
            .set_default("start_delay", 30_i64)?
            .set_default("insecure", false)?
            .set_default("skip_without_bucket", false)?
            .set_default("users_collector_enable", false)?
            .set_default("signing_region", "default")?
            .set_default("log_format", "pretty")?;

        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_key.is_empty() {
            return Err(AppError::Config("access_key is required (ACCESS_KEY)".to_string()));
        }
        if self.secret_key.is_empty() {
            return Err(AppError::Config("secret_key is required (SECRET_KEY)".to_string()));
        }
        if self.endpoint.is_empty() {
            return Err(AppError::Config("endpoint is required (RGW_ENDPOINT)".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(AppError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        let positive = [
            ("usage_collector_interval", self.usage_collector_interval),
            ("buckets_collector_interval", self.buckets_collector_interval),
            ("users_collector_interval", self.users_collector_interval),
            ("rgw_connection_timeout", self.rgw_connection_timeout),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_ip, self.listen_port)
    }

    pub fn usage_interval(&self) -> Duration {
        Duration::from_secs(self.usage_collector_interval)
    }

    pub fn buckets_interval(&self) -> Duration {
        Duration::from_secs(self.buckets_collector_interval)
    }

    pub fn users_interval(&self) -> Duration {
        Duration::from_secs(self.users_collector_interval)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.rgw_connection_timeout)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ACCESS_KEY", "AK"),
            ("SECRET_KEY", "SK"),
            ("RGW_ENDPOINT", "http://rgw.local:7480"),
        ]
    }

    #[test]
    fn test_defaults_are_applied() {
        let config = Config::from_sources(vars(&required()), None).unwrap();
        config.validate().unwrap();

        assert_eq!(config.endpoint, "http://rgw.local:7480");
        assert_eq!(config.listen_addr(), "127.0.0.1:9240");
        assert_eq!(config.usage_interval(), Duration::from_secs(30));
        assert_eq!(config.buckets_interval(), Duration::from_secs(300));
        assert_eq!(config.users_interval(), Duration::from_secs(3600));
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert_eq!(config.start_delay(), Duration::from_secs(30));
        assert!(!config.insecure);
        assert!(!config.skip_without_bucket);
        assert!(!config.users_collector_enable);
        assert_eq!(config.signing_region, "default");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let mut pairs = required();
        pairs.extend([
            ("LISTEN_PORT", "9999"),
            ("USAGE_COLLECTOR_INTERVAL", "5"),
            ("USERS_COLLECTOR_ENABLE", "true"),
            ("CLUSTER_NAME", "ceph-a"),
            ("LOG_FORMAT", "json"),
        ]);

        let config = Config::from_sources(vars(&pairs), None).unwrap();

        assert_eq!(config.listen_port, 9999);
        assert_eq!(config.usage_collector_interval, 5);
        assert!(config.users_collector_enable);
        assert_eq!(config.cluster_name, "ceph-a");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        let config = Config::from_sources(vars(&[("RGW_ENDPOINT", "http://rgw")]), None).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("access_key")));

        let config = Config::from_sources(vars(&[("ACCESS_KEY", "AK"), ("SECRET_KEY", "SK")]), None)
            .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("endpoint")));
    }

    #[test]
    fn test_rgw_endpoint_wins_over_bare_endpoint() {
        let mut pairs = required();
        pairs.push(("ENDPOINT", "http://unrelated-service"));

        let config = Config::from_sources(vars(&pairs), None).unwrap();
        assert_eq!(config.endpoint, "http://rgw.local:7480");

        let config = Config::from_sources(
            vars(&[
                ("ACCESS_KEY", "AK"),
                ("SECRET_KEY", "SK"),
                ("ENDPOINT", "http://unrelated-service"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(config.endpoint, "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrelated_variables_are_ignored() {
        let mut pairs = required();
        pairs.extend([("REGION_NAME", "nowhere"), ("PATH", "/usr/bin"), ("LISTEN", "0.0.0.0")]);

        let config = Config::from_sources(vars(&pairs), None).unwrap();
        assert_eq!(config.region, "");
        assert_eq!(config.listen_ip, DEFAULT_LISTEN_IP);
    }

    #[test]
    fn test_malformed_number_is_a_load_error() {
        let mut pairs = required();
        pairs.push(("USAGE_COLLECTOR_INTERVAL", "abc"));

        let err = Config::from_sources(vars(&pairs), None).unwrap_err();
        assert!(matches!(err, AppError::ConfigLoad(_)));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut pairs = required();
        pairs.push(("BUCKETS_COLLECTOR_INTERVAL", "0"));

        let config = Config::from_sources(vars(&pairs), None).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("buckets_collector_interval")));
    }

    #[test]
    fn test_non_http_endpoint_is_rejected() {
        let pairs = vec![
            ("ACCESS_KEY", "AK"),
            ("SECRET_KEY", "SK"),
            ("RGW_ENDPOINT", "rgw.local:7480"),
        ];

        let config = Config::from_sources(vars(&pairs), None).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_overrides_environment() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "endpoint: https://rgw.example.net\nlisten_port: 9300\nskip_without_bucket: true\nregion: eu-west"
        )
        .unwrap();

        let mut pairs = required();
        pairs.push(("LISTEN_PORT", "9999"));

        let config = Config::from_sources(vars(&pairs), Some(file.path())).unwrap();

        assert_eq!(config.endpoint, "https://rgw.example.net");
        assert_eq!(config.listen_port, 9300);
        assert!(config.skip_without_bucket);
        assert_eq!(config.region, "eu-west");
        assert_eq!(config.access_key, "AK");
    }

    #[test]
    fn test_directory_is_not_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_sources(vars(&required()), Some(dir.path())).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("directory")));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::from_sources(
            vars(&required()),
            Some(Path::new("/nonexistent/rgw-exporter.yaml")),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() {
        env::set_var("ACCESS_KEY", "env-ak");
        env::set_var("SECRET_KEY", "env-sk");
        env::set_var("RGW_ENDPOINT", "http://127.0.0.1:7480");
        env::set_var("START_DELAY", "0");

        let config = Config::load(None).unwrap();

        env::remove_var("ACCESS_KEY");
        env::remove_var("SECRET_KEY");
        env::remove_var("RGW_ENDPOINT");
        env::remove_var("START_DELAY");

        assert_eq!(config.access_key, "env-ak");
        assert_eq!(config.secret_key, "env-sk");
        assert_eq!(config.endpoint, "http://127.0.0.1:7480");
        assert_eq!(config.start_delay(), Duration::ZERO);
    }
}
