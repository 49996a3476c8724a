use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config_provider::ConfigSnapshot;

pub type TConfig = Arc<Config>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub debug: Option<bool>,
    pub server: Server,
    pub upstream: Upstream,
    pub filter_chain: FilterChain,
    /// Flat key/value table handed to the publishing filter, e.g. `"DataPublishing.Enabled"`.
    #[serde(default)]
    pub publishing: ConfigSnapshot,
    pub metrics: Option<Metrics>,
    /// Re-read `publishing` from the config file at this interval.
    pub reload_interval_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Server {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Upstream {
    pub address: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Larger upstream responses are answered with 502.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterChain {
    pub filters: Vec<String>,
    pub publish: Option<Publish>,
    pub log: Option<Log>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    Log,
    Tcp,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Publish {
    pub publisher: PublisherKind,
    /// Collector address for the `tcp` publisher.
    pub collector_address: Option<String>,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_split_regex")]
    pub split_regex: String,
    /// Empty means every request path is covered.
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Resource {
    pub pattern: String,
    pub api_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Log {}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Metrics {
    pub address: String,
    #[serde(default = "default_metrics_uri")]
    pub uri: String,
}

fn default_connect_timeout_ms() -> u64 { 3000 }

fn default_read_timeout_ms() -> u64 { 30000 }

fn default_max_response_size() -> usize { 16 * 1024 * 1024 }

fn default_queue_size() -> usize { 1024 }

fn default_split_regex() -> String { "/".to_string() }

fn default_metrics_uri() -> String { "/metrics".to_string() }

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let conf_str = fs::read_to_string(path)?;
        Self::parse(&conf_str)
    }

    pub fn parse(conf_str: &str) -> anyhow::Result<Self> {
        let conf: Config = toml::from_str(conf_str)?;
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, PublisherKind};
    use crate::config_provider::ConfigSnapshot;
    use crate::config_provider::{DATA_PUBLISHING_ENABLED, EXTERNAL_TRAFFIC_EXPECTED_VALUE, EXTERNAL_TRAFFIC_HEADER_NAME};

    const CONF: &str = r#"
[server]
address = "0.0.0.0:8080"

[upstream]
address = "127.0.0.1:9443"

[filter_chain]
filters = ["log", "publish"]

[filter_chain.log]

[filter_chain.publish]
publisher = "tcp"
collector_address = "127.0.0.1:7612"
resources = [
    { pattern = "/oauth2/token", api_name = "TokenAPI" },
    { pattern = "/oauth2/*" },
]

[publishing]
"DataPublishing.Enabled" = "true"
"ExternalTraffic.HeaderName" = "X-External-Traffic"
"ExternalTraffic.ExpectedValue" = "true"

[metrics]
address = "0.0.0.0:9090"
"#;

    #[test]
    fn test_parse() {
        let conf = Config::parse(CONF).unwrap();
        assert_eq!(conf.server.address, "0.0.0.0:8080");
        assert_eq!(conf.upstream.connect_timeout_ms, 3000);
        assert_eq!(conf.upstream.max_response_size, 16 * 1024 * 1024);
        assert_eq!(conf.filter_chain.filters, vec!["log", "publish"]);

        let publish = conf.filter_chain.publish.unwrap();
        assert_eq!(publish.publisher, PublisherKind::Tcp);
        assert_eq!(publish.queue_size, 1024);
        assert_eq!(publish.split_regex, "/");
        assert_eq!(publish.resources.len(), 2);
        assert_eq!(publish.resources[0].api_name.as_deref(), Some("TokenAPI"));
        assert_eq!(publish.resources[1].api_name, None);

        assert_eq!(conf.publishing.get_as_bool(DATA_PUBLISHING_ENABLED), Some(true));
        assert_eq!(conf.publishing.get_as_string(EXTERNAL_TRAFFIC_HEADER_NAME).as_deref(), Some("X-External-Traffic"));
        assert_eq!(conf.publishing.get_as_string(EXTERNAL_TRAFFIC_EXPECTED_VALUE).as_deref(), Some("true"));

        let metrics = conf.metrics.unwrap();
        assert_eq!(metrics.uri, "/metrics");
        assert!(conf.reload_interval_secs.is_none());
    }

    #[test]
    fn test_publishing_table_is_optional() {
        let conf = Config::parse(r#"
[server]
address = "0.0.0.0:8080"
[upstream]
address = "127.0.0.1:9443"
[filter_chain]
filters = []
"#).unwrap();
        assert_eq!(conf.publishing, ConfigSnapshot::new());
        assert!(conf.filter_chain.publish.is_none());
    }

    #[test]
    fn test_unknown_publisher_is_rejected() {
        let conf = CONF.replace("publisher = \"tcp\"", "publisher = \"kafka\"");
        assert!(Config::parse(&conf).is_err());
    }
}
