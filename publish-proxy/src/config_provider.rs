use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use arc_swap::ArcSwapOption;
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::Config;

pub const DATA_PUBLISHING_ENABLED: &str = "DataPublishing.Enabled";
pub const EXTERNAL_TRAFFIC_HEADER_NAME: &str = "ExternalTraffic.HeaderName";
pub const EXTERNAL_TRAFFIC_EXPECTED_VALUE: &str = "ExternalTraffic.ExpectedValue";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl ConfigValue {
    /// Bool-like reading: a real bool, or a string equal to `true` ignoring case.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => Some(s.trim().eq_ignore_ascii_case("true")),
            ConfigValue::Integer(_) => None
        }
    }

    pub fn as_string(&self) -> Cow<'_, str> {
        match self {
            ConfigValue::Bool(b) => Cow::Owned(b.to_string()),
            ConfigValue::Integer(i) => Cow::Owned(i.to_string()),
            ConfigValue::String(s) => Cow::Borrowed(s.as_str())
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// Read-only view of the publishing configuration at one point in time.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ConfigSnapshot {
    entries: HashMap<String, ConfigValue>,
}

impl ConfigSnapshot {
    pub fn new() -> Self {
        ConfigSnapshot::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get_as_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(|it| it.as_bool())
    }

    pub fn get_as_string(&self, key: &str) -> Option<Cow<'_, str>> {
        self.entries.get(key).map(|it| it.as_string())
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_configuration(&self) -> anyhow::Result<Arc<ConfigSnapshot>>;
}

/// Snapshot holder swapped atomically by whoever owns the configuration source.
#[derive(Default)]
pub struct SharedConfig {
    inner: ArcSwapOption<ConfigSnapshot>,
}

impl SharedConfig {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        SharedConfig { inner: ArcSwapOption::from_pointee(snapshot) }
    }

    /// A provider with nothing loaded yet, every read fails until [SharedConfig::store].
    pub fn unloaded() -> Self {
        SharedConfig { inner: ArcSwapOption::empty() }
    }

    pub fn store(&self, snapshot: ConfigSnapshot) {
        self.inner.store(Some(Arc::new(snapshot)));
    }
}

impl ConfigProvider for SharedConfig {
    fn get_configuration(&self) -> anyhow::Result<Arc<ConfigSnapshot>> {
        self.inner.load_full().ok_or_else(|| anyhow!("publishing configuration is not loaded"))
    }
}

/// Periodically re-reads the `publishing` table of the config file into `shared`.
///
/// A file that fails to load leaves the previous snapshot in place.
pub fn spawn_reload(shared: Arc<SharedConfig>, path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match Config::load(&path) {
                Ok(conf) => {
                    let changed = shared.get_configuration()
                        .map(|current| *current != conf.publishing)
                        .unwrap_or(true);
                    if changed {
                        shared.store(conf.publishing);
                        info!("publishing configuration reloaded from {:?}", path);
                    }
                }
                Err(e) => {
                    error!("reload publishing configuration from {:?} error: {:?}", path, e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_like_values() {
        let snapshot = ConfigSnapshot::new()
            .with("a", "true")
            .with("b", "TRUE ")
            .with("c", "false")
            .with("d", "yes")
            .with("e", true)
            .with("f", ConfigValue::Integer(1));
        assert_eq!(snapshot.get_as_bool("a"), Some(true));
        assert_eq!(snapshot.get_as_bool("b"), Some(true));
        assert_eq!(snapshot.get_as_bool("c"), Some(false));
        assert_eq!(snapshot.get_as_bool("d"), Some(false));
        assert_eq!(snapshot.get_as_bool("e"), Some(true));
        assert_eq!(snapshot.get_as_bool("f"), None);
        assert_eq!(snapshot.get_as_bool("missing"), None);
    }

    #[test]
    fn test_string_values() {
        let snapshot = ConfigSnapshot::new()
            .with("s", "X-External-Traffic")
            .with("b", true)
            .with("i", ConfigValue::Integer(42));
        assert_eq!(snapshot.get_as_string("s").as_deref(), Some("X-External-Traffic"));
        assert_eq!(snapshot.get_as_string("b").as_deref(), Some("true"));
        assert_eq!(snapshot.get_as_string("i").as_deref(), Some("42"));
        assert!(snapshot.get_as_string("missing").is_none());
    }

    #[test]
    fn test_shared_config_swap() {
        let shared = SharedConfig::unloaded();
        assert!(shared.get_configuration().is_err());

        shared.store(ConfigSnapshot::new().with(DATA_PUBLISHING_ENABLED, "true"));
        let first = shared.get_configuration().unwrap();
        shared.store(ConfigSnapshot::new().with(DATA_PUBLISHING_ENABLED, "false"));
        let second = shared.get_configuration().unwrap();

        // readers keep the snapshot they loaded
        assert_eq!(first.get_as_bool(DATA_PUBLISHING_ENABLED), Some(true));
        assert_eq!(second.get_as_bool(DATA_PUBLISHING_ENABLED), Some(false));
    }

    #[tokio::test]
    async fn test_spawn_reload() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("publish-proxy-reload-{}.toml", uuid::Uuid::new_v4()));
        let conf = |enabled: &str| format!(r#"
[server]
address = "127.0.0.1:0"
[upstream]
address = "127.0.0.1:1"
[filter_chain]
filters = []
[publishing]
"DataPublishing.Enabled" = "{}"
"#, enabled);
        std::fs::write(&path, conf("false"))?;

        let shared = Arc::new(SharedConfig::new(Config::load(&path)?.publishing));
        let handle = spawn_reload(shared.clone(), path.clone(), Duration::from_millis(20));

        std::fs::write(&path, conf("true"))?;
        let mut reloaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if shared.get_configuration()?.get_as_bool(DATA_PUBLISHING_ENABLED) == Some(true) {
                reloaded = true;
                break;
            }
        }
        handle.abort();
        let _ = std::fs::remove_file(&path);
        assert!(reloaded);
        Ok(())
    }
}
