//! Decides whether the telemetry of a request gets published.
//!
//! A request is published only when publishing is switched on and the request carries the
//! configured external traffic header with exactly the configured value. Everything that is
//! missing or unreadable fails closed.

use log::warn;

use publish_proxy_common::HeaderMap;

use crate::config_provider::{ConfigProvider, ConfigSnapshot, DATA_PUBLISHING_ENABLED, EXTERNAL_TRAFFIC_EXPECTED_VALUE, EXTERNAL_TRAFFIC_HEADER_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Publish,
    Disabled,
    NotExternalTraffic,
    ConfigUnavailable,
}

impl Eligibility {
    pub fn is_publish(&self) -> bool {
        *self == Eligibility::Publish
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Eligibility::Publish => "publish",
            Eligibility::Disabled => "disabled",
            Eligibility::NotExternalTraffic => "not_external_traffic",
            Eligibility::ConfigUnavailable => "config_unavailable",
        }
    }
}

/// Global switch, absent or non bool-like counts as off.
pub fn is_publishing_enabled(config: &ConfigSnapshot) -> bool {
    config.get_as_bool(DATA_PUBLISHING_ENABLED).unwrap_or(false)
}

/// Header name lookup ignores case, the value comparison is exact. With repeated headers
/// only the first occurrence counts.
pub fn is_external_traffic(config: &ConfigSnapshot, headers: &HeaderMap) -> bool {
    let header_name = config.get_as_string(EXTERNAL_TRAFFIC_HEADER_NAME);
    let expected_value = config.get_as_string(EXTERNAL_TRAFFIC_EXPECTED_VALUE);
    match (header_name, expected_value) {
        (Some(name), Some(expected)) if !name.is_empty() => {
            headers.get(&name).map(|value| value == expected).unwrap_or(false)
        }
        _ => false
    }
}

pub fn should_publish(config: &ConfigSnapshot, headers: &HeaderMap) -> bool {
    check(config, headers).is_publish()
}

pub fn check(config: &ConfigSnapshot, headers: &HeaderMap) -> Eligibility {
    if !is_publishing_enabled(config) {
        return Eligibility::Disabled;
    }
    if !is_external_traffic(config, headers) {
        return Eligibility::NotExternalTraffic;
    }
    Eligibility::Publish
}

/// Same as [check] but reads the configuration first, a failed read means no publishing.
pub fn evaluate(provider: &dyn ConfigProvider, headers: &HeaderMap) -> Eligibility {
    match provider.get_configuration() {
        Ok(config) => check(&config, headers),
        Err(e) => {
            warn!("read publishing configuration error, skip publishing: {:?}", e);
            Eligibility::ConfigUnavailable
        }
    }
}
