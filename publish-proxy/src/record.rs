use serde::{Deserialize, Serialize};

/// Per request timing breakdown, all durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRecord {
    pub correlation_id: String,
    /// epoch millis of request arrival
    pub request_timestamp: u64,
    pub backend_latency: u64,
    pub request_mediation_latency: u64,
    pub response_latency: u64,
    pub response_mediation_latency: u64,
}

/// Identity and outcome of one API invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRecord {
    pub message_id: String,
    pub http_method: String,
    pub elected_resource: String,
    pub api_name: Option<String>,
    pub status_code: u16,
    pub user_agent: Option<String>,
    pub client_id: Option<String>,
    pub request_payload_size: u64,
    pub response_payload_size: u64,
    /// epoch millis of request completion
    pub timestamp: u64,
}

/// What travels from the publishing filter to a record sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "payload", rename_all = "snake_case")]
pub enum PublishRecord {
    Invocation(InvocationRecord),
    Latency(LatencyRecord),
}

impl PublishRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            PublishRecord::Invocation(_) => "invocation",
            PublishRecord::Latency(_) => "latency",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            PublishRecord::Invocation(it) => &it.message_id,
            PublishRecord::Latency(it) => &it.correlation_id,
        }
    }
}
