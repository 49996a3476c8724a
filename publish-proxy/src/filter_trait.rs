use std::collections::HashMap;

use async_trait::async_trait;

use publish_proxy_common::{ReqPkt, ResPkt};

pub enum Value {
    U64(u64),
    Bool(bool),
    String(String),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(u) => Some(*u),
            _ => None
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None
        }
    }
}

// lifecycle timestamps, epoch millis
pub const REQUEST_IN_TIME: &str = "REQUEST_IN_TIME";
pub const BACKEND_REQUEST_TIME: &str = "BACKEND_REQUEST_TIME";
pub const BACKEND_RESPONSE_TIME: &str = "BACKEND_RESPONSE_TIME";
pub const RESPONSE_OUT_TIME: &str = "RESPONSE_OUT_TIME";

pub const CORRELATION_ID: &str = "correlation_id";

// per request filter context
#[derive(Default)]
pub struct FilterContext {
    attrs: HashMap<String, Value>,
}

impl FilterContext {
    pub fn new() -> Self {
        FilterContext {
            attrs: HashMap::new(),
        }
    }
    pub fn set_attr(&mut self, key: &str, value: Value) {
        self.attrs.insert(key.to_string(), value);
    }
    pub fn get_attr_as_u64(&self, key: &str) -> Option<u64> {
        self.attrs.get(key).and_then(|it| it.as_u64())
    }
    pub fn get_attr_as_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(|it| it.as_bool())
    }
    pub fn get_attr_as_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|it| it.as_str())
    }
}

// stateless filter, mutable per request data lives in FilterContext
#[allow(unused_variables)]
#[async_trait]
pub trait Filter: Send + Sync {
    /// Called once the request is fully read, before it is forwarded upstream.
    ///
    /// An error is logged by the caller and never stops the request.
    async fn on_request(&self, req: &ReqPkt, ctx: &mut FilterContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the response was written downstream, or failed to be.
    ///
    /// `res` is the upstream response, or the one generated by the proxy when `e` is set.
    async fn on_request_done(&self, req: &ReqPkt, res: &ResPkt, e: Option<&anyhow::Error>, ctx: &mut FilterContext) {}
}
