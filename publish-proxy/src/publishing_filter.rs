use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use uuid::Uuid;

use publish_proxy_common::tools::epoch_millis;
use publish_proxy_common::{ReqPkt, ResPkt};

use crate::config::Publish;
use crate::config_provider::ConfigProvider;
use crate::eligibility;
use crate::filter_trait::{Filter, FilterContext, Value, CORRELATION_ID};
use crate::latency::compute_latency;
use crate::prometheus::{METRICS, RECORD_INVOCATION, RECORD_LATENCY};
use crate::publisher::DataPublisher;
use crate::record::{InvocationRecord, LatencyRecord};
use crate::resource::ResourceMatcher;

/// Headers an upstream hop may already carry the message id in, checked in order.
pub const CORRELATION_ID_HEADERS: [&str; 2] = ["x-correlation-id", "activityid"];

const ELECTED_RESOURCE: &str = "publish_elected_resource";
const API_NAME: &str = "publish_api_name";

/// Publishes an invocation record and a latency record for every eligible request.
pub struct PublishingFilter {
    config: Arc<dyn ConfigProvider>,
    publisher: Arc<dyn DataPublisher>,
    resources: Option<ResourceMatcher>,
}

impl PublishingFilter {
    pub fn new(config: Arc<dyn ConfigProvider>, publisher: Arc<dyn DataPublisher>, conf: &Publish) -> anyhow::Result<Self> {
        let resources = if conf.resources.is_empty() {
            None
        } else {
            Some(ResourceMatcher::new(&conf.resources, &conf.split_regex)?)
        };
        Ok(PublishingFilter { config, publisher, resources })
    }

    pub fn resolve_correlation_id(req: &ReqPkt) -> String {
        CORRELATION_ID_HEADERS.iter()
            .filter_map(|name| req.headers.get(name))
            .map(|it| it.trim())
            .find(|it| !it.is_empty())
            .map(|it| it.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    pub fn generate_invocation_record(&self, req: &ReqPkt, res: &ResPkt, ctx: &FilterContext,
                                      message_id: &str, completed_at: u64) -> InvocationRecord {
        InvocationRecord {
            message_id: message_id.to_string(),
            http_method: req.method.clone(),
            elected_resource: ctx.get_attr_as_str(ELECTED_RESOURCE).unwrap_or(&req.path).to_string(),
            api_name: ctx.get_attr_as_str(API_NAME).map(|it| it.to_string()),
            status_code: res.status,
            user_agent: req.headers.get("user-agent").map(|it| it.to_string()),
            client_id: req.query_param("client_id").map(|it| it.to_string()),
            request_payload_size: req.body.len() as u64,
            response_payload_size: res.body_len() as u64,
            timestamp: completed_at,
        }
    }

    pub fn generate_latency_record(&self, ctx: &FilterContext, message_id: &str, completed_at: u64) -> LatencyRecord {
        compute_latency(ctx, message_id, completed_at)
    }

    fn publish(&self, invocation: InvocationRecord, latency: LatencyRecord) {
        let message_id = invocation.message_id.clone();
        match self.publisher.publish_invocation_data(invocation) {
            Ok(()) => METRICS.published_records.with_label_values(&[RECORD_INVOCATION]).inc(),
            Err(e) => {
                METRICS.publish_failures.with_label_values(&[RECORD_INVOCATION]).inc();
                warn!("publish invocation data {} error: {:?}", message_id, e);
            }
        }
        match self.publisher.publish_latency_data(latency) {
            Ok(()) => METRICS.published_records.with_label_values(&[RECORD_LATENCY]).inc(),
            Err(e) => {
                METRICS.publish_failures.with_label_values(&[RECORD_LATENCY]).inc();
                warn!("publish latency data {} error: {:?}", message_id, e);
            }
        }
    }
}

#[async_trait]
impl Filter for PublishingFilter {
    async fn on_request(&self, req: &ReqPkt, ctx: &mut FilterContext) -> anyhow::Result<()> {
        ctx.set_attr(CORRELATION_ID, Value::String(Self::resolve_correlation_id(req)));

        match &self.resources {
            None => {
                ctx.set_attr(ELECTED_RESOURCE, Value::String(req.path.clone()));
            }
            Some(resources) => {
                if let Some(resource) = resources.elect(&req.path) {
                    ctx.set_attr(ELECTED_RESOURCE, Value::String(resource.pattern.clone()));
                    if let Some(api_name) = &resource.api_name {
                        ctx.set_attr(API_NAME, Value::String(api_name.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    async fn on_request_done(&self, req: &ReqPkt, res: &ResPkt, _e: Option<&anyhow::Error>, ctx: &mut FilterContext) {
        if ctx.get_attr_as_str(ELECTED_RESOURCE).is_none() {
            METRICS.skipped_requests.with_label_values(&["unmapped_resource"]).inc();
            return;
        }

        let eligibility = eligibility::evaluate(self.config.as_ref(), &req.headers);
        if !eligibility.is_publish() {
            debug!("skip publishing {} {}: {}", req.method, req.path, eligibility.as_str());
            METRICS.skipped_requests.with_label_values(&[eligibility.as_str()]).inc();
            return;
        }

        let message_id = match ctx.get_attr_as_str(CORRELATION_ID) {
            Some(id) => id.to_string(),
            None => Self::resolve_correlation_id(req),
        };
        let completed_at = epoch_millis();
        let invocation = self.generate_invocation_record(req, res, ctx, &message_id, completed_at);
        let latency = self.generate_latency_record(ctx, &message_id, completed_at);
        self.publish(invocation, latency);
    }
}
