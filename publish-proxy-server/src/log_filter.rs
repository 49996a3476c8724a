use async_trait::async_trait;
use log::{info, warn};

use publish_proxy::filter_trait::{Filter, FilterContext, CORRELATION_ID, REQUEST_IN_TIME, RESPONSE_OUT_TIME};
use publish_proxy_common::{ReqPkt, ResPkt};

pub struct LogFilter {}

impl LogFilter {
    pub fn new() -> Self {
        LogFilter {}
    }
}

#[async_trait]
impl Filter for LogFilter {
    async fn on_request_done(&self, req: &ReqPkt, res: &ResPkt, e: Option<&anyhow::Error>, ctx: &mut FilterContext) {
        let start = ctx.get_attr_as_u64(REQUEST_IN_TIME).unwrap_or(0);
        let end = ctx.get_attr_as_u64(RESPONSE_OUT_TIME).unwrap_or(start);
        let elapsed = end.saturating_sub(start);
        let correlation_id = ctx.get_attr_as_str(CORRELATION_ID).unwrap_or("-");

        match e {
            None => info!("[{}] {} {} {} elapsed:{}ms, req_size:{}, res_size:{}",
                correlation_id, req.method, req.path, res.status, elapsed, req.bytes_total, res.raw_bytes.len()),
            Some(e) => warn!("[{}] {} {} {} elapsed:{}ms, req_size:{}, error:{:?}",
                correlation_id, req.method, req.path, res.status, elapsed, req.bytes_total, e),
        }
    }
}
