use async_trait::async_trait;
use log::warn;

use publish_proxy_common::{ReqPkt, ResPkt};

use crate::filter_trait::{Filter, FilterContext};

pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        FilterChain {
            filters,
        }
    }
}

#[async_trait]
impl Filter for FilterChain {
    async fn on_request(&self, req: &ReqPkt, ctx: &mut FilterContext) -> anyhow::Result<()> {
        for filter in self.filters.iter() {
            // a failing filter must not keep the others from seeing the request
            if let Err(e) = filter.on_request(req, ctx).await {
                warn!("filter on_request error, {} {}: {:?}", req.method, req.path, e);
            }
        }
        Ok(())
    }

    async fn on_request_done(&self, req: &ReqPkt, res: &ResPkt, e: Option<&anyhow::Error>, ctx: &mut FilterContext) {
        for filter in self.filters.iter() {
            filter.on_request_done(req, res, e, ctx).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::bail;
    use bytes::Bytes;

    use http_codec_core::res_codec::parse_response;
    use publish_proxy_common::HeaderMap;

    use super::*;
    use crate::filter_trait::Value;

    struct Recording {
        name: &'static str,
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Filter for Recording {
        async fn on_request(&self, _req: &ReqPkt, ctx: &mut FilterContext) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("{}:request", self.name));
            ctx.set_attr(self.name, Value::Bool(true));
            if self.fail {
                bail!("{} failed", self.name);
            }
            Ok(())
        }

        async fn on_request_done(&self, _req: &ReqPkt, _res: &ResPkt, _e: Option<&anyhow::Error>, _ctx: &mut FilterContext) {
            self.calls.lock().unwrap().push(format!("{}:done", self.name));
        }
    }

    #[tokio::test]
    async fn test_chain_runs_every_filter_in_order() {
        let calls = Arc::new(Mutex::new(vec![]));
        let chain = FilterChain::new(vec![
            Box::new(Recording { name: "a", fail: true, calls: calls.clone() }),
            Box::new(Recording { name: "b", fail: false, calls: calls.clone() }),
        ]);
        let req = ReqPkt {
            method: "GET".to_string(),
            path: "/".to_string(),
            query: None,
            version: 1,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            bytes_total: 0,
        };
        let res = parse_response(Bytes::from_static(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")).unwrap();
        let mut ctx = FilterContext::new();

        assert!(chain.on_request(&req, &mut ctx).await.is_ok());
        chain.on_request_done(&req, &res, None, &mut ctx).await;

        assert_eq!(ctx.get_attr_as_bool("a"), Some(true));
        assert_eq!(ctx.get_attr_as_bool("b"), Some(true));
        assert_eq!(*calls.lock().unwrap(), vec!["a:request", "b:request", "a:done", "b:done"]);
    }
}
