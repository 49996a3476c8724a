use std::sync::Arc;

use anyhow::bail;
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};

use http_codec_core::error::DecodeError;
use http_codec_core::res_codec::{build_response, encode_response};
use publish_proxy_common::tools::epoch_millis;

use crate::config::TConfig;
use crate::filter_trait::{Filter, FilterContext, Value, REQUEST_IN_TIME, RESPONSE_OUT_TIME};
use crate::prometheus::{method_label, CONN_DOWNSTREAM, METRICS};
use crate::session::Session;
use crate::upstream::Upstream;

pub struct ProxyServer {
    config: TConfig,
    filter: Arc<dyn Filter>,
    upstream: Arc<Upstream>,
}

impl ProxyServer {
    pub fn new(config: TConfig, filter: Arc<dyn Filter>) -> Self {
        let upstream = Arc::new(Upstream::new(&config.upstream));
        ProxyServer { config, filter, upstream }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.server.address).await.map_err(|e| {
            error!("bind error: {:?}", e);
            e
        })?;
        info!("listening on {}, upstream: {}", self.config.server.address, self.config.upstream.address);
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            // one connection per task
            let filter = self.filter.clone();
            let upstream = self.upstream.clone();
            tokio::spawn(async move {
                METRICS.connections.with_label_values(&[CONN_DOWNSTREAM]).inc();
                if let Err(e) = handle_session(stream, filter, upstream).await {
                    debug!("session {} closed with error: {:?}", peer, e);
                }
                METRICS.connections.with_label_values(&[CONN_DOWNSTREAM]).dec();
            });
        }
    }
}

async fn handle_session(stream: TcpStream, filter: Arc<dyn Filter>, upstream: Arc<Upstream>) -> anyhow::Result<()> {
    let mut session = Session::new(stream);
    loop {
        let req = match session.read_req_pkt().await {
            None => break,
            Some(Ok(req)) => req,
            Some(Err(e)) => {
                let status = match &e {
                    DecodeError::HeadTooLarge(_) => 431,
                    DecodeError::BodyTooLarge(_) => 413,
                    DecodeError::UnsupportedTransferEncoding => 501,
                    DecodeError::IOError(_) => bail!("read downstream error: {:?}", e),
                    _ => 400,
                };
                warn!("decode request error: {}", e);
                let res = encode_response(status, e.to_string().as_bytes(), false);
                let _ = session.write_downstream(&res).await;
                session.shutdown().await;
                bail!("decode request error: {}", e);
            }
        };
        session.init_from_req();

        let mut ctx = FilterContext::new();
        ctx.set_attr(REQUEST_IN_TIME, Value::U64(session.req_start));
        if let Err(e) = filter.on_request(&req, &mut ctx).await {
            warn!("filter on_request error: {:?}", e);
        }

        let (res, err) = match upstream.forward(&req, &mut ctx).await {
            Ok(res) => (res, None),
            Err(e) => {
                warn!("forward {} {} error: {:?}", req.method, req.path, e);
                (build_response(502, b"upstream unavailable", req.keep_alive()), Some(e))
            }
        };
        let keep_alive = req.keep_alive() && res.is_self_delimited() && !res.headers.has_connection_close();

        let write_result = session.write_downstream(&res.raw_bytes).await;
        ctx.set_attr(RESPONSE_OUT_TIME, Value::U64(epoch_millis()));

        match (&err, &write_result) {
            (None, Err(e)) => {
                let e = anyhow::anyhow!("write downstream error: {:?}", e);
                filter.on_request_done(&req, &res, Some(&e), &mut ctx).await;
            }
            _ => filter.on_request_done(&req, &res, err.as_ref(), &mut ctx).await,
        }

        let method = method_label(&req.method);
        let status = res.status.to_string();
        METRICS.requests.with_label_values(&[method, &status]).inc();
        let elapsed = epoch_millis().saturating_sub(session.req_start) as f64 / 1000.0;
        METRICS.request_latency.with_label_values(&[method]).observe(elapsed);

        write_result?;
        if !keep_alive {
            session.shutdown().await;
            break;
        }
    }
    Ok(())
}
