use std::time::Duration;

use anyhow::{anyhow, bail};
use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use http_codec_core::req_encoder::encode_upstream_request;
use http_codec_core::res_codec::parse_response;
use publish_proxy_common::tools::epoch_millis;
use publish_proxy_common::{ReqPkt, ResPkt};

use crate::config;
use crate::filter_trait::{FilterContext, Value, BACKEND_REQUEST_TIME, BACKEND_RESPONSE_TIME};

/// Forwards requests to the backend, one connection per request.
pub struct Upstream {
    address: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_response_size: usize,
}

impl Upstream {
    pub fn new(conf: &config::Upstream) -> Self {
        Upstream {
            address: conf.address.clone(),
            connect_timeout: Duration::from_millis(conf.connect_timeout_ms),
            read_timeout: Duration::from_millis(conf.read_timeout_ms),
            max_response_size: conf.max_response_size,
        }
    }

    /// Sends `req` and reads the response until the backend closes the connection.
    ///
    /// A response growing past `max_response_size` is an error.
    ///
    /// Stamps `BACKEND_REQUEST_TIME` once the request is written and `BACKEND_RESPONSE_TIME`
    /// once the response is complete.
    pub async fn forward(&self, req: &ReqPkt, ctx: &mut FilterContext) -> anyhow::Result<ResPkt> {
        let mut conn = timeout(self.connect_timeout, TcpStream::connect(&self.address)).await
            .map_err(|_| anyhow!("connect upstream {} timeout", self.address))?
            .map_err(|e| anyhow!("connect upstream {} error: {:?}", self.address, e))?;

        let data = encode_upstream_request(req);
        conn.write_all(&data).await.map_err(|e| anyhow!("send upstream error: {:?}", e))?;
        ctx.set_attr(BACKEND_REQUEST_TIME, Value::U64(epoch_millis()));

        let mut buf = BytesMut::with_capacity(4096);
        timeout(self.read_timeout, async {
            loop {
                let n = conn.read_buf(&mut buf).await
                    .map_err(|e| anyhow!("read upstream error: {:?}", e))?;
                if n == 0 {
                    return Ok::<_, anyhow::Error>(());
                }
                if buf.len() > self.max_response_size {
                    bail!("upstream response exceeds {} bytes", self.max_response_size);
                }
            }
        }).await
            .map_err(|_| anyhow!("read upstream {} timeout", self.address))??;
        ctx.set_attr(BACKEND_RESPONSE_TIME, Value::U64(epoch_millis()));

        let res = parse_response(buf.freeze()).map_err(|e| anyhow!("invalid upstream response: {}", e))?;
        debug!("upstream response: {:?}", res);
        Ok(res)
    }
}
