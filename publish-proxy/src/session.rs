use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;

use http_codec_core::error::DecodeError;
use http_codec_core::req_decoder::ReqDecoder;
use publish_proxy_common::ReqPkt;

/// One downstream connection, possibly carrying several requests in turn.
pub struct Session {
    downstream_reader: FramedRead<OwnedReadHalf, ReqDecoder>,
    downstream_writer: OwnedWriteHalf,
    /// epoch millis at which the current request started arriving
    pub req_start: u64,
}

impl Session {
    pub fn new(stream: TcpStream) -> Self {
        let (r, w) = stream.into_split();
        let r = FramedRead::new(r, ReqDecoder::new());

        Session {
            downstream_reader: r,
            downstream_writer: w,
            req_start: 0,
        }
    }

    pub fn init_from_req(&mut self) {
        self.req_start = self.downstream_reader.decoder().req_start();
    }

    #[inline]
    pub async fn read_req_pkt(&mut self) -> Option<Result<ReqPkt, DecodeError>> {
        self.downstream_reader.next().await
    }

    #[inline]
    pub async fn write_downstream(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.downstream_writer.write_all(data).await?;
        self.downstream_writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        let _ = self.downstream_writer.shutdown().await;
    }
}
