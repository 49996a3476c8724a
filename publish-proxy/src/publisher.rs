use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::{Publish, PublisherKind};
use crate::record::{InvocationRecord, LatencyRecord, PublishRecord};

/// Destination of published telemetry.
///
/// Both calls must return without waiting on the destination; what happens to a record
/// afterwards is up to the implementation.
pub trait DataPublisher: Send + Sync {
    fn publish_invocation_data(&self, record: InvocationRecord) -> anyhow::Result<()>;
    fn publish_latency_data(&self, record: LatencyRecord) -> anyhow::Result<()>;
}

/// Writes every record as one JSON line through the `data_publishing` log target.
pub struct LogPublisher;

impl LogPublisher {
    fn log(&self, record: &PublishRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(record)?;
        info!(target: "data_publishing", "{}", line);
        Ok(())
    }
}

impl DataPublisher for LogPublisher {
    fn publish_invocation_data(&self, record: InvocationRecord) -> anyhow::Result<()> {
        self.log(&PublishRecord::Invocation(record))
    }

    fn publish_latency_data(&self, record: LatencyRecord) -> anyhow::Result<()> {
        self.log(&PublishRecord::Latency(record))
    }
}

#[async_trait]
pub trait RecordSink: Send {
    async fn send(&mut self, record: &PublishRecord) -> anyhow::Result<()>;
}

/// Hands records to a background task draining one bounded queue into a [RecordSink].
///
/// A single queue keeps the records of one request in publish order. When the queue is
/// full the record is dropped, the caller never waits.
pub struct ChannelPublisher {
    tx: mpsc::Sender<PublishRecord>,
}

impl ChannelPublisher {
    pub fn spawn<S>(mut sink: S, queue_size: usize) -> Self
        where S: RecordSink + 'static {
        let (tx, mut rx) = mpsc::channel::<PublishRecord>(queue_size.max(1));
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.send(&record).await {
                    error!("send {} record {} error: {:?}", record.kind(), record.correlation_id(), e);
                }
            }
            debug!("publish queue closed");
        });
        ChannelPublisher { tx }
    }

    fn enqueue(&self, record: PublishRecord) -> anyhow::Result<()> {
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(record)) => {
                bail!("publish queue is full, {} record {} dropped", record.kind(), record.correlation_id())
            }
            Err(TrySendError::Closed(_)) => bail!("publish queue is closed"),
        }
    }
}

impl DataPublisher for ChannelPublisher {
    fn publish_invocation_data(&self, record: InvocationRecord) -> anyhow::Result<()> {
        self.enqueue(PublishRecord::Invocation(record))
    }

    fn publish_latency_data(&self, record: LatencyRecord) -> anyhow::Result<()> {
        self.enqueue(PublishRecord::Latency(record))
    }
}

/// Streams records as JSON lines to a collector over TCP.
///
/// The connection is opened on the first record and dropped on a write error; the next
/// record reconnects. A failed record is not sent again.
pub struct TcpRecordSink {
    address: String,
    conn: Option<TcpStream>,
}

impl TcpRecordSink {
    pub fn new(address: &str) -> Self {
        TcpRecordSink { address: address.to_string(), conn: None }
    }
}

#[async_trait]
impl RecordSink for TcpRecordSink {
    async fn send(&mut self, record: &PublishRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if self.conn.is_none() {
            let stream = TcpStream::connect(&self.address).await
                .map_err(|e| anyhow!("connect to collector {} error: {:?}", self.address, e))?;
            info!("connected to collector {}", self.address);
            self.conn = Some(stream);
        }
        if let Some(conn) = self.conn.as_mut() {
            if let Err(e) = conn.write_all(&line).await {
                self.conn = None;
                bail!("write to collector {} error: {:?}", self.address, e);
            }
        }
        Ok(())
    }
}

pub fn create_publisher(conf: &Publish) -> anyhow::Result<Arc<dyn DataPublisher>> {
    match conf.publisher {
        PublisherKind::Log => {
            info!("create log publisher");
            Ok(Arc::new(LogPublisher))
        }
        PublisherKind::Tcp => {
            let address = match &conf.collector_address {
                Some(address) => address,
                None => bail!("collector_address is required for the tcp publisher"),
            };
            if conf.queue_size == 0 {
                warn!("queue_size 0 is raised to 1");
            }
            info!("create tcp publisher to {}, queue_size: {}", address, conf.queue_size);
            Ok(Arc::new(ChannelPublisher::spawn(TcpRecordSink::new(address), conf.queue_size)))
        }
    }
}
