//! Message broker abstraction.
//!
//! The relay receives capture events from a broker and publishes capture
//! commands back to the cameras. Topic provisioning and the transport
//! itself live outside the relay; this module only needs a way to receive
//! and a way to publish.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::{RelayError, Result};

/// A message received from or published to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Broker connection.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Broker: Send + Sync {
    /// Next inbound message, or `None` once the connection is closed.
    async fn recv(&self) -> Result<Option<BrokerMessage>>;

    /// Publish a message.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
}

// ============================================================================
// In-memory broker
// ============================================================================

/// In-memory broker for tests.
pub struct MemoryBroker {
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<BrokerMessage>>>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<BrokerMessage>>,
    published: RwLock<Vec<BrokerMessage>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: Mutex::new(rx),
            published: RwLock::new(Vec::new()),
        }
    }

    /// Queue an inbound message.
    pub async fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        if let Some(tx) = self.inbound_tx.lock().await.as_ref() {
            let _ = tx.send(BrokerMessage::new(topic, payload));
        }
    }

    /// Close the inbound side; `recv` drains what is queued and then
    /// returns `None`.
    pub async fn close(&self) {
        self.inbound_tx.lock().await.take();
    }

    /// Everything published so far.
    pub async fn published(&self) -> Vec<BrokerMessage> {
        self.published.read().await.clone()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn recv(&self) -> Result<Option<BrokerMessage>> {
        Ok(self.inbound_rx.lock().await.recv().await)
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.published
            .write()
            .await
            .push(BrokerMessage::new(topic, payload));
        Ok(())
    }
}

// ============================================================================
// Line broker
// ============================================================================

/// Broker over a pair of byte streams.
///
/// Every non-empty input line is one event payload on `events_topic`.
/// Published messages are written as `<topic> <payload>` lines.
pub struct LineBroker<R, W> {
    events_topic: String,
    lines: Mutex<Lines<R>>,
    writer: Mutex<W>,
}

impl<R, W> LineBroker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(events_topic: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            events_topic: events_topic.into(),
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Line broker on the process's stdin and stdout.
pub type StdioBroker = LineBroker<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioBroker {
    pub fn stdio(events_topic: impl Into<String>) -> Self {
        LineBroker::new(
            events_topic,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

#[async_trait]
impl<R, W> Broker for LineBroker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&self) -> Result<Option<BrokerMessage>> {
        let mut lines = self.lines.lock().await;
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| RelayError::Broker(format!("read failed: {e}")))?;
            match line {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    return Ok(Some(BrokerMessage::new(
                        self.events_topic.clone(),
                        line.trim().as_bytes().to_vec(),
                    )))
                }
            }
        }
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut out = Vec::with_capacity(topic.len() + payload.len() + 2);
        out.extend_from_slice(topic.as_bytes());
        out.push(b' ');
        out.extend_from_slice(payload);
        out.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&out)
            .await
            .map_err(|e| RelayError::Broker(format!("write failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| RelayError::Broker(format!("flush failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_broker_roundtrip() {
        let broker = MemoryBroker::new();
        broker.inject("camera1/alerts", b"{}".to_vec()).await;
        broker.close().await;

        let msg = broker.recv().await.unwrap().unwrap();
        assert_eq!(msg.topic, "camera1/alerts");
        assert_eq!(msg.payload, b"{}");
        assert!(broker.recv().await.unwrap().is_none());

        broker.publish("camera1/capture", b"1").await.unwrap();
        assert_eq!(
            broker.published().await,
            vec![BrokerMessage::new("camera1/capture", b"1".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_line_broker_skips_blank_lines() {
        let input: &[u8] = b"{\"cam\":\"a\"}\n\n   \n{\"cam\":\"b\"}\n";
        let broker = LineBroker::new("camera1/alerts", input, Vec::new());

        let first = broker.recv().await.unwrap().unwrap();
        assert_eq!(first.payload, b"{\"cam\":\"a\"}");
        let second = broker.recv().await.unwrap().unwrap();
        assert_eq!(second.payload, b"{\"cam\":\"b\"}");
        assert_eq!(second.topic, "camera1/alerts");
        assert!(broker.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_broker_publish_format() {
        let broker = LineBroker::new("camera1/alerts", &b""[..], Vec::new());
        broker.publish("camera1/capture", b"1").await.unwrap();
        assert_eq!(broker.into_writer(), b"camera1/capture 1\n");
    }
}
