//! Motion trigger.
//!
//! Reads a sensor line (one token per pulse) and publishes a capture
//! command, at most once per cooldown window. Pulses inside the window are
//! dropped, not queued. Runs as its own task, independent of event
//! processing.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::config::{BrokerConfig, TriggerConfig};
use crate::error::{RelayError, Result};

/// Cooldown filter over pulse times.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// Offer a pulse seen at `now`. Returns whether it is accepted.
    ///
    /// Acceptance is recorded immediately, before the caller acts on it.
    pub fn offer(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Publishes capture commands in response to motion pulses.
pub struct Trigger<B: Broker> {
    broker: Arc<B>,
    motion_token: String,
    capture_topic: String,
    capture_payload: Vec<u8>,
    debouncer: Debouncer,
}

impl<B: Broker> Trigger<B> {
    pub fn new(
        broker: Arc<B>,
        motion_token: impl Into<String>,
        capture_topic: impl Into<String>,
        capture_payload: impl Into<Vec<u8>>,
        cooldown: Duration,
    ) -> Self {
        Self {
            broker,
            motion_token: motion_token.into(),
            capture_topic: capture_topic.into(),
            capture_payload: capture_payload.into(),
            debouncer: Debouncer::new(cooldown),
        }
    }

    pub fn from_config(broker: Arc<B>, topics: &BrokerConfig, trigger: &TriggerConfig) -> Self {
        Self::new(
            broker,
            trigger.motion_token.clone(),
            topics.capture_topic.clone(),
            topics.capture_payload.clone().into_bytes(),
            trigger.cooldown(),
        )
    }

    /// Handle one sensor line. Returns whether a command was published.
    pub async fn on_line(&mut self, line: &str) -> bool {
        if line.trim() != self.motion_token {
            return false;
        }
        if !self.debouncer.offer(Instant::now()) {
            debug!("motion inside cooldown, ignored");
            return false;
        }
        match self
            .broker
            .publish(&self.capture_topic, &self.capture_payload)
            .await
        {
            Ok(()) => {
                info!(topic = %self.capture_topic, "capture command sent");
                true
            }
            Err(e) => {
                warn!(topic = %self.capture_topic, error = %e, "capture command failed");
                false
            }
        }
    }

    /// Read lines until EOF or shutdown. Returns the number of commands
    /// published.
    pub async fn run<R>(mut self, reader: R, mut shutdown: watch::Receiver<bool>) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut issued = 0u64;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                line = lines.next_line() => {
                    let line = line.map_err(|e| RelayError::Broker(format!("trigger read failed: {e}")))?;
                    match line {
                        Some(line) => {
                            if self.on_line(&line).await {
                                issued += 1;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        info!(issued, "trigger stopped");
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[test]
    fn test_cooldown_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(4));

        assert!(debouncer.offer(start));
        assert!(!debouncer.offer(start + Duration::from_secs(2)));
        assert!(debouncer.offer(start + Duration::from_secs(5)));
        assert!(!debouncer.offer(start + Duration::from_secs(8)));
        assert!(debouncer.offer(start + Duration::from_secs(9)));
    }

    #[test]
    fn test_rejected_pulse_does_not_extend_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(4));

        assert!(debouncer.offer(start));
        assert!(!debouncer.offer(start + Duration::from_secs(3)));
        assert!(debouncer.offer(start + Duration::from_secs(4)));
    }

    fn trigger(broker: Arc<MemoryBroker>) -> Trigger<MemoryBroker> {
        Trigger::new(broker, "MOTION", "camera1/capture", b"1".to_vec(), Duration::from_secs(4))
    }

    #[tokio::test]
    async fn test_only_motion_lines_count() {
        let broker = Arc::new(MemoryBroker::new());
        let (_stop, stop_rx) = watch::channel(false);
        let input: &[u8] = b"noise\nMOTION\n  MOTION  \nmotion\n";

        let issued = trigger(broker.clone()).run(input, stop_rx).await.unwrap();
        assert_eq!(issued, 1);

        let published = broker.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "camera1/capture");
        assert_eq!(published[0].payload, b"1");
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulses_at_0_2_5_seconds() {
        let broker = Arc::new(MemoryBroker::new());
        let (_stop, stop_rx) = watch::channel(false);
        let (mut sensor, device) = tokio::io::duplex(64);
        let task = tokio::spawn(trigger(broker.clone()).run(BufReader::new(device), stop_rx));

        sensor.write_all(b"MOTION\n").await.unwrap();
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        sensor.write_all(b"MOTION\n").await.unwrap();
        settle().await;
        tokio::time::advance(Duration::from_secs(3)).await;
        sensor.write_all(b"MOTION\n").await.unwrap();
        settle().await;
        drop(sensor);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        assert_eq!(broker.published().await.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let broker = Arc::new(MemoryBroker::new());
        let (stop, stop_rx) = watch::channel(false);
        let (_sensor, device) = tokio::io::duplex(64);
        let task = tokio::spawn(trigger(broker).run(BufReader::new(device), stop_rx));

        stop.send(true).unwrap();
        assert_eq!(task.await.unwrap().unwrap(), 0);
    }
}
