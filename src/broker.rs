//! Broker gateway
//!
//! One logical MQTT connection for the whole backend:
//!
//! - subscribes to the raw-vitals and config topics (at-least-once),
//! - routes raw samples to the ingestion workers with sticky per-user
//!   partitioning, so two samples for the same user are always handled by
//!   the same worker in arrival order,
//! - applies config messages as detector switches,
//! - drains a bounded outbound channel and publishes enriched samples,
//!   alerts and config echoes fire-and-forget.
//!
//! The event loop reconnects forever with 1, 2, 4, … capped 30 s backoff;
//! every ConnAck resets the backoff and re-issues the (idempotent)
//! subscriptions. Unparseable inbound payloads are counted and dropped,
//! never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::MqttConfig;
use crate::detector::DetectorState;
use crate::{Alert, DetectorConfig, EnrichedSample, VitalSample};

/// Initial reconnect delay.
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Reconnect delay cap.
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Outbound publish queue capacity.
const OUTBOUND_CAPACITY: usize = 256;

/// A message bound for the broker.
#[derive(Debug, Clone)]
pub enum Outbound {
    Enriched(EnrichedSample),
    Alert(Alert),
    Config(DetectorConfig),
}

/// Cloneable handle for queueing outbound publishes.
///
/// Publishing is fire-and-forget: a full queue or a stopped gateway drops
/// the message with a log line instead of blocking the caller.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Outbound>,
}

impl Publisher {
    /// Wrap an existing channel sender. Lets tests capture the outbound
    /// stream without a broker.
    pub fn from_sender(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    pub fn publish(&self, message: Outbound) {
        if let Err(e) = self.tx.try_send(message) {
            warn!("dropping outbound publish: {e}");
        }
    }
}

/// Create the outbound publish queue.
///
/// Built outside the gateway so the ingestion workers can be spawned with
/// the [`Publisher`] before the gateway (which needs their work channels)
/// exists.
pub fn outbound_channel() -> (Publisher, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    (Publisher { tx }, rx)
}

/// Running totals the gateway exposes for observability.
#[derive(Debug, Default)]
pub struct GatewayCounters {
    /// Inbound payloads that failed to parse or validate.
    pub parse_errors: AtomicU64,
}

/// The gateway task. Owns the MQTT client and event loop.
pub struct BrokerGateway {
    client: AsyncClient,
    event_loop: EventLoop,
    config: MqttConfig,
    workers: Vec<mpsc::Sender<VitalSample>>,
    detector: Arc<DetectorState>,
    outbound_rx: mpsc::Receiver<Outbound>,
    shutdown_rx: watch::Receiver<bool>,
    counters: Arc<GatewayCounters>,
}

impl BrokerGateway {
    /// Build the gateway.
    pub fn new(
        config: MqttConfig,
        workers: Vec<mpsc::Sender<VitalSample>>,
        detector: Arc<DetectorState>,
        outbound_rx: mpsc::Receiver<Outbound>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, Arc<GatewayCounters>) {
        let client_id = format!("vitalhub-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, 64);
        let counters = Arc::new(GatewayCounters::default());

        let gateway = Self {
            client,
            event_loop,
            config,
            workers,
            detector,
            outbound_rx,
            shutdown_rx,
            counters: Arc::clone(&counters),
        };

        (gateway, counters)
    }

    /// Run until the shutdown signal fires.
    #[instrument(skip(self), fields(broker = %self.config.broker))]
    pub async fn run(mut self) {
        info!(
            "connecting to MQTT broker at {}:{}",
            self.config.broker, self.config.port
        );

        let mut backoff = BACKOFF_INITIAL;
        let mut outbound_open = true;

        loop {
            tokio::select! {
                event = self.event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                        backoff = BACKOFF_INITIAL;
                        self.subscribe().await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.handle_publish(&publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("broker connection error: {e}; retrying in {backoff:?}");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_MAX);
                    }
                },

                outbound = self.outbound_rx.recv(), if outbound_open => match outbound {
                    Some(message) => self.publish_outbound(message).await,
                    None => outbound_open = false,
                },

                _ = self.shutdown_rx.changed() => {
                    info!("shutdown signal received, closing broker connection");
                    break;
                }
            }
        }

        let _ = self.client.disconnect().await;
        debug!("broker gateway stopped");
        // Dropping self closes the worker channels; workers drain and exit.
    }

    /// (Re-)issue the two subscriptions. Safe to repeat after reconnects.
    async fn subscribe(&mut self) {
        for topic in [&self.config.raw_topic, &self.config.config_topic] {
            match self.client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
                Ok(()) => debug!("subscribed to {topic}"),
                Err(e) => warn!("failed to subscribe to {topic}: {e}"),
            }
        }
    }

    /// Route one inbound message by topic.
    async fn handle_publish(&mut self, topic: &str, payload: &[u8]) {
        if topic == self.config.raw_topic {
            match parse_raw_sample(payload) {
                Ok(sample) => self.dispatch_sample(sample).await,
                Err(e) => {
                    self.counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("dropping raw sample: {e}");
                }
            }
        } else if topic == self.config.config_topic {
            match parse_config(payload) {
                Ok(config) => self.detector.switch(config),
                Err(e) => {
                    self.counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("dropping config message: {e}");
                }
            }
        } else {
            trace!("ignoring message on unexpected topic {topic}");
        }
    }

    /// Hand a sample to its sticky worker, blocking when the channel is
    /// full. Backpressure propagates to the broker session instead of
    /// dropping samples in-process.
    async fn dispatch_sample(&mut self, sample: VitalSample) {
        let index = sticky_worker(&sample.user_id, self.workers.len());
        trace!(
            "dispatching sample for {} to worker {index}",
            sample.user_id
        );
        if self.workers[index].send(sample).await.is_err() {
            warn!("ingestion worker {index} is gone, sample dropped");
        }
    }

    /// Serialize and publish one outbound message, fire-and-forget.
    async fn publish_outbound(&mut self, message: Outbound) {
        let (topic, payload) = match &message {
            Outbound::Enriched(sample) => (&self.config.vitals_topic, serde_json::to_vec(sample)),
            Outbound::Alert(alert) => (&self.config.alerts_topic, serde_json::to_vec(alert)),
            Outbound::Config(config) => (&self.config.config_topic, serde_json::to_vec(config)),
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize outbound message: {e}");
                return;
            }
        };

        if let Err(e) = self
            .client
            .publish(topic.as_str(), QoS::AtMostOnce, false, payload)
            .await
        {
            warn!("failed to publish to {topic}: {e}");
        }
    }
}

/// Parse and validate one raw-vitals payload.
pub fn parse_raw_sample(payload: &[u8]) -> Result<VitalSample, String> {
    let sample: VitalSample =
        serde_json::from_slice(payload).map_err(|e| format!("invalid JSON: {e}"))?;
    if sample.user_id.is_empty() {
        return Err("empty user_id".to_string());
    }
    Ok(sample)
}

/// Parse and validate one config payload.
pub fn parse_config(payload: &[u8]) -> Result<DetectorConfig, String> {
    let config: DetectorConfig =
        serde_json::from_slice(payload).map_err(|e| format!("invalid JSON: {e}"))?;
    if config.user_id.is_empty() {
        return Err("empty user_id".to_string());
    }
    Ok(config)
}

/// Stable user → worker assignment. Per-user FIFO holds because the same
/// user always lands on the same worker channel.
pub fn sticky_worker(user_id: &str, workers: usize) -> usize {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}
