//! Roadside unit (responder) runtime.
//!
//! Listens on the qubit and encrypted-data topics and executes
//! [`ResponderHandshake`] actions. Nothing an incoming message contains can
//! stop the loop: invalid transfers and records are logged and dropped. The
//! loop ends when the shutdown future resolves, after draining every message
//! already queued.

use std::future::Future;

use bytes::Bytes;
use qlink_core::{Environment, ResponderAction, ResponderHandshake, SiftStats};
use qlink_proto::TelemetryRecord;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    error::NodeError,
    pubsub::{PubSub, Subscription},
};

/// Summary of a responder run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponderReport {
    /// Reconciliation summary, if a key was established
    pub stats: Option<SiftStats>,
    /// Records decrypted and delivered
    pub delivered: u64,
    /// Records dropped (bad tag, malformed, or no key yet)
    pub dropped: u64,
}

/// Responder bound to a broker.
///
/// Both subscriptions are taken in [`new`](Self::new), so messages published
/// after construction are never missed, even before [`run`](Self::run) is
/// first polled.
pub struct ResponderNode<E: Environment, P: PubSub> {
    broker: P,
    config: NodeConfig,
    handshake: ResponderHandshake<E>,
    qubits: P::Subscription,
    data: P::Subscription,
    deliveries: Option<mpsc::UnboundedSender<String>>,
}

impl<E: Environment, P: PubSub> ResponderNode<E, P> {
    /// Create a responder and subscribe to its input topics.
    pub fn new(env: E, broker: P, config: NodeConfig) -> Self {
        let qubits = broker.subscribe(&config.topics.send_qubits);
        let data = broker.subscribe(&config.topics.encrypted_data);
        let handshake = ResponderHandshake::new(env, config.session.clone());
        Self { broker, config, handshake, qubits, data, deliveries: None }
    }

    /// Forward every decrypted record to `sink`.
    #[must_use]
    pub fn with_deliveries(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.deliveries = Some(sink);
        self
    }

    /// Serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// - `Transport` if publishing the basis reply fails or an input topic
    ///   closes
    /// - `Protocol` if the basis reply cannot be encoded
    pub async fn run<F>(mut self, shutdown: F) -> Result<ResponderReport, NodeError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut report = ResponderReport::default();
        info!(num_bits = self.config.session.num_bits, "roadside unit listening");

        loop {
            tokio::select! {
                // Queued messages take priority over shutdown
                biased;

                payload = self.qubits.recv() => {
                    let topics = &self.config.topics;
                    let payload = payload.ok_or_else(|| closed(&topics.send_qubits))?;
                    self.on_qubits(&payload).await?;
                },
                payload = self.data.recv() => {
                    let topics = &self.config.topics;
                    let payload = payload.ok_or_else(|| closed(&topics.encrypted_data))?;
                    self.on_encrypted(&payload, &mut report);
                },
                () = &mut shutdown => break,
            }
        }

        report.stats = self.handshake.session().established().map(|e| e.stats());
        info!(delivered = report.delivered, dropped = report.dropped, "roadside unit stopped");
        Ok(report)
    }

    async fn on_qubits(&mut self, payload: &[u8]) -> Result<(), NodeError> {
        info!("received qubits from vehicle");

        let actions = match self.handshake.handle_qubit_payload(payload) {
            Ok(actions) => actions,
            Err(e) => {
                warn!(error = %e, "ignoring qubit transfer");
                return Ok(());
            },
        };

        for action in actions {
            if let ResponderAction::SendBases(reply) = action {
                let payload = reply.encode()?;
                self.broker
                    .publish(&self.config.topics.receive_basis, Bytes::from(payload))
                    .await?;
                info!("basis choices sent to vehicle");
            }
        }
        Ok(())
    }

    fn on_encrypted(&self, payload: &[u8], report: &mut ResponderReport) {
        for action in self.handshake.handle_encrypted_payload(payload) {
            match action {
                ResponderAction::Deliver(plaintext) => {
                    report.delivered += 1;
                    let text = String::from_utf8_lossy(&plaintext).into_owned();
                    log_record(&text);

                    if let Some(sink) = &self.deliveries
                        && sink.send(text).is_err()
                    {
                        debug!("delivery receiver gone");
                    }
                },
                ResponderAction::Drop { reason } => {
                    report.dropped += 1;
                    debug!(%reason, "record dropped");
                },
                ResponderAction::SendBases(_) => {},
            }
        }
    }
}

/// Run a responder until `shutdown` resolves. See [`ResponderNode::run`].
///
/// Subscribes only once the returned future is first polled. Build a
/// [`ResponderNode`] directly when the subscriptions must exist before a
/// peer starts publishing.
///
/// # Errors
///
/// See [`ResponderNode::run`].
pub async fn run_responder<E, P, F>(
    env: E,
    broker: P,
    config: NodeConfig,
    shutdown: F,
) -> Result<ResponderReport, NodeError>
where
    E: Environment,
    P: PubSub,
    F: Future<Output = ()>,
{
    ResponderNode::new(env, broker, config).run(shutdown).await
}

fn log_record(text: &str) {
    match text.parse::<TelemetryRecord>() {
        Ok(record) => info!(
            step = record.step,
            vehicle = %record.entity_id,
            x = record.x,
            y = record.y,
            speed = record.speed,
            acceleration = record.acceleration,
            lane = %record.lane_id,
            "vehicle record"
        ),
        Err(_) => info!(record = %text, "opaque record"),
    }
}

fn closed(topic: &str) -> NodeError {
    NodeError::Transport(format!("topic {topic} closed"))
}
