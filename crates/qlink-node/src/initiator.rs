//! Vehicle (initiator) runtime.
//!
//! Executes [`InitiatorHandshake`] actions over a [`PubSub`] broker:
//!
//! 1. Subscribe to basis replies, then publish the qubit transfer
//! 2. Wait for a reply, bounded by the handshake timeout
//! 3. Encrypt and publish one record per vehicle per simulation step
//!
//! A timeout in step 2 ends the run before any record is produced.

use std::{path::Path, sync::Arc};

use bytes::Bytes;
use qlink_core::{
    Environment, InitiatorAction, InitiatorHandshake, SecureChannel, SessionError, SiftStats,
};
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    error::NodeError,
    pubsub::{PubSub, Subscription},
    telemetry::TelemetrySource,
};

/// Summary of a completed initiator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatorReport {
    /// Reconciliation summary of the key exchange
    pub stats: SiftStats,
    /// Short fingerprint of the session key
    pub fingerprint: String,
    /// Records encrypted and published
    pub records_sent: u64,
}

/// Initiator bound to a broker.
///
/// The reply subscription is taken in [`new`](Self::new), so a responder
/// answering immediately after the qubits go out is never missed.
pub struct InitiatorNode<E: Environment, P: PubSub> {
    env: E,
    broker: P,
    config: NodeConfig,
    replies: P::Subscription,
}

impl<E: Environment, P: PubSub> InitiatorNode<E, P> {
    /// Create an initiator and subscribe to basis replies.
    pub fn new(env: E, broker: P, config: NodeConfig) -> Self {
        let replies = broker.subscribe(&config.topics.receive_basis);
        Self { env, broker, config, replies }
    }

    /// Establish the key, then stream telemetry from `source`.
    ///
    /// # Errors
    ///
    /// - `Session(KeyEstablishmentTimeout)` if no valid reply arrives in
    ///   time; `source` is never polled in that case
    /// - `Transport` if publishing fails or the reply topic closes
    /// - `RecordLog` if the record log cannot be written
    pub async fn run<S: TelemetrySource>(
        mut self,
        source: &mut S,
    ) -> Result<InitiatorReport, NodeError> {
        let (channel, stats) = self.establish().await?;

        let mut record_log = self.config.record_log.is_some().then(Vec::new);
        let mut records_sent = 0u64;

        for step in 0..self.config.steps {
            let records = source.step(step);
            debug!(step, vehicles = records.len(), "simulation step");

            for record in records {
                let line = record.to_string();
                let payload = channel.seal_message(line.as_bytes()).encode()?;
                self.broker
                    .publish(&self.config.topics.encrypted_data, Bytes::from(payload))
                    .await?;
                records_sent += 1;

                if let Some(log) = record_log.as_mut() {
                    log.push(line);
                }
            }

            if step + 1 < self.config.steps {
                self.env.sleep(self.config.step_interval).await;
            }
        }

        if let (Some(path), Some(lines)) = (&self.config.record_log, &record_log) {
            write_record_log(path, lines).await?;
            info!(path = %path.display(), records = lines.len(), "record log written");
        }

        info!(records_sent, "telemetry stream finished");
        Ok(InitiatorReport { stats, fingerprint: channel.fingerprint(), records_sent })
    }

    async fn establish(&mut self) -> Result<(Arc<SecureChannel<E>>, SiftStats), NodeError> {
        let mut handshake = InitiatorHandshake::new(self.env.clone(), self.config.session.clone());

        for action in handshake.start(self.env.now())? {
            match action {
                InitiatorAction::SendQubits(transfer) => {
                    let payload = transfer.encode()?;
                    self.broker
                        .publish(&self.config.topics.send_qubits, Bytes::from(payload))
                        .await?;
                },
            }
        }
        info!(
            num_bits = self.config.session.num_bits,
            "qubits sent, waiting for key establishment"
        );

        let channel = loop {
            handshake.check_timeout(self.env.now())?;
            let Some(remaining) = handshake.remaining(self.env.now()) else {
                return Err(SessionError::InvalidState {
                    state: handshake.session().state(),
                    operation: "await basis reply",
                }
                .into());
            };

            tokio::select! {
                // A reply that is already queued beats the deadline
                biased;

                payload = self.replies.recv() => {
                    let Some(payload) = payload else {
                        return Err(NodeError::Transport("basis reply topic closed".to_string()));
                    };
                    match handshake.handle_basis_payload(&payload, self.env.now()) {
                        Ok(channel) => break channel,
                        Err(e) if e.is_recoverable() => {
                            warn!(error = %e, "ignoring invalid basis reply");
                        },
                        Err(e) => return Err(e.into()),
                    }
                },
                () = self.env.sleep(remaining) => {},
            }
        };

        let stats = handshake
            .session()
            .established()
            .map(|established| established.stats())
            .ok_or_else(|| SessionError::InvalidState {
                state: handshake.session().state(),
                operation: "read key statistics",
            })?;

        Ok((channel, stats))
    }
}

/// Run an initiator to completion. See [`InitiatorNode::run`].
///
/// # Errors
///
/// See [`InitiatorNode::run`].
pub async fn run_initiator<E, P, S>(
    env: E,
    broker: P,
    config: NodeConfig,
    source: &mut S,
) -> Result<InitiatorReport, NodeError>
where
    E: Environment,
    P: PubSub,
    S: TelemetrySource,
{
    InitiatorNode::new(env, broker, config).run(source).await
}

async fn write_record_log(path: &Path, lines: &[String]) -> Result<(), NodeError> {
    let json = serde_json::to_vec_pretty(lines).map_err(std::io::Error::from)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
