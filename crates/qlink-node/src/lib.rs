//! qlink node runtimes.
//!
//! Production glue around [`qlink_core`]'s action-based handshakes: a
//! publish/subscribe transport, tokio time with OS randomness, and the two
//! long-running roles.
//!
//! # Components
//!
//! - [`InitiatorNode`]: the vehicle. Runs the key exchange, then encrypts
//!   and publishes telemetry every simulation step
//! - [`ResponderNode`]: the roadside unit. Answers the key exchange, then
//!   decrypts incoming records
//! - [`PubSub`] / [`MemoryBroker`]: topic transport and its in-process
//!   implementation
//! - [`TelemetrySource`] / [`SyntheticTraffic`]: where records come from
//! - [`SystemEnv`]: production environment (tokio time, crypto RNG)
//!
//! # Message Flow
//!
//! ```text
//! Vehicle                  quantum/send_qubits                Roadside unit
//!   │ ────────────────── {bits, bases} ──────────────────────────> │ measure
//!   │ <───────────────── {bases} ─────────────────────────────── │ sift
//!   │ sift               quantum/receive_basis                     │
//!   │ ────────────────── {ciphertext, nonce, tag} ─────────────> │ decrypt
//!   │                    vehicle/encrypted_data                    │
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod initiator;
mod pubsub;
mod responder;
mod system_env;
mod telemetry;

pub use config::{DEFAULT_ENTITIES, DEFAULT_STEP_INTERVAL, DEFAULT_STEPS, NodeConfig, Topics};
pub use error::NodeError;
pub use initiator::{InitiatorNode, InitiatorReport, run_initiator};
pub use pubsub::{DEFAULT_CAPACITY, MemoryBroker, MemorySubscription, PubSub, Subscription};
pub use responder::{ResponderNode, ResponderReport, run_responder};
pub use system_env::SystemEnv;
pub use telemetry::{SyntheticTraffic, TelemetrySource};
