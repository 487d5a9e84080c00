//! Node configuration.

use std::{path::PathBuf, time::Duration};

use qlink_core::SessionConfig;
use qlink_proto::{TOPIC_ENCRYPTED_DATA, TOPIC_RECEIVE_BASIS, TOPIC_SEND_QUBITS};

/// Default number of simulation steps the initiator runs.
pub const DEFAULT_STEPS: u64 = 1000;

/// Default number of simulated vehicles.
pub const DEFAULT_ENTITIES: usize = 3;

/// Default simulated time between two steps.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(100);

/// Logical topic names on the pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Initiator publishes qubits here
    pub send_qubits: String,
    /// Responder publishes its bases here
    pub receive_basis: String,
    /// Initiator publishes encrypted records here
    pub encrypted_data: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            send_qubits: TOPIC_SEND_QUBITS.to_string(),
            receive_basis: TOPIC_RECEIVE_BASIS.to_string(),
            encrypted_data: TOPIC_ENCRYPTED_DATA.to_string(),
        }
    }
}

/// Runtime configuration shared by both roles.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Key exchange parameters; both peers must agree on `num_bits`
    pub session: SessionConfig,
    /// Topic names
    pub topics: Topics,
    /// Simulation steps to run after the key is established
    pub steps: u64,
    /// Vehicles observed per step
    pub entities: usize,
    /// Pause between steps
    pub step_interval: Duration,
    /// Where the initiator writes every plaintext record it sent, as a JSON
    /// array, once the run ends
    pub record_log: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            topics: Topics::default(),
            steps: DEFAULT_STEPS,
            entities: DEFAULT_ENTITIES,
            step_interval: DEFAULT_STEP_INTERVAL,
            record_log: None,
        }
    }
}
