//! qlink binary.
//!
//! # Usage
//!
//! ```bash
//! # Vehicle and roadside unit over an in-memory broker
//! qlink demo --steps 20 --entities 3
//!
//! # Keep every plaintext record the vehicle sent
//! qlink demo --record-log vehicle_data.json
//!
//! # No roadside unit: key establishment times out
//! qlink demo --no-responder --timeout-secs 2
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use qlink_core::{
    SessionConfig,
    config::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_SIFTED_LEN, DEFAULT_NUM_BITS},
};
use qlink_node::{
    DEFAULT_ENTITIES, DEFAULT_STEP_INTERVAL, DEFAULT_STEPS, MemoryBroker, NodeConfig,
    ResponderNode, SyntheticTraffic, SystemEnv, Topics, run_initiator,
};
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// BB84-style key exchange for vehicle telemetry
#[derive(Parser, Debug)]
#[command(name = "qlink")]
#[command(about = "Quantum-keyed vehicle telemetry encryption")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a vehicle and a roadside unit against an in-memory broker
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Qubits exchanged per key
    #[arg(long, default_value_t = DEFAULT_NUM_BITS)]
    bits: usize,

    /// Maximum sifted key length in bits
    #[arg(long, default_value_t = DEFAULT_MAX_SIFTED_LEN)]
    max_sifted_len: usize,

    /// Seconds to wait for the basis reply
    #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Simulation steps after the key is established
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    steps: u64,

    /// Vehicles observed per step
    #[arg(long, default_value_t = DEFAULT_ENTITIES)]
    entities: usize,

    /// Milliseconds between steps
    #[arg(long, default_value_t = DEFAULT_STEP_INTERVAL.as_millis() as u64)]
    step_interval_ms: u64,

    /// Write every plaintext record sent to this JSON file
    #[arg(long)]
    record_log: Option<PathBuf>,

    /// Do not start the roadside unit
    #[arg(long)]
    no_responder: bool,
}

impl DemoArgs {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            session: SessionConfig {
                num_bits: self.bits,
                max_sifted_len: self.max_sifted_len,
                handshake_timeout: Duration::from_secs(self.timeout_secs),
            },
            topics: Topics::default(),
            steps: self.steps,
            entities: self.entities,
            step_interval: Duration::from_millis(self.step_interval_ms),
            record_log: self.record_log.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match cli.command {
        Command::Demo(args) => demo(&args).await,
    }
}

async fn demo(args: &DemoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.node_config();
    let broker = MemoryBroker::new();
    let env = SystemEnv::new();

    tracing::info!(bits = args.bits, steps = args.steps, "qlink demo starting");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let responder = if args.no_responder {
        tracing::warn!("roadside unit disabled, key establishment will time out");
        None
    } else {
        let node = ResponderNode::new(env, broker.clone(), config.clone());
        Some(tokio::spawn(node.run(async move {
            // A dropped sender also means shutdown
            stop_rx.await.ok();
        })))
    };

    let mut traffic = SyntheticTraffic::new(config.entities);
    let result = run_initiator(env, broker, config, &mut traffic).await;

    // The roadside unit may already have stopped on its own
    stop_tx.send(()).ok();
    if let Some(handle) = responder {
        let report = handle.await??;
        tracing::info!(
            delivered = report.delivered,
            dropped = report.dropped,
            "roadside unit finished"
        );
    }

    match result {
        Ok(report) => {
            tracing::info!(
                records_sent = report.records_sent,
                matching = report.stats.matching,
                total = report.stats.total,
                sifted_len = report.stats.kept,
                fingerprint = %report.fingerprint,
                "vehicle finished"
            );
            Ok(())
        },
        Err(e) => {
            if e.is_timeout() {
                tracing::error!("timeout waiting for key establishment, no records were encrypted");
            }
            Err(e.into())
        },
    }
}
