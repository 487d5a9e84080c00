//! Telemetry sources.
//!
//! The initiator observes vehicles once per simulation step and encrypts one
//! record per vehicle. [`SyntheticTraffic`] generates deterministic traffic
//! in place of a full traffic simulator.

use qlink_proto::TelemetryRecord;

/// Produces the records observed at each simulation step.
pub trait TelemetrySource: Send {
    /// Records for step `step`, one per visible entity. May be empty.
    fn step(&mut self, step: u64) -> Vec<TelemetryRecord>;
}

/// Simulated time per step in seconds.
const STEP_SECONDS: f64 = 0.1;

/// Lane width in metres.
const LANE_WIDTH: f64 = 3.2;

/// Length of the simulated road in metres; vehicles wrap around.
const ROAD_LENGTH: f64 = 500.0;

const LANES: usize = 3;

/// Every vehicle drives due east.
const HEADING_DEGREES: f64 = 90.0;

#[derive(Debug, Clone)]
struct Vehicle {
    id: String,
    lane: usize,
    position: f64,
    speed: f64,
    acceleration: f64,
    odometer: f64,
}

/// Deterministic traffic on a straight multi-lane road.
///
/// Vehicle `i` is named `veh{i}`, drives in lane `i % 3`, and cycles between
/// accelerating and braking around a cruising speed. Same arguments, same
/// records.
#[derive(Debug, Clone)]
pub struct SyntheticTraffic {
    vehicles: Vec<Vehicle>,
}

impl SyntheticTraffic {
    /// Traffic with `entities` vehicles.
    pub fn new(entities: usize) -> Self {
        let vehicles = (0..entities)
            .map(|i| Vehicle {
                id: format!("veh{i}"),
                lane: i % LANES,
                position: (i as f64 * 25.0) % ROAD_LENGTH,
                speed: 10.0 + i as f64,
                acceleration: 0.0,
                odometer: 0.0,
            })
            .collect();
        Self { vehicles }
    }

    fn record(step: u64, vehicle: &Vehicle) -> TelemetryRecord {
        // Rough CO2 (mg/s) and fuel (ml/s) models, increasing with load
        let load = vehicle.speed * (1.0 + vehicle.acceleration.max(0.0));
        let co2 = 1500.0 + 90.0 * load;
        let fuel = co2 / 2300.0;

        TelemetryRecord {
            step,
            entity_id: vehicle.id.clone(),
            x: vehicle.position,
            y: vehicle.lane as f64 * LANE_WIDTH,
            speed: vehicle.speed,
            acceleration: vehicle.acceleration,
            lane_id: format!("road_{}", vehicle.lane),
            extended: vec![
                format!("{:.2}", vehicle.odometer),
                format!("{HEADING_DEGREES:.2}"),
                format!("{co2:.2}"),
                format!("{fuel:.2}"),
            ],
        }
    }
}

impl TelemetrySource for SyntheticTraffic {
    fn step(&mut self, step: u64) -> Vec<TelemetryRecord> {
        for (i, vehicle) in self.vehicles.iter_mut().enumerate() {
            // 40-step cycle, phase shifted per vehicle
            let phase = (step + i as u64 * 7) % 40;
            vehicle.acceleration = if phase < 20 { 0.5 } else { -0.5 };
            vehicle.speed = (vehicle.speed + vehicle.acceleration * STEP_SECONDS).clamp(0.0, 30.0);

            let distance = vehicle.speed * STEP_SECONDS;
            vehicle.position = (vehicle.position + distance) % ROAD_LENGTH;
            vehicle.odometer += distance;
        }

        self.vehicles.iter().map(|v| Self::record(step, v)).collect()
    }
}
