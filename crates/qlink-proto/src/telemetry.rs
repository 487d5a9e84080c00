//! Telemetry record format.
//!
//! Records are comma-separated text:
//!
//! ```text
//! step,entity_id,x,y,speed,acceleration,lane_id[,extended...]
//! ```
//!
//! Numeric fields are written with two decimals. The key exchange and the
//! cipher treat records as opaque bytes; parsing exists only so receivers
//! can log structured fields.

use std::{fmt, str::FromStr};

use crate::error::ProtocolError;

/// Number of mandatory fields in a record.
pub const BASE_FIELD_COUNT: usize = 7;

/// One observation of one entity at one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Simulation step index
    pub step: u64,
    /// Observed entity (vehicle) identifier
    pub entity_id: String,
    /// Position x in metres
    pub x: f64,
    /// Position y in metres
    pub y: f64,
    /// Speed in m/s
    pub speed: f64,
    /// Acceleration in m/s²
    pub acceleration: f64,
    /// Lane identifier
    pub lane_id: String,
    /// Optional trailing fields (lane position, heading, emissions, fuel)
    pub extended: Vec<String>,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{:.2},{:.2},{:.2},{:.2},{}",
            self.step, self.entity_id, self.x, self.y, self.speed, self.acceleration, self.lane_id
        )?;
        for field in &self.extended {
            write!(f, ",{field}")?;
        }
        Ok(())
    }
}

impl FromStr for TelemetryRecord {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() < BASE_FIELD_COUNT {
            return Err(ProtocolError::InvalidRecord(format!(
                "expected at least {BASE_FIELD_COUNT} fields, got {}",
                parts.len()
            )));
        }

        let step = parts[0]
            .parse()
            .map_err(|_| ProtocolError::InvalidRecord(format!("bad step {:?}", parts[0])))?;

        Ok(Self {
            step,
            entity_id: parts[1].to_string(),
            x: parse_float("x", parts[2])?,
            y: parse_float("y", parts[3])?,
            speed: parse_float("speed", parts[4])?,
            acceleration: parse_float("acceleration", parts[5])?,
            lane_id: parts[6].to_string(),
            extended: parts[BASE_FIELD_COUNT..].iter().map(ToString::to_string).collect(),
        })
    }
}

fn parse_float(field: &str, value: &str) -> Result<f64, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidRecord(format!("bad {field} {value:?}")))
}
