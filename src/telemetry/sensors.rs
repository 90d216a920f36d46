//! Sensor acquisition seam
//!
//! Real deployments implement [`SensorReader`] against hardware drivers;
//! the agent core only ever sees one `f64` per metric.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Metric;

/// Reads the current value of a metric.
pub trait SensorReader: Send {
    fn read(&mut self, metric: &Metric) -> f64;
}

/// Random readings within plausible ranges per metric kind.
///
/// Stands in for hardware on hosts without sensors; ranges match the
/// simulated values devices in the field report before their drivers are
/// wired up.
pub struct SimulatedSensors {
    rng: StdRng,
}

impl SimulatedSensors {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorReader for SimulatedSensors {
    fn read(&mut self, metric: &Metric) -> f64 {
        match metric.kind.as_str() {
            "temperature" => self.rng.random_range(20.0..30.0),
            "humidity" => self.rng.random_range(40.0..80.0),
            "pressure" => self.rng.random_range(980.0..1020.0),
            "light" => self.rng.random_range(0.0..1000.0),
            _ => 0.0,
        }
    }
}
