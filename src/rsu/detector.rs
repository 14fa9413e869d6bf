use crate::VehicleId;

/// A detector that records every vehicle passing it.
#[derive(Clone, Debug, Default)]
pub struct OccupancyDetector {
    readings: Vec<DetectorReading>,
}

/// A single vehicle passing a detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorReading {
    /// The time at the start of the step in which the vehicle passed, in s.
    pub time: f64,
    /// The passing vehicle.
    pub vehicle: VehicleId,
    /// The speed of the vehicle in m/s.
    pub speed: f64,
    /// The length of the vehicle in m.
    pub length: f64,
}

impl OccupancyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, reading: DetectorReading) {
        self.readings.push(reading);
    }

    /// All readings since the last reset, in order of passing.
    pub fn readings(&self) -> &[DetectorReading] {
        &self.readings
    }

    /// The number of vehicles that passed.
    pub fn count(&self) -> usize {
        self.readings.len()
    }

    /// The harmonic mean speed of the moving vehicles that passed, in m/s.
    pub fn harmonic_mean_speed(&self) -> Option<f64> {
        let (n, inv_sum) = self
            .readings
            .iter()
            .filter(|r| r.speed > 0.0)
            .fold((0usize, 0.0), |(n, sum), r| (n + 1, sum + 1.0 / r.speed));
        (n > 0).then(|| n as f64 / inv_sum)
    }

    /// The total time the detector was occupied, in s.
    pub fn occupied_time(&self) -> f64 {
        self.readings
            .iter()
            .filter(|r| r.speed > 0.0)
            .map(|r| r.length / r.speed)
            .sum()
    }

    /// Clears the readings, starting a new aggregation period.
    pub fn reset(&mut self) {
        self.readings.clear();
    }
}
