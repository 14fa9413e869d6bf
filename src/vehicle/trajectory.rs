use crate::LaneId;

/// The recorded motion of a vehicle.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    /// The sampling period in s.
    period: f64,
    /// The samples, in order of time.
    samples: Vec<TrajectorySample>,
}

/// The state of a vehicle at an instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectorySample {
    /// The simulation time in s.
    pub time: f64,
    /// The lane the vehicle was on.
    pub lane: LaneId,
    /// The position along the lane in m.
    pub x: f64,
    /// The velocity in m/s.
    pub v: f64,
    /// The acceleration in m/s<sup>2</sup>.
    pub a: f64,
}

impl Trajectory {
    /// Creates an empty trajectory sampled every `period` seconds.
    pub fn new(period: f64) -> Self {
        Self {
            period,
            samples: vec![],
        }
    }

    /// Records a sample, if the sampling period has elapsed since the last one.
    pub(crate) fn sample(&mut self, sample: TrajectorySample) {
        let due = self
            .samples
            .last()
            // Tolerate rounding of accumulated time steps
            .map_or(true, |last| sample.time - last.time >= self.period - 1e-9);
        if due {
            self.samples.push(sample);
        }
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
