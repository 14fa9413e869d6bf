use crate::light::TrafficLight;
use crate::{LaneId, RsuId, VehicleId};
pub use detector::{DetectorReading, OccupancyDetector};

mod detector;

/// A road-side unit: a device at a fixed position along a lane,
/// which vehicles notice ahead of them and pass.
#[derive(Clone, Debug)]
pub struct Rsu {
    /// The RSU ID.
    id: RsuId,
    /// The lane the RSU is on.
    lane: LaneId,
    /// The position along the lane in m.
    x: f64,
    /// The behaviour of the RSU.
    kind: RsuKind,
}

/// The kinds of RSU.
#[derive(Clone, Debug)]
pub enum RsuKind {
    /// Records the vehicles passing it.
    Detector(OccupancyDetector),
    /// Marks the end of a lane that splits, so vehicles can prepare for the split.
    Split,
    /// A stop line controlled by a traffic light.
    TrafficLight(TrafficLight),
    /// Removes every vehicle passing it.
    Sink,
}

/// A vehicle passing an RSU.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pass {
    /// The time at the start of the step in which the RSU was passed, in s.
    pub time: f64,
    pub vehicle: VehicleId,
    pub speed: f64,
    pub length: f64,
}

/// What happens to a vehicle after passing an RSU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PassOutcome {
    Continue,
    Delete,
}

impl Rsu {
    pub(crate) fn new(id: RsuId, lane: LaneId, x: f64, kind: RsuKind) -> Self {
        Self { id, lane, x, kind }
    }

    /// Gets the RSU ID.
    pub fn id(&self) -> RsuId {
        self.id
    }

    /// Gets the lane the RSU is on.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Gets the position along the lane in m.
    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn kind(&self) -> &RsuKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut RsuKind {
        &mut self.kind
    }

    /// Whether vehicles may drive past this RSU unhindered.
    pub fn passable(&self) -> bool {
        !matches!(self.kind, RsuKind::TrafficLight(_))
    }

    /// Whether vehicles take this RSU into account ahead of reaching it.
    pub fn noticeable(&self) -> bool {
        matches!(self.kind, RsuKind::Split | RsuKind::TrafficLight(_))
    }

    /// Gets the traffic light, if this RSU is one.
    pub fn light(&self) -> Option<&TrafficLight> {
        match &self.kind {
            RsuKind::TrafficLight(light) => Some(light),
            _ => None,
        }
    }

    /// Gets the detector, if this RSU is one.
    pub fn detector(&self) -> Option<&OccupancyDetector> {
        match &self.kind {
            RsuKind::Detector(detector) => Some(detector),
            _ => None,
        }
    }

    /// Whether a vehicle approaching the RSU must stop at it.
    pub fn is_stop(&self) -> bool {
        self.light().map_or(false, TrafficLight::is_stop)
    }

    /// Handles a vehicle passing the RSU.
    pub(crate) fn pass(&mut self, pass: Pass) -> PassOutcome {
        match &mut self.kind {
            RsuKind::Detector(detector) => {
                detector.record(DetectorReading {
                    time: pass.time,
                    vehicle: pass.vehicle,
                    speed: pass.speed,
                    length: pass.length,
                });
                PassOutcome::Continue
            }
            RsuKind::Split => PassOutcome::Continue,
            RsuKind::TrafficLight(light) => {
                if light.is_stop() {
                    log::warn!(
                        "vehicle {:?} passed {:?} light {:?} on lane {:?}",
                        pass.vehicle,
                        light.state(),
                        self.id,
                        self.lane
                    );
                }
                PassOutcome::Continue
            }
            RsuKind::Sink => PassOutcome::Delete,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::light::LightState;

    fn pass() -> Pass {
        Pass {
            time: 1.0,
            vehicle: VehicleId::default(),
            speed: 10.0,
            length: 4.0,
        }
    }

    fn rsu(kind: RsuKind) -> Rsu {
        Rsu::new(RsuId::default(), LaneId::default(), 50.0, kind)
    }

    #[test]
    fn capabilities() {
        let light = rsu(RsuKind::TrafficLight(TrafficLight::manual(LightState::Red)));
        assert!(!light.passable());
        assert!(light.noticeable());
        assert!(light.is_stop());

        let split = rsu(RsuKind::Split);
        assert!(split.passable() && split.noticeable());

        let detector = rsu(RsuKind::Detector(OccupancyDetector::new()));
        assert!(detector.passable() && !detector.noticeable());
        assert!(!detector.is_stop());
    }

    #[test]
    fn pass_outcomes() {
        let mut sink = rsu(RsuKind::Sink);
        assert_eq!(sink.pass(pass()), PassOutcome::Delete);

        let mut detector = rsu(RsuKind::Detector(OccupancyDetector::new()));
        assert_eq!(detector.pass(pass()), PassOutcome::Continue);
        assert_eq!(detector.detector().map(|d| d.count()), Some(1));
    }
}
