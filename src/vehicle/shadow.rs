use crate::{LaneId, ShadowId, VehicleId};

/// The shadow of a vehicle changing lanes, occupying the target lane
/// alongside the vehicle until the lane change ends.
#[derive(Clone, Debug)]
pub struct LaneChangeVehicle {
    /// The shadow's ID.
    pub(crate) id: ShadowId,
    /// The vehicle changing lanes.
    pub(crate) owner: VehicleId,
    /// The target lane.
    pub(crate) lane: LaneId,
    /// The longitudinal position of the front along the target lane, in m.
    pub(crate) x: f64,
    /// The velocity in m/s, mirrored from the owner.
    pub(crate) v: f64,
    /// The acceleration in m/s<sup>2</sup>, mirrored from the owner.
    pub(crate) a: f64,
}

impl LaneChangeVehicle {
    pub(crate) fn new(id: ShadowId, owner: VehicleId, lane: LaneId, x: f64) -> Self {
        Self {
            id,
            owner,
            lane,
            x,
            v: 0.0,
            a: 0.0,
        }
    }

    pub fn id(&self) -> ShadowId {
        self.id
    }

    /// Gets the vehicle this is the shadow of.
    pub fn owner(&self) -> VehicleId {
        self.owner
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn v(&self) -> f64 {
        self.v
    }

    pub fn a(&self) -> f64 {
        self.a
    }
}
