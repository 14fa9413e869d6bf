use super::{occupant_x, Lookahead, Simulation};
use crate::error::{SimulationError, SimulationResult};
use crate::lane::{LateralDirection, Occupant};
use crate::vehicle::{LaneChange, LaneChangeVehicle};
use crate::{ShadowId, VehicleId};

impl Simulation {
    /// Starts a lane change, placing a shadow of the vehicle on the adjacent lane.
    ///
    /// # Parameters
    /// * `id` - The vehicle to change lanes
    /// * `dir` - The side of the target lane
    /// * `duration` - The time the lateral movement takes in s
    pub fn start_lane_change(
        &mut self,
        id: VehicleId,
        dir: LateralDirection,
        duration: f64,
    ) -> SimulationResult<ShadowId> {
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(SimulationError::InvalidLaneChangeDuration(duration));
        }
        let vehicle = self
            .vehicles
            .get(id)
            .ok_or(SimulationError::UnknownVehicle(id))?;
        if vehicle.lane_change.is_some() {
            return Err(SimulationError::AlreadyChangingLane(id));
        }
        if !self.network.lane(vehicle.lane)?.can_change(dir) {
            return Err(SimulationError::LaneChangeNotPermitted(id));
        }
        let (target, x) = self
            .network
            .adjacent_x(vehicle.lane, vehicle.x, dir)
            .ok_or(SimulationError::LaneChangeNotPermitted(id))?;
        let (v, a) = (vehicle.v, vehicle.a);

        let shadow = self.shadows.insert_with_key(|shadow| {
            let mut shadow = LaneChangeVehicle::new(shadow, id, target, x);
            shadow.v = v;
            shadow.a = a;
            shadow
        });
        let vehicles = &self.vehicles;
        let shadows = &self.shadows;
        if let Some(lane) = self.network.lanes_mut().get_mut(target) {
            lane.paste(Occupant::Shadow(shadow), |occ| {
                occupant_x(vehicles, shadows, occ)
            });
        }

        let dt = self.config.dt;
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.lane_change = Some(LaneChange {
                direction: dir,
                dy: dt / duration,
                progress: 0.0,
                shadow,
            });
        }
        self.epoch += 1;
        log::debug!(
            "vehicle {:?} starts changing lanes {:?} onto lane {:?}",
            id,
            dir,
            target
        );
        Ok(shadow)
    }

    /// Ends a lane change now, moving the vehicle onto the target lane.
    pub fn end_lane_change(&mut self, id: VehicleId) -> SimulationResult<()> {
        self.check_changing_lane(id)?;
        self.finish_lane_change(id);
        Ok(())
    }

    /// Abandons a lane change, keeping the vehicle on its current lane.
    pub fn abort_lane_change(&mut self, id: VehicleId) -> SimulationResult<()> {
        self.check_changing_lane(id)?;
        self.cancel_lane_change(id);
        Ok(())
    }

    fn check_changing_lane(&self, id: VehicleId) -> SimulationResult<()> {
        let vehicle = self
            .vehicles
            .get(id)
            .ok_or(SimulationError::UnknownVehicle(id))?;
        match vehicle.lane_change {
            Some(_) => Ok(()),
            None => Err(SimulationError::NotChangingLane(id)),
        }
    }

    /// Moves a vehicle onto the lane of its shadow, at the shadow's position.
    pub(super) fn finish_lane_change(&mut self, id: VehicleId) {
        let vehicle = match self.vehicles.get_mut(id) {
            Some(vehicle) => vehicle,
            None => return,
        };
        let lane_change = match vehicle.lane_change.take() {
            Some(lane_change) => lane_change,
            None => return,
        };
        let shadow = match self.shadows.remove(lane_change.shadow) {
            Some(shadow) => shadow,
            None => return,
        };
        let from = vehicle.lane;
        vehicle.lane = shadow.lane;
        vehicle.x = shadow.x;
        // RSUs are searched again from the new lane
        vehicle.rsus_in_range.clear();
        vehicle.lookahead = Lookahead::new(shadow.lane, shadow.x, vehicle.navigator.next_index());

        let vehicles = &self.vehicles;
        let shadows = &self.shadows;
        let lanes = self.network.lanes_mut();
        if let Some(lane) = lanes.get_mut(from) {
            lane.cut(Occupant::Vehicle(id));
        }
        if let Some(lane) = lanes.get_mut(shadow.lane) {
            lane.cut(Occupant::Shadow(shadow.id));
            lane.paste(Occupant::Vehicle(id), |occ| occupant_x(vehicles, shadows, occ));
        }
        self.epoch += 1;
        self.extend_lookahead(id, 0.0);
        log::debug!("vehicle {:?} changed lanes onto {:?}", id, shadow.lane);
    }

    /// Removes the shadow of a vehicle changing lanes, if it has one.
    pub(super) fn cancel_lane_change(&mut self, id: VehicleId) {
        let lane_change = match self
            .vehicles
            .get_mut(id)
            .and_then(|vehicle| vehicle.lane_change.take())
        {
            Some(lane_change) => lane_change,
            None => return,
        };
        if let Some(shadow) = self.shadows.remove(lane_change.shadow) {
            if let Some(lane) = self.network.lanes_mut().get_mut(shadow.lane) {
                lane.cut(Occupant::Shadow(shadow.id));
            }
        }
        self.epoch += 1;
        log::debug!("vehicle {:?} aborted its lane change", id);
    }
}
