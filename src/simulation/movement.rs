use super::{Removal, RemovalReason, Simulation};
use crate::lane::Occupant;
use crate::rsu::{Pass, PassOutcome};
use crate::vehicle::TrajectorySample;
use crate::{LaneId, ShadowSet, VehicleId, VehicleSet};

/// The outcome of a vehicle reaching the end of its lane.
enum Boundary {
    /// The vehicle is still within its lane.
    Within,
    /// The vehicle moves onto the next lane.
    Cross { from: LaneId, to: LaneId, length: f64 },
    /// The vehicle leaves the simulation.
    Leave(RemovalReason),
}

/// The position of a lane occupant along its lane.
pub(crate) fn occupant_x(vehicles: &VehicleSet, shadows: &ShadowSet, occupant: Occupant) -> f64 {
    match occupant {
        Occupant::Vehicle(id) => vehicles.get(id).map_or(0.0, |vehicle| vehicle.x),
        Occupant::Shadow(id) => shadows.get(id).map_or(0.0, |shadow| shadow.x),
    }
}

impl Simulation {
    /// Moves a vehicle over one time step, at most once per step.
    pub(super) fn move_vehicle(&mut self, id: VehicleId) {
        let step = self.step;
        let dt = self.config.dt;
        let vehicle = match self.vehicles.get_mut(id) {
            Some(vehicle) => vehicle,
            None => return,
        };
        if vehicle.moved == Some(step) {
            return;
        }
        vehicle.moved = Some(step);
        let dx = vehicle.integrate(dt);
        self.translate(id, dx);
    }

    /// Moves a vehicle forward by `dx`, onto the following lanes where needed.
    fn translate(&mut self, id: VehicleId, dx: f64) {
        self.extend_lookahead(id, dx);
        if !self.pass_rsus(id, dx) {
            return;
        }
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.x += dx;
        }

        loop {
            match self.resolve_boundary(id) {
                Boundary::Within => break,
                Boundary::Cross { from, to, length } => self.cross_boundary(id, from, to, length),
                Boundary::Leave(reason) => {
                    self.delete_vehicle(id, reason);
                    return;
                }
            }
        }

        self.sync_shadow(id);
        self.record_sample(id, self.time + self.config.dt);
    }

    /// Passes the RSUs between the front of the vehicle and `dx` beyond it.
    /// Returns false if the vehicle was deleted by an RSU.
    fn pass_rsus(&mut self, id: VehicleId, dx: f64) -> bool {
        let vehicle = match self.vehicles.get_mut(id) {
            Some(vehicle) => vehicle,
            None => return false,
        };
        let front = vehicle.x + dx;
        let mut passed = vec![];
        while let Some(&(pos, rsu)) = vehicle.rsus_in_range.front() {
            if pos > front {
                break;
            }
            vehicle.rsus_in_range.pop_front();
            passed.push(rsu);
        }
        let pass = Pass {
            time: self.time,
            vehicle: id,
            speed: vehicle.v,
            length: vehicle.length(),
        };

        for rsu_id in passed {
            let rsu = match self.network.rsu_mut(rsu_id) {
                Ok(rsu) => rsu,
                Err(_) => continue,
            };
            if !(rsu.passable() || rsu.noticeable()) {
                continue;
            }
            if rsu.pass(pass) == PassOutcome::Delete {
                self.delete_vehicle(id, RemovalReason::Sink);
                return false;
            }
        }
        true
    }

    /// Works out where a vehicle goes once its front reaches the end of its lane,
    /// visiting the node at the end of the lane.
    fn resolve_boundary(&mut self, id: VehicleId) -> Boundary {
        let network = &self.network;
        let vehicle = match self.vehicles.get_mut(id) {
            Some(vehicle) => vehicle,
            None => return Boundary::Within,
        };
        let lane = match network.lane(vehicle.lane) {
            Ok(lane) => lane,
            Err(_) => return Boundary::Within,
        };
        if vehicle.x < lane.length() {
            return Boundary::Within;
        }
        let end = match network.link(lane.link()) {
            Ok(link) => link.end(),
            Err(_) => return Boundary::Within,
        };

        if vehicle.navigator.next_node_to_visit() == Some(end) {
            vehicle.navigator.visit_next_node();
        }
        if vehicle.navigator.is_complete() && vehicle.navigator.last_visited_node() == Some(end) {
            return Boundary::Leave(RemovalReason::Arrived);
        }

        let next = match lane.down() {
            [] => return Boundary::Leave(RemovalReason::DeadEnd),
            [next] => *next,
            _ => {
                let target = vehicle.navigator.next_node_to_visit();
                match target.and_then(|node| network.lane_for_route(lane.id(), node, vehicle.gtu_type())) {
                    Some(next) => next,
                    None => return Boundary::Leave(RemovalReason::NoRouteAtSplit),
                }
            }
        };
        Boundary::Cross {
            from: lane.id(),
            to: next,
            length: lane.length(),
        }
    }

    /// Moves a vehicle from the end of lane `from` onto lane `to`.
    fn cross_boundary(&mut self, id: VehicleId, from: LaneId, to: LaneId, length: f64) {
        if let Some(lane_change) = self.vehicles.get(id).and_then(|vehicle| vehicle.lane_change) {
            let target = self
                .network
                .lane(to)
                .ok()
                .and_then(|lane| lane.neighbor(lane_change.direction));
            let shadow_lane = self
                .shadows
                .get(lane_change.shadow)
                .and_then(|shadow| self.network.lane(shadow.lane).ok());
            let compatible = match (target, shadow_lane) {
                (Some(target), Some(shadow_lane)) => shadow_lane.down().contains(&target),
                _ => false,
            };
            if !compatible {
                log::debug!(
                    "vehicle {:?} aborts its lane change entering lane {:?}",
                    id,
                    to
                );
                self.cancel_lane_change(id);
            }
        }

        let vehicle = match self.vehicles.get_mut(id) {
            Some(vehicle) => vehicle,
            None => return,
        };
        vehicle.x -= length;
        for (pos, _) in vehicle.rsus_in_range.iter_mut() {
            *pos -= length;
        }
        vehicle.lookahead.shift(length);
        vehicle.lane = to;
        self.epoch += 1;
        log::trace!("vehicle {:?} moved from lane {:?} onto {:?}", id, from, to);

        let vehicles = &self.vehicles;
        let shadows = &self.shadows;
        let lanes = self.network.lanes_mut();
        if let Some(lane) = lanes.get_mut(from) {
            lane.cut(Occupant::Vehicle(id));
        }
        let mut junction = false;
        if let Some(lane) = lanes.get_mut(to) {
            lane.paste(Occupant::Vehicle(id), |occ| occupant_x(vehicles, shadows, occ));
            if lane.is_merge() {
                lane.set_merge_origin(from);
            }
            junction = lane.is_merge() || lane.is_split();
        }
        // On entering a merge or split lane, the follower left behind moves now
        let follower = lanes
            .get(from)
            .filter(|_| junction)
            .and_then(|lane| lane.vehicles().last());
        if let Some(follower) = follower {
            self.move_vehicle(follower);
        }
    }

    /// Moves the shadow of a vehicle changing lanes alongside it.
    fn sync_shadow(&mut self, id: VehicleId) {
        let (lane, x, v, a, lane_change) = match self.vehicles.get(id) {
            Some(vehicle) => match vehicle.lane_change {
                Some(lane_change) => (vehicle.lane, vehicle.x, vehicle.v, vehicle.a, lane_change),
                None => return,
            },
            None => return,
        };
        let (target, target_x) = match self.network.adjacent_x(lane, x, lane_change.direction) {
            Some(adjacent) => adjacent,
            None => {
                log::debug!("vehicle {:?} lost the target lane of its lane change", id);
                self.cancel_lane_change(id);
                return;
            }
        };
        let shadow = match self.shadows.get_mut(lane_change.shadow) {
            Some(shadow) => shadow,
            None => return,
        };
        let old_lane = shadow.lane;
        shadow.lane = target;
        shadow.x = target_x;
        shadow.v = v;
        shadow.a = a;

        if old_lane != target {
            self.epoch += 1;
            let vehicles = &self.vehicles;
            let shadows = &self.shadows;
            let lanes = self.network.lanes_mut();
            let occupant = Occupant::Shadow(lane_change.shadow);
            if let Some(lane) = lanes.get_mut(old_lane) {
                lane.cut(occupant);
            }
            if let Some(lane) = lanes.get_mut(target) {
                lane.paste(occupant, |occ| occupant_x(vehicles, shadows, occ));
            }
        }
    }

    /// Adds a trajectory sample, if the vehicle is recording one.
    pub(super) fn record_sample(&mut self, id: VehicleId, time: f64) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            let sample = TrajectorySample {
                time,
                lane: vehicle.lane,
                x: vehicle.x,
                v: vehicle.v,
                a: vehicle.a,
            };
            if let Some(trajectory) = &mut vehicle.trajectory {
                trajectory.sample(sample);
            }
        }
    }

    /// Removes a vehicle and its shadow from the simulation, and records why.
    pub(super) fn delete_vehicle(&mut self, id: VehicleId, reason: RemovalReason) {
        let vehicle = match self.vehicles.remove(id) {
            Some(vehicle) => vehicle,
            None => return,
        };
        let lanes = self.network.lanes_mut();
        if let Some(lane) = lanes.get_mut(vehicle.lane) {
            lane.cut(Occupant::Vehicle(id));
        }
        if let Some(shadow) = vehicle.shadow().and_then(|shadow| self.shadows.remove(shadow)) {
            if let Some(lane) = lanes.get_mut(shadow.lane) {
                lane.cut(Occupant::Shadow(shadow.id));
            }
        }
        self.epoch += 1;

        let route = vehicle.route().id();
        match reason {
            RemovalReason::Arrived => {
                log::info!("vehicle {:?} arrived on lane {:?}", id, vehicle.lane)
            }
            RemovalReason::DeadEnd | RemovalReason::NoRouteAtSplit => log::warn!(
                "vehicle {:?} on lane {:?} following route {} removed: {:?}",
                id,
                vehicle.lane,
                route,
                reason
            ),
            RemovalReason::Sink | RemovalReason::Removed => {
                log::debug!("vehicle {:?} removed: {:?}", id, reason)
            }
        }

        self.removals.push(Removal {
            vehicle: id,
            reason,
            lane: vehicle.lane,
            time: self.time,
            trajectory: vehicle.trajectory,
        });
    }
}
