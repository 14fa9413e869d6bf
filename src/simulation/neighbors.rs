use super::lookahead::downstream_lane;
use super::Simulation;
use crate::error::{SimulationError, SimulationResult};
use crate::lane::{LateralDirection, Occupant};
use crate::vehicle::Vehicle;
use crate::{LaneId, ShadowId, VehicleId};
use std::cell::Cell;

/// A direction in which to look for a neighbouring vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The follower on the same lane.
    Up,
    /// The leader on the same lane.
    Down,
    LeftUp,
    LeftDown,
    RightUp,
    RightDown,
}

/// A vehicle found near another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// The vehicle found.
    pub vehicle: VehicleId,
    /// Set if the vehicle was found through its lane change shadow.
    pub shadow: Option<ShadowId>,
    /// The net distance between the two vehicles in m.
    pub gap: f64,
    /// The velocity of the vehicle found, in m/s.
    pub v: f64,
}

/// The neighbours of a vehicle, found at most once per simulation step.
#[derive(Clone, Debug, Default)]
pub(crate) struct NeighborCache {
    /// The step, topology version and cache epoch the entries were found at.
    stamp: Cell<Option<(u64, u64, u64)>>,
    entries: [Cell<Option<Option<Neighbor>>>; 6],
}

/// A vehicle or shadow on a lane.
struct OccupantState {
    owner: VehicleId,
    shadow: Option<ShadowId>,
    x: f64,
    v: f64,
    length: f64,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Up,
        Direction::Down,
        Direction::LeftUp,
        Direction::LeftDown,
        Direction::RightUp,
        Direction::RightDown,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// The adjacent lane to search, if not the vehicle's own lane.
    pub fn lateral(self) -> Option<LateralDirection> {
        match self {
            Direction::Up | Direction::Down => None,
            Direction::LeftUp | Direction::LeftDown => Some(LateralDirection::Left),
            Direction::RightUp | Direction::RightDown => Some(LateralDirection::Right),
        }
    }

    /// Whether to look for a leader rather than a follower.
    pub fn is_ahead(self) -> bool {
        matches!(
            self,
            Direction::Down | Direction::LeftDown | Direction::RightDown
        )
    }

    /// The direction ahead on the given side.
    pub fn ahead(side: LateralDirection) -> Self {
        match side {
            LateralDirection::Left => Direction::LeftDown,
            LateralDirection::Right => Direction::RightDown,
        }
    }
}

impl NeighborCache {
    fn get(&self, stamp: (u64, u64, u64), dir: Direction) -> Option<Option<Neighbor>> {
        if self.stamp.get() != Some(stamp) {
            return None;
        }
        self.entries[dir.index()].get()
    }

    fn put(&self, stamp: (u64, u64, u64), dir: Direction, neighbor: Option<Neighbor>) {
        if self.stamp.get() != Some(stamp) {
            for entry in &self.entries {
                entry.set(None);
            }
            self.stamp.set(Some(stamp));
        }
        self.entries[dir.index()].set(Some(neighbor));
    }
}

impl OccupantState {
    fn neighbor(&self, gap: f64) -> Neighbor {
        Neighbor {
            vehicle: self.owner,
            shadow: self.shadow,
            gap,
            v: self.v,
        }
    }
}

impl Simulation {
    /// Finds the nearest vehicle in a direction, within the maximum search distance.
    ///
    /// Leaders are searched along the vehicle's route. Followers are searched on all
    /// upstream lanes, and the nearest is returned. Results are cached until the
    /// next step or until a vehicle moves onto another lane.
    pub fn neighbor(&self, vehicle: VehicleId, dir: Direction) -> SimulationResult<Option<Neighbor>> {
        let vehicle = self
            .vehicles
            .get(vehicle)
            .ok_or(SimulationError::UnknownVehicle(vehicle))?;
        let stamp = self.cache_stamp();
        if let Some(found) = vehicle.neighbors.get(stamp, dir) {
            return Ok(found);
        }
        let found = self.find_neighbor(vehicle, dir);
        vehicle.neighbors.put(stamp, dir, found);
        Ok(found)
    }

    fn cache_stamp(&self) -> (u64, u64, u64) {
        (self.step, self.network.version(), self.epoch)
    }

    fn find_neighbor(&self, vehicle: &Vehicle, dir: Direction) -> Option<Neighbor> {
        let (lane, x) = match dir.lateral() {
            None => (vehicle.lane, vehicle.x),
            Some(side) => self.network.adjacent_x(vehicle.lane, vehicle.x, side)?,
        };
        let found = if dir.is_ahead() {
            self.find_leader(vehicle, lane, x)
        } else {
            self.find_follower(vehicle, lane, x)
        };
        found.filter(|n| n.gap <= self.config.max_search_distance)
    }

    fn occupant_state(&self, occupant: Occupant) -> Option<OccupantState> {
        match occupant {
            Occupant::Vehicle(id) => self.vehicles.get(id).map(|vehicle| OccupantState {
                owner: id,
                shadow: None,
                x: vehicle.x,
                v: vehicle.v,
                length: vehicle.length(),
            }),
            Occupant::Shadow(id) => {
                let shadow = self.shadows.get(id)?;
                let owner = self.vehicles.get(shadow.owner)?;
                Some(OccupantState {
                    owner: shadow.owner,
                    shadow: Some(id),
                    x: shadow.x,
                    v: shadow.v,
                    length: owner.length(),
                })
            }
        }
    }

    /// Finds the first vehicle ahead of position `x` on `lane`, continuing along the route.
    fn find_leader(&self, vehicle: &Vehicle, lane: LaneId, x: f64) -> Option<Neighbor> {
        let route = vehicle.route();
        let mut route_idx = vehicle.navigator.next_index();
        let mut lane_id = lane;
        let mut offset = 0.0;

        loop {
            let lane = self.network.lane(lane_id).ok()?;
            let found = lane
                .occupants()
                .iter()
                .filter_map(|occ| self.occupant_state(*occ))
                .filter(|state| state.owner != vehicle.id)
                .find(|state| state.x + offset > x);
            if let Some(state) = found {
                let gap = state.x + offset - state.length - x;
                return Some(state.neighbor(gap));
            }
            offset += lane.length();
            if offset - x > self.config.max_search_distance {
                return None;
            }
            let (next, next_idx) = downstream_lane(&self.network, lane_id, route, route_idx)?;
            lane_id = next;
            route_idx = next_idx;
        }
    }

    /// Finds the nearest vehicle behind position `x` on `lane`, or on any upstream lane.
    fn find_follower(&self, vehicle: &Vehicle, lane: LaneId, x: f64) -> Option<Neighbor> {
        let mut best: Option<Neighbor> = None;
        // Lanes to search, with the search origin relative to the start of each
        let mut stack = vec![(lane, x)];

        while let Some((lane_id, origin)) = stack.pop() {
            let lane = match self.network.lane(lane_id) {
                Ok(lane) => lane,
                Err(_) => continue,
            };
            let found = lane
                .occupants()
                .iter()
                .rev()
                .filter_map(|occ| self.occupant_state(*occ))
                .filter(|state| state.owner != vehicle.id)
                .find(|state| state.x < origin);
            match found {
                Some(state) => {
                    let gap = origin - vehicle.length() - state.x;
                    if best.map_or(true, |best| gap < best.gap) {
                        best = Some(state.neighbor(gap));
                    }
                }
                None if origin <= self.config.max_search_distance => {
                    for up in lane.up() {
                        if let Ok(up_lane) = self.network.lane(*up) {
                            stack.push((*up, origin + up_lane.length()));
                        }
                    }
                }
                None => {}
            }
        }
        best
    }
}
