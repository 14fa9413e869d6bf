use super::Simulation;
use crate::network::Network;
use crate::route::Route;
use crate::util::Interval;
use crate::{LaneId, VehicleId};

/// How far ahead of a vehicle the lane graph has been searched for RSUs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Lookahead {
    /// The furthest lane searched.
    lane: LaneId,
    /// The start of that lane, relative to the vehicle's current lane.
    offset: f64,
    /// The position on that lane up to which RSUs have been collected.
    scanned_to: f64,
    /// The index of the next route node beyond the end of the searched lanes.
    route_idx: usize,
}

impl Lookahead {
    /// Starts a lookahead at a position on a lane.
    /// RSUs at or behind the position are not collected.
    pub fn new(lane: LaneId, x: f64, route_idx: usize) -> Self {
        Self {
            lane,
            offset: 0.0,
            scanned_to: x,
            route_idx,
        }
    }

    /// Shifts the lookahead when the vehicle moves onto the next lane.
    pub fn shift(&mut self, length: f64) {
        self.offset -= length;
    }
}

/// Finds the lane following `lane` along a route.
///
/// `route_idx` is the index of the next route node to visit before the end of `lane`.
/// Returns the next lane and the index of the next route node to visit after it.
pub(crate) fn downstream_lane(
    network: &Network,
    lane: LaneId,
    route: &Route,
    route_idx: usize,
) -> Option<(LaneId, usize)> {
    let lane = network.lane(lane).ok()?;
    let end = network.link(lane.link()).ok()?.end();
    let route_idx = if route.node(route_idx) == Some(end) {
        route_idx + 1
    } else {
        route_idx
    };
    if route_idx >= route.len() {
        // The route ends here
        return None;
    }
    let next = match lane.down() {
        [] => None,
        [next] => Some(*next),
        _ => {
            let target = route.node(route_idx)?;
            network.lane_for_route(lane.id(), target, route.gtu_type())
        }
    };
    next.map(|next| (next, route_idx))
}

impl Simulation {
    /// Collects the RSUs ahead of a vehicle, up to its RSU range beyond `x + dx`.
    ///
    /// Extends the searched lanes along the vehicle's route. When no further lane can be
    /// found the search stops, and is tried again on a later step.
    pub(crate) fn extend_lookahead(&mut self, vehicle_id: VehicleId, dx: f64) {
        let network = &self.network;
        let vehicle = match self.vehicles.get_mut(vehicle_id) {
            Some(vehicle) => vehicle,
            None => return,
        };
        let target = vehicle.x + dx + vehicle.rsu_range;
        let route = vehicle.navigator.route().clone();
        let lookahead = &mut vehicle.lookahead;

        loop {
            let length = match network.lane(lookahead.lane) {
                Ok(lane) => lane.length(),
                Err(_) => break,
            };
            let want = target - lookahead.offset;
            let upto = want.min(length);
            if upto > lookahead.scanned_to {
                let window = Interval::new(lookahead.scanned_to, upto);
                for (x, rsu) in network.find_rsus(lookahead.lane, window) {
                    vehicle.rsus_in_range.push_back((x + lookahead.offset, rsu));
                }
                lookahead.scanned_to = upto;
            }
            if want <= length {
                break;
            }
            match downstream_lane(network, lookahead.lane, &route, lookahead.route_idx) {
                Some((next, route_idx)) => {
                    log::trace!("vehicle {:?} looks ahead onto lane {:?}", vehicle_id, next);
                    lookahead.lane = next;
                    lookahead.offset += length;
                    // Includes RSUs at the very start of the lane
                    lookahead.scanned_to = f64::NEG_INFINITY;
                    lookahead.route_idx = route_idx;
                }
                None => break,
            }
        }
    }
}
