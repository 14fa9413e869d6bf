//! Network builders shared by the integration tests.

#![allow(dead_code)]

use lane_kernel::math::{Point2d, Polyline};
use lane_kernel::{
    GtuType, LaneAttributes, LaneId, LaneWidth, LinkAttributes, Network, NodeId, Route,
    Simulation, SimulationConfig,
};
use std::rc::Rc;

/// The attributes of a straight lane.
pub fn straight(from: (f64, f64), to: (f64, f64), speed_limit: f64) -> LaneAttributes {
    LaneAttributes {
        centre: Polyline::straight(Point2d::new(from.0, from.1), Point2d::new(to.0, to.1))
            .unwrap(),
        width: LaneWidth::Constant(3.5),
        speed_limit,
    }
}

/// Adds a link with a single straight lane between two nodes.
pub fn single_lane_link(
    network: &mut Network,
    start: NodeId,
    end: NodeId,
    from: (f64, f64),
    to: (f64, f64),
) -> LaneId {
    let link = network
        .add_link(start, end, &LinkAttributes::default())
        .unwrap();
    network
        .add_lane(link, &straight(from, to, 30.0))
        .unwrap()
}

/// A chain of 100 m lanes along the x axis, one per link.
pub fn chain(lanes: usize) -> (Network, Vec<NodeId>, Vec<LaneId>) {
    let mut network = Network::new();
    let nodes = (0..=lanes)
        .map(|i| network.add_node(&format!("n{}", i)))
        .collect::<Vec<_>>();
    let lane_ids = (0..lanes)
        .map(|i| {
            let x = 100.0 * i as f64;
            single_lane_link(&mut network, nodes[i], nodes[i + 1], (x, 0.0), (x + 100.0, 0.0))
        })
        .collect::<Vec<_>>();
    for pair in lane_ids.windows(2) {
        network.connect_longitudinal(pair[0], pair[1]).unwrap();
    }
    (network, nodes, lane_ids)
}

pub fn route(id: &str, nodes: &[NodeId]) -> Rc<Route> {
    Rc::new(Route::new(id, GtuType::CAR, nodes.to_vec()))
}

pub fn simulation(network: Network, dt: f64) -> Simulation {
    let config = SimulationConfig {
        dt,
        ..Default::default()
    };
    Simulation::new(network, config).unwrap()
}
