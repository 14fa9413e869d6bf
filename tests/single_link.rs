//! Tests that involve the simulation of a single link.

mod common;

use assert_approx_eq::assert_approx_eq;
use common::{chain, route, simulation};
use lane_kernel::{
    Direction, LightState, Network, RsuKind, SimEvent, SimulationConfig, TrafficLight,
    VehicleClass,
};

/// Test that a vehicle's position increases monotonically.
#[test]
fn vehicle_drives_forward() {
    let mut network = Network::new();
    let a = network.add_node("a");
    let b = network.add_node("b");
    let lane = common::single_lane_link(&mut network, a, b, (0.0, 0.0), (1000.0, 0.0));
    let mut sim = simulation(network, 0.1);
    let veh = sim
        .add_vehicle(&VehicleClass::car(), route("ab", &[a, b]), lane, 0.0, 0.0)
        .unwrap();

    let mut pos = sim.vehicle(veh).unwrap().x();
    for _ in 0..100 {
        sim.step();
        let next_pos = sim.vehicle(veh).unwrap().x();
        assert!(next_pos > pos);
        pos = next_pos;
    }
}

/// Test that a vehicle never exceeds the speed limit of its lane.
#[test]
fn vehicle_keeps_to_speed_limit() {
    let (network, nodes, lanes) = chain(3);
    let mut sim = simulation(network, 0.2);
    let veh = sim
        .add_vehicle(&VehicleClass::car(), route("r", &nodes), lanes[0], 0.0, 0.0)
        .unwrap();

    for _ in 0..50 {
        sim.step();
        assert!(sim.vehicle(veh).unwrap().v() <= 30.0 + 1e-9);
    }
}

/// Test that a vehicle stops behind a stationary vehicle without running into it.
#[test]
fn vehicle_stops_behind_leader() {
    let mut network = Network::new();
    let a = network.add_node("a");
    let b = network.add_node("b");
    let lane = common::single_lane_link(&mut network, a, b, (0.0, 0.0), (1000.0, 0.0));
    let mut sim = simulation(network, 0.5);
    let route = route("ab", &[a, b]);
    let leader = sim
        .add_vehicle(&VehicleClass::car(), route.clone(), lane, 50.0, 0.0)
        .unwrap();
    sim.set_vehicle_acceleration(leader, Some(0.0)).unwrap();
    let follower = sim
        .add_vehicle(&VehicleClass::car(), route, lane, 0.0, 20.0)
        .unwrap();

    for _ in 0..60 {
        sim.step();
        let leader = sim.vehicle(leader).unwrap();
        let follower = sim.vehicle(follower).unwrap();
        assert!(follower.x() < leader.x_rear());
    }
    let follower = sim.vehicle(follower).unwrap();
    assert_approx_eq!(follower.v(), 0.0, 0.1);
}

/// Test that a vehicle waits at a red light and drives on once it turns green.
#[test]
fn vehicle_waits_at_red_light() {
    let (mut network, nodes, lanes) = chain(3);
    let light = network
        .add_rsu(
            lanes[1],
            50.0,
            RsuKind::TrafficLight(TrafficLight::manual(LightState::Red)),
        )
        .unwrap();
    let mut sim = simulation(network, 0.5);
    let veh = sim
        .add_vehicle(&VehicleClass::car(), route("r", &nodes), lanes[0], 0.0, 15.0)
        .unwrap();
    sim.schedule(60.0, SimEvent::SetLight(light, LightState::Green));

    for _ in 0..120 {
        sim.step();
        let vehicle = sim.vehicle(veh).unwrap();
        assert!(vehicle.lane() != lanes[1] || vehicle.x() < 50.0);
        assert!(vehicle.lane() != lanes[2]);
    }
    assert_approx_eq!(sim.vehicle(veh).unwrap().v(), 0.0, 0.05);

    sim.run(20);
    assert_eq!(sim.vehicle(veh).unwrap().lane(), lanes[2]);
}

/// Test that two runs with the same seed are identical.
#[test]
fn simulation_is_deterministic() {
    let run = || {
        let (network, nodes, lanes) = chain(4);
        let config = SimulationConfig::from_json(r#"{ "dt": 0.25, "seed": 3 }"#).unwrap();
        let mut sim = lane_kernel::Simulation::new(network, config).unwrap();
        for (i, x) in [0.0, 30.0, 60.0].into_iter().enumerate() {
            sim.add_vehicle(
                &VehicleClass::car(),
                route("r", &nodes),
                lanes[0],
                x,
                10.0 + i as f64,
            )
            .unwrap();
        }
        sim.run(200);
        sim.iter_vehicles()
            .map(|vehicle| (vehicle.lane(), vehicle.x(), vehicle.v()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

/// Test that scheduled events act on vehicles, and do nothing once they are gone.
#[test]
fn scheduled_removal() {
    let (network, nodes, lanes) = chain(2);
    let mut sim = simulation(network, 0.5);
    let veh = sim
        .add_vehicle(&VehicleClass::car(), route("r", &nodes), lanes[0], 0.0, 5.0)
        .unwrap();
    sim.schedule(1.0, SimEvent::RemoveVehicle(veh));
    sim.schedule(2.0, SimEvent::RemoveVehicle(veh));
    sim.schedule(2.0, SimEvent::AbortLaneChange(veh));
    sim.run(6);

    assert!(sim.vehicle(veh).is_none());
    let removals = sim.take_removals();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].reason, lane_kernel::RemovalReason::Removed);
    assert_approx_eq!(removals[0].time, 1.0);
}

/// Test that leaders are found on the lanes ahead, and followers on the lanes behind.
#[test]
fn neighbors_across_lanes() {
    let (network, nodes, lanes) = chain(3);
    let mut sim = simulation(network, 0.5);
    let route = route("r", &nodes);
    let behind = sim
        .add_vehicle(&VehicleClass::car(), route.clone(), lanes[0], 90.0, 0.0)
        .unwrap();
    let ahead = sim
        .add_vehicle(&VehicleClass::truck(), route, lanes[1], 30.0, 0.0)
        .unwrap();

    let leader = sim.neighbor(behind, Direction::Down).unwrap().unwrap();
    assert_eq!(leader.vehicle, ahead);
    assert_approx_eq!(leader.gap, 100.0 + 30.0 - 12.0 - 90.0);
    let follower = sim.neighbor(ahead, Direction::Up).unwrap().unwrap();
    assert_eq!(follower.vehicle, behind);
    assert_approx_eq!(follower.gap, 100.0 + 30.0 - 12.0 - 90.0);
    assert!(sim.neighbor(ahead, Direction::Down).unwrap().is_none());
    assert!(sim.neighbor(behind, Direction::LeftDown).unwrap().is_none());
}
