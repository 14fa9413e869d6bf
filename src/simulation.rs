use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::generator::VehicleGenerator;
use crate::lane::Occupant;
use crate::light::LightState;
use crate::markov::SimRng;
use crate::network::Network;
use crate::route::Route;
use crate::rsu::RsuKind;
use crate::scheduler::EventQueue;
use crate::vehicle::{LaneChangeVehicle, Trajectory, Vehicle, VehicleClass};
use crate::{GeneratorId, LaneId, RsuId, ShadowId, ShadowSet, VehicleId, VehicleSet};
pub(crate) use lookahead::Lookahead;
pub(crate) use movement::occupant_x;
pub(crate) use neighbors::NeighborCache;
pub use neighbors::{Direction, Neighbor};
use slotmap::SlotMap;
use std::rc::Rc;

mod generation;
mod lane_change;
mod lookahead;
mod movement;
mod neighbors;

/// A traffic simulation.
pub struct Simulation {
    /// The simulation settings.
    config: SimulationConfig,
    /// The road network.
    network: Network,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The shadows of the vehicles changing lanes.
    shadows: ShadowSet,
    /// The vehicle generators.
    generators: SlotMap<GeneratorId, VehicleGenerator>,
    /// The scheduled events.
    events: EventQueue<SimEvent>,
    /// The random stream shared by all draws.
    rng: SimRng,
    /// The number of steps simulated.
    step: u64,
    /// The simulation time in s.
    time: f64,
    /// Incremented whenever a vehicle or shadow changes lane, invalidating neighbour caches.
    epoch: u64,
    /// The vehicles removed since the last call to [Simulation::take_removals].
    removals: Vec<Removal>,
}

/// An event that can be scheduled on the simulation.
///
/// Events referring to vehicles, RSUs or generators that no longer exist do nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimEvent {
    /// Lets a generator release its next vehicle.
    Generate(GeneratorId),
    /// Removes a vehicle from the simulation.
    RemoveVehicle(VehicleId),
    /// Switches a traffic light.
    SetLight(RsuId, LightState),
    /// Aborts a vehicle's lane change, if it is changing lanes.
    AbortLaneChange(VehicleId),
}

/// A record of a vehicle leaving the simulation.
#[derive(Clone, Debug)]
pub struct Removal {
    pub vehicle: VehicleId,
    pub reason: RemovalReason,
    /// The lane the vehicle was last on.
    pub lane: LaneId,
    /// The time at the start of the step in which the vehicle was removed, in s.
    /// This is not interpolated to the moment within the step.
    pub time: f64,
    /// The recorded trajectory, if recording.
    pub trajectory: Option<Trajectory>,
}

/// Why a vehicle left the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// Reached the end of its route.
    Arrived,
    /// Reached the end of a lane with no lane beyond it.
    DeadEnd,
    /// Reached a split with no lane leading along its route.
    NoRouteAtSplit,
    /// Passed a sink.
    Sink,
    /// Removed through the simulation.
    Removed,
}

impl Simulation {
    /// Creates a simulation of the given network.
    pub fn new(network: Network, config: SimulationConfig) -> SimulationResult<Self> {
        config.validate()?;
        Ok(Self {
            rng: SimRng::new(config.seed),
            config,
            network,
            vehicles: VehicleSet::default(),
            shadows: ShadowSet::default(),
            generators: SlotMap::default(),
            events: EventQueue::new(),
            step: 0,
            time: 0.0,
            epoch: 0,
            removals: vec![],
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Gets the road network.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Gets the road network, to extend it or to control its RSUs.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// The simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The number of steps simulated.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets the shadow of a vehicle changing lanes.
    pub fn shadow(&self, id: ShadowId) -> Option<&LaneChangeVehicle> {
        self.shadows.get(id)
    }

    /// The vehicles removed so far and not yet taken.
    pub fn removals(&self) -> &[Removal] {
        &self.removals
    }

    /// Takes the records of the vehicles removed so far.
    pub fn take_removals(&mut self) -> Vec<Removal> {
        std::mem::take(&mut self.removals)
    }

    /// Schedules an event. Events in the past fire on the next step.
    pub fn schedule(&mut self, time: f64, event: SimEvent) {
        self.events.schedule_at(time, event);
    }

    /// Adds a vehicle to the simulation.
    ///
    /// # Parameters
    /// * `class` - The type of vehicle
    /// * `route` - The route to follow; its nodes up to the start of `lane` count as visited
    /// * `lane` - The lane to place the vehicle on
    /// * `x` - The position of the front of the vehicle along the lane in m
    /// * `v` - The initial velocity in m/s
    pub fn add_vehicle(
        &mut self,
        class: &VehicleClass,
        route: Rc<Route>,
        lane: LaneId,
        x: f64,
        v: f64,
    ) -> SimulationResult<VehicleId> {
        class.validate()?;
        let lane_ref = self.network.lane(lane)?;
        if !(0.0..lane_ref.length()).contains(&x) {
            return Err(SimulationError::PositionOffLane { lane, x });
        }
        let start = self.network.link(lane_ref.link())?.start();
        let rsu_range = self.config.rsu_range;
        let trajectory = self
            .config
            .record_trajectories
            .then(|| Trajectory::new(self.config.trajectory_period));

        let id = self.vehicles.insert_with_key(|id| {
            let start_idx = route.index_of(start);
            let mut vehicle = Vehicle::new(id, class, route, lane, x, v, rsu_range);
            // Nodes of the route up to the start of the lane count as visited
            if let Some(start_idx) = start_idx {
                while vehicle.navigator.next_index() <= start_idx {
                    vehicle.navigator.visit_next_node();
                }
            }
            vehicle.lookahead = Lookahead::new(lane, x, vehicle.navigator.next_index());
            vehicle.trajectory = trajectory;
            vehicle
        });

        let vehicles = &self.vehicles;
        let shadows = &self.shadows;
        if let Some(lane) = self.network.lanes_mut().get_mut(lane) {
            lane.paste(Occupant::Vehicle(id), |occ| occupant_x(vehicles, shadows, occ));
        }
        self.epoch += 1;
        self.extend_lookahead(id, 0.0);
        self.record_sample(id, self.time);
        log::debug!("added vehicle {:?} on lane {:?} at {}", id, lane, x);
        Ok(id)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> SimulationResult<()> {
        if !self.vehicles.contains_key(id) {
            return Err(SimulationError::UnknownVehicle(id));
        }
        self.delete_vehicle(id, RemovalReason::Removed);
        Ok(())
    }

    /// Overrides the acceleration of a vehicle until cleared with `None`.
    /// The maximum deceleration still applies.
    pub fn set_vehicle_acceleration(
        &mut self,
        id: VehicleId,
        acc: Option<f64>,
    ) -> SimulationResult<()> {
        let vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or(SimulationError::UnknownVehicle(id))?;
        vehicle.fixed_acc = acc;
        Ok(())
    }

    /// Advances the simulation by one time step.
    pub fn step(&mut self) {
        self.fire_events();
        self.update_lights();
        self.apply_accelerations();
        self.move_vehicles();
        self.end_lane_changes();
        self.sort_occupants();
        self.step += 1;
        self.time = self.step as f64 * self.config.dt;
    }

    /// Advances the simulation by `steps` time steps.
    pub fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Handles the events due by the current time.
    fn fire_events(&mut self) {
        while let Some((time, event)) = self.events.pop_due(self.time) {
            log::trace!("firing {:?} at {}", event, time);
            match event {
                SimEvent::Generate(id) => self.generate(id, time),
                SimEvent::RemoveVehicle(id) => self.delete_vehicle(id, RemovalReason::Removed),
                SimEvent::SetLight(id, state) => match self.network.rsu_mut(id) {
                    Ok(rsu) => match rsu.kind_mut() {
                        RsuKind::TrafficLight(light) => light.set_state(state),
                        _ => log::debug!("RSU {:?} is not a traffic light", id),
                    },
                    Err(err) => log::debug!("{}", err),
                },
                SimEvent::AbortLaneChange(id) => self.cancel_lane_change(id),
            }
        }
    }

    /// Updates the traffic lights.
    fn update_lights(&mut self) {
        let dt = self.config.dt;
        for rsu in self.network.rsus_mut().values_mut() {
            if let RsuKind::TrafficLight(light) = rsu.kind_mut() {
                light.step(dt);
            }
        }
    }

    /// Calculates the accelerations of the vehicles.
    fn apply_accelerations(&mut self) {
        for vehicle in self.vehicles.values() {
            self.drive(vehicle);
        }
        let dt = self.config.dt;
        for vehicle in self.vehicles.values_mut() {
            let acc = vehicle.fixed_acc.unwrap_or_else(|| vehicle.acc.acc());
            vehicle.set_acceleration(acc, dt);
        }
    }

    /// Applies the car following model, speed limit and stop lines to a vehicle.
    fn drive(&self, vehicle: &Vehicle) {
        let speed_limit = match self.network.lane(vehicle.lane) {
            Ok(lane) => lane.speed_limit(),
            Err(_) => return,
        };
        vehicle.acc.reset();
        vehicle.acc.apply_free_road(vehicle.v, speed_limit);

        let mut leaders = vec![Direction::Down];
        if let Some(dir) = vehicle.lane_change_direction() {
            leaders.push(Direction::ahead(dir));
        }
        for dir in leaders {
            if let Ok(Some(leader)) = self.neighbor(vehicle.id, dir) {
                vehicle
                    .acc
                    .follow_vehicle(leader.gap, vehicle.v, leader.v, speed_limit);
            }
        }

        let stop_line = vehicle.rsus_in_range.iter().find(|(_, id)| {
            self.network
                .rsu(*id)
                .map_or(false, |rsu| rsu.noticeable() && rsu.is_stop())
        });
        if let Some((pos, _)) = stop_line {
            vehicle
                .acc
                .stop_at_line(pos - vehicle.x, vehicle.v, speed_limit);
        }
    }

    /// Moves every vehicle. Vehicles already moved this step are skipped.
    fn move_vehicles(&mut self) {
        let ids = self.vehicles.keys().collect::<Vec<_>>();
        for id in ids {
            self.move_vehicle(id);
        }
    }

    /// Completes the lane changes whose lateral progress has reached the target lane.
    fn end_lane_changes(&mut self) {
        let done = self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.lane_change_progress().map_or(false, |p| p >= 1.0))
            .map(|vehicle| vehicle.id)
            .collect::<Vec<_>>();
        for id in done {
            self.finish_lane_change(id);
        }
    }

    /// Restores the ordering of every lane's occupants.
    fn sort_occupants(&mut self) {
        let vehicles = &self.vehicles;
        let shadows = &self.shadows;
        for lane in self.network.lanes_mut().values_mut() {
            lane.sort_occupants(|occ| occupant_x(vehicles, shadows, occ));
        }
    }
}
