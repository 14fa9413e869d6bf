use self::acceleration::{AccelerationModel, ModelParams};
use crate::error::{SimulationError, SimulationResult};
use crate::lane::LateralDirection;
use crate::network::GtuType;
use crate::route::{Route, RouteNavigator};
use crate::simulation::{Lookahead, NeighborCache};
use crate::{LaneId, RsuId, ShadowId, VehicleId};
pub use shadow::LaneChangeVehicle;
use std::collections::VecDeque;
use std::rc::Rc;
pub use trajectory::{Trajectory, TrajectorySample};

mod acceleration;
mod shadow;
mod trajectory;

/// Speeds below this are rounded to zero, in m/s.
const STANDSTILL: f64 = 1e-6;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The type of vehicle.
    class: VehicleClass,
    /// The acceleration model
    pub(crate) acc: AccelerationModel,
    /// The lane the vehicle is on.
    pub(crate) lane: LaneId,
    /// The longitudinal position of the front along the current lane, in m.
    pub(crate) x: f64,
    /// The velocity in m/s.
    pub(crate) v: f64,
    /// The acceleration in m/s<sup>2</sup>.
    pub(crate) a: f64,
    /// The in-progress lane change, if there is one.
    pub(crate) lane_change: Option<LaneChange>,
    /// The vehicle's progress along its route.
    pub(crate) navigator: RouteNavigator,
    /// The RSUs ahead within range, with their positions relative to the current lane.
    pub(crate) rsus_in_range: VecDeque<(f64, RsuId)>,
    /// How far ahead RSUs have been searched.
    pub(crate) lookahead: Lookahead,
    /// The distance ahead to look for RSUs, in m.
    pub(crate) rsu_range: f64,
    /// The simulation step in which the vehicle last moved.
    pub(crate) moved: Option<u64>,
    /// The surrounding vehicles found this step.
    pub(crate) neighbors: NeighborCache,
    /// An acceleration that overrides the car following model.
    pub(crate) fixed_acc: Option<f64>,
    /// The recorded trajectory, if recording.
    pub(crate) trajectory: Option<Trajectory>,
}

/// The attributes of a type of vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleClass {
    /// The name of the class.
    pub name: String,
    /// The GTU type, which determines the links the vehicle may use.
    pub gtu_type: GtuType,
    /// The vehicle length in m.
    pub length: f64,
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acceleration: f64,
    /// The comfortable deceleration of the vehicle, a positive number in m/s^2.
    pub comf_deceleration: f64,
    /// The maximum deceleration of the vehicle, a positive number in m/s^2.
    pub max_deceleration: f64,
    /// The speed the driver would like to drive at, in m/s.
    pub desired_speed: f64,
    /// The desired time gap to the vehicle ahead, in s.
    pub time_headway: f64,
    /// The gap kept to a stationary vehicle ahead, in m.
    pub min_gap: f64,
}

/// An in-progress lane change.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LaneChange {
    /// The direction of the lane change.
    pub direction: LateralDirection,
    /// The lateral progress made per time step.
    pub dy: f64,
    /// The lateral progress so far, from 0 to 1.
    pub progress: f64,
    /// The shadow occupying the target lane.
    pub shadow: ShadowId,
}

/// The lateral state of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleState {
    Cruising,
    ChangingLane,
}

impl VehicleClass {
    /// A passenger car.
    pub fn car() -> Self {
        Self {
            name: "car".to_owned(),
            gtu_type: GtuType::CAR,
            length: 4.5,
            max_acceleration: 2.0,
            comf_deceleration: 2.5,
            max_deceleration: 8.0,
            desired_speed: 33.3,
            time_headway: 1.2,
            min_gap: 2.0,
        }
    }

    /// A heavy goods vehicle.
    pub fn truck() -> Self {
        Self {
            name: "truck".to_owned(),
            gtu_type: GtuType::TRUCK,
            length: 12.0,
            max_acceleration: 0.8,
            comf_deceleration: 2.0,
            max_deceleration: 6.0,
            desired_speed: 23.6,
            time_headway: 1.5,
            min_gap: 3.0,
        }
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> SimulationResult<()> {
        let positive = [
            ("length", self.length),
            ("max_acceleration", self.max_acceleration),
            ("comf_deceleration", self.comf_deceleration),
            ("max_deceleration", self.max_deceleration),
            ("desired_speed", self.desired_speed),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SimulationError::Config(format!(
                    "{} of vehicle class {} must be positive, got {}",
                    name, self.name, value
                )));
            }
        }
        if !(self.time_headway >= 0.0 && self.min_gap >= 0.0) {
            return Err(SimulationError::Config(format!(
                "headway and gap of vehicle class {} must not be negative",
                self.name
            )));
        }
        Ok(())
    }
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(
        id: VehicleId,
        class: &VehicleClass,
        route: Rc<Route>,
        lane: LaneId,
        x: f64,
        v: f64,
        rsu_range: f64,
    ) -> Self {
        let navigator = RouteNavigator::new(route);
        let lookahead = Lookahead::new(lane, x, navigator.next_index());
        Self {
            id,
            acc: AccelerationModel::new(&ModelParams {
                time_headway: class.time_headway,
                max_acceleration: class.max_acceleration,
                comf_deceleration: class.comf_deceleration,
                min_gap: class.min_gap,
                desired_velocity: class.desired_speed,
            }),
            class: class.clone(),
            lane,
            x,
            v,
            a: 0.0,
            lane_change: None,
            navigator,
            rsus_in_range: VecDeque::new(),
            lookahead,
            rsu_range,
            moved: None,
            neighbors: NeighborCache::default(),
            fixed_acc: None,
            trajectory: None,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Gets the type of vehicle.
    pub fn class(&self) -> &VehicleClass {
        &self.class
    }

    pub fn gtu_type(&self) -> GtuType {
        self.class.gtu_type
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.class.length
    }

    /// The lane the vehicle is on.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The longitudinal position of the rear of the vehicle in m.
    pub fn x_rear(&self) -> f64 {
        self.x - self.class.length
    }

    /// The vehicle's velocity in m/s.
    pub fn v(&self) -> f64 {
        self.v
    }

    /// The vehicle's acceleration in m/s<sup>2</sup>.
    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn state(&self) -> VehicleState {
        match self.lane_change {
            Some(_) => VehicleState::ChangingLane,
            None => VehicleState::Cruising,
        }
    }

    /// The direction of the in-progress lane change.
    pub fn lane_change_direction(&self) -> Option<LateralDirection> {
        self.lane_change.map(|lc| lc.direction)
    }

    /// The lateral progress of the in-progress lane change, from 0 to 1.
    pub fn lane_change_progress(&self) -> Option<f64> {
        self.lane_change.map(|lc| lc.progress)
    }

    /// The shadow of the vehicle on the target lane, while changing lanes.
    pub fn shadow(&self) -> Option<ShadowId> {
        self.lane_change.map(|lc| lc.shadow)
    }

    /// The vehicle's progress along its route.
    pub fn navigator(&self) -> &RouteNavigator {
        &self.navigator
    }

    /// The vehicle's route.
    pub fn route(&self) -> &Rc<Route> {
        self.navigator.route()
    }

    /// The RSUs within range ahead, in order.
    pub fn rsus_in_range(&self) -> impl Iterator<Item = RsuId> + '_ {
        self.rsus_in_range.iter().map(|(_, id)| *id)
    }

    /// The distance ahead the vehicle looks for RSUs, in m.
    pub fn rsu_range(&self) -> f64 {
        self.rsu_range
    }

    /// The recorded trajectory, if recording.
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// Sets the acceleration for the next move, limited by the maximum deceleration
    /// and by what stops the vehicle within the time step.
    pub(crate) fn set_acceleration(&mut self, a: f64, dt: f64) {
        self.a = a
            .max(-self.class.max_deceleration)
            .max(-self.v / dt);
    }

    /// Integrates the velocity over a time step, and advances the lane change.
    /// Returns the distance to travel.
    pub(crate) fn integrate(&mut self, dt: f64) -> f64 {
        if let Some(lc) = &mut self.lane_change {
            lc.progress = f64::min(lc.progress + lc.dy, 1.0);
        }
        let dx = f64::max(self.v * dt + 0.5 * self.a * dt * dt, 0.0);
        let v = f64::max(self.v + self.a * dt, 0.0);
        self.v = if v < STANDSTILL { 0.0 } else { v };
        dx
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::GtuType;
    use assert_approx_eq::assert_approx_eq;

    fn vehicle(v: f64) -> Vehicle {
        let route = Rc::new(Route::new("r", GtuType::CAR, vec![]));
        Vehicle::new(
            VehicleId::default(),
            &VehicleClass::car(),
            route,
            LaneId::default(),
            0.0,
            v,
            300.0,
        )
    }

    #[test]
    fn integration_is_deterministic() {
        let mut vehicle = vehicle(10.0);
        let mut steps = vec![];
        for _ in 0..3 {
            vehicle.set_acceleration(-5.0, 1.0);
            let dx = vehicle.integrate(1.0);
            steps.push((dx, vehicle.v()));
        }
        assert_approx_eq!(steps[0].0, 7.5);
        assert_approx_eq!(steps[0].1, 5.0);
        assert_approx_eq!(steps[1].0, 2.5);
        assert_approx_eq!(steps[1].1, 0.0);
        assert_approx_eq!(steps[2].0, 0.0);
        assert_approx_eq!(steps[2].1, 0.0);
    }

    #[test]
    fn deceleration_is_limited() {
        let mut vehicle = vehicle(30.0);
        vehicle.set_acceleration(-50.0, 0.5);
        assert_approx_eq!(vehicle.a(), -8.0);

        // Never reverses within a step
        let mut vehicle = self::vehicle(2.0);
        vehicle.set_acceleration(-8.0, 0.5);
        assert_approx_eq!(vehicle.a(), -4.0);
        vehicle.integrate(0.5);
        assert_eq!(vehicle.v(), 0.0);
    }

    #[test]
    fn lane_change_progress_is_capped() {
        let mut vehicle = vehicle(10.0);
        vehicle.lane_change = Some(LaneChange {
            direction: LateralDirection::Left,
            dy: 0.4,
            progress: 0.0,
            shadow: ShadowId::default(),
        });
        assert_eq!(vehicle.state(), VehicleState::ChangingLane);
        for _ in 0..3 {
            vehicle.integrate(0.5);
        }
        assert_eq!(vehicle.lane_change_progress(), Some(1.0));
    }

    #[test]
    fn class_validation() {
        assert!(VehicleClass::car().validate().is_ok());
        assert!(VehicleClass::truck().validate().is_ok());
        let broken = VehicleClass {
            length: 0.0,
            ..VehicleClass::car()
        };
        assert!(broken.validate().is_err());
    }
}
