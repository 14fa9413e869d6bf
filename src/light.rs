use crate::error::{NetworkError, NetworkResult};
use serde::{Deserialize, Serialize};

/// A traffic light, controlled by a fixed-time plan or by scheduled events.
#[derive(Clone, Debug)]
pub struct TrafficLight {
    /// The fixed-time plan, if any.
    plan: Option<SignalPlan>,
    /// The current state.
    state: LightState,
    /// The time since the current state was entered in s.
    since: f64,
}

/// A fixed-time plan cycling green, amber and red.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalPlan {
    /// The duration of the green phase in s.
    pub green: f64,
    /// The duration of the amber phase in s.
    pub amber: f64,
    /// The duration of the red phase in s.
    pub red: f64,
    /// The time into the cycle at the start of the simulation in s.
    pub offset: f64,
}

/// The state of a traffic light.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum LightState {
    Red,
    Amber,
    Green,
}

impl SignalPlan {
    /// The duration of a whole cycle in s.
    pub fn cycle(&self) -> f64 {
        self.green + self.amber + self.red
    }

    fn duration(&self, state: LightState) -> f64 {
        match state {
            LightState::Green => self.green,
            LightState::Amber => self.amber,
            LightState::Red => self.red,
        }
    }
}

impl LightState {
    fn next(self) -> Self {
        use LightState::*;
        match self {
            Green => Amber,
            Amber => Red,
            Red => Green,
        }
    }
}

impl TrafficLight {
    /// Creates a light that follows a fixed-time plan.
    pub fn fixed_time(plan: SignalPlan) -> NetworkResult<Self> {
        let durations = [plan.green, plan.amber, plan.red];
        if durations.iter().any(|d| !(*d >= 0.0 && d.is_finite())) || !(plan.cycle() > 0.0) {
            return Err(NetworkError::InvalidSignalPlan(format!("{:?}", plan)));
        }
        let mut light = Self {
            plan: Some(plan),
            state: LightState::Green,
            since: plan.offset.rem_euclid(plan.cycle()),
        };
        light.step(0.0);
        Ok(light)
    }

    /// Creates a light which only changes through [TrafficLight::set_state].
    pub fn manual(state: LightState) -> Self {
        Self {
            plan: None,
            state,
            since: 0.0,
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> LightState {
        self.state
    }

    /// Whether approaching vehicles should stop.
    pub fn is_stop(&self) -> bool {
        self.state != LightState::Green
    }

    /// Forces the light into a state, restarting the phase.
    pub fn set_state(&mut self, state: LightState) {
        self.state = state;
        self.since = 0.0;
    }

    /// Advances the light by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let plan = match &self.plan {
            Some(plan) => plan,
            None => return,
        };
        self.since += dt;
        while self.since >= plan.duration(self.state) {
            self.since -= plan.duration(self.state);
            self.state = self.state.next();
        }
    }
}
