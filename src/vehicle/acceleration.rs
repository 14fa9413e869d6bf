use std::cell::Cell;

/// The acceleration model of a vehicle: the Intelligent Driver Model.
///
/// Constraints are applied one at a time after a [AccelerationModel::reset],
/// and the lowest resulting acceleration is kept.
#[derive(Clone, Debug)]
pub struct AccelerationModel {
    headway: f64,
    max_acc: f64,
    comf_dec: f64,
    min_gap: f64,
    desired_vel: f64,
    acc: Cell<f64>,
}

/// The parameters of the acceleration model.
pub struct ModelParams {
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The comfortable decelleration in m/s<sup>2</sup>.
    pub comf_deceleration: f64,
    /// The gap to keep to a stationary vehicle ahead in m.
    pub min_gap: f64,
    /// The speed the driver would like to drive at in m/s.
    pub desired_velocity: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &ModelParams) -> Self {
        AccelerationModel {
            headway: params.time_headway,
            max_acc: params.max_acceleration,
            comf_dec: params.comf_deceleration,
            min_gap: params.min_gap,
            desired_vel: params.desired_velocity,
            acc: Cell::new(params.max_acceleration),
        }
    }

    /// Resets the acceleration model. Use at the start of an update.
    pub fn reset(&self) {
        self.acc.set(self.max_acc);
    }

    /// Gets the acceleration resulting from the applied constraints.
    pub fn acc(&self) -> f64 {
        self.acc.get()
    }

    /// The speed the vehicle tries to reach on a lane with the given speed limit.
    pub fn desired_velocity(&self, speed_limit: f64) -> f64 {
        f64::min(self.desired_vel, speed_limit)
    }

    /// Calculates the acceleration on a free road.
    /// # Arguments
    /// * `vel` - The velocity of the simulated vehicle (m/s).
    /// * `speed_limit` - The current speed limit (m/s).
    pub fn apply_free_road(&self, vel: f64, speed_limit: f64) {
        let this_acc = self.max_acc * (1. - self.speed_term(vel, speed_limit));
        self.acc.set(f64::min(self.acc.get(), this_acc));
    }

    /// Calculates the acceleration needed to stop before a stop line.
    ///
    /// # Arguments
    /// * `net_dist` - The distance between this vehicle and the stop line.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `speed_limit` - The current speed limit (m/s).
    pub fn stop_at_line(&self, net_dist: f64, my_vel: f64, speed_limit: f64) {
        self.follow_vehicle(net_dist, my_vel, 0.0, speed_limit);
    }

    /// Calculates the acceleration needed to follow the vehicle ahead.
    ///
    /// # Arguments
    /// * `net_dist` - The distance between this vehicle and the vehicle ahead in metres.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The vehicle ahead's velocity (m/s).
    /// * `speed_limit` - The current speed limit (m/s).
    pub fn follow_vehicle(&self, net_dist: f64, my_vel: f64, their_vel: f64, speed_limit: f64) {
        let acc = self.idm(net_dist, my_vel, their_vel, speed_limit);
        self.acc.set(f64::min(self.acc.get(), acc));
    }

    /// The term of the IDM that slows the vehicle as it nears its desired speed.
    fn speed_term(&self, vel: f64, speed_limit: f64) -> f64 {
        (vel / self.desired_velocity(speed_limit)).powi(4)
    }

    /// Computes an acceleration using the intelligent driver model.
    fn idm(&self, net_dist: f64, my_vel: f64, their_vel: f64, speed_limit: f64) -> f64 {
        let comf_dec = self.comf_dec; // m.s^-2
        let max_acc = self.max_acc; // m.s^-2

        if net_dist <= 0.0 {
            -10. * max_acc
        } else {
            let appr = my_vel - their_vel;
            let factor = 1. / (2. * (max_acc * comf_dec).sqrt());
            let ss = self.min_gap + f64::max(0., (my_vel * self.headway) + (my_vel * appr * factor));
            let term = ss / net_dist;
            max_acc * (1. - self.speed_term(my_vel, speed_limit) - (term * term))
        }
    }
}
