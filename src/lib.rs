pub use cgmath;
pub use config::SimulationConfig;
pub use error::{MarkovError, NetworkError, SimulationError};
pub use generator::{GeneratedClass, GeneratorAttributes, VehicleGenerator};
pub use lane::{Lane, LaneAttributes, LaneWidth, LateralDirection, Occupant};
pub use light::{LightState, SignalPlan, TrafficLight};
pub use markov::{MarkovCorrelation, RandomStream, SimRng};
pub use network::{GtuType, Link, LinkAttributes, LinkKind, Network, Node};
pub use route::{CompleteRoute, Route, RouteNavigator};
pub use rsu::{DetectorReading, OccupancyDetector, Rsu, RsuKind};
pub use scheduler::EventQueue;
pub use simulation::{Direction, Neighbor, Removal, RemovalReason, SimEvent, Simulation};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{
    LaneChangeVehicle, Trajectory, TrajectorySample, Vehicle, VehicleClass, VehicleState,
};

mod config;
mod error;
mod generator;
mod lane;
mod light;
pub mod markov;
pub mod math;
mod network;
mod route;
mod rsu;
mod scheduler;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Node].
    pub struct NodeId;
    /// Unique ID of a [Link].
    pub struct LinkId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of a [LaneChangeVehicle], the shadow of a vehicle changing lanes.
    pub struct ShadowId;
    /// Unique ID of a road-side unit ([Rsu]).
    pub struct RsuId;
    /// Unique ID of a [VehicleGenerator].
    pub struct GeneratorId;
}

type NodeSet = SlotMap<NodeId, Node>;
type LinkSet = SlotMap<LinkId, Link>;
type LaneSet = SlotMap<LaneId, Lane>;
type RsuSet = SlotMap<RsuId, Rsu>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
type ShadowSet = SlotMap<ShadowId, LaneChangeVehicle>;
