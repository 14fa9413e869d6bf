//! Error types.
//!
//! Construction errors (network building, routes, Markov registration) fail
//! at the offending call. Runtime routing problems never surface here: they
//! delete the affected vehicle and are recorded as a [crate::Removal].

use crate::{LaneId, LinkId, NodeId, RsuId, VehicleId};
use thiserror::Error;

/// Errors raised while building or querying the lane network and routes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    #[error("node {0:?} not found")]
    UnknownNode(NodeId),

    #[error("link {0:?} not found")]
    UnknownLink(LinkId),

    #[error("lane {0:?} not found")]
    UnknownLane(LaneId),

    #[error("RSU {0:?} not found")]
    UnknownRsu(RsuId),

    #[error("no link from {from:?} to {to:?} permits GTU type {gtu_type}")]
    NotConnected {
        from: NodeId,
        to: NodeId,
        gtu_type: String,
    },

    #[error("node {to:?} cannot be reached from {from:?} by GTU type {gtu_type}")]
    Unreachable {
        from: NodeId,
        to: NodeId,
        gtu_type: String,
    },

    #[error("route {route} uses a connector between {from:?} and {to:?} away from its ends")]
    ConnectorInRoute {
        route: String,
        from: NodeId,
        to: NodeId,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("RSU position {x} is outside lane {lane:?} of length {length}")]
    RsuOffLane { lane: LaneId, x: f64, length: f64 },

    #[error("lane {up:?} ends at {up_end:?} but lane {down:?} starts at {down_start:?}")]
    Disconnected {
        up: LaneId,
        down: LaneId,
        up_end: NodeId,
        down_start: NodeId,
    },

    #[error("lanes {0:?} and {1:?} are not on the same link")]
    NotAdjacent(LaneId, LaneId),

    #[error("invalid signal plan: {0}")]
    InvalidSignalPlan(String),
}

/// Errors raised by [crate::MarkovCorrelation].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarkovError {
    #[error("state {0} already defined")]
    DuplicateState(String),

    #[error("correlation {value} is outside {range}")]
    CorrelationOutOfRange { value: f64, range: &'static str },

    #[error("no state has been defined for super-state {0}")]
    UnknownSuperState(String),

    #[error("correlation {value} of a sub state is lower than its group correlation {group}")]
    CorrelationBelowGroup { value: f64, group: f64 },

    #[error("got {states} states but {intensities} steady-state intensities")]
    LengthMismatch { states: usize, intensities: usize },

    #[error("no state can be drawn, all intensities are zero")]
    EmptyDraw,
}

/// Errors raised by the [crate::Simulation].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("vehicle {0:?} not found")]
    UnknownVehicle(VehicleId),

    #[error("vehicle {0:?} is already changing lanes")]
    AlreadyChangingLane(VehicleId),

    #[error("vehicle {0:?} cannot change lanes in the requested direction")]
    LaneChangeNotPermitted(VehicleId),

    #[error("vehicle {0:?} is not changing lanes")]
    NotChangingLane(VehicleId),

    #[error("lane change duration must be positive, got {0}")]
    InvalidLaneChangeDuration(f64),

    #[error("position {x} is outside lane {lane:?}")]
    PositionOffLane { lane: LaneId, x: f64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Markov(#[from] MarkovError),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
pub type MarkovResult<T> = Result<T, MarkovError>;
pub type SimulationResult<T> = Result<T, SimulationError>;
