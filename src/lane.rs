use crate::error::{NetworkError, NetworkResult};
use crate::math::Polyline;
use crate::util::Interval;
use crate::{LaneId, LinkId, RsuId, ShadowId, VehicleId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A lane: a single traversable path within a link.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane ID.
    id: LaneId,
    /// The link the lane belongs to.
    link: LinkId,
    /// The centre line of the lane.
    centre: Polyline,
    /// The width of the lane.
    width: LaneWidth,
    /// Speed limit in m/s.
    speed_limit: f64,
    /// The lane to the left, on the same link.
    left: Option<LaneId>,
    /// The lane to the right, on the same link.
    right: Option<LaneId>,
    /// Whether vehicles may change to the lane on the left.
    go_left: bool,
    /// Whether vehicles may change to the lane on the right.
    go_right: bool,
    /// The lanes that precede this one. More than one means this is a merge lane.
    up: SmallVec<[LaneId; 2]>,
    /// The lanes that succeed this one. More than one means this is a split lane.
    down: SmallVec<[LaneId; 2]>,
    /// The RSUs on the lane, ordered by position.
    rsus: Vec<(f64, RsuId)>,
    /// The vehicles and lane change shadows on the lane, ordered by position.
    occupants: Vec<Occupant>,
    /// The upstream lane from which the last vehicle entered, if this is a merge lane.
    merge_origin: Option<LaneId>,
}

/// The attributes of a lane.
#[derive(Clone, Debug)]
pub struct LaneAttributes {
    /// The centre line of the lane.
    pub centre: Polyline,
    /// The width of the lane.
    pub width: LaneWidth,
    /// The speed limit in m/s.
    pub speed_limit: f64,
}

/// The width of a lane along its length.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LaneWidth {
    Constant(f64),
    /// Varies linearly from the start to the end of the lane.
    Linear { start: f64, end: f64 },
}

/// A side of a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LateralDirection {
    Left,
    Right,
}

/// An entity occupying space on a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Occupant {
    Vehicle(VehicleId),
    Shadow(ShadowId),
}

impl LateralDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl LaneAttributes {
    /// Checks that the width and speed limit are positive.
    pub fn validate(&self) -> NetworkResult<()> {
        if !self.width.is_valid() {
            return Err(NetworkError::InvalidGeometry(format!(
                "lane width {:?} is not positive",
                self.width
            )));
        }
        if !(self.speed_limit > 0.0) {
            return Err(NetworkError::InvalidGeometry(format!(
                "speed limit {} is not positive",
                self.speed_limit
            )));
        }
        Ok(())
    }
}

impl LaneWidth {
    /// The width at a fraction along the lane.
    pub fn at(&self, fraction: f64) -> f64 {
        match *self {
            LaneWidth::Constant(width) => width,
            LaneWidth::Linear { start, end } => Interval::new(start, end).lerp(fraction),
        }
    }

    fn is_valid(&self) -> bool {
        let valid = |w: f64| w > 0.0 && w.is_finite();
        match *self {
            LaneWidth::Constant(width) => valid(width),
            LaneWidth::Linear { start, end } => valid(start) && valid(end),
        }
    }
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(id: LaneId, link: LinkId, attribs: &LaneAttributes) -> Self {
        Self {
            id,
            link,
            centre: attribs.centre.clone(),
            width: attribs.width,
            speed_limit: attribs.speed_limit,
            left: None,
            right: None,
            go_left: false,
            go_right: false,
            up: SmallVec::new(),
            down: SmallVec::new(),
            rsus: vec![],
            occupants: vec![],
            merge_origin: None,
        }
    }

    /// Gets the lane ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// Gets the link the lane belongs to.
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.centre.length()
    }

    /// Gets the centre line of the lane.
    pub fn centre(&self) -> &Polyline {
        &self.centre
    }

    /// Gets the width of the lane at a position in m.
    pub fn width_at(&self, x: f64) -> f64 {
        self.width.at((x / self.length()).clamp(0.0, 1.0))
    }

    /// Gets the speed limit in m/s.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// Gets the adjacent lane on the given side, if any.
    pub fn neighbor(&self, dir: LateralDirection) -> Option<LaneId> {
        match dir {
            LateralDirection::Left => self.left,
            LateralDirection::Right => self.right,
        }
    }

    /// Whether vehicles may change lanes from this lane in the given direction.
    pub fn can_change(&self, dir: LateralDirection) -> bool {
        let permitted = match dir {
            LateralDirection::Left => self.go_left,
            LateralDirection::Right => self.go_right,
        };
        permitted && self.neighbor(dir).is_some()
    }

    /// Gets the preceding lanes.
    pub fn up(&self) -> &[LaneId] {
        &self.up
    }

    /// Gets the succeeding lanes.
    pub fn down(&self) -> &[LaneId] {
        &self.down
    }

    /// Whether the lane splits into several lanes at its end.
    pub fn is_split(&self) -> bool {
        self.down.len() > 1
    }

    /// Whether several lanes merge into this lane at its start.
    pub fn is_merge(&self) -> bool {
        self.up.len() > 1
    }

    /// Gets the upstream lane from which the last vehicle entered this merge lane.
    pub fn merge_origin(&self) -> Option<LaneId> {
        self.merge_origin
    }

    /// Gets the RSUs on the lane and their positions, ordered by position.
    pub fn rsus(&self) -> &[(f64, RsuId)] {
        &self.rsus
    }

    /// Finds the RSUs within the window `(min, max]`, ordered by position.
    pub fn find_rsus(&self, window: Interval<f64>) -> impl Iterator<Item = (f64, RsuId)> + '_ {
        let start = self.rsus.partition_point(|(x, _)| *x <= window.min);
        self.rsus[start..]
            .iter()
            .copied()
            .take_while(move |(x, _)| *x <= window.max)
    }

    /// Gets the vehicles and shadows on the lane, ordered by position.
    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    /// Gets the vehicles on the lane, ordered by position.
    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.occupants.iter().filter_map(|occ| match occ {
            Occupant::Vehicle(id) => Some(*id),
            Occupant::Shadow(_) => None,
        })
    }

    pub(crate) fn set_lateral(&mut self, dir: LateralDirection, lane: LaneId, permitted: bool) {
        match dir {
            LateralDirection::Left => {
                self.left = Some(lane);
                self.go_left = permitted;
            }
            LateralDirection::Right => {
                self.right = Some(lane);
                self.go_right = permitted;
            }
        }
    }

    pub(crate) fn add_down(&mut self, lane: LaneId) {
        if !self.down.contains(&lane) {
            self.down.push(lane);
        }
    }

    pub(crate) fn add_up(&mut self, lane: LaneId) {
        if !self.up.contains(&lane) {
            self.up.push(lane);
        }
    }

    pub(crate) fn set_merge_origin(&mut self, lane: LaneId) {
        self.merge_origin = Some(lane);
    }

    /// Inserts an RSU, after any others at the same position.
    pub(crate) fn insert_rsu(&mut self, x: f64, id: RsuId) {
        let idx = self.rsus.partition_point(|(pos, _)| *pos <= x);
        self.rsus.insert(idx, (x, id));
    }

    /// Inserts an occupant at its position, given by `pos`.
    pub(crate) fn paste(&mut self, occupant: Occupant, pos: impl Fn(Occupant) -> f64) {
        let occ_pos = pos(occupant);
        let idx = self
            .occupants
            .iter()
            .map(|occ| pos(*occ))
            .position(|p| p > occ_pos)
            .unwrap_or(self.occupants.len());
        self.occupants.insert(idx, occupant);
    }

    /// Removes an occupant from the lane.
    pub(crate) fn cut(&mut self, occupant: Occupant) {
        if let Some(idx) = self.occupants.iter().rposition(|occ| *occ == occupant) {
            self.occupants.remove(idx);
        }
    }

    /// Restores the ordering of the occupants after they moved.
    pub(crate) fn sort_occupants(&mut self, pos: impl Fn(Occupant) -> f64) {
        self.occupants
            .sort_by(|a, b| pos(*a).total_cmp(&pos(*b)));
    }
}
