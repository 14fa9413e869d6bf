use crate::error::{NetworkError, NetworkResult};
use crate::lane::{Lane, LaneAttributes, LateralDirection};
use crate::rsu::{Rsu, RsuKind};
use crate::util::Interval;
use crate::{LaneId, LaneSet, LinkId, LinkSet, NodeId, NodeSet, RsuId, RsuSet};
use pathfinding::directed::bfs::bfs;
use smallvec::SmallVec;
use std::fmt;

/// A type of GTU (vehicle), which determines the links it may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GtuType(&'static str);

impl GtuType {
    pub const CAR: GtuType = GtuType("car");
    pub const TRUCK: GtuType = GtuType("truck");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for GtuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A point in the network graph where links start and end.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    links_out: Vec<LinkId>,
    links_in: Vec<LinkId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The links starting at this node.
    pub fn links_out(&self) -> &[LinkId] {
        &self.links_out
    }

    /// The links ending at this node.
    pub fn links_in(&self) -> &[LinkId] {
        &self.links_in
    }
}

/// The type of a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkKind {
    /// A road.
    #[default]
    Normal,
    /// A virtual link connecting a zone to the road network.
    Connector,
}

/// A directed edge between two nodes, carrying one or more lanes.
#[derive(Clone, Debug)]
pub struct Link {
    /// The link ID.
    id: LinkId,
    /// The node at the start of the link.
    start: NodeId,
    /// The node at the end of the link.
    end: NodeId,
    /// The type of link.
    kind: LinkKind,
    /// The lanes, ordered left to right.
    lanes: Vec<LaneId>,
    /// The GTU types that may use the link. Empty means all types.
    permitted: SmallVec<[GtuType; 2]>,
}

/// The attributes of a link.
#[derive(Clone, Debug, Default)]
pub struct LinkAttributes {
    /// The type of link.
    pub kind: LinkKind,
    /// The GTU types that may use the link. Empty means all types.
    pub permitted: Vec<GtuType>,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// The lanes, ordered left to right.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// Whether GTUs of the given type may use this link.
    pub fn permits(&self, gtu_type: GtuType) -> bool {
        self.permitted.is_empty() || self.permitted.contains(&gtu_type)
    }
}

/// A lane-based road network.
#[derive(Clone, Debug, Default)]
pub struct Network {
    /// The nodes in the network.
    nodes: NodeSet,
    /// The links in the network.
    links: LinkSet,
    /// The lanes in the network.
    lanes: LaneSet,
    /// The road-side units in the network.
    rsus: RsuSet,
    /// Incremented whenever lanes are connected.
    version: u64,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a node to the network.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        self.nodes.insert_with_key(|id| Node {
            id,
            name: name.to_owned(),
            links_out: vec![],
            links_in: vec![],
        })
    }

    /// Adds a link from `start` to `end`.
    pub fn add_link(
        &mut self,
        start: NodeId,
        end: NodeId,
        attribs: &LinkAttributes,
    ) -> NetworkResult<LinkId> {
        self.node(start)?;
        self.node(end)?;
        let id = self.links.insert_with_key(|id| Link {
            id,
            start,
            end,
            kind: attribs.kind,
            lanes: vec![],
            permitted: attribs.permitted.iter().copied().collect(),
        });
        self.nodes[start].links_out.push(id);
        self.nodes[end].links_in.push(id);
        self.version += 1;
        Ok(id)
    }

    /// Adds a lane to the right side of a link.
    pub fn add_lane(&mut self, link: LinkId, attribs: &LaneAttributes) -> NetworkResult<LaneId> {
        self.link(link)?;
        attribs.validate()?;
        let id = self
            .lanes
            .insert_with_key(|id| Lane::new(id, link, attribs));
        self.links[link].lanes.push(id);
        Ok(id)
    }

    /// Makes two lanes of the same link adjacent.
    ///
    /// # Parameters
    /// * `left` - The lane on the left
    /// * `right` - The lane on the right
    /// * `go_right` - Whether vehicles may change from `left` to `right`
    /// * `go_left` - Whether vehicles may change from `right` to `left`
    pub fn connect_lateral(
        &mut self,
        left: LaneId,
        right: LaneId,
        go_right: bool,
        go_left: bool,
    ) -> NetworkResult<()> {
        if self.lane(left)?.link() != self.lane(right)?.link() || left == right {
            return Err(NetworkError::NotAdjacent(left, right));
        }
        self.lanes[left].set_lateral(LateralDirection::Right, right, go_right);
        self.lanes[right].set_lateral(LateralDirection::Left, left, go_left);
        self.version += 1;
        Ok(())
    }

    /// Specifies that the end of lane `up` connects to the start of lane `down`.
    /// When `up` starts to split, a split RSU is placed at its end.
    pub fn connect_longitudinal(&mut self, up: LaneId, down: LaneId) -> NetworkResult<()> {
        let up_end = self.links[self.lane(up)?.link()].end;
        let down_start = self.links[self.lane(down)?.link()].start;
        if up_end != down_start {
            return Err(NetworkError::Disconnected {
                up,
                down,
                up_end,
                down_start,
            });
        }
        self.lanes[up].add_down(down);
        self.lanes[down].add_up(up);
        self.version += 1;

        let up_lane = &self.lanes[up];
        let has_split_rsu = up_lane
            .rsus()
            .iter()
            .any(|(_, id)| matches!(self.rsus[*id].kind(), RsuKind::Split));
        if up_lane.is_split() && !has_split_rsu {
            let length = up_lane.length();
            self.add_rsu(up, length, RsuKind::Split)?;
        }
        Ok(())
    }

    /// Places a road-side unit on a lane.
    pub fn add_rsu(&mut self, lane: LaneId, x: f64, kind: RsuKind) -> NetworkResult<RsuId> {
        let length = self.lane(lane)?.length();
        if !(0.0..=length).contains(&x) {
            return Err(NetworkError::RsuOffLane { lane, x, length });
        }
        let id = self
            .rsus
            .insert_with_key(|id| Rsu::new(id, lane, x, kind));
        self.lanes[lane].insert_rsu(x, id);
        Ok(id)
    }

    /// Gets a node.
    pub fn node(&self, id: NodeId) -> NetworkResult<&Node> {
        self.nodes.get(id).ok_or(NetworkError::UnknownNode(id))
    }

    /// Gets a link.
    pub fn link(&self, id: LinkId) -> NetworkResult<&Link> {
        self.links.get(id).ok_or(NetworkError::UnknownLink(id))
    }

    /// Gets a lane.
    pub fn lane(&self, id: LaneId) -> NetworkResult<&Lane> {
        self.lanes.get(id).ok_or(NetworkError::UnknownLane(id))
    }

    /// Gets an RSU.
    pub fn rsu(&self, id: RsuId) -> NetworkResult<&Rsu> {
        self.rsus.get(id).ok_or(NetworkError::UnknownRsu(id))
    }

    /// Gets an RSU mutably, to reconfigure it.
    pub fn rsu_mut(&mut self, id: RsuId) -> NetworkResult<&mut Rsu> {
        self.rsus.get_mut(id).ok_or(NetworkError::UnknownRsu(id))
    }

    /// Returns an iterator over all the nodes.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns an iterator over all the links.
    pub fn iter_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Returns an iterator over all the lanes.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// Returns an iterator over all the RSUs.
    pub fn iter_rsus(&self) -> impl Iterator<Item = &Rsu> {
        self.rsus.values()
    }

    /// The topology version, which changes whenever the lane graph is altered.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Finds a link from `from` to `to` that the GTU type may use.
    pub fn direct_link(&self, from: NodeId, to: NodeId, gtu_type: GtuType) -> Option<&Link> {
        let node = self.nodes.get(from)?;
        node.links_out
            .iter()
            .map(|id| &self.links[*id])
            .filter(|link| link.end == to && link.permits(gtu_type))
            // Prefer roads over connectors
            .min_by_key(|link| link.kind == LinkKind::Connector)
    }

    /// Whether a link leads directly from `from` to `to` for the GTU type.
    pub fn is_connected(&self, from: NodeId, to: NodeId, gtu_type: GtuType) -> bool {
        self.direct_link(from, to, gtu_type).is_some()
    }

    /// Whether `to` can be reached from `from` over links the GTU type may use.
    pub fn reaches(&self, from: NodeId, to: NodeId, gtu_type: GtuType) -> bool {
        let successors = |node: &NodeId| {
            self.nodes
                .get(*node)
                .into_iter()
                .flat_map(|node| node.links_out.iter())
                .map(|id| &self.links[*id])
                .filter(|link| link.permits(gtu_type))
                .map(|link| link.end)
                .collect::<SmallVec<[NodeId; 4]>>()
        };
        bfs(&from, successors, |node| *node == to).is_some()
    }

    /// Chooses the lane downstream of a split lane that leads towards the target node.
    /// Returns the first downstream lane whose link ends at, or can reach, the target.
    pub fn lane_for_route(
        &self,
        split_lane: LaneId,
        target: NodeId,
        gtu_type: GtuType,
    ) -> Option<LaneId> {
        let lane = self.lanes.get(split_lane)?;
        let link_of = |id: &LaneId| &self.links[self.lanes[*id].link()];
        let ends_at_target = |id: &LaneId| {
            let link = link_of(id);
            link.permits(gtu_type) && link.end == target
        };
        let reaches_target = |id: &LaneId| {
            let link = link_of(id);
            link.permits(gtu_type) && self.reaches(link.end, target, gtu_type)
        };
        lane.down()
            .iter()
            .copied()
            .find(ends_at_target)
            .or_else(|| lane.down().iter().copied().find(reaches_target))
    }

    /// Finds the RSUs on a lane within the window `(min, max]`, ordered by position.
    pub fn find_rsus(
        &self,
        lane: LaneId,
        window: Interval<f64>,
    ) -> impl Iterator<Item = (f64, RsuId)> + '_ {
        self.lanes
            .get(lane)
            .into_iter()
            .flat_map(move |lane| lane.find_rsus(window))
    }

    /// Maps a position on a lane to the adjacent lane on the given side.
    ///
    /// Lanes that allow changing between them map position by the section and fraction
    /// along their centre lines, when these have matching sections. Other lanes, and
    /// lanes with differently shaped centre lines, scale by their relative lengths.
    pub fn adjacent_x(&self, lane: LaneId, x: f64, dir: LateralDirection) -> Option<(LaneId, f64)> {
        let from = self.lanes.get(lane)?;
        let target = from.neighbor(dir)?;
        let to = self.lanes.get(target)?;
        let physical = from.can_change(dir) || to.can_change(dir.opposite());
        if physical && from.centre().section_count() == to.centre().section_count() {
            let (section, fraction) = from.centre().locate(x);
            Some((target, to.centre().position_at(section, fraction)))
        } else {
            Some((target, x * to.length() / from.length()))
        }
    }

    pub(crate) fn lanes_mut(&mut self) -> &mut LaneSet {
        &mut self.lanes
    }

    pub(crate) fn rsus_mut(&mut self) -> &mut RsuSet {
        &mut self.rsus
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lane::LaneWidth;
    use crate::math::{Point2d, Polyline};
    use assert_approx_eq::assert_approx_eq;

    fn straight(from: (f64, f64), to: (f64, f64)) -> LaneAttributes {
        LaneAttributes {
            centre: Polyline::straight(Point2d::new(from.0, from.1), Point2d::new(to.0, to.1))
                .unwrap(),
            width: LaneWidth::Constant(3.5),
            speed_limit: 20.0,
        }
    }

    /// A --> B, then B --> C and B --> D.
    struct Fork {
        net: Network,
        nodes: [NodeId; 4],
        lanes: [LaneId; 3],
    }

    fn fork() -> Fork {
        let mut net = Network::new();
        let nodes = ["A", "B", "C", "D"].map(|name| net.add_node(name));
        let [a, b, c, d] = nodes;
        let ab = net.add_link(a, b, &Default::default()).unwrap();
        let bc = net.add_link(b, c, &Default::default()).unwrap();
        let bd = net
            .add_link(
                b,
                d,
                &LinkAttributes {
                    kind: LinkKind::Normal,
                    permitted: vec![GtuType::CAR],
                },
            )
            .unwrap();
        let l_ab = net.add_lane(ab, &straight((0.0, 0.0), (100.0, 0.0))).unwrap();
        let l_bc = net.add_lane(bc, &straight((100.0, 0.0), (200.0, 0.0))).unwrap();
        let l_bd = net.add_lane(bd, &straight((100.0, 0.0), (200.0, -50.0))).unwrap();
        net.connect_longitudinal(l_ab, l_bc).unwrap();
        net.connect_longitudinal(l_ab, l_bd).unwrap();
        Fork {
            net,
            nodes,
            lanes: [l_ab, l_bc, l_bd],
        }
    }

    #[test]
    fn split_gets_split_rsu() {
        let Fork { net, lanes, .. } = fork();
        let lane = net.lane(lanes[0]).unwrap();
        assert!(lane.is_split());
        assert_eq!(lane.rsus().len(), 1);
        let (x, id) = lane.rsus()[0];
        assert_approx_eq!(x, 100.0);
        assert!(matches!(net.rsu(id).unwrap().kind(), RsuKind::Split));
    }

    #[test]
    fn lane_for_route_follows_target() {
        let Fork { net, nodes, lanes } = fork();
        let [_, _, c, d] = nodes;
        assert_eq!(net.lane_for_route(lanes[0], c, GtuType::CAR), Some(lanes[1]));
        assert_eq!(net.lane_for_route(lanes[0], d, GtuType::CAR), Some(lanes[2]));
        assert_eq!(net.lane_for_route(lanes[0], d, GtuType::TRUCK), None);
    }

    #[test]
    fn reachability() {
        let Fork { net, nodes, .. } = fork();
        let [a, b, c, d] = nodes;
        assert!(net.is_connected(a, b, GtuType::CAR));
        assert!(!net.is_connected(a, c, GtuType::CAR));
        assert!(net.reaches(a, c, GtuType::TRUCK));
        assert!(net.reaches(a, d, GtuType::CAR));
        assert!(!net.reaches(a, d, GtuType::TRUCK));
        assert!(!net.reaches(c, a, GtuType::CAR));
        assert!(!net.is_connected(b, d, GtuType::TRUCK));
    }

    #[test]
    fn disconnected_lanes_fail() {
        let Fork {
            mut net, lanes, ..
        } = fork();
        assert!(matches!(
            net.connect_longitudinal(lanes[1], lanes[2]),
            Err(NetworkError::Disconnected { .. })
        ));
    }

    #[test]
    fn rsu_must_be_on_lane() {
        let Fork {
            mut net, lanes, ..
        } = fork();
        assert!(matches!(
            net.add_rsu(lanes[1], 120.0, RsuKind::Sink),
            Err(NetworkError::RsuOffLane { .. })
        ));
        let id = net.add_rsu(lanes[1], 50.0, RsuKind::Sink).unwrap();
        let found = net
            .find_rsus(lanes[1], Interval::new(0.0, 50.0))
            .collect::<Vec<_>>();
        assert_eq!(found, [(50.0, id)]);
    }

    #[test]
    fn adjacent_positions() {
        let mut net = Network::new();
        let a = net.add_node("A");
        let b = net.add_node("B");
        let link = net.add_link(a, b, &Default::default()).unwrap();
        let bent = |y: f64, x_corner: f64| LaneAttributes {
            centre: Polyline::new(vec![
                Point2d::new(0.0, y),
                Point2d::new(x_corner, y),
                Point2d::new(x_corner, 100.0),
            ])
            .unwrap(),
            width: LaneWidth::Constant(3.5),
            speed_limit: 20.0,
        };
        // Left turn: the left lane is on the inside of the bend
        let left = net.add_lane(link, &bent(3.5, 46.5)).unwrap();
        let right = net.add_lane(link, &bent(0.0, 50.0)).unwrap();
        net.connect_lateral(left, right, true, true).unwrap();

        // Halfway along the first section maps to halfway along the other
        let (lane, x) = net
            .adjacent_x(right, 25.0, LateralDirection::Left)
            .unwrap();
        assert_eq!(lane, left);
        assert_approx_eq!(x, 23.25);

        // Without permission to change lanes, the length ratio is used
        let mut net2 = net.clone();
        net2.lanes[left].set_lateral(LateralDirection::Right, right, false);
        net2.lanes[right].set_lateral(LateralDirection::Left, left, false);
        let (_, x) = net2
            .adjacent_x(right, 50.0, LateralDirection::Left)
            .unwrap();
        assert_approx_eq!(x, 50.0 * 143.0 / 150.0);

        assert!(net
            .adjacent_x(left, 10.0, LateralDirection::Left)
            .is_none());
    }
}
