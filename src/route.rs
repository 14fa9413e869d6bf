use crate::error::{NetworkError, NetworkResult};
use crate::network::{GtuType, LinkKind, Network};
use crate::NodeId;
use itertools::Itertools;
pub use navigator::RouteNavigator;
use std::ops::Deref;

mod navigator;

/// An ordered sequence of nodes for a GTU type to travel along.
///
/// A plain route need not list every node passed; consecutive nodes only have
/// to be reachable from one another, and the nodes at splits decide which way
/// vehicles go. See [CompleteRoute] for routes that list every node.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// The route ID.
    id: String,
    /// The GTU type the route is meant for.
    gtu_type: GtuType,
    /// The nodes, in order of travel.
    nodes: Vec<NodeId>,
}

/// A route in which every consecutive pair of nodes is directly connected.
/// This is checked whenever a node is added.
#[derive(Clone, Debug, PartialEq)]
pub struct CompleteRoute {
    route: Route,
}

impl Route {
    /// Creates a new route.
    pub fn new(id: &str, gtu_type: GtuType, nodes: Vec<NodeId>) -> Self {
        Self {
            id: id.to_owned(),
            gtu_type,
            nodes,
        }
    }

    /// Appends a node without any checks. Use [Route::verify] to validate the route.
    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gtu_type(&self) -> GtuType {
        self.gtu_type
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gets the node at the given index.
    pub fn node(&self, idx: usize) -> Option<NodeId> {
        self.nodes.get(idx).copied()
    }

    /// Gets the first node.
    pub fn origin(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Gets the last node.
    pub fn destination(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Gets the index of the first occurrence of a node.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| *n == node)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Checks that the route can be travelled by its GTU type.
    ///
    /// Consecutive nodes need not be directly connected, but the second must be
    /// reachable from the first. Connectors may only be used for the first and
    /// last hop of the route.
    pub fn verify(&self, network: &Network) -> NetworkResult<()> {
        for node in &self.nodes {
            network.node(*node)?;
        }
        let last_hop = self.nodes.len().saturating_sub(2);
        for (idx, (from, to)) in self.nodes.iter().copied().tuple_windows().enumerate() {
            match network.direct_link(from, to, self.gtu_type) {
                Some(link) if link.kind() == LinkKind::Connector => {
                    if idx != 0 && idx != last_hop {
                        return Err(NetworkError::ConnectorInRoute {
                            route: self.id.clone(),
                            from,
                            to,
                        });
                    }
                }
                Some(_) => {}
                None if network.reaches(from, to, self.gtu_type) => {
                    log::debug!(
                        "route {}: {:?} and {:?} are not adjacent, but {:?} is reachable",
                        self.id,
                        from,
                        to,
                        to
                    );
                }
                None => {
                    return Err(NetworkError::Unreachable {
                        from,
                        to,
                        gtu_type: self.gtu_type.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

impl CompleteRoute {
    /// Creates a route, checking that each node is directly connected to the previous.
    pub fn new(
        id: &str,
        gtu_type: GtuType,
        nodes: impl IntoIterator<Item = NodeId>,
        network: &Network,
    ) -> NetworkResult<Self> {
        let mut route = Self {
            route: Route::new(id, gtu_type, vec![]),
        };
        for node in nodes {
            route.add_node(node, network)?;
        }
        Ok(route)
    }

    /// Appends a node, which must be directly connected to the current last node.
    pub fn add_node(&mut self, node: NodeId, network: &Network) -> NetworkResult<()> {
        network.node(node)?;
        if let Some(last) = self.route.destination() {
            if !network.is_connected(last, node, self.route.gtu_type) {
                return Err(NetworkError::NotConnected {
                    from: last,
                    to: node,
                    gtu_type: self.route.gtu_type.to_string(),
                });
            }
        }
        self.route.add_node(node);
        Ok(())
    }

    /// Gets the underlying route.
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn into_route(self) -> Route {
        self.route
    }
}

impl Deref for CompleteRoute {
    type Target = Route;

    fn deref(&self) -> &Route {
        &self.route
    }
}
