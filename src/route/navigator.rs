use super::Route;
use crate::NodeId;
use std::rc::Rc;

/// A cursor over a route, tracking which nodes a vehicle has passed.
/// The cursor only ever moves forward.
#[derive(Clone, Debug)]
pub struct RouteNavigator {
    /// The route, shared with other vehicles following it.
    route: Rc<Route>,
    /// The index of the last node visited, if any.
    last_visited: Option<usize>,
}

impl RouteNavigator {
    /// Creates a navigator that has not visited any node yet.
    pub fn new(route: Rc<Route>) -> Self {
        Self {
            route,
            last_visited: None,
        }
    }

    /// Gets the route.
    pub fn route(&self) -> &Rc<Route> {
        &self.route
    }

    /// Gets the index of the last visited node.
    pub fn last_visited(&self) -> Option<usize> {
        self.last_visited
    }

    /// Gets the last visited node.
    pub fn last_visited_node(&self) -> Option<NodeId> {
        self.last_visited.and_then(|idx| self.route.node(idx))
    }

    /// Gets the index of the next node to visit.
    pub fn next_index(&self) -> usize {
        self.last_visited.map_or(0, |idx| idx + 1)
    }

    /// Gets the next node to visit, without visiting it.
    pub fn next_node_to_visit(&self) -> Option<NodeId> {
        self.route.node(self.next_index())
    }

    /// Visits the next node and returns it, or returns `None` if the route is complete.
    pub fn visit_next_node(&mut self) -> Option<NodeId> {
        let idx = self.next_index();
        let node = self.route.node(idx)?;
        self.last_visited = Some(idx);
        Some(node)
    }

    /// Whether the last node of the route has been visited.
    pub fn is_complete(&self) -> bool {
        self.next_index() >= self.route.len()
    }
}
