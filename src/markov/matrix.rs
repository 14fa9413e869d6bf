use super::RandomStream;
use crate::error::{MarkovError, MarkovResult};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// An element of a [TransitionMatrix]: either a single state,
/// or a sub-group of states represented by its super state.
#[derive(Clone, Debug)]
pub(crate) enum MarkovNode<S> {
    Leaf(FixedState<S>),
    Group(TransitionMatrix<S>),
}

/// A single user-visible state and its correlation.
#[derive(Clone, Debug)]
pub(crate) struct FixedState<S> {
    pub state: S,
    pub correlation: f64,
}

/// A row-generating transition matrix over a set of fixed states and sub-groups.
///
/// Probabilities are not stored; each draw evaluates the single row of the
/// previous state from the intensities supplied at that moment.
#[derive(Clone, Debug)]
pub(crate) struct TransitionMatrix<S> {
    /// The super state of the group, `None` for the root.
    state: Option<S>,
    /// The correlation of the whole group within its parent matrix.
    correlation: f64,
    /// The elements, in insertion order.
    nodes: Vec<MarkovNode<S>>,
}

impl<S: Clone + Eq + Hash> MarkovNode<S> {
    fn correlation(&self) -> f64 {
        match self {
            MarkovNode::Leaf(leaf) => leaf.correlation,
            MarkovNode::Group(group) => group.correlation,
        }
    }

    /// Whether the state is this leaf, or anywhere inside this group.
    fn contains(&self, state: &S) -> bool {
        match self {
            MarkovNode::Leaf(leaf) => leaf.state == *state,
            MarkovNode::Group(group) => group.contains(state),
        }
    }

    fn intensity(&self, intensities: &HashMap<S, f64>) -> f64 {
        match self {
            MarkovNode::Leaf(leaf) => intensities.get(&leaf.state).copied().unwrap_or(0.0),
            MarkovNode::Group(group) => group.intensity(intensities),
        }
    }

    /// The state this element represents in its parent matrix.
    pub fn key(&self) -> Option<&S> {
        match self {
            MarkovNode::Leaf(leaf) => Some(&leaf.state),
            MarkovNode::Group(group) => group.state.as_ref(),
        }
    }

    fn draw<R: RandomStream + ?Sized>(
        &self,
        previous: Option<&S>,
        intensities: &HashMap<S, f64>,
        stream: &mut R,
    ) -> MarkovResult<S> {
        match self {
            MarkovNode::Leaf(leaf) => Ok(leaf.state.clone()),
            MarkovNode::Group(group) => group.draw(previous, intensities, stream),
        }
    }
}

impl<S: Clone + Eq + Hash> TransitionMatrix<S> {
    /// Creates the root matrix.
    pub fn root() -> Self {
        Self {
            state: None,
            correlation: 0.0,
            nodes: vec![],
        }
    }

    pub fn correlation(&self) -> f64 {
        self.correlation
    }

    pub fn nodes(&self) -> &[MarkovNode<S>] {
        &self.nodes
    }

    /// Appends a fixed state.
    pub fn push_leaf(&mut self, state: S, correlation: f64) {
        self.nodes
            .push(MarkovNode::Leaf(FixedState { state, correlation }));
    }

    /// Whether the state is anywhere in this matrix, including its sub-groups.
    pub fn contains(&self, state: &S) -> bool {
        self.nodes.iter().any(|node| node.contains(state))
    }

    /// Finds the leaf of a state.
    pub fn leaf(&self, state: &S) -> Option<&FixedState<S>> {
        self.nodes.iter().find_map(|node| match node {
            MarkovNode::Leaf(leaf) if leaf.state == *state => Some(leaf),
            MarkovNode::Leaf(_) => None,
            MarkovNode::Group(group) => group.leaf(state),
        })
    }

    /// Finds the group headed by the given super state.
    pub fn group(&self, super_state: &S) -> Option<&TransitionMatrix<S>> {
        self.nodes.iter().find_map(|node| match node {
            MarkovNode::Group(group) if group.state.as_ref() == Some(super_state) => Some(group),
            MarkovNode::Group(group) => group.group(super_state),
            MarkovNode::Leaf(_) => None,
        })
    }

    /// Finds the group headed by the given super state.
    pub fn group_mut(&mut self, super_state: &S) -> Option<&mut TransitionMatrix<S>> {
        for node in &mut self.nodes {
            if let MarkovNode::Group(group) = node {
                if group.state.as_ref() == Some(super_state) {
                    return Some(group);
                }
                if let Some(found) = group.group_mut(super_state) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Replaces the leaf of `state` by a group in the same slot. The group takes over
    /// the leaf's correlation and the leaf is moved into it with a correlation of 0.
    /// Returns `false` if there is no such leaf.
    pub fn promote(&mut self, state: &S) -> bool {
        for node in &mut self.nodes {
            let correlation = match node {
                MarkovNode::Leaf(leaf) if leaf.state == *state => leaf.correlation,
                MarkovNode::Leaf(_) => continue,
                MarkovNode::Group(group) => {
                    if group.promote(state) {
                        return true;
                    }
                    continue;
                }
            };
            let mut group = TransitionMatrix {
                state: Some(state.clone()),
                correlation,
                nodes: vec![],
            };
            group.push_leaf(state.clone(), 0.0);
            *node = MarkovNode::Group(group);
            return true;
        }
        false
    }

    /// The summed intensity of all elements.
    fn intensity(&self, intensities: &HashMap<S, f64>) -> f64 {
        self.nodes.iter().map(|node| node.intensity(intensities)).sum()
    }

    /// Computes the row of the transition matrix for the previous state.
    ///
    /// If the previous state is in element `i`, the off-diagonal probabilities are the
    /// steady-state fractions scaled by `(1 - c_i)(1 - c_j)` and the diagonal takes the
    /// remainder, so the row sums to 1 and the chain stays reversible. Otherwise the
    /// row is the plain steady state.
    pub fn row(&self, previous: Option<&S>, intensities: &HashMap<S, f64>) -> Vec<f64> {
        let weights = self
            .nodes
            .iter()
            .map(|node| node.intensity(intensities))
            .collect::<Vec<_>>();
        let total = weights.iter().sum::<f64>();
        let current = previous.and_then(|prev| self.nodes.iter().position(|n| n.contains(prev)));
        let i_factor = current.map_or(1.0, |i| 1.0 - self.nodes[i].correlation());

        let mut row = self
            .nodes
            .iter()
            .zip(&weights)
            .enumerate()
            .map(|(j, (node, weight))| {
                if Some(j) == current || total <= 0.0 {
                    return 0.0;
                }
                let j_factor = match current {
                    Some(_) => 1.0 - node.correlation(),
                    None => 1.0,
                };
                j_factor * i_factor * weight / total
            })
            .collect::<Vec<_>>();

        if let Some(i) = current {
            row[i] = 1.0 - row.iter().sum::<f64>();
        }
        row
    }

    /// Draws the next state, recursing into a sub-group if one is drawn.
    /// Uses one value of the stream for this matrix, and one per sub-group visited.
    pub fn draw<R: RandomStream + ?Sized>(
        &self,
        previous: Option<&S>,
        intensities: &HashMap<S, f64>,
        stream: &mut R,
    ) -> MarkovResult<S> {
        let row = self.row(previous, intensities);
        let r = stream.next_uniform();

        let mut cumulative = 0.0;
        let mut last_possible = None;
        for (j, p) in row.iter().enumerate() {
            cumulative += p;
            if *p > 0.0 {
                last_possible = Some(j);
            }
            if r < cumulative {
                return self.nodes[j].draw(previous, intensities, stream);
            }
        }

        // The cumulative row can fall just short of 1.0
        match last_possible {
            Some(j) => self.nodes[j].draw(previous, intensities, stream),
            None => Err(MarkovError::EmptyDraw),
        }
    }
}

impl<S: fmt::Debug> fmt::Display for TransitionMatrix<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => write!(f, "T({:?})[ ", state)?,
            None => write!(f, "T[ ")?,
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match node {
                MarkovNode::Leaf(leaf) => write!(f, "{:?}({:.2})", leaf.state, leaf.correlation)?,
                MarkovNode::Group(group) => write!(f, "{}", group)?,
            }
        }
        write!(f, " ]")
    }
}
