//! Correlated state draws from a Markov chain.
//!
//! States are drawn such that their long-run proportions follow the steady-state
//! intensities supplied with each draw, while consecutive draws are correlated:
//! a state with correlation `c` is more likely to be drawn again after itself.
//! States can be grouped so that the whole group is correlated, with the states
//! inside it correlated among each other at least as strongly.

use crate::error::{MarkovError, MarkovResult};
use matrix::{MarkovNode, TransitionMatrix};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

mod matrix;

/// A source of uniform random numbers in `[0, 1)`.
pub trait RandomStream {
    fn next_uniform(&mut self) -> f64;
}

impl<R: RngCore> RandomStream for R {
    fn next_uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// The seeded random stream of a simulation.
#[derive(Clone, Debug)]
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

/// A Markov chain that draws correlated states.
///
/// The transition matrix is never stored. Each draw derives the row of the previous
/// state from the steady-state intensities given at that moment, so the intensities
/// may change between draws.
#[derive(Clone, Debug)]
pub struct MarkovCorrelation<S> {
    root: TransitionMatrix<S>,
}

impl<S: Clone + Eq + Hash + fmt::Debug> Default for MarkovCorrelation<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Eq + Hash + fmt::Debug> MarkovCorrelation<S> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            root: TransitionMatrix::root(),
        }
    }

    /// Adds a state to the root level of the chain.
    ///
    /// # Parameters
    /// * `state` - The state, which must not yet be in the chain
    /// * `correlation` - The correlation of the state, in the range `(-1, 1)`
    pub fn add_state(&mut self, state: S, correlation: f64) -> MarkovResult<()> {
        if !(correlation > -1.0 && correlation < 1.0) {
            return Err(MarkovError::CorrelationOutOfRange {
                value: correlation,
                range: "(-1, 1)",
            });
        }
        self.ensure_new(&state)?;
        self.root.push_leaf(state, correlation);
        Ok(())
    }

    /// Adds a state to the group of a super state. If the super state is a single
    /// state, it first becomes a group in its own place, keeping its correlation for
    /// the whole group and its own correlation within the group is reset to 0.
    ///
    /// # Parameters
    /// * `super_state` - A state already in the chain
    /// * `state` - The state to add, which must not yet be in the chain
    /// * `correlation` - The correlation within the group, in the range `[0, 1)` and
    ///   no lower than the group correlation
    pub fn add_group_state(
        &mut self,
        super_state: &S,
        state: S,
        correlation: f64,
    ) -> MarkovResult<()> {
        if !(correlation >= 0.0 && correlation < 1.0) {
            return Err(MarkovError::CorrelationOutOfRange {
                value: correlation,
                range: "[0, 1)",
            });
        }
        self.ensure_new(&state)?;
        let unknown = || MarkovError::UnknownSuperState(format!("{:?}", super_state));

        let group_correlation = match self.root.group(super_state) {
            Some(group) => group.correlation(),
            None => self.root.leaf(super_state).ok_or_else(unknown)?.correlation,
        };
        if correlation < group_correlation {
            return Err(MarkovError::CorrelationBelowGroup {
                value: correlation,
                group: group_correlation,
            });
        }

        if self.root.group(super_state).is_none() {
            self.root.promote(super_state);
        }
        let group = self.root.group_mut(super_state).ok_or_else(unknown)?;
        // Stored relative to the group correlation
        let correlation = (correlation - group_correlation) / (1.0 - group_correlation);
        group.push_leaf(state, correlation);
        Ok(())
    }

    /// Draws the next state.
    ///
    /// # Parameters
    /// * `previous` - The previously drawn state, if any
    /// * `states` - The states for which intensities are given
    /// * `intensities` - The steady-state intensities, in the same order as `states`
    /// * `stream` - The random stream to draw from
    ///
    /// States not yet in the chain are added to the root level without correlation.
    /// States in the chain but not in `states` have an intensity of zero.
    /// A state listed more than once takes its last intensity.
    pub fn draw_state<I, R>(
        &mut self,
        previous: Option<&S>,
        states: &[S],
        intensities: &[I],
        stream: &mut R,
    ) -> MarkovResult<S>
    where
        I: Copy + Into<f64>,
        R: RandomStream + ?Sized,
    {
        let intensities = self.intensity_map(states, intensities)?;
        let state = self.root.draw(previous, &intensities, stream)?;
        log::trace!("drew {:?} after {:?}", state, previous);
        Ok(state)
    }

    /// The root-level row of the transition matrix for the previous state. Each entry is
    /// the state it represents, being the super state for a group, and its probability.
    pub fn transition_row<I>(
        &mut self,
        previous: Option<&S>,
        states: &[S],
        intensities: &[I],
    ) -> MarkovResult<Vec<(S, f64)>>
    where
        I: Copy + Into<f64>,
    {
        let intensities = self.intensity_map(states, intensities)?;
        let row = self.root.row(previous, &intensities);
        Ok(self
            .root
            .nodes()
            .iter()
            .filter_map(MarkovNode::key)
            .cloned()
            .zip(row)
            .collect())
    }

    /// Whether the state is in the chain.
    pub fn contains(&self, state: &S) -> bool {
        self.root.contains(state)
    }

    /// The stored correlation of a state. For states in a group, this is relative
    /// to the group correlation.
    pub fn correlation(&self, state: &S) -> Option<f64> {
        self.root.leaf(state).map(|leaf| leaf.correlation)
    }

    /// The correlation of the group headed by the super state.
    pub fn group_correlation(&self, super_state: &S) -> Option<f64> {
        self.root.group(super_state).map(|group| group.correlation())
    }

    fn ensure_new(&self, state: &S) -> MarkovResult<()> {
        if self.root.contains(state) {
            Err(MarkovError::DuplicateState(format!("{:?}", state)))
        } else {
            Ok(())
        }
    }

    fn intensity_map<I: Copy + Into<f64>>(
        &mut self,
        states: &[S],
        intensities: &[I],
    ) -> MarkovResult<HashMap<S, f64>> {
        if states.len() != intensities.len() {
            return Err(MarkovError::LengthMismatch {
                states: states.len(),
                intensities: intensities.len(),
            });
        }
        let mut map = HashMap::with_capacity(states.len());
        for (state, intensity) in states.iter().zip(intensities) {
            if !self.root.contains(state) {
                self.root.push_leaf(state.clone(), 0.0);
            }
            map.insert(state.clone(), (*intensity).into());
        }
        Ok(map)
    }
}

impl<S: fmt::Debug> fmt::Display for MarkovCorrelation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkovCorrelation [ {} ]", self.root)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// Replays a fixed sequence of uniforms.
    struct Replay(Vec<f64>);

    impl RandomStream for Replay {
        fn next_uniform(&mut self) -> f64 {
            self.0.remove(0)
        }
    }

    fn three_states(correlation_c: f64) -> MarkovCorrelation<char> {
        let mut markov = MarkovCorrelation::new();
        markov.add_state('A', 0.0).unwrap();
        markov.add_state('B', 0.0).unwrap();
        markov.add_state('C', correlation_c).unwrap();
        markov
    }

    const STATES: [char; 3] = ['A', 'B', 'C'];
    const STEADY: [f64; 3] = [0.7, 0.2, 0.1];

    #[test]
    fn transition_rows() {
        let mut markov = three_states(0.4);

        let row = markov
            .transition_row(Some(&'C'), &STATES, &STEADY)
            .unwrap();
        assert_approx_eq!(row[0].1, 0.42);
        assert_approx_eq!(row[1].1, 0.12);
        assert_approx_eq!(row[2].1, 0.46);

        let row = markov
            .transition_row(Some(&'A'), &STATES, &STEADY)
            .unwrap();
        assert_approx_eq!(row[0].1, 0.74);
        assert_approx_eq!(row[1].1, 0.2);
        assert_approx_eq!(row[2].1, 0.06);
    }

    #[test]
    fn rows_sum_to_one() {
        let mut markov = three_states(0.9);
        markov.add_group_state(&'B', 'D', 0.95).unwrap();
        let states = ['A', 'B', 'C', 'D'];
        let intensities = [3.0, 1.0, 0.5, 2.5];
        for prev in [None, Some('A'), Some('B'), Some('C'), Some('D')] {
            let row = markov
                .transition_row(prev.as_ref(), &states, &intensities)
                .unwrap();
            let sum = row.iter().map(|(_, p)| p).sum::<f64>();
            assert_approx_eq!(sum, 1.0);
            assert!(row.iter().all(|(_, p)| *p >= 0.0));
        }
    }

    #[test]
    fn steady_state_is_preserved() {
        let mut markov = three_states(0.6);
        let mut rng = SimRng::new(7);
        let mut counts = [0usize; 3];
        let mut prev = None;
        let n = 100_000;
        for _ in 0..n {
            let state = markov
                .draw_state(prev.as_ref(), &STATES, &STEADY, &mut rng)
                .unwrap();
            counts[STATES.iter().position(|s| *s == state).unwrap()] += 1;
            prev = Some(state);
        }
        for (count, expected) in counts.iter().zip(STEADY) {
            assert_approx_eq!(*count as f64 / n as f64, expected, 0.015);
        }
    }

    #[test]
    fn correlation_repeats_states() {
        let mut markov = three_states(0.4);
        let mut rng = SimRng::new(11);
        let mut after_c = 0;
        let mut c_after_c = 0;
        let mut prev = Some('A');
        for _ in 0..100_000 {
            let state = markov
                .draw_state(prev.as_ref(), &STATES, &STEADY, &mut rng)
                .unwrap();
            if prev == Some('C') {
                after_c += 1;
                if state == 'C' {
                    c_after_c += 1;
                }
            }
            prev = Some(state);
        }
        assert_approx_eq!(c_after_c as f64 / after_c as f64, 0.46, 0.03);
    }

    #[test]
    fn strong_correlation_almost_always_repeats() {
        let mut markov = three_states(0.99);
        let row = markov
            .transition_row(Some(&'C'), &STATES, &STEADY)
            .unwrap();
        assert!(row[2].1 > 0.99);
    }

    #[test]
    fn draw_uses_cumulative_row() {
        let mut markov = three_states(0.4);
        // Row after C is [0.42, 0.12, 0.46]
        let mut stream = Replay(vec![0.41, 0.5, 0.55, 0.9999]);
        let mut draw = |m: &mut MarkovCorrelation<char>| {
            m.draw_state(Some(&'C'), &STATES, &STEADY, &mut stream)
                .unwrap()
        };
        assert_eq!(draw(&mut markov), 'A');
        assert_eq!(draw(&mut markov), 'B');
        assert_eq!(draw(&mut markov), 'C');
        assert_eq!(draw(&mut markov), 'C');
    }

    #[test]
    fn group_draws_use_one_value_per_level() {
        let mut markov = MarkovCorrelation::new();
        markov.add_state('A', 0.0).unwrap();
        markov.add_state('B', 0.0).unwrap();
        markov.add_group_state(&'B', 'D', 0.0).unwrap();
        let states = ['A', 'B', 'D'];
        let intensities = [1.0, 1.0, 2.0];
        // Root row [0.25, 0.75], then group row [1/3, 2/3]
        let mut stream = Replay(vec![0.5, 0.9]);
        let state = markov
            .draw_state(None, &states, &intensities, &mut stream)
            .unwrap();
        assert_eq!(state, 'D');
        assert!(stream.0.is_empty());
    }

    #[test]
    fn group_correlation_is_remapped() {
        let mut markov = MarkovCorrelation::new();
        markov.add_state('A', 0.0).unwrap();
        markov.add_state('B', 0.3).unwrap();
        markov.add_group_state(&'B', 'C', 0.3).unwrap();
        markov.add_group_state(&'B', 'D', 0.65).unwrap();

        assert_eq!(markov.group_correlation(&'B'), Some(0.3));
        assert_eq!(markov.correlation(&'B'), Some(0.0));
        assert_approx_eq!(markov.correlation(&'C').unwrap(), 0.0);
        assert_approx_eq!(markov.correlation(&'D').unwrap(), 0.5);

        // The group keeps the position of the promoted state
        let row = markov
            .transition_row(None, &['A', 'B'], &[1.0, 1.0])
            .unwrap();
        assert_eq!(row.iter().map(|(s, _)| *s).collect::<Vec<_>>(), ['A', 'B']);
    }

    #[test]
    fn nested_groups() {
        let mut markov = MarkovCorrelation::new();
        markov.add_state(1, 0.2).unwrap();
        markov.add_group_state(&1, 2, 0.5).unwrap();
        markov.add_group_state(&2, 3, 0.8).unwrap();
        assert!(markov.contains(&3));
        assert_approx_eq!(markov.group_correlation(&2).unwrap(), 0.375);

        let mut rng = SimRng::new(3);
        for _ in 0..100 {
            let state = markov
                .draw_state(Some(&3), &[1, 2, 3], &[1.0, 1.0, 1.0], &mut rng)
                .unwrap();
            assert!([1, 2, 3].contains(&state));
        }
    }

    #[test]
    fn correlation_below_group_fails() {
        let mut markov = MarkovCorrelation::new();
        markov.add_state('B', 0.3).unwrap();
        assert_eq!(
            markov.add_group_state(&'B', 'C', 0.2),
            Err(MarkovError::CorrelationBelowGroup {
                value: 0.2,
                group: 0.3
            })
        );
    }

    #[test]
    fn invalid_registrations() {
        let mut markov = MarkovCorrelation::new();
        assert!(matches!(
            markov.add_state('A', 1.0),
            Err(MarkovError::CorrelationOutOfRange { .. })
        ));
        assert!(matches!(
            markov.add_state('A', f64::NAN),
            Err(MarkovError::CorrelationOutOfRange { .. })
        ));
        markov.add_state('A', -0.5).unwrap();
        assert!(matches!(
            markov.add_state('A', 0.0),
            Err(MarkovError::DuplicateState(_))
        ));
        assert!(matches!(
            markov.add_group_state(&'A', 'B', -0.1),
            Err(MarkovError::CorrelationOutOfRange { .. })
        ));
        assert!(matches!(
            markov.add_group_state(&'Z', 'B', 0.1),
            Err(MarkovError::UnknownSuperState(_))
        ));
        assert!(matches!(
            markov.add_group_state(&'A', 'A', 0.1),
            Err(MarkovError::DuplicateState(_))
        ));
    }

    #[test]
    fn unknown_states_are_added() {
        let mut markov = MarkovCorrelation::<char>::new();
        let mut rng = SimRng::new(1);
        let state = markov
            .draw_state(None, &['X'], &[2.0], &mut rng)
            .unwrap();
        assert_eq!(state, 'X');
        assert!(markov.contains(&'X'));
        assert_eq!(markov.correlation(&'X'), Some(0.0));
    }

    #[test]
    fn repeated_state_takes_last_intensity() {
        let mut markov = MarkovCorrelation::<char>::new();
        let row = markov
            .transition_row(None, &['A', 'B', 'A'], &[3.0, 1.0, 1.0])
            .unwrap();
        assert_eq!(row.len(), 2);
        assert_approx_eq!(row[0].1, 0.5);
        assert_approx_eq!(row[1].1, 0.5);
    }

    #[test]
    fn length_mismatch_fails() {
        let mut markov = three_states(0.0);
        let mut rng = SimRng::new(1);
        assert_eq!(
            markov.draw_state(None, &STATES, &[1.0, 2.0], &mut rng),
            Err(MarkovError::LengthMismatch {
                states: 3,
                intensities: 2
            })
        );
    }

    #[test]
    fn zero_intensities() {
        let mut markov = three_states(0.0);
        let mut rng = SimRng::new(1);
        assert_eq!(
            markov.draw_state(None, &STATES, &[0.0; 3], &mut rng),
            Err(MarkovError::EmptyDraw)
        );
        // The previous state is kept if nothing else can be drawn
        let state = markov
            .draw_state(Some(&'B'), &STATES, &[0.0; 3], &mut rng)
            .unwrap();
        assert_eq!(state, 'B');
    }

    #[test]
    fn integer_intensities() {
        let mut markov = MarkovCorrelation::new();
        let mut rng = SimRng::new(5);
        let state = markov
            .draw_state(None, &["car", "truck"], &[0u32, 4u32], &mut rng)
            .unwrap();
        assert_eq!(state, "truck");
    }

    #[test]
    fn same_seed_same_draws() {
        let draws = |seed| {
            let mut markov = three_states(0.5);
            let mut rng = SimRng::new(seed);
            let mut prev = None;
            (0..50)
                .map(|_| {
                    let state = markov
                        .draw_state(prev.as_ref(), &STATES, &STEADY, &mut rng)
                        .unwrap();
                    prev = Some(state);
                    state
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(draws(9), draws(9));
    }

    #[test]
    fn display() {
        let mut markov = MarkovCorrelation::new();
        markov.add_state('A', 0.2).unwrap();
        markov.add_state('B', 0.0).unwrap();
        markov.add_group_state(&'B', 'C', 0.5).unwrap();
        assert_eq!(
            markov.to_string(),
            "MarkovCorrelation [ T[ 'A'(0.20), T('B')[ 'B'(0.00), 'C'(0.50) ] ] ]"
        );
    }
}
