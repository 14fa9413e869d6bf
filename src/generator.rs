use crate::error::{SimulationError, SimulationResult};
use crate::markov::MarkovCorrelation;
use crate::route::Route;
use crate::vehicle::VehicleClass;
use crate::{GeneratorId, LaneId};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use std::rc::Rc;

/// The attributes of a vehicle generator.
#[derive(Clone, Debug)]
pub struct GeneratorAttributes {
    /// The lane vehicles are released onto, at its start.
    pub lane: LaneId,
    /// The mean flow in vehicles per second.
    pub flow: f64,
    /// The initial velocity of new vehicles in m/s, capped by the speed limit.
    pub speed: f64,
    /// The gap that must be free at the start of the lane in m.
    pub min_gap: f64,
    /// The classes of vehicle to release.
    pub classes: Vec<GeneratedClass>,
    /// The routes given to new vehicles, with their relative weights.
    pub routes: Vec<(Rc<Route>, f64)>,
}

/// A class of vehicle released by a generator.
#[derive(Clone, Debug)]
pub struct GeneratedClass {
    pub class: VehicleClass,
    /// The long-run share of the class, relative to the other classes.
    pub intensity: f64,
    /// The correlation of consecutive vehicles being of this class.
    pub correlation: f64,
    /// The index of an earlier class this class is grouped with. Classes in a group
    /// are correlated as a whole, with the group's correlation being that of the first class.
    pub group: Option<usize>,
}

/// Releases vehicles onto a lane with exponentially distributed headways.
///
/// The class of each vehicle is drawn from a Markov chain, so that vehicles of
/// correlated classes tend to follow each other in platoons.
#[derive(Clone, Debug)]
pub struct VehicleGenerator {
    id: GeneratorId,
    lane: LaneId,
    speed: f64,
    min_gap: f64,
    classes: Vec<VehicleClass>,
    /// The index of each class, as drawn by the chain.
    states: Vec<usize>,
    intensities: Vec<f64>,
    chain: MarkovCorrelation<usize>,
    /// The index of the class of the last vehicle released.
    previous: Option<usize>,
    routes: Vec<Rc<Route>>,
    route_weights: WeightedIndex<f64>,
    headway: Exp<f64>,
    /// The number of vehicles released.
    released: usize,
}

impl VehicleGenerator {
    pub(crate) fn new(id: GeneratorId, attribs: &GeneratorAttributes) -> SimulationResult<Self> {
        if !(attribs.flow > 0.0 && attribs.flow.is_finite()) {
            return Err(SimulationError::Config(format!(
                "generator flow must be positive, got {}",
                attribs.flow
            )));
        }
        let headway = Exp::new(attribs.flow)
            .map_err(|err| SimulationError::Config(format!("invalid generator flow: {}", err)))?;
        if attribs.classes.is_empty() {
            return Err(SimulationError::Config(
                "generator has no vehicle classes".to_owned(),
            ));
        }
        let route_weights = WeightedIndex::new(attribs.routes.iter().map(|(_, weight)| *weight))
            .map_err(|err| SimulationError::Config(format!("invalid route weights: {}", err)))?;

        let mut chain = MarkovCorrelation::new();
        for (idx, generated) in attribs.classes.iter().enumerate() {
            generated.class.validate()?;
            match generated.group {
                None => chain.add_state(idx, generated.correlation)?,
                Some(group) => chain.add_group_state(&group, idx, generated.correlation)?,
            }
        }

        Ok(Self {
            id,
            lane: attribs.lane,
            speed: attribs.speed,
            min_gap: attribs.min_gap,
            classes: attribs.classes.iter().map(|c| c.class.clone()).collect(),
            states: (0..attribs.classes.len()).collect(),
            intensities: attribs.classes.iter().map(|c| c.intensity).collect(),
            chain,
            previous: None,
            routes: attribs.routes.iter().map(|(route, _)| route.clone()).collect(),
            route_weights,
            headway,
            released: 0,
        })
    }

    pub fn id(&self) -> GeneratorId {
        self.id
    }

    /// The lane vehicles are released onto.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// The initial velocity of new vehicles in m/s, before capping by the speed limit.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The gap that must be free at the start of the lane in m.
    pub fn min_gap(&self) -> f64 {
        self.min_gap
    }

    /// The number of vehicles released so far.
    pub fn released(&self) -> usize {
        self.released
    }

    /// The class of the last vehicle released.
    pub fn previous_class(&self) -> Option<&VehicleClass> {
        self.previous.map(|idx| &self.classes[idx])
    }

    /// Draws the time until the next vehicle in s.
    pub(crate) fn next_headway<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.headway.sample(rng)
    }

    /// Draws the class and route of the next vehicle, counting it as released.
    pub(crate) fn draw<R: Rng>(&mut self, rng: &mut R) -> SimulationResult<(VehicleClass, Rc<Route>)> {
        let idx = self.chain.draw_state(
            self.previous.as_ref(),
            &self.states,
            &self.intensities,
            rng,
        )?;
        self.previous = Some(idx);
        self.released += 1;
        let route = self.routes[self.route_weights.sample(rng)].clone();
        Ok((self.classes[idx].clone(), route))
    }
}
