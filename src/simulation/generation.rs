use super::{occupant_x, SimEvent, Simulation};
use crate::error::SimulationResult;
use crate::generator::{GeneratorAttributes, VehicleGenerator};
use crate::lane::Occupant;
use crate::GeneratorId;

impl Simulation {
    /// Adds a vehicle generator. Its first vehicle is released after a random headway.
    pub fn add_generator(&mut self, attribs: &GeneratorAttributes) -> SimulationResult<GeneratorId> {
        self.network.lane(attribs.lane)?;
        for (route, _) in &attribs.routes {
            route.verify(&self.network)?;
        }
        let id = self
            .generators
            .try_insert_with_key(|id| VehicleGenerator::new(id, attribs))?;
        if let Some(generator) = self.generators.get(id) {
            let headway = generator.next_headway(&mut self.rng);
            self.events
                .schedule_at(self.time + headway, SimEvent::Generate(id));
        }
        Ok(id)
    }

    /// Gets a vehicle generator.
    pub fn generator(&self, id: GeneratorId) -> Option<&VehicleGenerator> {
        self.generators.get(id)
    }

    /// The position of the rear of a lane occupant.
    fn occupant_rear(&self, occupant: Occupant) -> f64 {
        let length = match occupant {
            Occupant::Vehicle(id) => self.vehicles.get(id).map(|vehicle| vehicle.length()),
            Occupant::Shadow(id) => self
                .shadows
                .get(id)
                .and_then(|shadow| self.vehicles.get(shadow.owner))
                .map(|vehicle| vehicle.length()),
        };
        occupant_x(&self.vehicles, &self.shadows, occupant) - length.unwrap_or(0.0)
    }

    /// Releases the next vehicle of a generator, unless the start of its lane is occupied.
    pub(super) fn generate(&mut self, id: GeneratorId, time: f64) {
        let (lane_id, min_gap, speed) = match self.generators.get(id) {
            Some(generator) => (generator.lane(), generator.min_gap(), generator.speed()),
            None => return,
        };
        let lane = match self.network.lane(lane_id) {
            Ok(lane) => lane,
            Err(_) => return,
        };
        let speed = speed.min(lane.speed_limit());
        // The rearmost occupant is the one that entered last
        let blocked = lane
            .occupants()
            .first()
            .map_or(false, |occ| self.occupant_rear(*occ) < min_gap);
        if blocked {
            log::trace!("generator {:?} waits for lane {:?} to clear", id, lane_id);
            self.events
                .schedule_at(time + self.config.dt, SimEvent::Generate(id));
            return;
        }

        let generator = match self.generators.get_mut(id) {
            Some(generator) => generator,
            None => return,
        };
        let drawn = generator.draw(&mut self.rng);
        let headway = generator.next_headway(&mut self.rng);
        self.events
            .schedule_at(time + headway, SimEvent::Generate(id));

        let (class, route) = match drawn {
            Ok(drawn) => drawn,
            Err(err) => {
                log::warn!("generator {:?} failed to draw a vehicle: {}", id, err);
                return;
            }
        };
        match self.add_vehicle(&class, route, lane_id, 0.0, speed) {
            Ok(vehicle) => log::debug!(
                "generator {:?} released {} {:?}",
                id,
                class.name,
                vehicle
            ),
            Err(err) => log::warn!("generator {:?} failed to release a vehicle: {}", id, err),
        }
    }
}
