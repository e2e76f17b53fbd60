use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::entity::{Bounds, EntityId, EntitySnapshot, MotionEntity, MotionSettings};
use crate::error::MotionError;
use crate::observable::{Observable, Observer, SubscriptionId};
use crate::random::StdRandom;

/// World stores the entities of one kaleidoscope: they share a viewport,
/// creation settings and tick cadence, but otherwise move independently.
pub struct World {
    settings: MotionSettings,
    seeder: StdRng,
    entities: Vec<MotionEntity>,
    bounds: Option<Bounds>,
}

impl World {
    /// With a seed, every entity gets its own deterministic random source
    /// derived from it.
    pub fn new(settings: MotionSettings, seed: Option<u64>) -> Result<Self, MotionError> {
        settings.validate()?;
        let seeder = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(World {
            settings,
            seeder,
            entities: Vec::new(),
            bounds: None,
        })
    }

    pub fn with_entities(
        settings: MotionSettings,
        count: usize,
        seed: Option<u64>,
    ) -> Result<Self, MotionError> {
        let mut world = World::new(settings, seed)?;
        for _ in 0..count {
            world.spawn_entity()?;
        }
        Ok(world)
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// Spawn a new entity and return a handle to it. If the world has already
    /// been sized, the entity receives the current bounds.
    pub fn spawn_entity(&mut self) -> Result<MotionEntity, MotionError> {
        let rng = StdRandom::seeded(self.seeder.gen());
        let entity = MotionEntity::new(&self.settings, Box::new(rng))?;
        if let Some(bounds) = self.bounds {
            entity.set_bounds(bounds.width, bounds.height)?;
        }
        debug!("Spawned entity {} with size {}", entity.id(), entity.size());
        self.entities.push(entity.clone());
        Ok(entity)
    }

    pub fn entities(&self) -> &[MotionEntity] {
        &self.entities
    }

    pub fn get(&self, id: EntityId) -> Option<&MotionEntity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Hands the viewport size to every entity.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), MotionError> {
        for entity in &self.entities {
            entity.set_bounds(width, height)?;
        }
        self.bounds = Some(Bounds { width, height });
        debug!("World resized to {}x{}", width, height);
        Ok(())
    }

    pub fn start_all(&self) -> Result<(), MotionError> {
        let (low, high) = self.settings.velocity_range;
        for entity in &self.entities {
            entity.start(low, high)?;
        }
        info!(
            "Started {} entities ticking every {:?}",
            self.entities.len(),
            self.settings.tick_interval
        );
        Ok(())
    }

    pub fn pause_all(&self) {
        for entity in &self.entities {
            entity.pause();
        }
        info!("Paused {} entities", self.entities.len());
    }

    pub fn is_running(&self) -> bool {
        self.entities.iter().any(MotionEntity::is_running)
    }

    /// Gives every entity a new speed without touching its schedule.
    pub fn randomize_velocities(&self) -> Result<(), MotionError> {
        let (low, high) = self.settings.velocity_range;
        for entity in &self.entities {
            entity.randomize_velocity(low, high)?;
        }
        Ok(())
    }

    /// Advances every entity once by hand. Entities are independent, so they
    /// are stepped in parallel; each still notifies its own observers.
    pub fn step_all(&self) {
        self.entities.par_iter().for_each(MotionEntity::advance);
    }

    /// Registers the same observer on every current entity.
    pub fn subscribe_all(&self, observer: Observer<MotionEntity>) -> Vec<SubscriptionId> {
        self.entities
            .iter()
            .map(|entity| entity.subscribe(observer.clone()))
            .collect()
    }

    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.entities.iter().map(MotionEntity::snapshot).collect()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.pause_all();
    }
}
