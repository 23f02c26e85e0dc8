//! The simulation context.
//!
//! [`Simulation`] owns every grid and registry the tick phases touch. Phases
//! run single-threaded in a fixed order: clock, terrain regeneration,
//! atmosphere, wind, organisms, stats. The bevy systems in
//! [`WorldPlugin`](crate::world::WorldPlugin) and
//! [`OrganismPlugin`](crate::organisms::OrganismPlugin) call the same phase
//! methods that [`Simulation::step`] chains together.

use bevy_ecs::prelude::Resource;
use glam::IVec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ConfigError, SimulationConfig};
use crate::organisms::{
    commit_spawn, destroy_organism, scatter_adults, spawn_organism, EcosystemStats, Organism,
    OrganismId, OrganismRegistry, SpeciesKind, TrackedOrganism,
};
use crate::world::{self, generate_terrain, AtmosphereField, TerrainGrid, WindField};

/// Simulation time in milliseconds, advanced only by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    now_ms: f64,
    ticks: u64,
}

impl SimClock {
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn advance(&mut self, dt_ms: f64) {
        self.now_ms += dt_ms;
        self.ticks += 1;
    }
}

#[derive(Resource)]
pub struct Simulation {
    pub clock: SimClock,
    pub terrain: TerrainGrid,
    pub atmosphere: AtmosphereField,
    pub wind: WindField,
    pub organisms: OrganismRegistry,
    pub stats: EcosystemStats,
    config: SimulationConfig,
    rng: StdRng,
    tracked: TrackedOrganism,
}

impl Simulation {
    /// Validate the config and generate a fresh landscape from its seed
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut terrain = TerrainGrid::new(config.width, config.height);
        generate_terrain(&mut terrain, &config.terrain, config.seed);
        Ok(Self::with_terrain(config, terrain))
    }

    /// Build around an existing terrain grid; the config is not validated
    pub fn with_terrain(config: SimulationConfig, terrain: TerrainGrid) -> Self {
        let atmosphere =
            AtmosphereField::new(terrain.width(), terrain.height(), config.atmosphere.clone());
        let wind = WindField::new(&terrain, config.wind.clone());

        Self {
            clock: SimClock::default(),
            terrain,
            atmosphere,
            wind,
            organisms: OrganismRegistry::default(),
            stats: EcosystemStats::default(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            tracked: TrackedOrganism::default(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tracked(&self) -> Option<OrganismId> {
        self.tracked.id()
    }

    /// Scatter the initial adults and start tracking the first one
    pub fn populate(&mut self) -> usize {
        let spawned = scatter_adults(
            &mut self.organisms,
            &mut self.terrain,
            &self.config.organisms,
            self.clock.now_ms(),
            self.config.seed,
        );
        for organism in spawned.iter().filter_map(|id| self.organisms.get(*id)) {
            self.stats.record_spawn(organism.species, true);
            if self.tracked.id().is_none() {
                self.tracked.track(organism);
            }
        }
        spawned.len()
    }

    pub fn spawn(&mut self, species: SpeciesKind, position: IVec2) -> Option<OrganismId> {
        let spawned = spawn_organism(
            &mut self.organisms,
            &mut self.terrain,
            species,
            position,
            self.clock.now_ms(),
            &self.config.organisms,
        );
        self.stats.record_spawn(species, spawned.is_some());
        spawned
    }

    pub fn destroy(&mut self, id: OrganismId) -> Option<Organism> {
        let destroyed = destroy_organism(&mut self.organisms, &mut self.terrain, id)?;
        self.tracked.released(id);
        Some(destroyed)
    }

    pub fn advance_clock(&mut self, dt_ms: f64) {
        self.clock.advance(dt_ms);
    }

    pub fn regenerate_terrain(&mut self, dt_ms: f64) {
        if self.config.regenerate_terrain {
            world::regenerate_terrain(&mut self.terrain, &self.atmosphere, (dt_ms / 1000.0) as f32);
        }
    }

    pub fn tick_atmosphere(&mut self) {
        let drops = self.atmosphere.tick(&mut self.terrain, &mut self.rng);
        self.stats.rain_drops += drops as u64;
    }

    pub fn tick_wind(&mut self) {
        self.wind.tick(&self.terrain, &mut self.atmosphere);
    }

    /// One turn per organism alive at the start of the phase, in spawn order.
    ///
    /// Destruction and spawns requested by a turn are applied before the next
    /// organism acts. Organisms spawned during the phase first act next tick.
    pub fn tick_organisms(&mut self) {
        let now_ms = self.clock.now_ms();
        for id in self.organisms.ids() {
            let Some(organism) = self.organisms.get_mut(id) else {
                continue;
            };
            let report = organism.process(&mut self.terrain, &self.config.organisms, now_ms, &mut self.rng);
            self.tracked.observe(organism, &report);
            self.stats.record_turn(&report);

            if report.destroy {
                destroy_organism(&mut self.organisms, &mut self.terrain, id);
                self.tracked.released(id);
            }
            for request in &report.spawns {
                let spawned = commit_spawn(
                    &mut self.organisms,
                    &mut self.terrain,
                    request,
                    now_ms,
                    &self.config.organisms,
                );
                self.stats.record_spawn(request.species, spawned.is_some());
            }
        }
    }

    pub fn collect_stats(&mut self) {
        let ticks = self.clock.ticks();
        if ticks % self.config.stats_interval.max(1) == 0 {
            self.stats.collect(&self.organisms);
        }
        if ticks % self.config.log_interval.max(1) == 0 {
            self.stats.log_summary(ticks);
        }
    }

    /// Run every phase once, in order
    pub fn step(&mut self, dt_ms: f64) {
        self.advance_clock(dt_ms);
        self.regenerate_terrain(dt_ms);
        self.tick_atmosphere();
        self.tick_wind();
        self.tick_organisms();
        self.collect_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organisms::LifeCycleState;
    use crate::world::TerrainCell;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            width: 32,
            height: 32,
            seed: 7,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = SimulationConfig {
            height: 33,
            ..small_config()
        };
        assert!(matches!(Simulation::new(config), Err(ConfigError::Dimensions { .. })));
    }

    #[test]
    fn clock_advances_per_step() {
        let mut sim = Simulation::new(small_config()).unwrap();
        sim.step(50.0);
        sim.step(50.0);
        assert_eq!(sim.clock.ticks(), 2);
        assert_eq!(sim.clock.now_ms(), 100.0);
    }

    #[test]
    fn populate_tracks_the_first_adult() {
        let mut sim = Simulation::new(small_config()).unwrap();
        let spawned = sim.populate();
        assert!(spawned > 0);
        let tracked = sim.tracked().unwrap();
        assert!(sim.organisms.contains(tracked));

        sim.destroy(tracked).unwrap();
        assert_eq!(sim.tracked(), None);
    }

    #[test]
    fn expired_organisms_are_destroyed_during_the_phase() {
        let mut terrain = TerrainGrid::new(16, 16);
        for x in 0..16 {
            terrain.insert(TerrainCell::dirt(IVec2::new(x, 10), 1.0, 1.0).with_surface(true));
        }
        let mut sim = Simulation::with_terrain(small_config(), terrain);
        let id = sim.spawn(SpeciesKind::Plant, IVec2::new(4, 10)).unwrap();

        let lifetime = sim.config().organisms.plant.max_lifetime_ms;
        sim.advance_clock(lifetime + 1.0);
        sim.tick_organisms();

        assert!(!sim.organisms.contains(id));
        assert!(sim.organisms.organisms_at(IVec2::new(4, 10)).is_empty());
        assert_eq!(sim.stats.deaths, 1);
        assert!(sim.terrain.iter().all(|(_, cell)| !cell.is_linked()));
    }

    #[test]
    fn organism_state_follows_the_life_cycle() {
        let mut terrain = TerrainGrid::new(16, 16);
        for x in 0..16 {
            terrain.insert(TerrainCell::dirt(IVec2::new(x, 10), 1.0, 1.0).with_surface(true));
        }
        let mut sim = Simulation::with_terrain(small_config(), terrain);
        let id = sim.spawn(SpeciesKind::Cactus, IVec2::new(4, 10)).unwrap();
        sim.advance_clock(10.0);
        sim.tick_organisms();
        assert_eq!(sim.organisms.get(id).unwrap().lifecycle.state, LifeCycleState::Growing);
    }
}
