use bevy::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::organisms::behavior::LifeCycleAction;
use crate::organisms::components::LifeSquareKind;
use crate::organisms::registry::OrganismRegistry;
use crate::organisms::species::SpeciesKind;
use crate::organisms::systems::TurnReport;
use crate::simulation::Simulation;

/// Ecosystem statistics for tuning and analysis
#[derive(Debug, Clone, Default, Serialize)]
pub struct EcosystemStats {
    /// Total population count
    pub total_population: u32,
    pub population_by_species: HashMap<SpeciesKind, u32>,
    pub squares_by_kind: HashMap<LifeSquareKind, u32>,
    /// Spendable energy summed over the population
    pub total_energy: f32,

    // Running counters since startup
    pub births: u64,
    pub deaths: u64,
    pub sprouts: u64,
    pub seeds_produced: u64,
    pub failed_spawns: u64,
    pub growth_units: u64,
    pub rain_drops: u64,
}

impl EcosystemStats {
    pub fn reset(&mut self) {
        self.total_population = 0;
        self.population_by_species.clear();
        self.squares_by_kind.clear();
        self.total_energy = 0.0;
    }

    /// Recount the population snapshot
    pub fn collect(&mut self, registry: &OrganismRegistry) {
        self.reset();
        for (_, organism) in registry.iter() {
            self.total_population += 1;
            *self.population_by_species.entry(organism.species).or_insert(0) += 1;
            for kind in LifeSquareKind::ALL {
                let count = organism.count_of(kind) as u32;
                if count > 0 {
                    *self.squares_by_kind.entry(kind).or_insert(0) += count;
                }
            }
            self.total_energy += organism.energy.current;
        }
    }

    /// Fold one organism turn into the running counters
    pub fn record_turn(&mut self, report: &TurnReport) {
        if let Some(growth) = report.growth {
            self.growth_units += growth.units as u64;
        }
        if report.destroy {
            if report.action == LifeCycleAction::Sprout {
                self.sprouts += 1;
            } else {
                self.deaths += 1;
            }
        }
    }

    pub fn record_spawn(&mut self, species: SpeciesKind, succeeded: bool) {
        match (succeeded, species.is_seed()) {
            (true, true) => {
                self.births += 1;
                self.seeds_produced += 1;
            }
            (true, false) => self.births += 1,
            (false, _) => self.failed_spawns += 1,
        }
    }

    pub fn population_of(&self, species: SpeciesKind) -> u32 {
        self.population_by_species.get(&species).copied().unwrap_or(0)
    }

    pub fn log_summary(&self, tick: u64) {
        let plants = self.population_of(SpeciesKind::Plant);
        let cacti = self.population_of(SpeciesKind::Cactus);
        let seeds = self.population_of(SpeciesKind::PlantSeed) + self.population_of(SpeciesKind::CactusSeed);

        info!(
            "[ECOSYSTEM] Tick {} | Population: {} | Plants: {} | Cacti: {} | Seeds: {} | Energy: {:.1} | Births: {} | Deaths: {} | Sprouts: {} | Rain: {}",
            tick,
            self.total_population,
            plants,
            cacti,
            seeds,
            self.total_energy,
            self.births,
            self.deaths,
            self.sprouts,
            self.rain_drops
        );
    }
}

/// Collect ecosystem statistics periodically
pub fn collect_ecosystem_stats(mut sim: ResMut<Simulation>) {
    sim.collect_stats();
}
