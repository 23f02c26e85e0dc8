use serde::{Deserialize, Serialize};

use crate::organisms::species::{SpeciesKind, Stage};

/// Life-cycle constants for one species
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifeCycleTuning {
    /// Lifetime in simulation milliseconds
    pub max_lifetime_ms: f64,
    /// Energy banked before a seed is attempted
    pub reproduction_energy: f32,
    /// Energy charged per reproduction attempt, successful or not
    pub reproduction_energy_unit: f32,
    /// Minimum delay between two growth actions of the same sub-type
    pub throttle_interval_ms: f64,
    /// Energy charged per successful structural extension
    pub growth_unit_cost: f32,
}

impl Default for LifeCycleTuning {
    fn default() -> Self {
        Self {
            max_lifetime_ms: 40_000.0,
            reproduction_energy: 1000.0,
            reproduction_energy_unit: 300.0,
            throttle_interval_ms: 1000.0,
            growth_unit_cost: 1.0,
        }
    }
}

/// How nutrients move between terrain, life squares and organism pools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UptakeTuning {
    // Organism pulls these fractions out of each life square buffer per tick
    pub air_uptake_fraction: f32,
    pub water_uptake_fraction: f32,
    pub root_uptake_fraction: f32,

    // Terrain exchange per life square per tick
    /// Air absorbed by a fully exposed green square
    pub green_air_rate: f32,
    /// Fraction of the linked cell's water a root draws
    pub root_water_draw: f32,
    /// Fraction of the linked cell's dirt nutrients a root draws
    pub root_dirt_draw: f32,
    /// Fraction of the linked cell's water a seed soaks up
    pub seed_water_draw: f32,
    /// Sprout progress per tick regardless of water
    pub sprout_rate: f32,
    /// Extra sprout progress per unit of water soaked
    pub sprout_water_factor: f32,

    /// Pools an adult starts with
    pub starting_pool: f32,
    /// Scales the limiting nutrient into energy
    pub photosynthesis_efficiency: f32,
}

impl Default for UptakeTuning {
    fn default() -> Self {
        Self {
            air_uptake_fraction: 0.5,
            water_uptake_fraction: 0.5,
            root_uptake_fraction: 0.5,
            green_air_rate: 0.4,
            root_water_draw: 0.05,
            root_dirt_draw: 0.05,
            seed_water_draw: 0.02,
            sprout_rate: 0.002,
            sprout_water_factor: 0.5,
            starting_pool: 1.0,
            photosynthesis_efficiency: 1.0,
        }
    }
}

/// Organism tuning parameters for easy balance adjustment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrganismTuning {
    pub plant: LifeCycleTuning,
    pub cactus: LifeCycleTuning,
    /// Shared by every seed stage
    pub seed: LifeCycleTuning,
    pub uptake: UptakeTuning,
    /// Adults scattered over the surface at startup
    pub initial_population: usize,
}

impl Default for OrganismTuning {
    fn default() -> Self {
        Self {
            plant: LifeCycleTuning::default(),
            cactus: LifeCycleTuning {
                max_lifetime_ms: 90_000.0,
                reproduction_energy: 1400.0,
                reproduction_energy_unit: 400.0,
                throttle_interval_ms: 2500.0,
                growth_unit_cost: 1.0,
            },
            seed: LifeCycleTuning {
                max_lifetime_ms: 60_000.0,
                ..LifeCycleTuning::default()
            },
            uptake: UptakeTuning::default(),
            initial_population: 12,
        }
    }
}

impl OrganismTuning {
    /// Create balanced preset
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Create preset for a fast, crowded garden (cheap seeds, generous uptake)
    pub fn lush() -> Self {
        let mut tuning = Self::default();
        tuning.plant.reproduction_energy = 120.0;
        tuning.plant.reproduction_energy_unit = 40.0;
        tuning.cactus.reproduction_energy = 200.0;
        tuning.cactus.reproduction_energy_unit = 60.0;
        tuning.uptake.green_air_rate = 0.8;
        tuning.uptake.root_water_draw = 0.1;
        tuning.uptake.root_dirt_draw = 0.1;
        tuning.uptake.sprout_rate = 0.01;
        tuning.initial_population = 24;
        tuning
    }

    /// Create preset for a sparse, drought-prone world
    pub fn harsh() -> Self {
        let mut tuning = Self::default();
        tuning.plant.max_lifetime_ms = 25_000.0;
        tuning.uptake.root_water_draw = 0.02;
        tuning.uptake.green_air_rate = 0.2;
        tuning.uptake.sprout_rate = 0.001;
        tuning.initial_population = 6;
        tuning
    }

    /// Life-cycle constants that apply to a species
    pub fn lifecycle(&self, species: SpeciesKind) -> &LifeCycleTuning {
        match species.descriptor().stage {
            Stage::Seed { .. } => &self.seed,
            Stage::Adult { .. } => match species {
                SpeciesKind::Cactus => &self.cactus,
                _ => &self.plant,
            },
        }
    }
}
