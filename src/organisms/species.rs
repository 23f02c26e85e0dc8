use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::organisms::components::{NutrientPools, OrganismId};
use crate::organisms::growth::{self, GrowthReport};
use crate::organisms::systems::Organism;
use crate::organisms::tuning::LifeCycleTuning;
use crate::organisms::LifeSquare;
use crate::world::TerrainGrid;

/// Every organism variant the simulation knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpeciesKind {
    Plant,
    PlantSeed,
    Cactus,
    CactusSeed,
}

/// Seed and adult variants point at each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Seed { adult: SpeciesKind },
    Adult { seed: SpeciesKind },
}

/// Energy produced from the current pools, given the species' water cost
pub type PhotosynthesisFn = fn(&NutrientPools, efficiency: f32, water_cost: f32) -> f32;
/// Link the first life squares of a fresh organism; `None` leaves the terrain untouched
pub type AttachFn = fn(&mut TerrainGrid, OrganismId, IVec2) -> Option<Vec<LifeSquare>>;
pub type GrowFn = fn(&mut Organism, &mut TerrainGrid, f64, &LifeCycleTuning) -> Option<GrowthReport>;
/// Where a seed would be placed
pub type SeedSiteFn = fn(&Organism) -> Option<IVec2>;

/// Capability table entry for one species
pub struct SpeciesDescriptor {
    pub name: &'static str,
    pub stage: Stage,
    pub photosynthesis: PhotosynthesisFn,
    /// Pool units of water charged per unit of energy
    pub water_cost: f32,
    pub attach: AttachFn,
    pub grow: Option<GrowFn>,
    pub seed_site: Option<SeedSiteFn>,
}

impl std::fmt::Debug for SpeciesDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeciesDescriptor")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("water_cost", &self.water_cost)
            .finish()
    }
}

fn limiting_pool(pools: &NutrientPools, water_cost: f32) -> f32 {
    pools.air.min(pools.water / water_cost).min(pools.dirt)
}

/// A cheaper water cost stretches a scarce water pool further
pub fn rooted_photosynthesis(pools: &NutrientPools, efficiency: f32, water_cost: f32) -> f32 {
    (efficiency * limiting_pool(pools, water_cost)).max(0.0)
}

pub fn dormant(_pools: &NutrientPools, _efficiency: f32, _water_cost: f32) -> f32 {
    0.0
}

static PLANT: SpeciesDescriptor = SpeciesDescriptor {
    name: "plant",
    stage: Stage::Adult {
        seed: SpeciesKind::PlantSeed,
    },
    photosynthesis: rooted_photosynthesis,
    water_cost: 1.0,
    attach: growth::attach_rooted_adult,
    grow: Some(growth::grow_rooted),
    seed_site: Some(growth::seed_site_above_top_green),
};

static PLANT_SEED: SpeciesDescriptor = SpeciesDescriptor {
    name: "plant seed",
    stage: Stage::Seed {
        adult: SpeciesKind::Plant,
    },
    photosynthesis: dormant,
    water_cost: 1.0,
    attach: growth::attach_seed,
    grow: None,
    seed_site: None,
};

static CACTUS: SpeciesDescriptor = SpeciesDescriptor {
    name: "cactus",
    stage: Stage::Adult {
        seed: SpeciesKind::CactusSeed,
    },
    photosynthesis: rooted_photosynthesis,
    water_cost: 0.5,
    attach: growth::attach_rooted_adult,
    grow: Some(growth::grow_rooted),
    seed_site: Some(growth::seed_site_above_top_green),
};

static CACTUS_SEED: SpeciesDescriptor = SpeciesDescriptor {
    name: "cactus seed",
    stage: Stage::Seed {
        adult: SpeciesKind::Cactus,
    },
    photosynthesis: dormant,
    water_cost: 1.0,
    attach: growth::attach_seed,
    grow: None,
    seed_site: None,
};

impl SpeciesKind {
    pub const ALL: [SpeciesKind; 4] = [
        SpeciesKind::Plant,
        SpeciesKind::PlantSeed,
        SpeciesKind::Cactus,
        SpeciesKind::CactusSeed,
    ];

    pub fn descriptor(self) -> &'static SpeciesDescriptor {
        match self {
            SpeciesKind::Plant => &PLANT,
            SpeciesKind::PlantSeed => &PLANT_SEED,
            SpeciesKind::Cactus => &CACTUS,
            SpeciesKind::CactusSeed => &CACTUS_SEED,
        }
    }

    pub fn is_seed(self) -> bool {
        matches!(self.descriptor().stage, Stage::Seed { .. })
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_pair_up() {
        for species in SpeciesKind::ALL {
            match species.descriptor().stage {
                Stage::Seed { adult } => {
                    assert_eq!(adult.descriptor().stage, Stage::Adult { seed: species });
                    assert!(species.descriptor().grow.is_none());
                }
                Stage::Adult { seed } => {
                    assert_eq!(seed.descriptor().stage, Stage::Seed { adult: species });
                    assert!(species.descriptor().seed_site.is_some());
                }
            }
        }
    }

    #[test]
    fn cactus_gets_more_from_scarce_water() {
        let pools = NutrientPools::new(10.0, 2.0, 10.0);
        let energy = |species: SpeciesKind, pools: &NutrientPools| {
            let descriptor = species.descriptor();
            (descriptor.photosynthesis)(pools, 1.0, descriptor.water_cost)
        };
        assert_eq!(energy(SpeciesKind::Plant, &pools), 2.0);
        assert_eq!(energy(SpeciesKind::Cactus, &pools), 4.0);
        assert_eq!(energy(SpeciesKind::CactusSeed, &pools), 0.0);
        assert_eq!(energy(SpeciesKind::Plant, &NutrientPools::new(-1.0, 3.0, 3.0)), 0.0);
    }
}
