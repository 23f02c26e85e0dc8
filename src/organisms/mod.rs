mod behavior;
mod components;
mod ecosystem_stats;
mod growth;
mod registry;
mod species;
mod systems;
mod tuning;

use bevy::prelude::*;
pub use behavior::*;
pub use components::*;
pub use ecosystem_stats::EcosystemStats;
pub use growth::{
    attach_rooted_adult, attach_seed, dirt_availability, grow_dirt_root, grow_green, grow_rooted,
    grow_water_root, produce_seed, GrowthBranch, GrowthReport,
};
pub use registry::OrganismRegistry;
pub use species::{SpeciesDescriptor, SpeciesKind, Stage};
pub use systems::{
    commit_spawn, destroy_organism, scatter_adults, spawn_organism, Organism, SpawnRequest,
    TrackedOrganism, TurnReport,
};
pub use tuning::*;

use crate::world::SimulationSet;

pub struct OrganismPlugin;

impl Plugin for OrganismPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, systems::spawn_initial_organisms)
            .add_systems(
                Update,
                (systems::tick_organisms, systems::log_tracked_organism)
                    .chain()
                    .in_set(SimulationSet::Organisms),
            )
            .add_systems(
                Update,
                ecosystem_stats::collect_ecosystem_stats.in_set(SimulationSet::Stats),
            );
    }
}
