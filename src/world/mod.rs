mod atmosphere;
mod cell;
mod grid;
mod resources;
mod terrain;
mod wind;

use bevy::prelude::*;

pub use atmosphere::{
    diffuse_pass, saturation_pressure_of_water_vapor, AtmosphereConfig, AtmosphereField,
};
pub use cell::{LifeLink, NutrientStore, NutrientType, TerrainCell, TerrainKind, NUTRIENT_TYPE_COUNT};
pub use grid::{CellId, CoarseLayout, TerrainGrid, COARSE_FACTOR, DIAGONAL_OFFSETS, DIRECT_OFFSETS};
pub use resources::*;
pub use terrain::*;
pub use wind::{is_blocked_by_terrain, GustFunction, WindConfig, WindField, BLOCKED};

use crate::simulation::Simulation;

/// Fixed phase order of one simulation tick
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    Clock,
    Atmosphere,
    Wind,
    Organisms,
    Stats,
}

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                SimulationSet::Clock,
                SimulationSet::Atmosphere,
                SimulationSet::Wind,
                SimulationSet::Organisms,
                SimulationSet::Stats,
            )
                .chain(),
        )
        .add_systems(Startup, log_world_summary)
        .add_systems(Update, advance_clock.in_set(SimulationSet::Clock))
        .add_systems(Update, tick_atmosphere.in_set(SimulationSet::Atmosphere))
        .add_systems(Update, tick_wind.in_set(SimulationSet::Wind));
    }
}

fn log_world_summary(sim: Res<Simulation>) {
    info!(
        "World {}x{} with {} terrain cells, coarse grid {}x{}, {} blocked wind cells",
        sim.terrain.width(),
        sim.terrain.height(),
        sim.terrain.len(),
        sim.wind.layout().width,
        sim.wind.layout().height,
        sim.wind.blocked_count()
    );
}

/// Advance simulation time by one configured tick and regrow terrain nutrients
fn advance_clock(mut sim: ResMut<Simulation>) {
    let dt_ms = sim.config().tick_ms;
    sim.advance_clock(dt_ms);
    sim.regenerate_terrain(dt_ms);
}

fn tick_atmosphere(mut sim: ResMut<Simulation>) {
    sim.tick_atmosphere();
}

fn tick_wind(mut sim: ResMut<Simulation>) {
    sim.tick_wind();
}
