use glam::IVec2;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::world::cell::TerrainCell;
use crate::world::grid::TerrainGrid;

/// Parameters for the procedural landscape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Fraction of the height (from the top) where the dirt surface sits on average
    pub surface_level: f32,
    /// Peak deviation of the surface line, in cells
    pub surface_amplitude: f32,
    /// Rows of rock at the bottom of the world
    pub bedrock_depth: u32,
    pub dirt_water: f32,
    pub dirt_nutrients: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            surface_level: 0.6,
            surface_amplitude: 4.0,
            bedrock_depth: 4,
            dirt_water: 1.0,
            dirt_nutrients: 4.0,
        }
    }
}

/// Fill an empty grid with air over a wavy dirt surface resting on bedrock.
///
/// The same seed always produces the same landscape. The topmost dirt cell
/// of every column is flagged as surface.
pub fn generate_terrain(grid: &mut TerrainGrid, config: &TerrainConfig, seed: u64) {
    let mut local_rng = rand::rngs::StdRng::seed_from_u64(seed);
    let width = grid.width();
    let height = grid.height();

    let phase = local_rng.gen_range(0.0..std::f32::consts::TAU);
    let base = height as f32 * config.surface_level.clamp(0.0, 1.0);
    let bedrock_top = height - config.bedrock_depth.min(height as u32) as i32;

    for x in 0..width {
        // Two overlapping waves keep the surface from looking periodic
        let t = x as f32 / width as f32 * std::f32::consts::TAU;
        let wave = (t + phase).sin() * 0.7 + (3.0 * t - phase).sin() * 0.3;
        let jitter = local_rng.gen_range(-0.5..0.5);
        let surface_y = (base + wave * config.surface_amplitude + jitter)
            .round()
            .clamp(0.0, bedrock_top as f32) as i32;

        for y in surface_y..height {
            let pos = IVec2::new(x, y);
            let cell = if y >= bedrock_top {
                TerrainCell::rock(pos)
            } else {
                let richness = local_rng.gen_range(0.5..1.5);
                TerrainCell::dirt(pos, config.dirt_water, config.dirt_nutrients * richness)
                    .with_surface(y == surface_y)
            };
            grid.insert(cell);
        }
    }
}

/// Row index of the topmost collidable cell in a column, if any
pub fn surface_height(grid: &TerrainGrid, x: i32) -> Option<i32> {
    (0..grid.height()).find(|y| grid.collidable_at(IVec2::new(x, *y)).is_some())
}
