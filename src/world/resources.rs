use crate::organisms::{LifeSquare, LifeSquareKind, UptakeTuning};
use crate::world::atmosphere::AtmosphereField;
use crate::world::cell::{NutrientType, TerrainCell, TerrainKind, NUTRIENT_TYPE_COUNT};
use crate::world::grid::TerrainGrid;

/// Nutrient regeneration per second by terrain kind
/// [Air, Water, Dirt]
pub const REGENERATION_RATES: [[f32; NUTRIENT_TYPE_COUNT]; 5] = [
    // Dirt
    [0.0, 0.05, 0.02],
    // Rock
    [0.0, 0.0, 0.0],
    // Water
    [0.0, 0.0, 0.0],
    // PlantTissue
    [0.0, 0.0, 0.0],
    // Seed
    [0.0, 0.0, 0.0],
];

/// Regeneration stops once a store reaches this value
pub const MAX_NUTRIENT_DENSITY: [f32; NUTRIENT_TYPE_COUNT] = [0.0, 2.0, 8.0];

/// Relative humidity at which dirt water regenerates at full rate
const HUMIDITY_REFERENCE: f64 = 4.0;

/// Regeneration multiplier for a nutrient given local relative humidity
pub fn humidity_regeneration_multiplier(humidity: f64, nutrient: NutrientType) -> f32 {
    let normalized = (humidity / HUMIDITY_REFERENCE).clamp(0.0, 1.0) as f32;
    match nutrient {
        NutrientType::Water => normalized,
        NutrientType::Dirt => 0.5 + normalized * 0.5,
        NutrientType::Air => 1.0,
    }
}

/// Update nutrient regeneration for a single cell
pub fn regenerate_cell(cell: &mut TerrainCell, humidity: f64, dt_seconds: f32) {
    let kind_idx = cell.kind as usize;
    for nutrient in NutrientType::ALL {
        let rate = REGENERATION_RATES[kind_idx][nutrient as usize];
        if rate <= 0.0 {
            continue;
        }
        let cap = MAX_NUTRIENT_DENSITY[nutrient as usize];
        let current = cell.nutrients.get(nutrient);
        if current >= cap {
            continue;
        }
        let effective = rate * humidity_regeneration_multiplier(humidity, nutrient);
        *cell.nutrients.get_mut(nutrient) = (current + effective * dt_seconds).min(cap);
    }
}

/// Regenerate every terrain cell, reading humidity from the atmosphere
pub fn regenerate_terrain(terrain: &mut TerrainGrid, atmosphere: &AtmosphereField, dt_seconds: f32) {
    for (_, cell) in terrain.iter_mut() {
        if cell.kind != TerrainKind::Dirt {
            continue;
        }
        let humidity = atmosphere.humidity_at(cell.position);
        regenerate_cell(cell, humidity, dt_seconds);
    }
}

/// Local update of one life square against its terrain cell.
///
/// Returns `false` when the linked cell no longer exists, in which case the
/// owning organism must drop the square.
pub fn exchange_with_terrain(
    square: &mut LifeSquare,
    terrain: &mut TerrainGrid,
    rates: &UptakeTuning,
) -> bool {
    if !terrain.contains(square.cell) {
        return false;
    }

    match square.kind {
        LifeSquareKind::Green => {
            let exposed = terrain
                .neighbors_direct(square.position)
                .iter()
                .filter(|pos| terrain.collidable_at(**pos).is_none())
                .count();
            square
                .nutrients
                .add(NutrientType::Air, rates.green_air_rate * exposed as f32 / 4.0);
        }
        LifeSquareKind::Root => {
            if let Some(cell) = terrain.cell_mut(square.cell) {
                let water = cell.nutrients.water * rates.root_water_draw;
                let dirt = cell.nutrients.dirt * rates.root_dirt_draw;
                let water = cell.nutrients.take(NutrientType::Water, water);
                let dirt = cell.nutrients.take(NutrientType::Dirt, dirt);
                square.nutrients.add(NutrientType::Water, water);
                square.nutrients.add(NutrientType::Dirt, dirt);
            }
        }
        LifeSquareKind::Seed => {
            if let Some(cell) = terrain.cell_mut(square.cell) {
                let wanted = cell.nutrients.water * rates.seed_water_draw;
                let soaked = cell.nutrients.take(NutrientType::Water, wanted);
                square.sprout_status += rates.sprout_rate + soaked * rates.sprout_water_factor;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::cell::TerrainCell;
    use glam::IVec2;

    #[test]
    fn regeneration_caps_and_skips_inert_kinds() {
        let mut dirt = TerrainCell::dirt(IVec2::ZERO, 1.9, 0.0);
        regenerate_cell(&mut dirt, 8.0, 10.0);
        assert_eq!(dirt.nutrients.water, MAX_NUTRIENT_DENSITY[NutrientType::Water as usize]);
        assert!(dirt.nutrients.dirt > 0.0);

        let mut rock = TerrainCell::rock(IVec2::ZERO);
        regenerate_cell(&mut rock, 8.0, 10.0);
        assert_eq!(rock.nutrients.total(), 0.0);
    }

    #[test]
    fn dry_air_stops_water_regeneration() {
        let mut dirt = TerrainCell::dirt(IVec2::ZERO, 0.5, 1.0);
        regenerate_cell(&mut dirt, 0.0, 1.0);
        assert_eq!(dirt.nutrients.water, 0.5);
    }

    #[test]
    fn root_draws_from_its_cell_and_green_breathes_air() {
        let mut terrain = TerrainGrid::new(8, 8);
        let dirt = terrain
            .insert(TerrainCell::dirt(IVec2::new(3, 4), 1.0, 2.0))
            .unwrap();
        let tissue = terrain
            .insert(TerrainCell::plant_tissue(IVec2::new(3, 3)))
            .unwrap();
        let rates = UptakeTuning::default();

        let mut root = LifeSquare::new(LifeSquareKind::Root, dirt, IVec2::new(3, 4));
        assert!(exchange_with_terrain(&mut root, &mut terrain, &rates));
        let cell = terrain.cell(dirt).unwrap();
        assert!((root.nutrients.water + cell.nutrients.water - 1.0).abs() < 1e-6);
        assert!((root.nutrients.dirt + cell.nutrients.dirt - 2.0).abs() < 1e-6);

        // three open sides, dirt below
        let mut green = LifeSquare::new(LifeSquareKind::Green, tissue, IVec2::new(3, 3));
        assert!(exchange_with_terrain(&mut green, &mut terrain, &rates));
        assert!((green.nutrients.air - rates.green_air_rate * 0.75).abs() < 1e-6);
    }

    #[test]
    fn missing_cell_reports_loss() {
        let mut terrain = TerrainGrid::new(4, 4);
        let id = terrain.insert(TerrainCell::seed(IVec2::ZERO)).unwrap();
        let mut seed = LifeSquare::new(LifeSquareKind::Seed, id, IVec2::ZERO);
        assert!(exchange_with_terrain(&mut seed, &mut terrain, &UptakeTuning::default()));
        assert!(seed.sprout_status > 0.0);
        terrain.remove(id);
        assert!(!exchange_with_terrain(&mut seed, &mut terrain, &UptakeTuning::default()));
    }
}
