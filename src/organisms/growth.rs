//! Growth algorithms shared by the rooted species.
//!
//! Each extension links one new life square to a terrain cell and reports the
//! number of units grown so the caller can charge for them.

use glam::{IVec2, Vec2};
use rand::Rng;
use tracing::debug;

use crate::organisms::components::{GrowthThrottle, LifeSquare, LifeSquareKind, OrganismId};
use crate::organisms::species::Stage;
use crate::organisms::systems::{Organism, SpawnRequest};
use crate::organisms::tuning::LifeCycleTuning;
use crate::world::{CellId, LifeLink, NutrientType, TerrainCell, TerrainGrid, TerrainKind};

const UP: IVec2 = IVec2::new(0, -1);

/// Growth sub-routine picked from the scarcest pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthBranch {
    /// Photosynthetic tissue, answers an air shortage
    Green,
    WaterRoot,
    DirtRoot,
}

impl GrowthBranch {
    pub fn for_nutrient(nutrient: NutrientType) -> Self {
        match nutrient {
            NutrientType::Air => GrowthBranch::Green,
            NutrientType::Water => GrowthBranch::WaterRoot,
            NutrientType::Dirt => GrowthBranch::DirtRoot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthReport {
    pub branch: GrowthBranch,
    /// Structural units added (0 when throttled or no site was found)
    pub units: u32,
}

fn throttle_slot(throttle: &mut GrowthThrottle, branch: GrowthBranch) -> &mut f64 {
    match branch {
        GrowthBranch::Green => &mut throttle.green_last,
        GrowthBranch::WaterRoot => &mut throttle.water_root_last,
        GrowthBranch::DirtRoot => &mut throttle.dirt_root_last,
    }
}

/// Address the scarcest nutrient pool with one throttled extension.
///
/// Refused outright (`None`) while current energy is negative. A throttled or
/// site-less attempt still stamps the branch's timestamp.
pub fn grow_rooted(
    organism: &mut Organism,
    terrain: &mut TerrainGrid,
    now_ms: f64,
    tuning: &LifeCycleTuning,
) -> Option<GrowthReport> {
    if organism.energy.current < 0.0 {
        debug!("[GROWTH] {:?} wants to grow but is in energy debt", organism.id);
        return None;
    }

    let branch = GrowthBranch::for_nutrient(organism.pools.scarcest());
    let claimed = GrowthThrottle::try_claim(
        throttle_slot(&mut organism.throttle, branch),
        now_ms,
        tuning.throttle_interval_ms,
    );
    let units = if claimed {
        match branch {
            GrowthBranch::Green => grow_green(organism, terrain),
            GrowthBranch::WaterRoot => grow_water_root(organism, terrain),
            GrowthBranch::DirtRoot => grow_dirt_root(organism, terrain),
        }
    } else {
        0
    };

    organism.energy.spend(units as f32 * tuning.growth_unit_cost);
    Some(GrowthReport { branch, units })
}

fn link_new_square(
    organism: &mut Organism,
    terrain: &mut TerrainGrid,
    cell: CellId,
    kind: LifeSquareKind,
) -> bool {
    let link = LifeLink {
        organism: organism.id,
        kind,
    };
    if !terrain.link(cell, link) {
        return false;
    }
    let Some(position) = terrain.cell(cell).map(|c| c.position) else {
        return false;
    };
    organism.add_square(LifeSquare::new(kind, cell, position));
    true
}

/// Stack a new green square on top of the topmost green square, or the
/// topmost root when the organism has no green left
pub fn grow_green(organism: &mut Organism, terrain: &mut TerrainGrid) -> u32 {
    let anchor = organism
        .topmost(LifeSquareKind::Green)
        .or_else(|| organism.topmost(LifeSquareKind::Root))
        .map(|square| square.position);
    let Some(anchor) = anchor else {
        return 0;
    };

    let Some(tissue) = terrain.insert(TerrainCell::plant_tissue(anchor + UP)) else {
        return 0;
    };
    if link_new_square(organism, terrain, tissue, LifeSquareKind::Green) {
        1
    } else {
        terrain.remove(tissue);
        0
    }
}

/// Rootable, unlinked cell at a position no life square occupies yet
fn free_rootable_cell(terrain: &TerrainGrid, pos: IVec2) -> Option<CellId> {
    if terrain.is_occupied_by_life(pos) {
        return None;
    }
    terrain
        .iter_at(pos)
        .find(|(_, cell)| cell.rootable && cell.collidable)
        .map(|(id, _)| id)
}

fn root_frontier(organism: &Organism, terrain: &TerrainGrid) -> Vec<(IVec2, CellId)> {
    organism
        .squares()
        .iter()
        .filter(|square| square.kind == LifeSquareKind::Root)
        .flat_map(|square| terrain.neighbors_direct(square.position))
        .filter_map(|pos| free_rootable_cell(terrain, pos).map(|id| (pos, id)))
        .collect()
}

/// Extend a root into the wettest free neighbor of any existing root
pub fn grow_water_root(organism: &mut Organism, terrain: &mut TerrainGrid) -> u32 {
    let mut wettest: Option<(CellId, f32)> = None;
    for (_, id) in root_frontier(organism, terrain) {
        let Some(water) = terrain.cell(id).map(|c| c.nutrients.water) else {
            continue;
        };
        if wettest.map_or(true, |(_, best)| water > best) {
            wettest = Some((id, water));
        }
    }

    match wettest {
        Some((id, _)) if link_new_square(organism, terrain, id, LifeSquareKind::Root) => 1,
        _ => 0,
    }
}

/// Dirt nutrients reachable from a candidate root position, discounted by how
/// many roots already crowd each nutrient cell
pub fn dirt_availability(terrain: &TerrainGrid, candidate: IVec2) -> f32 {
    terrain
        .neighbors_direct(candidate)
        .iter()
        .flat_map(|pos| terrain.iter_at(*pos).collect::<Vec<_>>())
        .filter(|(_, cell)| cell.is_nutrient_bearing())
        .map(|(_, cell)| {
            let crowding = terrain
                .neighbors_direct(cell.position)
                .iter()
                .filter(|pos| terrain.root_count_at(**pos) > 0)
                .count();
            cell.nutrients.dirt / (crowding as f32 + 1.0)
        })
        .sum()
}

/// Extend a root toward the richest uncrowded dirt, preferring the topmost
/// candidate on ties
pub fn grow_dirt_root(organism: &mut Organism, terrain: &mut TerrainGrid) -> u32 {
    let mut best: Option<(CellId, IVec2, f32)> = None;
    for (pos, id) in root_frontier(organism, terrain) {
        let score = dirt_availability(terrain, pos);
        let better = match best {
            None => true,
            Some((_, best_pos, best_score)) => {
                score > best_score || (score == best_score && pos.y < best_pos.y)
            }
        };
        if better {
            best = Some((id, pos, score));
        }
    }

    match best {
        Some((id, _, _)) if link_new_square(organism, terrain, id, LifeSquareKind::Root) => 1,
        _ => 0,
    }
}

/// Position just above the topmost green square
pub fn seed_site_above_top_green(organism: &Organism) -> Option<IVec2> {
    organism
        .topmost(LifeSquareKind::Green)
        .map(|square| square.position + UP)
}

/// Place a seed cell at the species' seed site and queue the seed organism.
///
/// The cell is thrown with a random outward, upward velocity. Nothing is
/// changed when the site is occupied.
pub fn produce_seed<R: Rng + ?Sized>(
    organism: &Organism,
    terrain: &mut TerrainGrid,
    rng: &mut R,
) -> Option<SpawnRequest> {
    let descriptor = organism.species.descriptor();
    let Stage::Adult { seed } = descriptor.stage else {
        return None;
    };
    let site = (descriptor.seed_site?)(organism)?;

    let mut cell = TerrainCell::seed(site);
    cell.velocity = Vec2::new(
        rng.gen_range(-3.0f32..3.0).floor(),
        rng.gen_range(-3.0f32..-1.0).floor(),
    );
    let Some(seed_cell) = terrain.insert(cell) else {
        debug!("[GROWTH] Seed site {:?} is occupied", site);
        return None;
    };

    Some(SpawnRequest {
        species: seed,
        position: terrain.wrap(site),
        seed_cell: Some(seed_cell),
    })
}

/// First squares of a rooted adult: a green square on new tissue above `pos`
/// and a root square in the rootable cell at `pos`.
///
/// A lone water cell sitting above is cleared first; any other collidable cell
/// there blocks the spawn. On failure the terrain is left as it was, cleared
/// water included.
pub fn attach_rooted_adult(
    terrain: &mut TerrainGrid,
    organism: OrganismId,
    pos: IVec2,
) -> Option<Vec<LifeSquare>> {
    let above = terrain.wrap(pos + UP);
    let root_cell = terrain
        .iter_at(pos)
        .find(|(_, cell)| cell.rootable && !cell.is_linked())
        .map(|(id, _)| id)?;

    let mut cleared = None;
    if let Some(top) = terrain.collidable_at(above) {
        let is_water = terrain
            .cell(top)
            .map_or(false, |cell| cell.kind == TerrainKind::Water);
        if !is_water || terrain.collidable_at(above + UP).is_some() {
            return None;
        }
        cleared = terrain.remove(top);
    }

    let green_link = LifeLink {
        organism,
        kind: LifeSquareKind::Green,
    };
    let root_link = LifeLink {
        organism,
        kind: LifeSquareKind::Root,
    };
    let tissue = terrain.insert(TerrainCell::plant_tissue(above));
    let attached = match tissue {
        Some(tissue) => terrain.link(tissue, green_link) && terrain.link(root_cell, root_link),
        None => false,
    };
    let Some(tissue) = tissue.filter(|_| attached) else {
        if let Some(tissue) = tissue {
            terrain.remove(tissue);
        }
        terrain.unlink(root_cell);
        if let Some(water) = cleared {
            terrain.insert(water);
        }
        return None;
    };

    Some(vec![
        LifeSquare::new(LifeSquareKind::Green, tissue, above),
        LifeSquare::new(LifeSquareKind::Root, root_cell, terrain.wrap(pos)),
    ])
}

/// Bind a seed square to the seed (or other rootable) cell at `pos`
pub fn attach_seed(
    terrain: &mut TerrainGrid,
    organism: OrganismId,
    pos: IVec2,
) -> Option<Vec<LifeSquare>> {
    let cell = terrain
        .iter_at(pos)
        .find(|(_, cell)| cell.collidable && cell.rootable && !cell.is_linked())
        .map(|(id, _)| id)?;
    let link = LifeLink {
        organism,
        kind: LifeSquareKind::Seed,
    };
    if !terrain.link(cell, link) {
        return None;
    }
    Some(vec![LifeSquare::new(LifeSquareKind::Seed, cell, terrain.wrap(pos))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organisms::components::NutrientPools;
    use crate::organisms::registry::OrganismRegistry;
    use crate::organisms::species::SpeciesKind;
    use crate::organisms::systems::spawn_organism;
    use crate::organisms::tuning::OrganismTuning;
    use rand::rngs::mock::StepRng;

    /// Flat dirt from row 8 down on a 16x16 world
    fn flat_world() -> TerrainGrid {
        let mut terrain = TerrainGrid::new(16, 16);
        for x in 0..16 {
            for y in 8..16 {
                terrain.insert(TerrainCell::dirt(IVec2::new(x, y), 1.0, 1.0).with_surface(y == 8));
            }
        }
        terrain
    }

    fn plant(registry: &mut OrganismRegistry, terrain: &mut TerrainGrid) -> OrganismId {
        spawn_organism(
            registry,
            terrain,
            SpeciesKind::Plant,
            IVec2::new(5, 8),
            0.0,
            &OrganismTuning::default(),
        )
        .unwrap()
    }

    #[test]
    fn adult_attaches_green_above_and_root_below() {
        let mut terrain = flat_world();
        let mut registry = OrganismRegistry::default();
        let id = plant(&mut registry, &mut terrain);
        let organism = registry.get(id).unwrap();

        assert_eq!(organism.count_of(LifeSquareKind::Green), 1);
        assert_eq!(organism.count_of(LifeSquareKind::Root), 1);
        let tissue = terrain.collidable_at(IVec2::new(5, 7)).unwrap();
        assert_eq!(terrain.cell(tissue).unwrap().kind, TerrainKind::PlantTissue);
        assert_eq!(terrain.root_count_at(IVec2::new(5, 8)), 1);
    }

    #[test]
    fn adult_clears_lone_water_but_not_rock() {
        let mut terrain = flat_world();
        terrain.insert(TerrainCell::water(IVec2::new(5, 7), 1.0));
        let squares = attach_rooted_adult(&mut terrain, OrganismId::default(), IVec2::new(5, 8));
        assert!(squares.is_some());
        let top = terrain.collidable_at(IVec2::new(5, 7)).unwrap();
        assert_eq!(terrain.cell(top).unwrap().kind, TerrainKind::PlantTissue);

        let mut terrain = flat_world();
        terrain.insert(TerrainCell::rock(IVec2::new(2, 7)));
        let before = terrain.len();
        assert!(attach_rooted_adult(&mut terrain, OrganismId::default(), IVec2::new(2, 8)).is_none());
        assert_eq!(terrain.len(), before);
        assert!(!terrain.is_occupied_by_life(IVec2::new(2, 8)));
    }

    #[test]
    fn green_growth_stacks_upward() {
        let mut terrain = flat_world();
        let mut registry = OrganismRegistry::default();
        let id = plant(&mut registry, &mut terrain);
        let organism = registry.get_mut(id).unwrap();

        assert_eq!(grow_green(organism, &mut terrain), 1);
        assert_eq!(organism.topmost(LifeSquareKind::Green).unwrap().position, IVec2::new(5, 6));

        // blocked above the new top
        terrain.insert(TerrainCell::rock(IVec2::new(5, 5)));
        assert_eq!(grow_green(organism, &mut terrain), 0);
        assert_eq!(organism.count_of(LifeSquareKind::Green), 2);
    }

    #[test]
    fn water_root_picks_wettest_neighbor() {
        let mut terrain = flat_world();
        let wet = terrain.collidable_at(IVec2::new(6, 8)).unwrap();
        terrain.cell_mut(wet).unwrap().nutrients.water = 5.0;
        let mut registry = OrganismRegistry::default();
        let id = plant(&mut registry, &mut terrain);
        let organism = registry.get_mut(id).unwrap();

        assert_eq!(grow_water_root(organism, &mut terrain), 1);
        assert_eq!(terrain.root_count_at(IVec2::new(6, 8)), 1);
        assert_eq!(organism.count_of(LifeSquareKind::Root), 2);
    }

    #[test]
    fn dirt_root_prefers_uncrowded_nutrients() {
        let mut terrain = flat_world();
        let rich = terrain.collidable_at(IVec2::new(4, 10)).unwrap();
        terrain.cell_mut(rich).unwrap().nutrients.dirt = 20.0;
        let mut registry = OrganismRegistry::default();
        let id = plant(&mut registry, &mut terrain);
        let organism = registry.get_mut(id).unwrap();

        // (4, 9) borders the rich cell
        assert!(dirt_availability(&terrain, IVec2::new(4, 9)) > dirt_availability(&terrain, IVec2::new(6, 8)));
        assert_eq!(grow_dirt_root(organism, &mut terrain), 1);
        assert_eq!(grow_dirt_root(organism, &mut terrain), 1);
        assert_eq!(organism.count_of(LifeSquareKind::Root), 3);
        let rich_is_tapped = terrain
            .neighbors_direct(IVec2::new(4, 10))
            .iter()
            .any(|pos| terrain.root_count_at(*pos) > 0);
        assert!(rich_is_tapped);
    }

    #[test]
    fn grow_dispatches_on_scarcest_pool_and_throttles() {
        let mut terrain = flat_world();
        let mut registry = OrganismRegistry::default();
        let id = plant(&mut registry, &mut terrain);
        let tuning = OrganismTuning::default().plant;
        let organism = registry.get_mut(id).unwrap();
        organism.pools = NutrientPools::new(10.0, 1.0, 10.0);

        let first = grow_rooted(organism, &mut terrain, 1500.0, &tuning).unwrap();
        assert_eq!(first, GrowthReport { branch: GrowthBranch::WaterRoot, units: 1 });
        assert_eq!(organism.energy.current, -tuning.growth_unit_cost);

        // in debt now: refused
        assert!(grow_rooted(organism, &mut terrain, 3000.0, &tuning).is_none());

        organism.energy.current = 5.0;
        let throttled = grow_rooted(organism, &mut terrain, 1600.0, &tuning).unwrap();
        assert_eq!(throttled.units, 0);
        assert_eq!(organism.count_of(LifeSquareKind::Root), 2);
    }

    #[test]
    fn seed_lands_above_top_green() {
        let mut terrain = flat_world();
        let mut registry = OrganismRegistry::default();
        let id = plant(&mut registry, &mut terrain);
        let organism = registry.get(id).unwrap();
        let mut rng = StepRng::new(0, 0);

        let request = produce_seed(organism, &mut terrain, &mut rng).unwrap();
        assert_eq!(request.species, SpeciesKind::PlantSeed);
        assert_eq!(request.position, IVec2::new(5, 6));
        let cell = terrain.cell(request.seed_cell.unwrap()).unwrap();
        assert_eq!(cell.kind, TerrainKind::Seed);
        assert_eq!(cell.velocity, Vec2::new(-3.0, -3.0));

        // site now occupied
        assert!(produce_seed(organism, &mut terrain, &mut rng).is_none());
    }
}
