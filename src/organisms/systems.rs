use bevy::prelude::*;
use glam::IVec2;
use rand::Rng;
use smallvec::SmallVec;

use crate::organisms::behavior::*;
use crate::organisms::components::*;
use crate::organisms::growth::{self, GrowthReport};
use crate::organisms::registry::OrganismRegistry;
use crate::organisms::species::{SpeciesKind, Stage};
use crate::organisms::tuning::{OrganismTuning, UptakeTuning};
use crate::simulation::Simulation;
use crate::world::{exchange_with_terrain, surface_height, CellId, NutrientType, TerrainGrid, TerrainKind};

/// Organism creation deferred until the acting organism's turn is over
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub species: SpeciesKind,
    pub position: IVec2,
    /// Seed cell placed for the new organism; removed again if the spawn fails
    pub seed_cell: Option<CellId>,
}

/// Everything that happened during one organism's turn
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub action: LifeCycleAction,
    pub destroy: bool,
    pub energy_gained: f32,
    pub growth: Option<GrowthReport>,
    pub spawns: SmallVec<[SpawnRequest; 1]>,
}

impl TurnReport {
    fn new(action: LifeCycleAction) -> Self {
        Self {
            action,
            destroy: false,
            energy_gained: 0.0,
            growth: None,
            spawns: SmallVec::new(),
        }
    }
}

fn kind_index(kind: LifeSquareKind) -> usize {
    match kind {
        LifeSquareKind::Green => 0,
        LifeSquareKind::Root => 1,
        LifeSquareKind::Seed => 2,
    }
}

#[derive(Debug, Clone)]
pub struct Organism {
    /// Assigned by the registry
    pub id: OrganismId,
    /// Spawn order, assigned by the registry
    pub serial: u64,
    pub species: SpeciesKind,
    /// Root position; never changes
    pub position: IVec2,
    squares: Vec<LifeSquare>,
    square_counts: [usize; 3],
    pub pools: NutrientPools,
    pub energy: Energy,
    pub spawn_time_ms: f64,
    pub throttle: GrowthThrottle,
    pub lifecycle: LifeCycle,
}

impl Organism {
    pub fn new(species: SpeciesKind, position: IVec2, now_ms: f64, uptake: &UptakeTuning) -> Self {
        let pools = if species.is_seed() {
            NutrientPools::default()
        } else {
            let start = uptake.starting_pool;
            NutrientPools::new(start, start, start)
        };
        Self {
            id: OrganismId::default(),
            serial: 0,
            species,
            position,
            squares: Vec::new(),
            square_counts: [0; 3],
            pools,
            energy: Energy::default(),
            spawn_time_ms: now_ms,
            throttle: GrowthThrottle::starting_at(now_ms),
            lifecycle: LifeCycle::new(now_ms),
        }
    }

    pub fn squares(&self) -> &[LifeSquare] {
        &self.squares
    }

    pub fn add_square(&mut self, square: LifeSquare) {
        self.square_counts[kind_index(square.kind)] += 1;
        self.squares.push(square);
    }

    pub fn count_of(&self, kind: LifeSquareKind) -> usize {
        self.square_counts[kind_index(kind)]
    }

    fn recount(&mut self) {
        self.square_counts = [0; 3];
        for square in &self.squares {
            self.square_counts[kind_index(square.kind)] += 1;
        }
    }

    /// Square of a kind with the smallest y; the oldest wins ties
    pub fn topmost(&self, kind: LifeSquareKind) -> Option<&LifeSquare> {
        self.squares
            .iter()
            .filter(|square| square.kind == kind)
            .min_by_key(|square| square.position.y)
    }

    pub fn sprout_status(&self) -> f32 {
        self.squares
            .iter()
            .find(|square| square.kind == LifeSquareKind::Seed)
            .map_or(0.0, |square| square.sprout_status)
    }

    /// Local terrain update of every square. Squares whose cell disappeared
    /// are dropped; returns false once nothing is left.
    pub fn pre_tick(&mut self, terrain: &mut TerrainGrid, uptake: &UptakeTuning) -> bool {
        let before = self.squares.len();
        self.squares
            .retain_mut(|square| exchange_with_terrain(square, terrain, uptake));
        if self.squares.len() != before {
            self.recount();
        }
        !self.squares.is_empty()
    }

    /// Pull a fraction of every square's buffer into the pools
    pub fn tick(&mut self, uptake: &UptakeTuning) {
        for square in &mut self.squares {
            let store = &mut square.nutrients;
            let wanted_air = store.air * uptake.air_uptake_fraction;
            let wanted_water = store.water * uptake.water_uptake_fraction;
            let wanted_dirt = store.dirt * uptake.root_uptake_fraction;
            let air = store.take(NutrientType::Air, wanted_air);
            let water = store.take(NutrientType::Water, wanted_water);
            let dirt = store.take(NutrientType::Dirt, wanted_dirt);
            self.pools.add(NutrientType::Air, air);
            self.pools.add(NutrientType::Water, water);
            self.pools.add(NutrientType::Dirt, dirt);
        }
    }

    /// Energy accounting followed by the single life-cycle action of this tick
    pub fn post_tick<R: Rng + ?Sized>(
        &mut self,
        terrain: &mut TerrainGrid,
        tuning: &OrganismTuning,
        now_ms: f64,
        rng: &mut R,
    ) -> TurnReport {
        let descriptor = self.species.descriptor();
        let lifecycle = tuning.lifecycle(self.species);

        let gained = (descriptor.photosynthesis)(
            &self.pools,
            tuning.uptake.photosynthesis_efficiency,
            descriptor.water_cost,
        )
        .max(0.0);
        if gained > 0.0 {
            self.energy.gain(gained);
            self.pools.air -= gained;
            self.pools.water -= gained * descriptor.water_cost;
            self.pools.dirt -= gained;
        }

        let fraction = life_fraction(now_ms, self.spawn_time_ms, lifecycle.max_lifetime_ms);
        let action = match descriptor.stage {
            Stage::Seed { .. } => decide_seed(self.sprout_status(), fraction),
            Stage::Adult { .. } => decide_adult(&self.energy, fraction, lifecycle),
        };
        self.lifecycle.set_state(action.state(), now_ms);

        let mut report = TurnReport::new(action);
        report.energy_gained = gained;

        match action {
            LifeCycleAction::Expire => report.destroy = true,
            LifeCycleAction::Sprout => {
                report.destroy = true;
                if let Stage::Seed { adult } = descriptor.stage {
                    report.spawns.push(SpawnRequest {
                        species: adult,
                        position: self.position,
                        seed_cell: None,
                    });
                }
            }
            LifeCycleAction::Reproduce => {
                if let Some(request) = growth::produce_seed(self, terrain, rng) {
                    report.spawns.push(request);
                }
                self.energy.spend(lifecycle.reproduction_energy_unit);
            }
            LifeCycleAction::Grow => {
                if let Some(grow) = descriptor.grow {
                    report.growth = grow(self, terrain, now_ms, lifecycle);
                }
            }
            LifeCycleAction::Idle => {}
        }
        report
    }

    /// One full turn: pre_tick, tick, post_tick
    pub fn process<R: Rng + ?Sized>(
        &mut self,
        terrain: &mut TerrainGrid,
        tuning: &OrganismTuning,
        now_ms: f64,
        rng: &mut R,
    ) -> TurnReport {
        if !self.pre_tick(terrain, &tuning.uptake) {
            self.lifecycle.set_state(LifeCycleState::Dying, now_ms);
            let mut report = TurnReport::new(LifeCycleAction::Expire);
            report.destroy = true;
            return report;
        }
        self.tick(&tuning.uptake);
        self.post_tick(terrain, tuning, now_ms, rng)
    }
}

/// Register an organism and attach its first squares; nothing is left behind on failure
pub fn spawn_organism(
    registry: &mut OrganismRegistry,
    terrain: &mut TerrainGrid,
    species: SpeciesKind,
    position: IVec2,
    now_ms: f64,
    tuning: &OrganismTuning,
) -> Option<OrganismId> {
    let position = terrain.wrap(position);
    let id = registry.insert(Organism::new(species, position, now_ms, &tuning.uptake));
    match (species.descriptor().attach)(terrain, id, position) {
        Some(squares) => {
            if let Some(organism) = registry.get_mut(id) {
                for square in squares {
                    organism.add_square(square);
                }
            }
            Some(id)
        }
        None => {
            debug!("[SPAWN] No room for {} at {:?}", species.name(), position);
            registry.remove(id);
            None
        }
    }
}

pub fn commit_spawn(
    registry: &mut OrganismRegistry,
    terrain: &mut TerrainGrid,
    request: &SpawnRequest,
    now_ms: f64,
    tuning: &OrganismTuning,
) -> Option<OrganismId> {
    let spawned = spawn_organism(registry, terrain, request.species, request.position, now_ms, tuning);
    if spawned.is_none() {
        if let Some(cell) = request.seed_cell {
            terrain.remove(cell);
        }
    }
    spawned
}

/// Deregister an organism and release its squares.
///
/// Plant tissue the organism grew is removed; dirt and seed cells stay as
/// terrain with their link cleared.
pub fn destroy_organism(
    registry: &mut OrganismRegistry,
    terrain: &mut TerrainGrid,
    id: OrganismId,
) -> Option<Organism> {
    let mut organism = registry.remove(id)?;
    for square in std::mem::take(&mut organism.squares) {
        let owned = terrain
            .cell(square.cell)
            .and_then(|cell| cell.link)
            .map_or(false, |link| link.organism == id);
        if !owned {
            continue;
        }
        let is_tissue = terrain
            .cell(square.cell)
            .map_or(false, |cell| cell.kind == TerrainKind::PlantTissue);
        if is_tissue {
            terrain.remove(square.cell);
        } else {
            terrain.unlink(square.cell);
        }
    }
    organism.recount();
    organism.lifecycle.state = LifeCycleState::Destroyed;
    Some(organism)
}

/// Drop rooted adults onto random surface columns
pub fn scatter_adults(
    registry: &mut OrganismRegistry,
    terrain: &mut TerrainGrid,
    tuning: &OrganismTuning,
    now_ms: f64,
    seed: u64,
) -> Vec<OrganismId> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut spawned = Vec::new();
    let attempts = tuning.initial_population * 4;

    for _ in 0..attempts {
        if spawned.len() >= tuning.initial_population {
            break;
        }
        let x = rng.i32(0..terrain.width());
        let Some(y) = surface_height(terrain, x) else {
            continue;
        };
        let species = if rng.bool() {
            SpeciesKind::Plant
        } else {
            SpeciesKind::Cactus
        };
        if let Some(id) = spawn_organism(registry, terrain, species, IVec2::new(x, y), now_ms, tuning) {
            spawned.push(id);
        }
    }
    spawned
}

/// Follows one organism through its life and logs its transitions
#[derive(Debug, Default)]
pub struct TrackedOrganism {
    id: Option<OrganismId>,
    last_state: Option<LifeCycleState>,
}

// TRACKED ORGANISM LOGGING
impl TrackedOrganism {
    pub fn track(&mut self, organism: &Organism) {
        self.id = Some(organism.id);
        self.last_state = Some(organism.lifecycle.state);
        info!(
            "[TRACKED] Started tracking {} #{} at {:?}",
            organism.species.name(),
            organism.serial,
            organism.position
        );
    }

    pub fn id(&self) -> Option<OrganismId> {
        self.id
    }

    pub fn observe(&mut self, organism: &Organism, report: &TurnReport) {
        if self.id != Some(organism.id) {
            return;
        }
        let state = organism.lifecycle.state;
        if self.last_state != Some(state) {
            info!(
                "[TRACKED] #{} {:?} -> {:?} | energy {:.1} (total {:.1}) | squares {}",
                organism.serial,
                self.last_state,
                state,
                organism.energy.current,
                organism.energy.total,
                organism.squares().len()
            );
            self.last_state = Some(state);
        }
        if let Some(growth) = report.growth.filter(|growth| growth.units > 0) {
            debug!("[TRACKED] #{} grew {:?}", organism.serial, growth.branch);
        }
    }

    pub fn released(&mut self, id: OrganismId) {
        if self.id == Some(id) {
            info!("[TRACKED] Organism destroyed; tracking stopped");
            self.id = None;
            self.last_state = None;
        }
    }
}

/// Spawn initial organisms in the world
pub fn spawn_initial_organisms(mut sim: ResMut<Simulation>) {
    info!("Spawning initial organisms...");
    let spawned = sim.populate();
    info!("Spawned {} organisms", spawned);
}

pub fn tick_organisms(mut sim: ResMut<Simulation>) {
    sim.tick_organisms();
}

/// Periodic status line for the tracked organism
pub fn log_tracked_organism(sim: Res<Simulation>) {
    if sim.clock.ticks() % 100 != 0 {
        return;
    }
    let Some(organism) = sim.tracked().and_then(|id| sim.organisms.get(id)) else {
        return;
    };
    info!(
        "[TRACKED] t={:.0}ms #{} {:?} | pools air {:.2} water {:.2} dirt {:.2} | green {} root {}",
        sim.clock.now_ms(),
        organism.serial,
        organism.lifecycle.state,
        organism.pools.air,
        organism.pools.water,
        organism.pools.dirt,
        organism.count_of(LifeSquareKind::Green),
        organism.count_of(LifeSquareKind::Root)
    );
}
