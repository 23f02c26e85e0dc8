use glam::IVec2;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::world::{CellId, NutrientStore, NutrientType};

new_key_type! {
    /// Stable handle for organisms backed by a generational slot map.
    pub struct OrganismId;
}

/// Structural role of a life square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifeSquareKind {
    /// Photosynthetic tissue above ground
    Green,
    Root,
    Seed,
}

impl LifeSquareKind {
    pub const ALL: [LifeSquareKind; 3] =
        [LifeSquareKind::Green, LifeSquareKind::Root, LifeSquareKind::Seed];
}

/// Organism-owned structural unit bound to exactly one terrain cell.
///
/// The nutrient store is a local buffer: the terrain exchange fills it and
/// the owning organism drains it into its pools.
#[derive(Debug, Clone)]
pub struct LifeSquare {
    pub kind: LifeSquareKind,
    /// Handle into the terrain grid; cleared by destroy, never dereferenced after removal
    pub cell: CellId,
    pub position: IVec2,
    pub nutrients: NutrientStore,
    /// Progress toward sprouting, only meaningful for seed squares (1.0 = ready)
    pub sprout_status: f32,
}

impl LifeSquare {
    pub fn new(kind: LifeSquareKind, cell: CellId, position: IVec2) -> Self {
        Self {
            kind,
            cell,
            position,
            nutrients: NutrientStore::default(),
            sprout_status: 0.0,
        }
    }
}

/// Cumulative nutrient pools of an organism.
///
/// Pools may go negative transiently; that is a deficit signal, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientPools {
    pub air: f32,
    pub water: f32,
    pub dirt: f32,
}

impl NutrientPools {
    pub fn new(air: f32, water: f32, dirt: f32) -> Self {
        Self { air, water, dirt }
    }

    pub fn get(&self, nutrient: NutrientType) -> f32 {
        match nutrient {
            NutrientType::Air => self.air,
            NutrientType::Water => self.water,
            NutrientType::Dirt => self.dirt,
        }
    }

    pub fn add(&mut self, nutrient: NutrientType, amount: f32) {
        match nutrient {
            NutrientType::Air => self.air += amount,
            NutrientType::Water => self.water += amount,
            NutrientType::Dirt => self.dirt += amount,
        }
    }

    /// Debit the same amount from every pool
    pub fn consume(&mut self, amount: f32) {
        self.air -= amount;
        self.water -= amount;
        self.dirt -= amount;
    }

    /// Scarcest pool; ties resolve air, then dirt, then water
    pub fn scarcest(&self) -> NutrientType {
        let min = self.air.min(self.dirt).min(self.water);
        if self.air == min {
            NutrientType::Air
        } else if self.dirt == min {
            NutrientType::Dirt
        } else {
            NutrientType::Water
        }
    }
}

/// Energy accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    /// Spendable energy; reproduction and growth debit it
    pub current: f32,
    /// Everything ever converted; never decreases
    pub total: f32,
}

impl Energy {
    pub fn gain(&mut self, amount: f32) {
        self.current += amount;
        self.total += amount;
    }

    pub fn spend(&mut self, amount: f32) {
        self.current -= amount;
    }

    /// Fraction of the reproduction threshold currently banked
    pub fn ratio(&self, reproduction_energy: f32) -> f32 {
        if reproduction_energy > 0.0 {
            self.current / reproduction_energy
        } else {
            0.0
        }
    }
}

/// Per growth-type "last grown" timestamps in simulation milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthThrottle {
    pub green_last: f64,
    pub water_root_last: f64,
    pub dirt_root_last: f64,
}

impl GrowthThrottle {
    pub fn starting_at(now_ms: f64) -> Self {
        Self {
            green_last: now_ms,
            water_root_last: now_ms,
            dirt_root_last: now_ms,
        }
    }

    /// Claim a growth slot if the interval has elapsed, stamping `last` on success
    pub fn try_claim(last: &mut f64, now_ms: f64, interval_ms: f64) -> bool {
        if now_ms > *last + interval_ms {
            *last = now_ms;
            true
        } else {
            false
        }
    }
}
