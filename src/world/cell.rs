use glam::{IVec2, Vec2};

use crate::organisms::{LifeSquareKind, OrganismId};

/// Nutrient categories exchanged between terrain and organisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum NutrientType {
    Air = 0,
    Water = 1,
    Dirt = 2,
}

pub const NUTRIENT_TYPE_COUNT: usize = 3;

impl NutrientType {
    pub const ALL: [NutrientType; NUTRIENT_TYPE_COUNT] =
        [NutrientType::Air, NutrientType::Water, NutrientType::Dirt];
}

/// Scalar nutrient stores shared by terrain cells and life squares
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NutrientStore {
    pub air: f32,
    pub water: f32,
    pub dirt: f32,
}

impl NutrientStore {
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

    pub fn get_mut(&mut self, nutrient: NutrientType) -> &mut f32 {
        match nutrient {
            NutrientType::Air => &mut self.air,
            NutrientType::Water => &mut self.water,
            NutrientType::Dirt => &mut self.dirt,
        }
    }

    /// Add to a store, never letting it drop below zero
    pub fn add(&mut self, nutrient: NutrientType, amount: f32) {
        let value = self.get_mut(nutrient);
        *value = (*value + amount).max(0.0);
    }

    /// Remove up to `amount` from a store and return what was actually taken
    pub fn take(&mut self, nutrient: NutrientType, amount: f32) -> f32 {
        let value = self.get_mut(nutrient);
        let taken = amount.clamp(0.0, (*value).max(0.0));
        *value -= taken;
        taken
    }

    pub fn total(&self) -> f32 {
        self.air + self.water + self.dirt
    }
}

/// Terrain kinds. A position with no cells is open air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TerrainKind {
    Dirt = 0,
    Rock = 1,
    Water = 2,
    PlantTissue = 3,
    Seed = 4,
}

/// Non-owning back reference from a terrain cell to the life square bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifeLink {
    pub organism: OrganismId,
    pub kind: LifeSquareKind,
}

/// A single terrain cell stored in the [`TerrainGrid`](crate::world::TerrainGrid)
#[derive(Debug, Clone)]
pub struct TerrainCell {
    /// Wrapped grid position
    pub position: IVec2,
    pub kind: TerrainKind,
    pub nutrients: NutrientStore,
    pub solid: bool,
    pub collidable: bool,
    pub rootable: bool,
    /// Top layer of a solid mass, exposed to the atmosphere
    pub surface: bool,
    /// At most one life square may be linked to a cell at a time
    pub link: Option<LifeLink>,
    /// Initial motion handed to the terrain physics collaborator
    pub velocity: Vec2,
}

impl TerrainCell {
    fn with_kind(kind: TerrainKind, position: IVec2) -> Self {
        let (solid, collidable, rootable) = match kind {
            TerrainKind::Dirt => (true, true, true),
            TerrainKind::Rock => (true, true, false),
            TerrainKind::Water => (false, true, false),
            TerrainKind::PlantTissue => (true, true, false),
            TerrainKind::Seed => (true, true, true),
        };
        Self {
            position,
            kind,
            nutrients: NutrientStore::default(),
            solid,
            collidable,
            rootable,
            surface: false,
            link: None,
            velocity: Vec2::ZERO,
        }
    }

    pub fn dirt(position: IVec2, water: f32, dirt: f32) -> Self {
        let mut cell = Self::with_kind(TerrainKind::Dirt, position);
        cell.nutrients = NutrientStore::new(0.0, water, dirt);
        cell
    }

    pub fn rock(position: IVec2) -> Self {
        Self::with_kind(TerrainKind::Rock, position)
    }

    pub fn water(position: IVec2, water: f32) -> Self {
        let mut cell = Self::with_kind(TerrainKind::Water, position);
        cell.nutrients.water = water;
        cell
    }

    pub fn plant_tissue(position: IVec2) -> Self {
        Self::with_kind(TerrainKind::PlantTissue, position)
    }

    pub fn seed(position: IVec2) -> Self {
        Self::with_kind(TerrainKind::Seed, position)
    }

    pub fn with_surface(mut self, surface: bool) -> Self {
        self.surface = surface;
        self
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Linked to a root life square of any organism
    pub fn is_rooted(&self) -> bool {
        matches!(
            self.link,
            Some(LifeLink {
                kind: LifeSquareKind::Root,
                ..
            })
        )
    }

    /// Solid cell carrying dirt nutrients a root could draw on
    pub fn is_nutrient_bearing(&self) -> bool {
        self.solid && self.nutrients.dirt > 0.0
    }

    /// Counts toward a fully blocked wind square
    pub fn blocks_wind(&self) -> bool {
        !self.surface && self.collidable && self.solid
    }
}
