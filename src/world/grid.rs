use glam::IVec2;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::world::cell::{LifeLink, TerrainCell};

new_key_type! {
    /// Stable handle to a terrain cell; stale after the cell is removed.
    pub struct CellId;
}

/// Left, right, up, down (y grows downward)
pub const DIRECT_OFFSETS: [IVec2; 4] = [
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(0, -1),
    IVec2::new(0, 1),
];

pub const DIAGONAL_OFFSETS: [IVec2; 4] = [
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 1),
    IVec2::new(1, 1),
];

/// Terrain cells per coarse (atmosphere/wind) cell along each axis
pub const COARSE_FACTOR: i32 = 4;

/// Toroidal terrain storage.
///
/// Cells live in a generational slot map; each position keeps a small stack
/// of the cells stacked on it (at most one of them collidable).
#[derive(Debug, Clone)]
pub struct TerrainGrid {
    width: i32,
    height: i32,
    cells: SlotMap<CellId, TerrainCell>,
    columns: Vec<SmallVec<[CellId; 2]>>,
}

impl TerrainGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1) as i32;
        let height = height.max(1) as i32;
        Self {
            width,
            height,
            cells: SlotMap::with_key(),
            columns: vec![SmallVec::new(); (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn wrap(&self, pos: IVec2) -> IVec2 {
        IVec2::new(pos.x.rem_euclid(self.width), pos.y.rem_euclid(self.height))
    }

    fn index(&self, pos: IVec2) -> usize {
        let pos = self.wrap(pos);
        (pos.y * self.width + pos.x) as usize
    }

    /// Handles of every cell stacked at a position
    pub fn cells_at(&self, pos: IVec2) -> &[CellId] {
        &self.columns[self.index(pos)]
    }

    pub fn iter_at(&self, pos: IVec2) -> impl Iterator<Item = (CellId, &TerrainCell)> + '_ {
        self.cells_at(pos)
            .iter()
            .filter_map(move |id| self.cells.get(*id).map(|cell| (*id, cell)))
    }

    pub fn cell(&self, id: CellId) -> Option<&TerrainCell> {
        self.cells.get(id)
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut TerrainCell> {
        self.cells.get_mut(id)
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains_key(id)
    }

    pub fn collidable_at(&self, pos: IVec2) -> Option<CellId> {
        self.iter_at(pos)
            .find(|(_, cell)| cell.collidable)
            .map(|(id, _)| id)
    }

    pub fn neighbors_direct(&self, pos: IVec2) -> [IVec2; 4] {
        DIRECT_OFFSETS.map(|offset| self.wrap(pos + offset))
    }

    pub fn neighbors_diagonal(&self, pos: IVec2) -> [IVec2; 4] {
        DIAGONAL_OFFSETS.map(|offset| self.wrap(pos + offset))
    }

    /// Place a cell. Rejected when a collidable cell already occupies the
    /// position and the new cell is collidable too.
    pub fn insert(&mut self, mut cell: TerrainCell) -> Option<CellId> {
        cell.position = self.wrap(cell.position);
        if cell.collidable && self.collidable_at(cell.position).is_some() {
            return None;
        }
        cell.link = None;
        let index = self.index(cell.position);
        let id = self.cells.insert(cell);
        self.columns[index].push(id);
        Some(id)
    }

    /// Remove a cell, clearing its life square link on the way out.
    pub fn remove(&mut self, id: CellId) -> Option<TerrainCell> {
        let mut cell = self.cells.remove(id)?;
        let index = self.index(cell.position);
        self.columns[index].retain(|other| *other != id);
        cell.link = None;
        Some(cell)
    }

    /// Bind a life square to a cell; fails if the cell is gone or already linked.
    pub fn link(&mut self, id: CellId, link: LifeLink) -> bool {
        match self.cells.get_mut(id) {
            Some(cell) if cell.link.is_none() => {
                cell.link = Some(link);
                true
            }
            _ => false,
        }
    }

    pub fn unlink(&mut self, id: CellId) {
        if let Some(cell) = self.cells.get_mut(id) {
            cell.link = None;
        }
    }

    /// Any cell at the position carries a life square link
    pub fn is_occupied_by_life(&self, pos: IVec2) -> bool {
        self.iter_at(pos).any(|(_, cell)| cell.is_linked())
    }

    pub fn root_count_at(&self, pos: IVec2) -> usize {
        self.iter_at(pos).filter(|(_, cell)| cell.is_rooted()).count()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, &TerrainCell)> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CellId, &mut TerrainCell)> {
        self.cells.iter_mut()
    }
}

/// Shape of the quarter-resolution grid shared by atmosphere and wind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoarseLayout {
    pub width: i32,
    pub height: i32,
}

impl CoarseLayout {
    pub fn for_terrain(terrain_width: i32, terrain_height: i32) -> Self {
        Self {
            width: ((terrain_width + COARSE_FACTOR - 1) / COARSE_FACTOR).max(1),
            height: ((terrain_height + COARSE_FACTOR - 1) / COARSE_FACTOR).max(1),
        }
    }

    pub fn len(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn wrap(&self, pos: IVec2) -> IVec2 {
        IVec2::new(pos.x.rem_euclid(self.width), pos.y.rem_euclid(self.height))
    }

    pub fn index(&self, pos: IVec2) -> usize {
        let pos = self.wrap(pos);
        (pos.y * self.width + pos.x) as usize
    }

    pub fn position(&self, index: usize) -> IVec2 {
        let index = index as i32;
        IVec2::new(index % self.width, index / self.width)
    }

    /// Coarse cell covering a terrain position
    pub fn from_terrain(&self, terrain_pos: IVec2) -> IVec2 {
        self.wrap(IVec2::new(
            terrain_pos.x.div_euclid(COARSE_FACTOR),
            terrain_pos.y.div_euclid(COARSE_FACTOR),
        ))
    }

    pub fn direct(&self, pos: IVec2) -> [IVec2; 4] {
        DIRECT_OFFSETS.map(|offset| self.wrap(pos + offset))
    }

    pub fn diagonal(&self, pos: IVec2) -> [IVec2; 4] {
        DIAGONAL_OFFSETS.map(|offset| self.wrap(pos + offset))
    }

    pub fn is_boundary(&self, pos: IVec2) -> bool {
        pos.x == 0 || pos.y == 0 || pos.x == self.width - 1 || pos.y == self.height - 1
    }

    /// Row-major iteration order used by every coarse pass
    pub fn positions(&self) -> impl Iterator<Item = IVec2> {
        let width = self.width;
        (0..self.len()).map(move |i| IVec2::new(i as i32 % width, i as i32 / width))
    }
}
