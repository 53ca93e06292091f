//! Grid store - the authoritative tile matrix
//!
//! Tiles live behind `Arc`s so a replaced grid shares every untouched tile
//! with the grid it was derived from. Old snapshots stay valid for as long as
//! anything holds them.

mod generate;
mod land_value;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use land_value::{land_value, MAX_LAND_VALUE, MIN_LAND_VALUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    None,
    Road,
    Residential,
    Commercial,
    Industrial,
    Park,
    Farm,
    Defense,
    Port,
}

impl BuildingType {
    pub const ALL: [BuildingType; 9] = [
        BuildingType::None,
        BuildingType::Road,
        BuildingType::Residential,
        BuildingType::Commercial,
        BuildingType::Industrial,
        BuildingType::Park,
        BuildingType::Farm,
        BuildingType::Defense,
        BuildingType::Port,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BuildingType::None => "Empty",
            BuildingType::Road => "Road",
            BuildingType::Residential => "Residential",
            BuildingType::Commercial => "Commercial",
            BuildingType::Industrial => "Industrial",
            BuildingType::Park => "Park",
            BuildingType::Farm => "Farm",
            BuildingType::Defense => "Defense",
            BuildingType::Port => "Port",
        }
    }

    /// Anything that hostiles treat as a target.
    pub fn is_structure(self) -> bool {
        !matches!(self, BuildingType::None | BuildingType::Road)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    None,
    Water,
    Forest,
    Stone,
}

impl ResourceType {
    /// Water is terrain, not something an explorer can harvest.
    pub fn is_harvestable(self) -> bool {
        matches!(self, ResourceType::Forest | ResourceType::Stone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub building: BuildingType,
    pub resource: ResourceType,
    pub land_value: f64,
    pub level: u8,
    pub variant: f64,
    pub explored: bool,
}

impl Tile {
    pub fn is_water(&self) -> bool {
        self.resource == ResourceType::Water
    }

    pub fn has_building(&self) -> bool {
        self.building != BuildingType::None
    }
}

/// Partial tile update merged by [`Grid::replace_tile`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TilePatch {
    pub building: Option<BuildingType>,
    pub level: Option<u8>,
    pub land_value: Option<f64>,
    pub explored: Option<bool>,
}

impl TilePatch {
    pub fn building(mut self, building: BuildingType) -> Self {
        self.building = Some(building);
        self
    }

    pub fn level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn explored(mut self, explored: bool) -> Self {
        self.explored = Some(explored);
        self
    }

    fn apply(&self, tile: &Tile) -> Tile {
        let mut next = tile.clone();
        if let Some(building) = self.building {
            next.building = building;
        }
        if let Some(level) = self.level {
            next.level = level.clamp(1, MAX_LEVEL);
        }
        if let Some(value) = self.land_value {
            next.land_value = value;
        }
        if let Some(explored) = self.explored {
            next.explored = explored;
        }
        next
    }
}

pub const MAX_LEVEL: u8 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
    version: u64,
    tiles: Vec<Arc<Tile>>,
}

impl Grid {
    /// Builds the session grid: island mask, resource seeding, initial fog.
    pub fn generate(size: usize, seed: u64) -> Self {
        generate::generate(size, seed, generate::DEFAULT_REVEAL_RADIUS)
    }

    pub fn generate_with_reveal(size: usize, seed: u64, reveal_radius: f64) -> Self {
        generate::generate(size, seed, reveal_radius)
    }

    /// Wraps an explicit row-major tile list. Land values are recomputed.
    pub fn from_tiles(size: usize, tiles: Vec<Tile>) -> Option<Self> {
        if tiles.len() != size * size {
            return None;
        }
        let coords_match = tiles.iter().enumerate().all(|(index, tile)| {
            tile.x == (index % size) as i32 && tile.y == (index / size) as i32
        });
        if !coords_match {
            return None;
        }
        let mut grid = Self {
            size,
            version: 0,
            tiles: tiles.into_iter().map(Arc::new).collect(),
        };
        grid.recompute_all_land_values();
        Some(grid)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.size + x as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|index| self.tiles[index].as_ref())
    }

    /// Shared handle to a tile, for identity checks across grid versions.
    pub fn tile_handle(&self, x: i32, y: i32) -> Option<&Arc<Tile>> {
        self.index(x, y).map(|index| &self.tiles[index])
    }

    /// Row-major iteration (y outer, x inner).
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().map(|tile| tile.as_ref())
    }

    /// The up-to-eight tiles around (x, y), clipped at the edges.
    pub fn neighbors(&self, x: i32, y: i32) -> impl Iterator<Item = &Tile> {
        block(x, y, 1)
            .filter(move |&(nx, ny)| (nx, ny) != (x, y))
            .filter_map(move |(nx, ny)| self.get(nx, ny))
    }

    pub fn has_unexplored(&self) -> bool {
        self.tiles.iter().any(|tile| !tile.explored)
    }

    pub fn count_buildings(&self, building: BuildingType) -> usize {
        self.tiles
            .iter()
            .filter(|tile| tile.building == building)
            .count()
    }

    /// Returns a new grid with (x, y) merged with `patch`. Every other tile is
    /// shared with `self`. Out-of-bounds coordinates return an unchanged copy.
    pub fn replace_tile(&self, x: i32, y: i32, patch: TilePatch) -> Grid {
        let mut next = self.clone();
        if let Some(index) = self.index(x, y) {
            next.tiles[index] = Arc::new(patch.apply(&self.tiles[index]));
            next.version += 1;
        }
        next
    }

    /// Recomputes land value for the 3x3 block centred on (x, y). Tiles whose
    /// value is unchanged keep their existing allocation.
    pub fn with_land_values_around(mut self, x: i32, y: i32) -> Grid {
        for (bx, by) in block(x, y, 1) {
            let Some(index) = self.index(bx, by) else {
                continue;
            };
            let value = land_value(&self, bx, by);
            if self.tiles[index].land_value != value {
                let mut tile = self.tiles[index].as_ref().clone();
                tile.land_value = value;
                self.tiles[index] = Arc::new(tile);
            }
        }
        self
    }

    /// Marks every unexplored tile within `radius` (Chebyshev) of (cx, cy) as
    /// explored. Returns the new grid and the newly revealed tiles that carry
    /// a harvestable resource.
    pub fn reveal_area(&self, cx: i32, cy: i32, radius: i32) -> (Grid, Vec<Tile>) {
        let mut next = self.clone();
        let mut found = Vec::new();
        let mut changed = false;
        for (x, y) in block(cx, cy, radius) {
            let Some(index) = self.index(x, y) else {
                continue;
            };
            let tile = &self.tiles[index];
            if tile.explored {
                continue;
            }
            let revealed = TilePatch::default().explored(true).apply(tile);
            if revealed.resource.is_harvestable() {
                found.push(revealed.clone());
            }
            next.tiles[index] = Arc::new(revealed);
            changed = true;
        }
        if changed {
            next.version += 1;
        }
        (next, found)
    }

    fn recompute_all_land_values(&mut self) {
        let values: Vec<f64> = self
            .tiles
            .iter()
            .map(|tile| land_value(self, tile.x, tile.y))
            .collect();
        for (tile, value) in self.tiles.iter_mut().zip(values) {
            Arc::make_mut(tile).land_value = value;
        }
    }
}

/// Coordinates of the (2r+1)^2 square centred on (x, y), unclipped.
fn block(x: i32, y: i32, radius: i32) -> impl Iterator<Item = (i32, i32)> {
    (-radius..=radius).flat_map(move |dy| (-radius..=radius).map(move |dx| (x + dx, y + dy)))
}
