//! Coordinate types for world positions, islands, and columns.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Width and depth of an island, in columns.
pub const ISLAND_SIZE: u32 = 200;

/// Horizontal size of one column in world units.
pub const BLOCK_SIZE: f32 = 1.0;

/// Vertical size of one stack entry in world units.
pub const BLOCK_HEIGHT: f32 = 1.0;

/// Global column coordinate (one unit per column, across all islands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct WorldColumn {
    /// X coordinate in column space
    pub x: i64,
    /// Z coordinate in column space
    pub z: i64,
}

impl WorldColumn {
    /// Creates a new global column coordinate.
    #[must_use]
    pub const fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }

    /// Returns the column under a world-space position.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            x: (position.x / BLOCK_SIZE).floor() as i64,
            z: (position.z / BLOCK_SIZE).floor() as i64,
        }
    }

    /// Returns the island owning this column.
    #[must_use]
    pub const fn to_island_coord(self) -> IslandCoord {
        let size = ISLAND_SIZE as i64;
        IslandCoord {
            x: self.x.div_euclid(size) as i32,
            y: self.z.div_euclid(size) as i32,
        }
    }

    /// Returns the column's position inside its island.
    #[must_use]
    pub const fn to_local(self) -> LocalColumn {
        let size = ISLAND_SIZE as i64;
        LocalColumn {
            x: self.x.rem_euclid(size) as u16,
            z: self.z.rem_euclid(size) as u16,
        }
    }

    /// Chebyshev distance to another column.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u64 {
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        if dx > dz {
            dx
        } else {
            dz
        }
    }
}

/// Island coordinate (identifies an island in the sparse world map).
///
/// `y` runs along the world Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct IslandCoord {
    /// X coordinate in island space
    pub x: i32,
    /// Y coordinate in island space
    pub y: i32,
}

impl IslandCoord {
    /// Creates a new island coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the island under a world-space position.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        WorldColumn::from_position(position).to_island_coord()
    }

    /// Global column of a local column of this island.
    #[must_use]
    pub const fn column(self, local: LocalColumn) -> WorldColumn {
        let size = ISLAND_SIZE as i64;
        WorldColumn {
            x: (self.x as i64) * size + local.x as i64,
            z: (self.y as i64) * size + local.z as i64,
        }
    }

    /// Neighbour offset by whole islands.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The 3×3 neighbourhood centred on this island, centre first.
    #[must_use]
    pub fn neighbourhood(self) -> [Self; 9] {
        [
            self,
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(0, -1),
            self.offset(-1, -1),
            self.offset(1, -1),
            self.offset(-1, 1),
            self.offset(1, 1),
        ]
    }

    /// Whether `other` lies in the 3×3 neighbourhood of this island.
    #[must_use]
    pub const fn is_adjacent_or_same(self, other: Self) -> bool {
        (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }
}

/// Column position inside an island (0 to ISLAND_SIZE-1 on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct LocalColumn {
    /// X coordinate within the island
    pub x: u16,
    /// Z coordinate within the island
    pub z: u16,
}

impl LocalColumn {
    /// Creates a new local column coordinate.
    #[must_use]
    pub const fn new(x: u16, z: u16) -> Self {
        Self { x, z }
    }

    /// Whether the coordinate lies inside an island grid.
    #[must_use]
    pub const fn in_bounds(self) -> bool {
        (self.x as u32) < ISLAND_SIZE && (self.z as u32) < ISLAND_SIZE
    }

    /// Converts to linear index for grid access (row-major by z).
    #[must_use]
    pub const fn to_index(self) -> usize {
        (self.z as usize) * (ISLAND_SIZE as usize) + (self.x as usize)
    }

    /// Creates from a linear grid index.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        let size = ISLAND_SIZE as usize;
        Self {
            x: (index % size) as u16,
            z: (index / size) as u16,
        }
    }

    /// Distance to the nearest island edge, in columns.
    #[must_use]
    pub const fn edge_distance(self) -> u16 {
        let max = (ISLAND_SIZE - 1) as u16;
        let dx = if self.x < max - self.x { self.x } else { max - self.x };
        let dz = if self.z < max - self.z { self.z } else { max - self.z };
        if dx < dz {
            dx
        } else {
            dz
        }
    }
}
