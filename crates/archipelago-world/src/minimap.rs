//! Minimap and heightmap baking.

use std::path::Path;

use archipelago_common::{IslandCoord, ISLAND_SIZE};
use image::{GrayImage, ImageResult, Luma, Rgba, RgbaImage};
use tracing::debug;

use crate::island::Island;

/// Minimap colour of submerged columns.
pub const WATER_COLOR: [u8; 3] = [48, 96, 200];

/// Heightmap intensity per stack index.
pub const HEIGHT_STEP: u32 = 16;

/// Top-down images of one island.
#[derive(Debug, Clone)]
pub struct IslandMaps {
    /// Colour of each column's top block
    pub minimap: RgbaImage,
    /// Top stack index of each column
    pub heightmap: GrayImage,
}

impl IslandMaps {
    /// Bakes both images from a generated island.
    ///
    /// Returns `None` if the island has no grid.
    #[must_use]
    pub fn bake(island: &Island) -> Option<Self> {
        let grid = island.grid()?;
        let mut minimap = RgbaImage::new(ISLAND_SIZE, ISLAND_SIZE);
        let mut heightmap = GrayImage::new(ISLAND_SIZE, ISLAND_SIZE);

        for column in grid.iter() {
            let x = u32::from(column.local.x);
            let z = u32::from(column.local.z);
            let [r, g, b] = match column.top() {
                _ if column.level < 0 && column.top_index() == 0 => WATER_COLOR,
                Some(block) => block.terrain.color(),
                None => [0, 0, 0],
            };
            minimap.put_pixel(x, z, Rgba([r, g, b, 255]));

            let height = (u32::from(column.top_index()) * HEIGHT_STEP).min(255) as u8;
            heightmap.put_pixel(x, z, Luma([height]));
        }

        debug!("Baked maps for island ({}, {})", island.coord().x, island.coord().y);
        Some(Self { minimap, heightmap })
    }

    /// Writes both images as PNG files into a directory.
    pub fn save_png(&self, dir: impl AsRef<Path>, coord: IslandCoord) -> ImageResult<()> {
        let dir = dir.as_ref();
        self.minimap
            .save(dir.join(format!("minimap_{}_{}.png", coord.x, coord.y)))?;
        self.heightmap
            .save(dir.join(format!("heightmap_{}_{}.png", coord.x, coord.y)))
    }
}
