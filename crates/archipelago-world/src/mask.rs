//! Seed map sampling.
//!
//! Terrain is derived from a few fixed reference images rather than from live
//! noise. Lookups are by integer pixel coordinate and wrap around the image,
//! so any seed offset is valid.

use std::path::Path;

use image::{Rgba, RgbaImage};
use noise::{NoiseFn, Perlin};
use thiserror::Error;
use tracing::info;

/// Mask loading errors.
#[derive(Debug, Error)]
pub enum MaskError {
    /// The image could not be opened or decoded
    #[error("Failed to load mask {path}: {source}")]
    Load {
        /// File that failed
        path: String,
        /// Decoder error
        source: image::ImageError,
    },
    /// Zero-sized image
    #[error("Mask has zero size")]
    Empty,
}

/// Result type for mask operations.
pub type MaskResult<T> = Result<T, MaskError>;

/// Normalized channel values of one mask pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskSample {
    /// Red channel, 0-1
    pub r: f32,
    /// Green channel, 0-1
    pub g: f32,
    /// Blue channel, 0-1
    pub b: f32,
    /// Alpha channel, 0-1
    pub a: f32,
}

impl From<Rgba<u8>> for MaskSample {
    fn from(pixel: Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
            a: f32::from(a) / 255.0,
        }
    }
}

/// One fixed color buffer.
#[derive(Debug, Clone)]
pub struct SeedMap {
    image: RgbaImage,
}

impl SeedMap {
    /// Wraps an existing RGBA buffer.
    pub fn from_image(image: RgbaImage) -> MaskResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MaskError::Empty);
        }
        Ok(Self { image })
    }

    /// Loads a mask from an image file.
    pub fn from_path(path: impl AsRef<Path>) -> MaskResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| MaskError::Load {
                path: path.display().to_string(),
                source,
            })?
            .to_rgba8();
        info!(
            "Loaded mask {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Self::from_image(image)
    }

    /// Single-color mask.
    #[must_use]
    pub fn uniform(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), Rgba(color)),
        }
    }

    /// Synthesizes a mask from Perlin noise, one noise field per channel.
    #[must_use]
    pub fn procedural(seed: u32, size: u32, scale: f64) -> Self {
        let size = size.max(1);
        let fields: [Perlin; 4] = [
            Perlin::new(seed),
            Perlin::new(seed.wrapping_add(1)),
            Perlin::new(seed.wrapping_add(2)),
            Perlin::new(seed.wrapping_add(3)),
        ];
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let point = [f64::from(x) / scale, f64::from(y) / scale];
            let mut pixel = [0u8; 4];
            for (channel, field) in pixel.iter_mut().zip(&fields) {
                let value = (field.get(point) + 1.0) * 0.5;
                *channel = (value.clamp(0.0, 1.0) * 255.0) as u8;
            }
            Rgba(pixel)
        });
        Self { image }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Samples a pixel, wrapping coordinates around the image.
    #[must_use]
    pub fn sample(&self, x: i64, y: i64) -> MaskSample {
        let px = x.rem_euclid(i64::from(self.image.width())) as u32;
        let py = y.rem_euclid(i64::from(self.image.height())) as u32;
        MaskSample::from(*self.image.get_pixel(px, py))
    }
}

/// The set of seed maps used by island generation.
#[derive(Debug, Clone)]
pub struct MaskSampler {
    /// Terrain type and elevation source
    pub primary: SeedMap,
    /// Decoration source
    pub secondary: SeedMap,
    /// Coarse per-cell style source for world-map mode
    pub world_map: Option<SeedMap>,
}

/// Pixels of world per world-map pixel.
pub const WORLD_MAP_SCALE: i64 = 16;

impl MaskSampler {
    /// Creates a sampler from primary and secondary maps.
    #[must_use]
    pub fn new(primary: SeedMap, secondary: SeedMap) -> Self {
        Self {
            primary,
            secondary,
            world_map: None,
        }
    }

    /// Adds a world-map mask.
    #[must_use]
    pub fn with_world_map(mut self, world_map: SeedMap) -> Self {
        self.world_map = Some(world_map);
        self
    }

    /// Loads the masks from image files.
    pub fn from_paths(
        primary: impl AsRef<Path>,
        secondary: impl AsRef<Path>,
        world_map: Option<&Path>,
    ) -> MaskResult<Self> {
        let sampler = Self::new(SeedMap::from_path(primary)?, SeedMap::from_path(secondary)?);
        match world_map {
            Some(path) => Ok(sampler.with_world_map(SeedMap::from_path(path)?)),
            None => Ok(sampler),
        }
    }

    /// Uniform masks: everything fertile and flat, no decorations.
    #[must_use]
    pub fn flat() -> Self {
        Self::new(
            SeedMap::uniform(4, 4, [255, 255, 255, 255]),
            SeedMap::uniform(4, 4, [0, 0, 0, 255]),
        )
    }

    /// Noise-synthesized masks for worlds without image assets.
    #[must_use]
    pub fn procedural(seed: u32, size: u32) -> Self {
        Self::new(
            SeedMap::procedural(seed, size, 24.0),
            SeedMap::procedural(seed.wrapping_add(17), size, 6.0),
        )
        .with_world_map(SeedMap::procedural(seed.wrapping_add(31), (size / 8).max(4), 4.0))
    }

    /// Samples the primary mask.
    #[must_use]
    pub fn primary(&self, x: i64, y: i64) -> MaskSample {
        self.primary.sample(x, y)
    }

    /// Samples the secondary mask.
    #[must_use]
    pub fn secondary(&self, x: i64, y: i64) -> MaskSample {
        self.secondary.sample(x, y)
    }

    /// Samples the world map at a global column, if one is configured.
    #[must_use]
    pub fn world_map(&self, column_x: i64, column_z: i64) -> Option<MaskSample> {
        self.world_map.as_ref().map(|map| {
            map.sample(
                column_x.div_euclid(WORLD_MAP_SCALE),
                column_z.div_euclid(WORLD_MAP_SCALE),
            )
        })
    }
}
