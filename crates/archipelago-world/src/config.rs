//! Engine configuration.
//!
//! Streaming, generation and pool parameters, loaded from and saved to an
//! `archipelago.toml` file.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::generation::BlendSettings;
use crate::mask::{MaskResult, MaskSampler};
use crate::pool::PoolConfig;
use crate::streaming::{
    DEFAULT_LOAD_BUDGET, DEFAULT_SIGHT_RADIUS, MAX_LOAD_BUDGET, MAX_SIGHT_RADIUS, MIN_LOAD_BUDGET,
    MIN_SIGHT_RADIUS,
};
use crate::style::{default_styles, Style, StyleTable, MAX_MOUNTAIN_HEIGHT};

/// Configuration file name.
pub const CONFIG_FILE: &str = "archipelago.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === World Settings ===
    /// World seed (None = random)
    pub world_seed: Option<u64>,
    /// Derive styles per cell from the world-map mask
    pub world_map_mode: bool,
    /// Where `save_world` writes by default
    pub save_path: PathBuf,

    // === Streaming Settings ===
    /// Sight radius in columns (5-50)
    pub sight_radius: u32,
    /// Column loads per tick (10-100)
    pub load_budget: usize,

    // === Mask Settings ===
    /// Primary mask image (None = procedural)
    pub primary_mask: Option<PathBuf>,
    /// Secondary mask image (None = procedural)
    pub secondary_mask: Option<PathBuf>,
    /// World-map mask image
    pub world_map_mask: Option<PathBuf>,
    /// Noise seed for procedural masks
    pub mask_seed: u32,
    /// Edge length of procedural masks in pixels
    pub mask_size: u32,

    // === Tables ===
    /// Terrain styles indexed by the seed's style digit
    pub styles: Vec<Style>,
    /// Pool template counts
    pub pool: PoolConfig,
    /// Border blending
    pub blend: BlendSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_seed: None,
            world_map_mode: false,
            save_path: PathBuf::from("saves/world.json"),

            sight_radius: DEFAULT_SIGHT_RADIUS,
            load_budget: DEFAULT_LOAD_BUDGET,

            primary_mask: None,
            secondary_mask: None,
            world_map_mask: None,
            mask_seed: 1,
            mask_size: 512,

            styles: default_styles(),
            pool: PoolConfig::default(),
            blend: BlendSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `archipelago.toml` in the working directory.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut config) => {
                        config.validate();
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.sight_radius = self.sight_radius.clamp(MIN_SIGHT_RADIUS, MAX_SIGHT_RADIUS);
        self.load_budget = self.load_budget.clamp(MIN_LOAD_BUDGET, MAX_LOAD_BUDGET);
        self.mask_size = self.mask_size.clamp(16, 4096);
        self.blend.band = self.blend.band.clamp(1, 50);
        self.blend.edge_weight = self.blend.edge_weight.clamp(0.0, 1.0);
        self.blend.copy_threshold = self.blend.copy_threshold.clamp(0.0, 1.0);
        if self.styles.is_empty() {
            warn!("No styles configured, using presets");
            self.styles = default_styles();
        }
        for style in &mut self.styles {
            style.max_level = style.max_level.clamp(-1, 4);
            style.mountain_height = style.mountain_height.min(MAX_MOUNTAIN_HEIGHT);
        }
    }

    /// Style table built from the configured styles.
    #[must_use]
    pub fn style_table(&self) -> StyleTable {
        StyleTable::new(self.styles.clone())
    }

    /// Loads the configured mask images, or synthesizes masks when no
    /// image paths are set.
    pub fn masks(&self) -> MaskResult<MaskSampler> {
        match (&self.primary_mask, &self.secondary_mask) {
            (Some(primary), Some(secondary)) => {
                MaskSampler::from_paths(primary, secondary, self.world_map_mask.as_deref())
            },
            _ => {
                if self.primary_mask.is_some() || self.secondary_mask.is_some() {
                    warn!("Both primary and secondary masks are required, using procedural masks");
                }
                Ok(MaskSampler::procedural(self.mask_seed, self.mask_size))
            },
        }
    }
}
