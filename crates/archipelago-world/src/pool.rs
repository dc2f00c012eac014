//! Visual instance pool.
//!
//! Every materialized block or decoration borrows a visual instance from the
//! pool. Released instances are deactivated and kept on a per-category free
//! list so later acquisitions reuse them instead of spawning new ones.
//! Categories must be registered up front; acquiring from an unknown category
//! is a configuration error.

use ahash::AHashMap;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::block::{DecorationKind, Rotation, TerrainType, HEIGHT_LEVELS};

/// Pool errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// No category registered for the key
    #[error("Unknown pool category: {0:?}")]
    UnknownCategory(PoolKey),
    /// Custom block id beyond the configured template list
    #[error("Custom block id {id} out of range (have {count} templates)")]
    CustomIdOutOfRange {
        /// Requested id
        id: u16,
        /// Number of registered custom templates
        count: u16,
    },
    /// Handle does not refer to a spawned instance
    #[error("Invalid instance handle {0:?}")]
    InvalidHandle(InstanceId),
    /// Instance is already on its free list
    #[error("Instance {0:?} released twice")]
    AlreadyReleased(InstanceId),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Handle to a spawned visual instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Pool category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKey {
    /// Native terrain block at a height-level variant set
    Block {
        /// Terrain type (never `Custom`)
        terrain: TerrainType,
        /// Height-level variant set
        height_level: u8,
    },
    /// Custom block template
    Custom(u16),
    /// Ground decoration per style
    Decoration {
        /// Decoration category
        kind: DecorationKind,
        /// Style index
        style: u8,
    },
}

/// Template counts the pool categories are built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Visual variants per (terrain, height level) category
    pub block_variants: u16,
    /// Number of custom block templates
    pub custom_templates: u16,
    /// Visual variants per decoration category
    pub decoration_variants: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            block_variants: 4,
            custom_templates: 8,
            decoration_variants: 3,
        }
    }
}

/// A spawned visual instance.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualInstance {
    /// Category the instance belongs to
    pub key: PoolKey,
    /// Template variant it was spawned from
    pub variant: u16,
    /// Current world position
    pub position: Vec3,
    /// Current orientation
    pub rotation: Rotation,
    /// Whether the instance is in the scene
    pub active: bool,
}

/// Per-category counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryStats {
    /// Instances ever spawned
    pub spawned: usize,
    /// Instances currently acquired
    pub active: usize,
    /// Instances waiting on the free list
    pub free: usize,
}

#[derive(Debug)]
struct Category {
    variants: u16,
    free: Vec<InstanceId>,
    spawned: usize,
    active: usize,
}

impl Category {
    fn new(variants: u16) -> Self {
        Self {
            variants: variants.max(1),
            free: Vec::new(),
            spawned: 0,
            active: 0,
        }
    }
}

/// Free-list based instance pool.
#[derive(Debug)]
pub struct InstancePool {
    categories: AHashMap<PoolKey, Category>,
    instances: Vec<VisualInstance>,
    custom_templates: u16,
}

impl InstancePool {
    /// Builds every category from the configuration.
    #[must_use]
    pub fn new(config: &PoolConfig, style_count: usize) -> Self {
        let mut categories = AHashMap::new();
        for terrain in TerrainType::NATIVE {
            for height_level in 0..HEIGHT_LEVELS {
                categories.insert(
                    PoolKey::Block {
                        terrain,
                        height_level,
                    },
                    Category::new(config.block_variants),
                );
            }
        }
        for id in 0..config.custom_templates {
            categories.insert(PoolKey::Custom(id), Category::new(1));
        }
        for kind in DecorationKind::ALL {
            for style in 0..style_count.min(usize::from(u8::MAX)) {
                categories.insert(
                    PoolKey::Decoration {
                        kind,
                        style: style as u8,
                    },
                    Category::new(config.decoration_variants),
                );
            }
        }
        info!("Instance pool ready with {} categories", categories.len());

        Self {
            categories,
            instances: Vec::new(),
            custom_templates: config.custom_templates,
        }
    }

    /// Acquires an instance, reusing a released one when available.
    ///
    /// `appearance` picks the template variant when a new instance has to be
    /// spawned.
    pub fn acquire(
        &mut self,
        key: PoolKey,
        appearance: u8,
        position: Vec3,
        rotation: Rotation,
    ) -> PoolResult<InstanceId> {
        let Some(category) = self.categories.get_mut(&key) else {
            return Err(match key {
                PoolKey::Custom(id) => PoolError::CustomIdOutOfRange {
                    id,
                    count: self.custom_templates,
                },
                other => PoolError::UnknownCategory(other),
            });
        };

        category.active += 1;
        if let Some(id) = category.free.pop() {
            let instance = &mut self.instances[id.0 as usize];
            instance.position = position;
            instance.rotation = rotation;
            instance.active = true;
            return Ok(id);
        }

        let id = InstanceId(self.instances.len() as u32);
        category.spawned += 1;
        self.instances.push(VisualInstance {
            key,
            variant: u16::from(appearance) % category.variants,
            position,
            rotation,
            active: true,
        });
        debug!("Spawned instance {} for {key:?}", id.0);
        Ok(id)
    }

    /// Deactivates an instance and returns it to its category's free list.
    pub fn release(&mut self, id: InstanceId) -> PoolResult<()> {
        let instance = self
            .instances
            .get_mut(id.0 as usize)
            .ok_or(PoolError::InvalidHandle(id))?;
        if !instance.active {
            return Err(PoolError::AlreadyReleased(id));
        }
        let category = self
            .categories
            .get_mut(&instance.key)
            .ok_or(PoolError::UnknownCategory(instance.key))?;

        instance.active = false;
        category.active -= 1;
        category.free.push(id);
        Ok(())
    }

    /// Looks up a spawned instance.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&VisualInstance> {
        self.instances.get(id.0 as usize)
    }

    /// Counters for one category.
    #[must_use]
    pub fn stats(&self, key: PoolKey) -> Option<CategoryStats> {
        self.categories.get(&key).map(|c| CategoryStats {
            spawned: c.spawned,
            active: c.active,
            free: c.free.len(),
        })
    }

    /// Number of instances currently in the scene.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.categories.values().map(|c| c.active).sum()
    }

    /// Number of instances ever spawned.
    #[must_use]
    pub fn spawned_count(&self) -> usize {
        self.instances.len()
    }

    /// Whether a category is registered.
    #[must_use]
    pub fn has_category(&self, key: PoolKey) -> bool {
        self.categories.contains_key(&key)
    }
}
