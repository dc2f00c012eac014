//! Block, terrain, and ground decoration types.

use archipelago_common::{IslandCoord, LocalColumn, BLOCK_HEIGHT, BLOCK_SIZE};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::pool::{InstanceId, PoolKey};

/// Number of visual height-level variant sets per terrain type.
pub const HEIGHT_LEVELS: u8 = 5;

/// Height level whose variant set carries snow caps.
pub const SNOW_HEIGHT_LEVEL: u8 = HEIGHT_LEVELS - 1;

/// Terrain type of a column or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    /// Fertile ground
    Grass,
    /// Bare soil
    Mud,
    /// Rock
    Stone,
    /// Molten rock
    Lava,
    /// User-placed block drawn from the custom template list
    Custom(u16),
}

impl TerrainType {
    /// All procedurally generated terrain types.
    pub const NATIVE: [Self; 4] = [Self::Grass, Self::Mud, Self::Stone, Self::Lava];

    /// Whether this is one of the generated terrain types.
    #[must_use]
    pub const fn is_native(self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Surface color used for minimaps (R, G, B).
    #[must_use]
    pub const fn color(self) -> [u8; 3] {
        match self {
            Self::Grass => [86, 152, 60],
            Self::Mud => [120, 84, 52],
            Self::Stone => [128, 128, 128],
            Self::Lava => [226, 88, 34],
            Self::Custom(_) => [200, 190, 160],
        }
    }

    /// Movement speed multiplier when walking on this terrain.
    #[must_use]
    pub const fn speed_multiplier(self) -> f32 {
        match self {
            Self::Grass | Self::Stone | Self::Custom(_) => 1.0,
            Self::Mud => 0.7,
            Self::Lava => 0.5,
        }
    }

    /// Ground friction coefficient.
    #[must_use]
    pub const fn friction(self) -> f32 {
        match self {
            Self::Grass => 0.8,
            Self::Mud => 1.0,
            Self::Stone => 0.6,
            Self::Lava => 0.9,
            Self::Custom(_) => 0.7,
        }
    }
}

/// Quantized block orientation (90° steps around the vertical axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// 0°
    #[default]
    North,
    /// 90°
    East,
    /// 180°
    South,
    /// 270°
    West,
}

impl Rotation {
    /// Creates a rotation from a number of quarter turns.
    #[must_use]
    pub const fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            _ => Self::West,
        }
    }

    /// Quantizes an angle in degrees to the nearest quarter turn.
    #[must_use]
    pub fn from_degrees(degrees: f32) -> Self {
        let turns = (degrees / 90.0).round().rem_euclid(4.0) as u8;
        Self::from_quarter_turns(turns)
    }

    /// Angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> f32 {
        match self {
            Self::North => 0.0,
            Self::East => 90.0,
            Self::South => 180.0,
            Self::West => 270.0,
        }
    }
}

/// World-space placement of a stack entry.
#[must_use]
pub fn block_placement(island: IslandCoord, local: LocalColumn, stack_index: u16) -> Vec3 {
    let column = island.column(local);
    Vec3::new(
        column.x as f32 * BLOCK_SIZE,
        f32::from(stack_index) * BLOCK_HEIGHT,
        column.z as f32 * BLOCK_SIZE,
    )
}

/// One block in a column stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    /// Terrain type (custom blocks carry their template id)
    pub terrain: TerrainType,
    /// Visual variant set, 0 to HEIGHT_LEVELS-1
    pub height_level: u8,
    /// Height ordinal in the column, 0 is bedrock
    pub stack_index: u16,
    /// World-space placement
    pub placement: Vec3,
    /// Orientation
    pub rotation: Rotation,
    /// Appearance value 0-99, picks the pooled variant
    pub appearance: u8,
    /// Always materialize regardless of occlusion
    pub force_visible: bool,
    /// Active visual instance, present only while materialized
    #[serde(skip)]
    pub(crate) visual: Option<InstanceId>,
}

impl BlockInstance {
    /// Creates a block without a visual instance.
    #[must_use]
    pub fn new(
        terrain: TerrainType,
        height_level: u8,
        stack_index: u16,
        placement: Vec3,
        rotation: Rotation,
        appearance: u8,
    ) -> Self {
        Self {
            terrain,
            height_level: height_level.min(HEIGHT_LEVELS - 1),
            stack_index,
            placement,
            rotation,
            appearance: appearance % 100,
            force_visible: false,
            visual: None,
        }
    }

    /// Pool category this block draws its visual from.
    #[must_use]
    pub const fn pool_key(&self) -> PoolKey {
        match self.terrain {
            TerrainType::Custom(id) => PoolKey::Custom(id),
            terrain => PoolKey::Block {
                terrain,
                height_level: self.height_level,
            },
        }
    }

    /// Active visual instance, if materialized.
    #[must_use]
    pub const fn visual(&self) -> Option<InstanceId> {
        self.visual
    }

    /// Whether the block currently has a visual instance.
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        self.visual.is_some()
    }

    /// Copy of the block data without the visual handle.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            visual: None,
            ..self.clone()
        }
    }
}

/// Ground decoration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecorationKind {
    /// Tree
    Tree,
    /// Boulder
    Rock,
    /// Shrub
    Bush,
    /// Flowers
    Flower,
    /// Tall grass
    Tuft,
    /// Mushrooms
    Mushroom,
}

impl DecorationKind {
    /// All decoration categories.
    pub const ALL: [Self; 6] = [
        Self::Tree,
        Self::Rock,
        Self::Bush,
        Self::Flower,
        Self::Tuft,
        Self::Mushroom,
    ];

    /// Picks a category from a 0-1 mask value.
    #[must_use]
    pub fn from_unit(value: f32) -> Self {
        let index = ((value.clamp(0.0, 1.0) * Self::ALL.len() as f32) as usize)
            .min(Self::ALL.len() - 1);
        Self::ALL[index]
    }

    /// Whether the decoration blocks movement through its column.
    #[must_use]
    pub const fn blocks_movement(self) -> bool {
        matches!(self, Self::Tree | Self::Rock)
    }
}

/// Ground decoration sitting on top of a column.
#[derive(Debug, Clone, PartialEq)]
pub struct PropInstance {
    /// Decoration category
    pub kind: DecorationKind,
    /// Visual variant set
    pub height_level: u8,
    /// Orientation
    pub rotation: Rotation,
    /// Style index the decoration was generated with
    pub style: u8,
    /// Appearance value 0-99
    pub appearance: u8,
    /// Owning column
    pub column: LocalColumn,
    /// Owning island
    pub island: IslandCoord,
    /// Stack index of the block it rests on
    pub stack_index: u16,
    pub(crate) visual: Option<InstanceId>,
}

impl PropInstance {
    /// Pool category this decoration draws its visual from.
    #[must_use]
    pub const fn pool_key(&self) -> PoolKey {
        PoolKey::Decoration {
            kind: self.kind,
            style: self.style,
        }
    }

    /// World-space placement (on top of the supporting block).
    #[must_use]
    pub fn placement(&self) -> Vec3 {
        block_placement(self.island, self.column, self.stack_index + 1)
    }

    /// Active visual instance, if materialized.
    #[must_use]
    pub const fn visual(&self) -> Option<InstanceId> {
        self.visual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_quantization() {
        assert_eq!(Rotation::from_degrees(0.0), Rotation::North);
        assert_eq!(Rotation::from_degrees(95.0), Rotation::East);
        assert_eq!(Rotation::from_degrees(-90.0), Rotation::West);
        assert_eq!(Rotation::from_degrees(540.0), Rotation::South);
        assert_eq!(Rotation::from_quarter_turns(7), Rotation::West);
    }

    #[test]
    fn test_pool_key_for_custom_block() {
        let block = BlockInstance::new(
            TerrainType::Custom(3),
            2,
            4,
            Vec3::ZERO,
            Rotation::North,
            42,
        );
        assert_eq!(block.pool_key(), PoolKey::Custom(3));

        let grass = BlockInstance::new(TerrainType::Grass, 9, 0, Vec3::ZERO, Rotation::East, 150);
        assert_eq!(
            grass.pool_key(),
            PoolKey::Block {
                terrain: TerrainType::Grass,
                height_level: HEIGHT_LEVELS - 1
            }
        );
        assert_eq!(grass.appearance, 50);
    }

    #[test]
    fn test_decoration_from_unit() {
        assert_eq!(DecorationKind::from_unit(0.0), DecorationKind::Tree);
        assert_eq!(DecorationKind::from_unit(1.0), DecorationKind::Mushroom);
        assert!(DecorationKind::Rock.blocks_movement());
        assert!(!DecorationKind::Flower.blocks_movement());
    }

    #[test]
    fn test_block_placement() {
        let pos = block_placement(IslandCoord::new(1, -1), LocalColumn::new(5, 10), 3);
        assert_eq!(pos, Vec3::new(205.0, 3.0, -190.0));
    }
}
