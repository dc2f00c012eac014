//! Column data structure.

use archipelago_common::{LocalColumn, BLOCK_HEIGHT};

use crate::block::{BlockInstance, PropInstance, TerrainType};

/// One (x, z) cell of an island holding a vertical block stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Position inside the island
    pub local: LocalColumn,
    /// Terrain type derived at generation time
    pub terrain: TerrainType,
    /// Elevation level, -1 is underwater
    pub level: i8,
    /// Mountain column
    pub mountain: bool,
    /// Whether characters can stand here
    pub walkable: bool,
    /// Style index the column was generated with
    pub style: u8,
    pub(crate) loaded: bool,
    pub(crate) stack: Vec<BlockInstance>,
    pub(crate) decoration: Option<PropInstance>,
    top_index: u16,
}

impl Column {
    /// Creates a column holding a single bedrock block.
    #[must_use]
    pub fn new(
        local: LocalColumn,
        terrain: TerrainType,
        level: i8,
        bedrock: BlockInstance,
    ) -> Self {
        let top_index = bedrock.stack_index;
        Self {
            local,
            terrain,
            level,
            mountain: false,
            walkable: true,
            style: 0,
            loaded: false,
            stack: vec![bedrock],
            decoration: None,
            top_index,
        }
    }

    /// Creates a column from a prebuilt stack (must not be empty).
    pub(crate) fn with_stack(
        local: LocalColumn,
        terrain: TerrainType,
        level: i8,
        stack: Vec<BlockInstance>,
    ) -> Self {
        let mut column = Self {
            local,
            terrain,
            level,
            mountain: false,
            walkable: true,
            style: 0,
            loaded: false,
            stack,
            decoration: None,
            top_index: 0,
        };
        column.sort_stack();
        column.recompute_top();
        column
    }

    /// Whether the column's visuals are in the scene.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Blocks ordered by stack index.
    #[must_use]
    pub fn blocks(&self) -> &[BlockInstance] {
        &self.stack
    }

    /// Ground decoration, if any.
    #[must_use]
    pub const fn decoration(&self) -> Option<&PropInstance> {
        self.decoration.as_ref()
    }

    /// Cached highest stack index.
    #[must_use]
    pub const fn top_index(&self) -> u16 {
        self.top_index
    }

    /// Topmost block, defining the walkable surface.
    #[must_use]
    pub fn top(&self) -> Option<&BlockInstance> {
        self.stack.last()
    }

    /// World-space height of the walkable surface.
    #[must_use]
    pub fn surface_height(&self) -> f32 {
        (f32::from(self.top_index) + 1.0) * BLOCK_HEIGHT
    }

    /// First block at a stack index.
    #[must_use]
    pub fn block_at(&self, stack_index: u16) -> Option<&BlockInstance> {
        self.stack.iter().find(|b| b.stack_index == stack_index)
    }

    /// Whether any block occupies the stack index.
    #[must_use]
    pub fn has_index(&self, stack_index: u16) -> bool {
        self.stack.iter().any(|b| b.stack_index == stack_index)
    }

    pub(crate) fn sort_stack(&mut self) {
        self.stack.sort_by_key(|b| b.stack_index);
    }

    pub(crate) fn recompute_top(&mut self) {
        self.top_index = self.stack.last().map_or(0, |b| b.stack_index);
    }

    /// Marks the topmost native block as always visible.
    pub(crate) fn force_top_native_visible(&mut self) {
        if let Some(block) = self.stack.iter_mut().rev().find(|b| b.terrain.is_native()) {
            block.force_visible = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Rotation;
    use glam::Vec3;

    fn block(terrain: TerrainType, index: u16) -> BlockInstance {
        BlockInstance::new(terrain, 0, index, Vec3::ZERO, Rotation::North, 0)
    }

    #[test]
    fn test_stack_sorted_and_top_cached() {
        let column = Column::with_stack(
            LocalColumn::new(1, 1),
            TerrainType::Grass,
            1,
            vec![
                block(TerrainType::Grass, 2),
                block(TerrainType::Stone, 0),
                block(TerrainType::Mud, 1),
            ],
        );
        let indices: Vec<u16> = column.blocks().iter().map(|b| b.stack_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(column.top_index(), 2);
        assert_eq!(column.surface_height(), 3.0);
        assert_eq!(column.block_at(1).map(|b| b.terrain), Some(TerrainType::Mud));
    }

    #[test]
    fn test_force_visible_skips_custom_top() {
        let mut column = Column::with_stack(
            LocalColumn::new(0, 0),
            TerrainType::Grass,
            0,
            vec![block(TerrainType::Grass, 0), block(TerrainType::Custom(1), 1)],
        );
        column.force_top_native_visible();
        assert!(column.blocks()[0].force_visible);
        assert!(!column.blocks()[1].force_visible);
    }
}
