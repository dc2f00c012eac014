//! Modification log records.
//!
//! Runtime edits are stored as an append-only list of records per island.
//! The log plus the island seed is all that is needed to rebuild the edited
//! island, so it is the only world state written to save files.

use archipelago_common::LocalColumn;
use serde::{Deserialize, Serialize};

use crate::block::{BlockInstance, Rotation, TerrainType};

/// Kind of edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOp {
    /// A block was placed
    Add,
    /// The blocks at a stack index were removed
    Remove,
}

/// One entry of an island's modification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationRecord {
    /// Column the edit applies to
    pub column: LocalColumn,
    /// Operation
    pub op: EditOp,
    /// Terrain type of the placed block (custom id included)
    pub terrain: TerrainType,
    /// Height-level variant set of the placed block
    pub height_level: u8,
    /// Orientation of the placed block
    pub rotation: Rotation,
    /// Stack index the edit targeted
    pub stack_index: u16,
    /// Literal world y of the block at add time
    pub y: f32,
}

impl ModificationRecord {
    /// Record for a placed block.
    #[must_use]
    pub fn add(column: LocalColumn, block: &BlockInstance) -> Self {
        Self {
            column,
            op: EditOp::Add,
            terrain: block.terrain,
            height_level: block.height_level,
            rotation: block.rotation,
            stack_index: block.stack_index,
            y: block.placement.y,
        }
    }

    /// Record for a removal at a stack index.
    #[must_use]
    pub fn remove(column: LocalColumn, block: &BlockInstance) -> Self {
        Self {
            op: EditOp::Remove,
            ..Self::add(column, block)
        }
    }
}
