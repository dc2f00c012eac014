//! Error types shared across Archipelago crates.

use thiserror::Error;

use crate::coords::{IslandCoord, LocalColumn};

/// World and island errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// No island record exists at the coordinate
    #[error("Island not found at ({}, {})", .0.x, .0.y)]
    IslandNotFound(IslandCoord),

    /// The island exists but its column grid is not generated
    #[error("Island at ({}, {}) is not loaded", .0.x, .0.y)]
    IslandNotLoaded(IslandCoord),

    /// Column coordinate outside the island grid
    #[error("Column ({}, {}) is outside the island grid", .0.x, .0.z)]
    ColumnOutOfBounds(LocalColumn),

    /// Stack index has no block in the column
    #[error("No block at stack index {index} in column ({}, {})", column.x, column.z)]
    NoBlockAtIndex {
        /// Column that was queried
        column: LocalColumn,
        /// Requested stack index
        index: u16,
    },
}

/// Result type alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
