//! # Archipelago Common
//!
//! Common types shared by the Archipelago crates:
//! - Coordinate types (world column, island, local column)
//! - World error types
//! - Version information for save schemas
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::version::*;
}

pub use prelude::*;
