//! # Archipelago World
//!
//! Island world engine for Archipelago.
//!
//! This crate handles:
//! - Procedural island generation from seed maps
//! - Column streaming around the observer
//! - Pooled visual instances with occlusion culling
//! - Diff-based world persistence

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod block;
pub mod column;
pub mod config;
pub mod edit;
pub mod engine;
pub mod generation;
pub mod island;
pub mod mask;
pub mod minimap;
pub mod persistence;
pub mod pool;
pub mod seed;
pub mod streaming;
pub mod style;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::block::*;
    pub use crate::column::*;
    pub use crate::config::*;
    pub use crate::edit::*;
    pub use crate::engine::*;
    pub use crate::generation::*;
    pub use crate::island::*;
    pub use crate::mask::*;
    pub use crate::minimap::*;
    pub use crate::persistence::*;
    pub use crate::pool::*;
    pub use crate::seed::*;
    pub use crate::streaming::*;
    pub use crate::style::*;
    pub use crate::world::*;
}

pub use prelude::*;
