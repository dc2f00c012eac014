//! World save files.
//!
//! A save stores only what cannot be regenerated: every island's coordinate,
//! seed string and modification log, plus the observer. Column data is
//! rebuilt from the seed on load, so file size grows with the number of
//! edits rather than with explored area.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use archipelago_common::{IslandCoord, SchemaVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::edit::ModificationRecord;
use crate::island::Island;
use crate::seed::IslandSeed;
use crate::world::{Observer, World};

/// Errors that can occur while saving or loading a world.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error, including malformed seeds.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Save written by an incompatible schema.
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build reads.
        expected: SchemaVersion,
        /// Version in the file.
        found: SchemaVersion,
    },

    /// Two records for the same island.
    #[error("Duplicate island ({}, {}) in save", .0.x, .0.y)]
    DuplicateIsland(IslandCoord),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Persisted form of one island.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IslandRecord {
    /// Island coordinate
    pub coord: IslandCoord,
    /// Seed string
    pub seed: IslandSeed,
    /// Edit log in application order
    pub modifications: Vec<ModificationRecord>,
}

impl IslandRecord {
    /// Rebuilds an ungenerated island from the record.
    #[must_use]
    pub fn into_island(self) -> Island {
        Island::with_modifications(self.coord, self.seed, self.modifications)
    }
}

/// Complete save file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSave {
    /// Schema version
    pub version: SchemaVersion,
    /// Seed new islands are drawn from
    pub world_seed: u64,
    /// Observer position and heading
    pub observer: Observer,
    /// Every island ever created, sorted by coordinate
    pub islands: Vec<IslandRecord>,
}

impl WorldSave {
    /// Captures every island record of a world, loaded or not.
    #[must_use]
    pub fn capture(world: &World) -> Self {
        let mut islands: Vec<IslandRecord> = world
            .islands()
            .map(|island| IslandRecord {
                coord: island.coord(),
                seed: *island.seed(),
                modifications: island.modifications().to_vec(),
            })
            .collect();
        islands.sort_by_key(|r| (r.coord.x, r.coord.y));

        Self {
            version: SchemaVersion::WORLD_SAVE,
            world_seed: world.world_seed(),
            observer: *world.observer(),
            islands,
        }
    }

    /// Total number of modification records.
    #[must_use]
    pub fn modification_count(&self) -> usize {
        self.islands.iter().map(|r| r.modifications.len()).sum()
    }

    /// Writes the save atomically (temp file + rename).
    pub fn write_to(&self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");

        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            writer.flush()?;
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PersistenceError::Io(e)
        })?;

        info!(
            "Saved {} islands ({} edits) to {}",
            self.islands.len(),
            self.modification_count(),
            path.display()
        );
        Ok(())
    }

    /// Reads and validates a save file.
    pub fn read_from(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let save: Self = serde_json::from_reader(reader)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;

        if !SchemaVersion::WORLD_SAVE.can_read(&save.version) {
            return Err(PersistenceError::VersionMismatch {
                expected: SchemaVersion::WORLD_SAVE,
                found: save.version,
            });
        }

        let mut seen = ahash::AHashSet::new();
        for record in &save.islands {
            if !seen.insert(record.coord) {
                return Err(PersistenceError::DuplicateIsland(record.coord));
            }
        }

        debug!("Read save {} with {} islands", path.display(), save.islands.len());
        Ok(save)
    }
}
