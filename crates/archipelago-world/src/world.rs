//! World registry.
//!
//! Owns every island record ever created, the set of columns currently in the
//! scene, the observer, and the per-island minimap cache. Islands are keyed
//! by coordinate; records are never dropped except by [`World::clear`].

use ahash::{AHashMap, AHashSet};
use archipelago_common::{IslandCoord, WorldColumn, WorldError, WorldResult};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::column::Column;
use crate::generation::{EdgeProfile, GenerationTask, IslandGenerator, NeighbourEdges, Side};
use crate::island::{Island, IslandState};
use crate::minimap::IslandMaps;
use crate::pool::InstancePool;
use crate::seed::IslandSeed;

/// Position and heading of the observer driving streaming.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observer {
    /// World-space position
    pub position: Vec3,
    /// Heading in degrees
    pub rotation: f32,
}

impl Observer {
    /// Island the observer stands on.
    #[must_use]
    pub fn island(&self) -> IslandCoord {
        IslandCoord::from_position(self.position)
    }

    /// Column the observer stands on.
    #[must_use]
    pub fn column(&self) -> WorldColumn {
        WorldColumn::from_position(self.position)
    }
}

/// Registry of islands and loaded columns.
#[derive(Debug)]
pub struct World {
    islands: AHashMap<IslandCoord, Island>,
    maps: AHashMap<IslandCoord, IslandMaps>,
    loaded_columns: AHashSet<WorldColumn>,
    observer: Observer,
    world_seed: u64,
    rng: fastrand::Rng,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new(world_seed: u64) -> Self {
        Self {
            islands: AHashMap::new(),
            maps: AHashMap::new(),
            loaded_columns: AHashSet::new(),
            observer: Observer::default(),
            world_seed,
            rng: fastrand::Rng::with_seed(world_seed),
        }
    }

    /// Seed new island seeds are drawn from.
    #[must_use]
    pub const fn world_seed(&self) -> u64 {
        self.world_seed
    }

    /// Current observer.
    #[must_use]
    pub const fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Moves the observer.
    pub fn set_observer(&mut self, position: Vec3, rotation: f32) {
        self.observer = Observer { position, rotation };
    }

    /// Island record at a coordinate.
    #[must_use]
    pub fn island(&self, coord: IslandCoord) -> Option<&Island> {
        self.islands.get(&coord)
    }

    /// Mutable island record at a coordinate.
    pub fn island_mut(&mut self, coord: IslandCoord) -> Option<&mut Island> {
        self.islands.get_mut(&coord)
    }

    /// Every island record.
    pub fn islands(&self) -> impl Iterator<Item = &Island> {
        self.islands.values()
    }

    /// Number of island records.
    #[must_use]
    pub fn island_count(&self) -> usize {
        self.islands.len()
    }

    /// Number of islands with generated columns.
    #[must_use]
    pub fn loaded_island_count(&self) -> usize {
        self.islands.values().filter(|i| i.is_loaded()).count()
    }

    /// Inserts or replaces an island record.
    pub fn insert_island(&mut self, island: Island) {
        self.islands.insert(island.coord(), island);
    }

    /// Creates a record with a random seed if none exists.
    ///
    /// Returns `true` if a record was created.
    pub fn ensure_island(&mut self, coord: IslandCoord, style_count: usize) -> bool {
        if self.islands.contains_key(&coord) {
            return false;
        }
        let seed = IslandSeed::random(&mut self.rng, style_count);
        debug!("Created island ({}, {}) with seed {seed}", coord.x, coord.y);
        self.islands.insert(coord, Island::new(coord, seed));
        true
    }

    /// Copies the facing edges of the loaded neighbours of an island.
    #[must_use]
    pub fn neighbour_edges(&self, coord: IslandCoord) -> NeighbourEdges {
        let mut edges = NeighbourEdges::default();
        for side in Side::ALL {
            let edge = self
                .islands
                .get(&side.neighbour(coord))
                .and_then(|n| EdgeProfile::from_neighbour(n, side));
            edges.set(side, edge);
        }
        edges
    }

    /// Starts generating an island, if it exists and is not generated or
    /// already in flight.
    pub fn start_generation(
        &mut self,
        coord: IslandCoord,
        generator: &IslandGenerator,
        fast: bool,
    ) -> Option<GenerationTask> {
        let edges = self.neighbour_edges(coord);
        let island = self.islands.get_mut(&coord)?;
        match island.state() {
            IslandState::Created | IslandState::Unloaded => {
                Some(generator.start(island, edges, fast))
            },
            IslandState::Generating | IslandState::Loaded => None,
        }
    }

    /// Installs a finished task into its island and bakes its maps.
    pub fn finish_generation(&mut self, task: GenerationTask, pool: &mut InstancePool) {
        let coord = task.coord();
        let Some(island) = self.islands.get_mut(&coord) else {
            return;
        };
        task.finish(island, pool);
        if let Some(maps) = IslandMaps::bake(island) {
            self.maps.insert(coord, maps);
        }
    }

    /// Generates an island synchronously in fast mode.
    ///
    /// Returns `false` if the island is missing or already generated.
    pub fn generate_now(
        &mut self,
        coord: IslandCoord,
        generator: &IslandGenerator,
        pool: &mut InstancePool,
    ) -> bool {
        let Some(mut task) = self.start_generation(coord, generator, true) else {
            return false;
        };
        while !task.step(generator) {}
        self.finish_generation(task, pool);
        true
    }

    /// Cached maps of a generated island.
    #[must_use]
    pub fn maps(&self, coord: IslandCoord) -> Option<&IslandMaps> {
        self.maps.get(&coord)
    }

    /// Column at a world column coordinate.
    pub fn column(&self, column: WorldColumn) -> WorldResult<&Column> {
        let coord = column.to_island_coord();
        self.islands
            .get(&coord)
            .ok_or(WorldError::IslandNotFound(coord))?
            .column(column.to_local())
    }

    /// Whether a column's visuals are in the scene.
    #[must_use]
    pub fn is_column_loaded(&self, column: WorldColumn) -> bool {
        self.loaded_columns.contains(&column)
    }

    /// Columns currently in the scene.
    pub fn loaded_columns(&self) -> impl Iterator<Item = &WorldColumn> {
        self.loaded_columns.iter()
    }

    /// Number of columns currently in the scene.
    #[must_use]
    pub fn loaded_column_count(&self) -> usize {
        self.loaded_columns.len()
    }

    /// Materializes a column of a loaded island.
    pub fn load_column(&mut self, column: WorldColumn, pool: &mut InstancePool) -> WorldResult<()> {
        let coord = column.to_island_coord();
        let island = self
            .islands
            .get_mut(&coord)
            .ok_or(WorldError::IslandNotFound(coord))?;
        if !island.is_loaded() {
            return Err(WorldError::IslandNotLoaded(coord));
        }
        island.load_column(column.to_local(), pool)?;
        self.loaded_columns.insert(column);
        Ok(())
    }

    /// Returns a column's visuals to the pool.
    pub fn unload_column(
        &mut self,
        column: WorldColumn,
        pool: &mut InstancePool,
    ) -> WorldResult<()> {
        if !self.loaded_columns.remove(&column) {
            return Ok(());
        }
        match self.islands.get_mut(&column.to_island_coord()) {
            Some(island) if island.grid().is_some() => {
                island.unload_column(column.to_local(), pool)
            },
            _ => Ok(()),
        }
    }

    /// Releases an island's columns, keeping its record.
    pub fn release_island(&mut self, coord: IslandCoord, pool: &mut InstancePool) {
        let Some(island) = self.islands.get_mut(&coord) else {
            return;
        };
        island.release(pool);
        self.loaded_columns.retain(|c| c.to_island_coord() != coord);
        self.maps.remove(&coord);
    }

    /// Releases every generated island outside the 3×3 neighbourhood of
    /// `center`. Returns the evicted coordinates.
    pub fn evict_distant(
        &mut self,
        center: IslandCoord,
        pool: &mut InstancePool,
    ) -> Vec<IslandCoord> {
        let distant: Vec<IslandCoord> = self
            .islands
            .values()
            .filter(|i| i.state() == IslandState::Loaded && !i.coord().is_adjacent_or_same(center))
            .map(Island::coord)
            .collect();
        for coord in &distant {
            self.release_island(*coord, pool);
        }
        if !distant.is_empty() {
            info!("Evicted {} islands around ({}, {})", distant.len(), center.x, center.y);
        }
        distant
    }

    /// Releases everything and drops every record.
    pub fn clear(&mut self, pool: &mut InstancePool) {
        for island in self.islands.values_mut() {
            island.release(pool);
        }
        self.islands.clear();
        self.maps.clear();
        self.loaded_columns.clear();
    }

    /// Replaces the world seed and restarts the seed generator.
    pub fn reseed(&mut self, world_seed: u64) {
        self.world_seed = world_seed;
        self.rng = fastrand::Rng::with_seed(world_seed);
    }
}
