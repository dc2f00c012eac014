//! World engine facade.
//!
//! [`WorldEngine`] owns the world registry, the instance pool, the island
//! generator and the streaming loader, and exposes the gameplay-facing
//! queries, edits and persistence entry points. Everything runs on the
//! caller's thread; the host calls [`WorldEngine::tick`] once per frame.

use std::path::Path;

use archipelago_common::{
    IslandCoord, WorldColumn, WorldError, WorldResult, BLOCK_HEIGHT, BLOCK_SIZE,
};
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::block::{BlockInstance, Rotation, TerrainType};
use crate::column::Column;
use crate::config::EngineConfig;
use crate::generation::IslandGenerator;
use crate::island::Island;
use crate::mask::{MaskResult, MaskSampler};
use crate::minimap::IslandMaps;
use crate::persistence::{PersistenceResult, WorldSave};
use crate::pool::InstancePool;
use crate::streaming::{StreamingLoader, StreamingStats};
use crate::world::World;

/// Movement multiplier where no column exists.
pub const DEFAULT_SPEED_MULTIPLIER: f32 = 1.0;

/// Friction where no column exists.
pub const DEFAULT_FRICTION: f32 = 0.8;

/// Top-level owner of all world state.
#[derive(Debug)]
pub struct WorldEngine {
    config: EngineConfig,
    world: World,
    pool: InstancePool,
    generator: IslandGenerator,
    loader: StreamingLoader,
}

impl WorldEngine {
    /// Creates an engine with an empty world.
    #[must_use]
    pub fn new(mut config: EngineConfig, masks: MaskSampler) -> Self {
        config.validate();
        let styles = config.style_table();
        let pool = InstancePool::new(&config.pool, styles.len());
        let generator = IslandGenerator::new(masks, styles, config.blend.clone())
            .with_world_map_mode(config.world_map_mode);
        let world_seed = config.world_seed.unwrap_or_else(|| fastrand::u64(..));
        let loader = StreamingLoader::new(config.sight_radius, config.load_budget);
        info!(
            "World engine ready: seed {world_seed}, sight radius {}, budget {}",
            loader.sight_radius(),
            loader.load_budget()
        );

        Self {
            config,
            world: World::new(world_seed),
            pool,
            generator,
            loader,
        }
    }

    /// Creates an engine with masks loaded as the configuration describes.
    pub fn from_config(config: EngineConfig) -> MaskResult<Self> {
        let masks = config.masks()?;
        Ok(Self::new(config, masks))
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// World registry.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Instance pool.
    #[must_use]
    pub const fn pool(&self) -> &InstancePool {
        &self.pool
    }

    /// Streaming loader.
    #[must_use]
    pub const fn loader(&self) -> &StreamingLoader {
        &self.loader
    }

    /// Runs one streaming tick.
    pub fn tick(&mut self) -> StreamingStats {
        self.loader.tick(&mut self.world, &mut self.pool, &self.generator)
    }

    /// Moves the observer; streaming follows on the next tick.
    pub fn set_observer(&mut self, position: Vec3, rotation: f32) {
        self.world.set_observer(position, rotation);
    }

    /// Jumps the observer, generating the destination synchronously.
    pub fn teleport(&mut self, position: Vec3) {
        let rotation = self.world.observer().rotation;
        self.world.set_observer(position, rotation);
        self.loader
            .teleport(&mut self.world, &mut self.pool, &self.generator);
    }

    /// Generates one island synchronously if it is not generated yet.
    pub fn generate_island_now(&mut self, coord: IslandCoord) -> bool {
        self.world.ensure_island(coord, self.generator.styles().len());
        self.world
            .generate_now(coord, &self.generator, &mut self.pool)
    }

    /// Cached minimap and heightmap of a generated island.
    #[must_use]
    pub fn maps(&self, coord: IslandCoord) -> Option<&IslandMaps> {
        self.world.maps(coord)
    }

    fn column_at(&self, position: Vec3) -> Option<&Column> {
        self.world.column(WorldColumn::from_position(position)).ok()
    }

    /// Height of the walkable surface under a position, 0 where nothing is
    /// generated.
    #[must_use]
    pub fn surface_height_at(&self, position: Vec3) -> f32 {
        self.column_at(position).map_or(0.0, Column::surface_height)
    }

    /// Whether characters can stand on the column under a position.
    #[must_use]
    pub fn surface_walkable_at(&self, position: Vec3) -> bool {
        self.column_at(position).is_some_and(|c| c.walkable)
    }

    /// Block occupying a position.
    #[must_use]
    pub fn block_at(&self, position: Vec3) -> Option<&BlockInstance> {
        let level = (position.y / BLOCK_HEIGHT).floor();
        if level < 0.0 || level > f32::from(u16::MAX) {
            return None;
        }
        self.column_at(position)?.block_at(level as u16)
    }

    fn surface_terrain_at(&self, position: Vec3) -> Option<TerrainType> {
        self.column_at(position)?.top().map(|b| b.terrain)
    }

    /// Movement speed multiplier of the surface under a position.
    #[must_use]
    pub fn movement_speed_multiplier_at(&self, position: Vec3) -> f32 {
        self.surface_terrain_at(position)
            .map_or(DEFAULT_SPEED_MULTIPLIER, TerrainType::speed_multiplier)
    }

    /// Friction of the surface under a position.
    #[must_use]
    pub fn friction_at(&self, position: Vec3) -> f32 {
        self.surface_terrain_at(position)
            .map_or(DEFAULT_FRICTION, TerrainType::friction)
    }

    /// Island record under a position.
    #[must_use]
    pub fn island_at(&self, position: Vec3) -> Option<&Island> {
        self.world.island(IslandCoord::from_position(position))
    }

    /// Places a block and records it in the island's log.
    ///
    /// `angle` is snapped to the nearest quarter turn; `position` is the
    /// world-space placement stored with the block.
    pub fn add_block(
        &mut self,
        column: WorldColumn,
        terrain: TerrainType,
        height_level: u8,
        angle: f32,
        stack_index: u16,
        position: Vec3,
    ) -> WorldResult<()> {
        let local = column.to_local();
        let island = loaded_island_mut(&mut self.world, column.to_island_coord())?;
        let (appearance, _) = island.seed().block_appearance(local, stack_index);
        let block = BlockInstance::new(
            terrain,
            height_level,
            stack_index,
            position,
            Rotation::from_degrees(angle),
            appearance,
        );
        island.insert_block(local, block, true, true, &mut self.pool)?;
        debug!("Added {terrain:?} at ({}, {}) index {stack_index}", column.x, column.z);
        Ok(())
    }

    /// Removes the blocks at a stack index and records it in the log.
    pub fn remove_block(&mut self, column: WorldColumn, stack_index: u16) -> WorldResult<bool> {
        let island = loaded_island_mut(&mut self.world, column.to_island_coord())?;
        island.remove_block(column.to_local(), stack_index, true, &mut self.pool)
    }

    /// Removes up to `depth` top blocks from every column whose centre lies
    /// within `radius` of `center` on the horizontal plane. Returns the
    /// number of removals.
    pub fn destroy_blocks_in_area(&mut self, center: Vec3, radius: f32, depth: u16) -> usize {
        let radius = radius.max(0.0);
        let min = WorldColumn::from_position(center - Vec3::new(radius, 0.0, radius));
        let max = WorldColumn::from_position(center + Vec3::new(radius, 0.0, radius));
        let mut removed = 0;

        for z in min.z..=max.z {
            for x in min.x..=max.x {
                let dx = (x as f32 + 0.5) * BLOCK_SIZE - center.x;
                let dz = (z as f32 + 0.5) * BLOCK_SIZE - center.z;
                if dx * dx + dz * dz > radius * radius {
                    continue;
                }
                let column = WorldColumn::new(x, z);
                for _ in 0..depth {
                    let Ok(top) = self.world.column(column).map(Column::top_index) else {
                        break;
                    };
                    match self.remove_block(column, top) {
                        Ok(true) => removed += 1,
                        Ok(false) => break,
                        Err(e) => {
                            debug!("Skipping column ({x}, {z}): {e}");
                            break;
                        },
                    }
                }
            }
        }
        debug!("Destroyed {removed} blocks around {center}");
        removed
    }

    /// Writes every island's seed and log plus the observer to a file.
    pub fn save_world(&self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        WorldSave::capture(&self.world).write_to(path)
    }

    /// Replaces the world with a saved one.
    ///
    /// The file is fully read and validated before the current world is
    /// touched; the saved observer's neighbourhood is regenerated with its
    /// edits replayed.
    pub fn load_world(&mut self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        let save = WorldSave::read_from(path)?;
        self.reset_world();
        self.world.reseed(save.world_seed);
        let island_count = save.islands.len();
        for record in save.islands {
            self.world.insert_island(record.into_island());
        }
        self.world
            .set_observer(save.observer.position, save.observer.rotation);
        self.loader
            .teleport(&mut self.world, &mut self.pool, &self.generator);
        info!("Loaded world with {island_count} islands");
        Ok(())
    }

    /// Discards the world and starts a new one from a random world seed,
    /// generated around the current observer.
    pub fn generate_random_world(&mut self) {
        let seed = fastrand::u64(..);
        self.reset_world();
        self.world.reseed(seed);
        self.loader
            .teleport(&mut self.world, &mut self.pool, &self.generator);
        info!("Generated random world with seed {seed}");
    }

    /// Releases every island and drops all records.
    pub fn reset_world(&mut self) {
        self.world.clear(&mut self.pool);
        self.loader.reset();
        if self.pool.active_count() != 0 {
            warn!("{} visuals still active after reset", self.pool.active_count());
        }
    }
}

fn loaded_island_mut(world: &mut World, coord: IslandCoord) -> WorldResult<&mut Island> {
    let island = world
        .island_mut(coord)
        .ok_or(WorldError::IslandNotFound(coord))?;
    if !island.is_loaded() {
        return Err(WorldError::IslandNotLoaded(coord));
    }
    Ok(island)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::island::IslandState;
    use crate::mask::SeedMap;
    use crate::style::default_styles;
    use archipelago_common::ISLAND_SIZE;
    use tempfile::TempDir;

    const CENTER: Vec3 = Vec3::new(100.5, 0.0, 100.5);

    fn engine(world_seed: u64) -> WorldEngine {
        let config = EngineConfig {
            world_seed: Some(world_seed),
            sight_radius: 5,
            load_budget: 100,
            // meadow only: flat masks give grass at level 0 everywhere
            styles: default_styles()[1..2].to_vec(),
            ..EngineConfig::default()
        };
        let mut engine = WorldEngine::new(config, MaskSampler::flat());
        engine.teleport(CENTER);
        settle(&mut engine);
        engine
    }

    fn settle(engine: &mut WorldEngine) {
        for _ in 0..100 {
            engine.tick();
            if engine.loader().is_idle() {
                return;
            }
        }
    }

    fn indices(engine: &WorldEngine, column: WorldColumn) -> Vec<u16> {
        engine
            .world()
            .column(column)
            .expect("generated")
            .blocks()
            .iter()
            .map(|b| b.stack_index)
            .collect()
    }

    #[test]
    fn test_queries_on_flat_world() {
        let engine = engine(1);
        assert_eq!(engine.world().loaded_island_count(), 9);
        assert_eq!(engine.island_at(CENTER).map(Island::coord), Some(IslandCoord::new(0, 0)));

        let top = engine.block_at(Vec3::new(100.5, 1.5, 100.5)).expect("block");
        assert_eq!(top.stack_index, 1);
        assert!(engine.block_at(Vec3::new(100.5, -1.0, 100.5)).is_none());
        assert!(engine.block_at(Vec3::new(100.5, 9.0, 100.5)).is_none());

        let far = Vec3::new(5_000.0, 0.0, 5_000.0);
        assert!(engine.island_at(far).is_none());
        assert_eq!(engine.surface_height_at(far), 0.0);
        assert!(!engine.surface_walkable_at(far));
        assert_eq!(engine.friction_at(far), DEFAULT_FRICTION);
        assert!(engine.maps(IslandCoord::new(1, 1)).is_some());
    }

    #[test]
    fn test_decoration_blocks_walking_until_built_over() {
        let config = EngineConfig {
            world_seed: Some(3),
            sight_radius: 5,
            load_budget: 100,
            styles: default_styles()[1..2].to_vec(),
            ..EngineConfig::default()
        };
        let masks = MaskSampler::new(
            SeedMap::uniform(2, 2, [255, 255, 255, 255]),
            SeedMap::uniform(2, 2, [0, 255, 0, 255]),
        );
        let mut engine = WorldEngine::new(config, masks);
        engine.teleport(CENTER);
        settle(&mut engine);

        let column = WorldColumn::from_position(CENTER);
        assert!(!engine.surface_walkable_at(CENTER));
        engine
            .add_block(column, TerrainType::Stone, 2, 0.0, 2, Vec3::new(100.0, 2.0, 100.0))
            .expect("loaded island");
        assert!(engine.surface_walkable_at(CENTER));
        assert!(engine.world().column(column).expect("generated").decoration().is_none());
    }

    #[test]
    fn test_surface_follows_edits() {
        let mut engine = engine(2);
        let column = WorldColumn::from_position(CENTER);
        let before = engine.surface_height_at(CENTER);

        engine
            .add_block(column, TerrainType::Mud, 2, 90.0, 2, Vec3::new(100.0, 2.0, 100.0))
            .expect("loaded island");
        assert_eq!(engine.surface_height_at(CENTER), before + BLOCK_HEIGHT);
        assert_eq!(engine.movement_speed_multiplier_at(CENTER), 0.7);
        assert_eq!(engine.friction_at(CENTER), TerrainType::Mud.friction());
        let added = engine.block_at(Vec3::new(100.5, 2.5, 100.5)).expect("added");
        assert_eq!(added.rotation, Rotation::East);

        assert_eq!(engine.remove_block(column, 2), Ok(true));
        assert_eq!(engine.surface_height_at(CENTER), before);
        assert_eq!(engine.remove_block(column, 1), Ok(true));
        assert_eq!(engine.remove_block(column, 0), Ok(false));
        assert_eq!(engine.surface_height_at(CENTER), BLOCK_HEIGHT);
    }

    #[test]
    fn test_edits_require_generated_island() {
        let mut engine = engine(3);
        let far = WorldColumn::new(10 * i64::from(ISLAND_SIZE), 0);
        assert_eq!(
            engine.remove_block(far, 1),
            Err(WorldError::IslandNotFound(IslandCoord::new(10, 0)))
        );
        assert!(engine
            .add_block(far, TerrainType::Stone, 0, 0.0, 2, Vec3::ZERO)
            .is_err());
    }

    #[test]
    fn test_custom_block_outside_templates_has_no_visual() {
        let mut engine = engine(4);
        let column = WorldColumn::from_position(CENTER);
        engine
            .add_block(column, TerrainType::Custom(500), 0, 0.0, 2, Vec3::new(100.0, 2.0, 100.0))
            .expect("data still inserted");
        assert!(engine.world().is_column_loaded(column));
        let block = engine.world().column(column).expect("generated").top().expect("top");
        assert_eq!(block.terrain, TerrainType::Custom(500));
        assert!(!block.is_materialized());
    }

    #[test]
    fn test_destroy_blocks_in_area() {
        let mut engine = engine(5);
        assert_eq!(engine.destroy_blocks_in_area(CENTER, 1.0, 1), 5);
        assert_eq!(indices(&engine, WorldColumn::new(101, 100)), vec![0]);
        assert_eq!(indices(&engine, WorldColumn::new(101, 101)), vec![0, 1]);
        assert_eq!(engine.destroy_blocks_in_area(CENTER, 1.0, 4), 0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("world.json");

        let mut source = engine(6);
        let added = WorldColumn::new(100, 100);
        let removed = WorldColumn::new(101, 100);
        source
            .add_block(added, TerrainType::Stone, 2, 0.0, 2, Vec3::new(100.0, 2.0, 100.0))
            .expect("loaded island");
        source.remove_block(removed, 1).expect("loaded island");
        source.set_observer(Vec3::new(102.0, 3.0, 99.0), 45.0);
        source.save_world(&path).expect("save");

        let mut restored = engine(77);
        restored.load_world(&path).expect("load");
        settle(&mut restored);

        assert_eq!(restored.world().island_count(), source.world().island_count());
        assert_eq!(restored.world().world_seed(), 6);
        assert_eq!(restored.world().observer(), source.world().observer());
        assert_eq!(indices(&restored, added), vec![0, 1, 2]);
        assert_eq!(indices(&restored, removed), vec![0]);
        for island in source.world().islands() {
            let twin = restored.world().island(island.coord()).expect("restored");
            assert_eq!(twin.seed(), island.seed());
            assert_eq!(twin.modifications(), island.modifications());
            assert_eq!(twin.terrain_signature(), island.terrain_signature());
        }
    }

    #[test]
    fn test_unloaded_islands_are_saved() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("world.json");
        let mut engine = engine(8);
        engine.set_observer(Vec3::new(700.0, 0.0, 100.0), 0.0);
        settle(&mut engine);
        assert_eq!(
            engine.world().island(IslandCoord::new(-1, 0)).map(Island::state),
            Some(IslandState::Unloaded)
        );

        engine.save_world(&path).expect("save");
        let save = WorldSave::read_from(&path).expect("read");
        assert_eq!(save.islands.len(), engine.world().island_count());
        assert!(save.islands.iter().any(|r| r.coord == IslandCoord::new(-1, 0)));
    }

    #[test]
    fn test_malformed_save_leaves_world_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"version\": ").expect("write");

        let mut engine = engine(9);
        assert!(engine.load_world(&path).is_err());
        assert_eq!(engine.world().loaded_island_count(), 9);
        assert_eq!(engine.world().world_seed(), 9);
    }

    #[test]
    fn test_reset_and_random_world() {
        let mut engine = engine(10);
        engine.reset_world();
        assert_eq!(engine.world().island_count(), 0);
        assert_eq!(engine.pool().active_count(), 0);
        assert_eq!(engine.surface_height_at(CENTER), 0.0);

        engine.generate_random_world();
        assert_eq!(engine.world().loaded_island_count(), 9);
        assert!(engine.surface_height_at(CENTER) > 0.0);
    }

    #[test]
    fn test_generate_island_now() {
        let mut engine = engine(11);
        let coord = IslandCoord::new(5, 5);
        assert!(engine.generate_island_now(coord));
        assert!(!engine.generate_island_now(coord));
        assert!(engine.world().island(coord).is_some_and(Island::is_loaded));
    }
}
