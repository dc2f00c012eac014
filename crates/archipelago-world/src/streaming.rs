//! Column streaming around the observer.
//!
//! The loader keeps the 3×3 island neighbourhood of the observer generated
//! and the square sight window of columns materialized:
//! - Islands entering the neighbourhood are queued for generation (FIFO,
//!   one row per tick) so each one blends against fully loaded neighbours
//! - Islands leaving it are evicted
//! - Columns outside the window are unloaded, columns inside are loaded
//!   innermost ring first under a per-tick budget

use std::collections::VecDeque;

use archipelago_common::{IslandCoord, WorldColumn};
use tracing::{debug, info, warn};

use crate::generation::{GenerationTask, IslandGenerator};
use crate::island::Island;
use crate::pool::InstancePool;
use crate::world::World;

/// Smallest sight radius, in columns.
pub const MIN_SIGHT_RADIUS: u32 = 5;

/// Largest sight radius, in columns.
pub const MAX_SIGHT_RADIUS: u32 = 50;

/// Default sight radius, in columns.
pub const DEFAULT_SIGHT_RADIUS: u32 = 20;

/// Smallest per-tick column load budget.
pub const MIN_LOAD_BUDGET: usize = 10;

/// Largest per-tick column load budget.
pub const MAX_LOAD_BUDGET: usize = 100;

/// Default per-tick column load budget.
pub const DEFAULT_LOAD_BUDGET: usize = 40;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Islands that finished generating
    pub islands_generated: usize,
    /// Islands released for leaving the neighbourhood
    pub islands_evicted: usize,
    /// Columns materialized
    pub columns_loaded: usize,
    /// Columns returned to the pool
    pub columns_unloaded: usize,
}

/// Squared ring of columns at Chebyshev distance `radius` from `center`.
fn ring(center: WorldColumn, radius: i64) -> impl Iterator<Item = WorldColumn> {
    let horizontal = (-radius..=radius).flat_map(move |dx| {
        let bottom = WorldColumn::new(center.x + dx, center.z - radius);
        let top = WorldColumn::new(center.x + dx, center.z + radius);
        if radius == 0 {
            vec![bottom]
        } else {
            vec![bottom, top]
        }
    });
    let vertical = (1 - radius..radius).flat_map(move |dz| {
        [
            WorldColumn::new(center.x - radius, center.z + dz),
            WorldColumn::new(center.x + radius, center.z + dz),
        ]
    });
    horizontal.chain(vertical)
}

fn load_if_ready(world: &mut World, column: WorldColumn, pool: &mut InstancePool) -> bool {
    if world.is_column_loaded(column) {
        return false;
    }
    if !world
        .island(column.to_island_coord())
        .is_some_and(Island::is_loaded)
    {
        return false;
    }
    match world.load_column(column, pool) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to load column ({}, {}): {e}", column.x, column.z);
            false
        },
    }
}

/// Unbudgeted load of the whole sight window, one row per step.
#[derive(Debug, Clone)]
pub struct SightFillTask {
    center: WorldColumn,
    radius: i64,
    next_row: i64,
}

impl SightFillTask {
    /// Creates a fill task for the window around `center`.
    #[must_use]
    pub fn new(center: WorldColumn, radius: u32) -> Self {
        Self {
            center,
            radius: i64::from(radius),
            next_row: 0,
        }
    }

    /// Whether every row has been loaded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next_row > self.radius * 2
    }

    /// Loads the next row of the window. Returns the number of columns
    /// loaded.
    pub fn step(&mut self, world: &mut World, pool: &mut InstancePool) -> usize {
        if self.is_complete() {
            return 0;
        }
        let z = self.center.z - self.radius + self.next_row;
        let mut loaded = 0;
        for x in self.center.x - self.radius..=self.center.x + self.radius {
            if load_if_ready(world, WorldColumn::new(x, z), pool) {
                loaded += 1;
            }
        }
        self.next_row += 1;
        loaded
    }
}

/// Drives island generation and column streaming from the observer.
#[derive(Debug)]
pub struct StreamingLoader {
    sight_radius: u32,
    load_budget: usize,
    last_island: Option<IslandCoord>,
    pending: VecDeque<IslandCoord>,
    current: Option<GenerationTask>,
    sight_fill: Option<SightFillTask>,
}

impl StreamingLoader {
    /// Creates a loader; radius and budget are clamped to their ranges.
    #[must_use]
    pub fn new(sight_radius: u32, load_budget: usize) -> Self {
        Self {
            sight_radius: sight_radius.clamp(MIN_SIGHT_RADIUS, MAX_SIGHT_RADIUS),
            load_budget: load_budget.clamp(MIN_LOAD_BUDGET, MAX_LOAD_BUDGET),
            last_island: None,
            pending: VecDeque::new(),
            current: None,
            sight_fill: None,
        }
    }

    /// Sight radius in columns.
    #[must_use]
    pub const fn sight_radius(&self) -> u32 {
        self.sight_radius
    }

    /// Column loads allowed per tick.
    #[must_use]
    pub const fn load_budget(&self) -> usize {
        self.load_budget
    }

    /// Islands waiting for generation, including the one in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    /// Whether a sight fill pass is running.
    #[must_use]
    pub const fn is_filling(&self) -> bool {
        self.sight_fill.is_some()
    }

    /// Whether no generation or fill work is outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.current.is_none() && self.sight_fill.is_none()
    }

    /// Forgets all queued work.
    pub fn reset(&mut self) {
        self.last_island = None;
        self.pending.clear();
        self.current = None;
        self.sight_fill = None;
    }

    /// Runs one streaming tick.
    pub fn tick(
        &mut self,
        world: &mut World,
        pool: &mut InstancePool,
        generator: &IslandGenerator,
    ) -> StreamingStats {
        let mut stats = StreamingStats::default();
        let center = world.observer().island();
        if self.last_island != Some(center) {
            stats.islands_evicted = self.enter_island(world, pool, generator, center);
        }

        stats.islands_generated = self.advance_generation(world, pool, generator);

        if let Some(fill) = self.sight_fill.as_mut() {
            stats.columns_loaded = fill.step(world, pool);
            if fill.is_complete() {
                debug!("Sight fill complete");
                self.sight_fill = None;
            }
            return stats;
        }

        let observer = world.observer().column();
        stats.columns_unloaded = self.unload_outside(world, pool, observer);
        stats.columns_loaded = self.load_inside(world, pool, observer);
        stats
    }

    /// Generates the neighbourhood of the observer's new position
    /// synchronously and starts an unbudgeted sight fill.
    pub fn teleport(
        &mut self,
        world: &mut World,
        pool: &mut InstancePool,
        generator: &IslandGenerator,
    ) {
        if let Some(mut task) = self.current.take() {
            while !task.step(generator) {}
            world.finish_generation(task, pool);
        }
        self.pending.clear();

        let center = world.observer().island();
        self.last_island = Some(center);
        world.evict_distant(center, pool);
        for coord in center.neighbourhood() {
            world.ensure_island(coord, generator.styles().len());
            world.generate_now(coord, generator, pool);
        }

        let observer = world.observer().column();
        self.unload_outside(world, pool, observer);
        self.sight_fill = Some(SightFillTask::new(observer, self.sight_radius));
        info!("Teleported to island ({}, {})", center.x, center.y);
    }

    fn enter_island(
        &mut self,
        world: &mut World,
        pool: &mut InstancePool,
        generator: &IslandGenerator,
        center: IslandCoord,
    ) -> usize {
        debug!("Observer entered island ({}, {})", center.x, center.y);
        self.last_island = Some(center);

        for coord in center.neighbourhood() {
            world.ensure_island(coord, generator.styles().len());
            let needs_generation = world
                .island(coord)
                .is_some_and(|i| !i.is_loaded() && i.grid().is_none());
            let in_flight = self.current.as_ref().is_some_and(|t| t.coord() == coord);
            if needs_generation && !in_flight && !self.pending.contains(&coord) {
                self.pending.push_back(coord);
            }
        }

        self.pending.retain(|c| c.is_adjacent_or_same(center));
        world.evict_distant(center, pool).len()
    }

    fn advance_generation(
        &mut self,
        world: &mut World,
        pool: &mut InstancePool,
        generator: &IslandGenerator,
    ) -> usize {
        while self.current.is_none() {
            let Some(coord) = self.pending.pop_front() else {
                return 0;
            };
            self.current = world.start_generation(coord, generator, false);
        }

        let Some(task) = self.current.as_mut() else {
            return 0;
        };
        if !task.step(generator) {
            return 0;
        }

        let Some(task) = self.current.take() else {
            return 0;
        };
        let coord = task.coord();
        world.finish_generation(task, pool);
        if !coord.is_adjacent_or_same(world.observer().island()) {
            world.release_island(coord, pool);
        }
        1
    }

    fn unload_outside(
        &self,
        world: &mut World,
        pool: &mut InstancePool,
        observer: WorldColumn,
    ) -> usize {
        let radius = u64::from(self.sight_radius);
        let outside: Vec<WorldColumn> = world
            .loaded_columns()
            .filter(|c| c.chebyshev(observer) > radius)
            .copied()
            .collect();
        for column in &outside {
            if let Err(e) = world.unload_column(*column, pool) {
                warn!("Failed to unload column ({}, {}): {e}", column.x, column.z);
            }
        }
        outside.len()
    }

    fn load_inside(
        &self,
        world: &mut World,
        pool: &mut InstancePool,
        observer: WorldColumn,
    ) -> usize {
        let mut loaded = 0;
        for radius in 0..=i64::from(self.sight_radius) {
            for column in ring(observer, radius) {
                if loaded >= self.load_budget {
                    return loaded;
                }
                if load_if_ready(world, column, pool) {
                    loaded += 1;
                }
            }
        }
        loaded
    }
}

impl Default for StreamingLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SIGHT_RADIUS, DEFAULT_LOAD_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::BlendSettings;
    use crate::island::IslandState;
    use crate::mask::MaskSampler;
    use crate::pool::PoolConfig;
    use crate::style::StyleTable;
    use glam::Vec3;

    fn setup() -> (World, IslandGenerator, InstancePool) {
        let generator = IslandGenerator::new(
            MaskSampler::flat(),
            StyleTable::default(),
            BlendSettings::default(),
        );
        (World::new(1), generator, InstancePool::new(&PoolConfig::default(), 4))
    }

    fn run_until_idle(
        loader: &mut StreamingLoader,
        world: &mut World,
        pool: &mut InstancePool,
        generator: &IslandGenerator,
    ) {
        for _ in 0..5_000 {
            let stats = loader.tick(world, pool, generator);
            if loader.is_idle() && stats.columns_loaded == 0 {
                return;
            }
        }
        panic!("streaming did not settle");
    }

    #[test]
    fn test_ring_sizes() {
        let center = WorldColumn::new(0, 0);
        assert_eq!(ring(center, 0).count(), 1);
        assert_eq!(ring(center, 1).count(), 8);
        assert_eq!(ring(center, 3).count(), 24);
        assert!(ring(center, 2).all(|c| c.chebyshev(center) == 2));
    }

    #[test]
    fn test_radius_and_budget_clamped() {
        let loader = StreamingLoader::new(1, 1_000);
        assert_eq!(loader.sight_radius(), MIN_SIGHT_RADIUS);
        assert_eq!(loader.load_budget(), MAX_LOAD_BUDGET);
    }

    #[test]
    fn test_streaming_converges_to_window() {
        let (mut world, generator, mut pool) = setup();
        world.set_observer(Vec3::new(100.5, 2.0, 100.5), 0.0);
        let mut loader = StreamingLoader::new(5, 20);

        run_until_idle(&mut loader, &mut world, &mut pool, &generator);

        assert_eq!(world.island_count(), 9);
        assert_eq!(world.loaded_island_count(), 9);
        assert_eq!(world.loaded_column_count(), 11 * 11);
        let observer = world.observer().column();
        assert!(world.loaded_columns().all(|c| c.chebyshev(observer) <= 5));

        let active = pool.active_count();
        for _ in 0..20 {
            let stats = loader.tick(&mut world, &mut pool, &generator);
            assert_eq!(stats.columns_loaded, 0);
            assert_eq!(stats.columns_unloaded, 0);
            assert_eq!(stats.islands_generated, 0);
            assert_eq!(world.loaded_column_count(), 11 * 11);
        }
        assert_eq!(pool.active_count(), active);
    }

    #[test]
    fn test_load_budget_respected() {
        let (mut world, generator, mut pool) = setup();
        world.set_observer(Vec3::new(100.5, 2.0, 100.5), 0.0);
        let mut loader = StreamingLoader::new(10, 10);
        world.ensure_island(IslandCoord::new(0, 0), 4);
        world.generate_now(IslandCoord::new(0, 0), &generator, &mut pool);

        let stats = loader.tick(&mut world, &mut pool, &generator);
        assert_eq!(stats.columns_loaded, 10);
        assert!(world.is_column_loaded(WorldColumn::new(100, 100)));
    }

    #[test]
    fn test_moving_one_island_generates_three() {
        let (mut world, generator, mut pool) = setup();
        let mut loader = StreamingLoader::new(5, 100);
        world.set_observer(Vec3::new(100.5, 2.0, 100.5), 0.0);
        loader.teleport(&mut world, &mut pool, &generator);
        assert_eq!(world.loaded_island_count(), 9);
        run_until_idle(&mut loader, &mut world, &mut pool, &generator);
        assert_eq!(world.loaded_column_count(), 121);

        world.set_observer(Vec3::new(300.5, 2.0, 100.5), 0.0);
        let stats = loader.tick(&mut world, &mut pool, &generator);
        assert_eq!(stats.islands_evicted, 3);
        assert_eq!(world.island_count(), 12);
        assert_eq!(loader.pending_count(), 3);
        assert!(world.loaded_columns().all(|c| c.chebyshev(world.observer().column()) <= 5));

        run_until_idle(&mut loader, &mut world, &mut pool, &generator);
        assert_eq!(world.loaded_island_count(), 9);
        assert_eq!(
            world.island(IslandCoord::new(-1, 0)).map(|i| i.state()),
            Some(IslandState::Unloaded)
        );
        assert_eq!(world.loaded_column_count(), 121);
    }

    #[test]
    fn test_teleport_fills_sight_without_budget() {
        let (mut world, generator, mut pool) = setup();
        let mut loader = StreamingLoader::new(5, 10);
        world.set_observer(Vec3::new(-150.0, 2.0, 420.0), 0.0);
        loader.teleport(&mut world, &mut pool, &generator);
        assert!(loader.is_filling());

        for _ in 0..11 {
            loader.tick(&mut world, &mut pool, &generator);
        }
        assert!(!loader.is_filling());
        assert_eq!(world.loaded_column_count(), 121);
    }
}
