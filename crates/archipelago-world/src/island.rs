//! Islands and their column grids.
//!
//! An island record outlives its columns: once unloaded, only the seed and
//! the modification log are kept, which is enough to rebuild the exact
//! edited state later.

use archipelago_common::{IslandCoord, LocalColumn, WorldError, WorldResult, ISLAND_SIZE};
use tracing::{debug, warn};

use crate::block::{block_placement, BlockInstance, TerrainType};
use crate::column::Column;
use crate::edit::{EditOp, ModificationRecord};
use crate::pool::InstancePool;
use crate::seed::IslandSeed;

/// Columns on each border ring that are always drawn.
pub const BORDER_MARGIN: u16 = 6;

/// Island lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandState {
    /// Record exists, nothing generated yet
    Created,
    /// Generation task in flight
    Generating,
    /// Columns generated and available to the streaming loader
    Loaded,
    /// Columns released, seed and log retained
    Unloaded,
}

/// Bounds-checked 200×200 column storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGrid {
    columns: Vec<Column>,
}

impl ColumnGrid {
    /// Wraps a full row-major (z, then x) column list.
    pub(crate) fn from_columns(columns: Vec<Column>) -> Self {
        debug_assert_eq!(columns.len(), (ISLAND_SIZE * ISLAND_SIZE) as usize);
        Self { columns }
    }

    /// Column at a local coordinate.
    #[must_use]
    pub fn get(&self, local: LocalColumn) -> Option<&Column> {
        if !local.in_bounds() {
            return None;
        }
        self.columns.get(local.to_index())
    }

    /// Mutable column at a local coordinate.
    pub fn get_mut(&mut self, local: LocalColumn) -> Option<&mut Column> {
        if !local.in_bounds() {
            return None;
        }
        self.columns.get_mut(local.to_index())
    }

    /// All columns in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }
}

/// An independently seeded tile of the world.
#[derive(Debug)]
pub struct Island {
    coord: IslandCoord,
    seed: IslandSeed,
    style: u8,
    modifications: Vec<ModificationRecord>,
    state: IslandState,
    grid: Option<ColumnGrid>,
}

impl Island {
    /// Creates an ungenerated island record.
    #[must_use]
    pub fn new(coord: IslandCoord, seed: IslandSeed) -> Self {
        Self {
            coord,
            seed,
            style: seed.style(),
            modifications: Vec::new(),
            state: IslandState::Created,
            grid: None,
        }
    }

    /// Creates a record with an existing modification log.
    #[must_use]
    pub fn with_modifications(
        coord: IslandCoord,
        seed: IslandSeed,
        modifications: Vec<ModificationRecord>,
    ) -> Self {
        Self {
            modifications,
            ..Self::new(coord, seed)
        }
    }

    /// Island coordinate.
    #[must_use]
    pub const fn coord(&self) -> IslandCoord {
        self.coord
    }

    /// Island seed.
    #[must_use]
    pub const fn seed(&self) -> &IslandSeed {
        &self.seed
    }

    /// Style index, wrapped into the generator's table once generation starts.
    #[must_use]
    pub const fn style(&self) -> u8 {
        self.style
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> IslandState {
        self.state
    }

    /// Whether the columns are generated and usable.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == IslandState::Loaded
    }

    /// Append-only edit log.
    #[must_use]
    pub fn modifications(&self) -> &[ModificationRecord] {
        &self.modifications
    }

    /// Column grid, present while generating or loaded.
    #[must_use]
    pub const fn grid(&self) -> Option<&ColumnGrid> {
        self.grid.as_ref()
    }

    /// Column at a local coordinate.
    pub fn column(&self, local: LocalColumn) -> WorldResult<&Column> {
        let grid = self
            .grid
            .as_ref()
            .ok_or(WorldError::IslandNotLoaded(self.coord))?;
        grid.get(local).ok_or(WorldError::ColumnOutOfBounds(local))
    }

    fn column_mut(&mut self, local: LocalColumn) -> WorldResult<&mut Column> {
        let coord = self.coord;
        let grid = self
            .grid
            .as_mut()
            .ok_or(WorldError::IslandNotLoaded(coord))?;
        grid.get_mut(local).ok_or(WorldError::ColumnOutOfBounds(local))
    }

    pub(crate) fn begin_generation(&mut self, style: u8) {
        self.state = IslandState::Generating;
        self.style = style;
    }

    /// Installs a freshly generated grid and replays the modification log.
    pub(crate) fn install_grid(&mut self, grid: ColumnGrid, pool: &mut InstancePool) {
        self.grid = Some(grid);
        let log = std::mem::take(&mut self.modifications);
        for record in &log {
            let result = match record.op {
                EditOp::Add => {
                    let (appearance, _) =
                        self.seed.block_appearance(record.column, record.stack_index);
                    let mut block = BlockInstance::new(
                        record.terrain,
                        record.height_level,
                        record.stack_index,
                        block_placement(self.coord, record.column, record.stack_index),
                        record.rotation,
                        appearance,
                    );
                    block.placement.y = record.y;
                    self.insert_block(record.column, block, false, false, pool)
                },
                EditOp::Remove => self
                    .remove_block(record.column, record.stack_index, false, pool)
                    .map(|_| ()),
            };
            if let Err(e) = result {
                warn!("Skipping modification on island {:?}: {e}", self.coord);
            }
        }
        self.modifications = log;
        self.state = IslandState::Loaded;
    }

    /// Releases every visual and drops the grid, keeping seed and log.
    pub(crate) fn release(&mut self, pool: &mut InstancePool) {
        if let Some(grid) = self.grid.as_mut() {
            for column in grid.iter_mut() {
                unload_column_visuals(column, pool);
            }
        }
        self.grid = None;
        self.state = IslandState::Unloaded;
        debug!("Released island {:?}", self.coord);
    }

    /// Visibility of the stack entry at position `slot` of a column.
    ///
    /// Fully enclosed entries (blocks on all four sides at the same stack
    /// index and a block above) are never materialized.
    #[must_use]
    pub fn is_block_visible(&self, local: LocalColumn, slot: usize) -> bool {
        let Some(grid) = self.grid.as_ref() else {
            return false;
        };
        let Some(column) = grid.get(local) else {
            return false;
        };
        let Some(block) = column.stack.get(slot) else {
            return false;
        };

        if block.force_visible || slot + 1 == column.stack.len() {
            return true;
        }
        if local.edge_distance() < BORDER_MARGIN {
            return true;
        }

        let index = block.stack_index;
        let max = (ISLAND_SIZE - 1) as u16;
        let neighbours = [
            LocalColumn::new(local.x.saturating_sub(1), local.z),
            LocalColumn::new((local.x + 1).min(max), local.z),
            LocalColumn::new(local.x, local.z.saturating_sub(1)),
            LocalColumn::new(local.x, (local.z + 1).min(max)),
        ];
        let side_open = neighbours
            .iter()
            .any(|n| grid.get(*n).is_some_and(|c| !c.has_index(index)));

        side_open || !column.has_index(index + 1)
    }

    /// Materializes the visible blocks and the decoration of a column.
    pub fn load_column(&mut self, local: LocalColumn, pool: &mut InstancePool) -> WorldResult<()> {
        let visible: Vec<bool> = {
            let column = self.column(local)?;
            (0..column.stack.len())
                .map(|slot| self.is_block_visible(local, slot))
                .collect()
        };

        let coord = self.coord;
        let column = self.column_mut(local)?;
        for (block, visible) in column.stack.iter_mut().zip(visible) {
            if !visible || block.visual.is_some() {
                continue;
            }
            let acquired =
                pool.acquire(block.pool_key(), block.appearance, block.placement, block.rotation);
            match acquired {
                Ok(id) => block.visual = Some(id),
                Err(e) => warn!("No visual for block in {coord:?} {local:?}: {e}"),
            }
        }
        if let Some(prop) = column.decoration.as_mut() {
            if prop.visual.is_none() {
                let acquired =
                    pool.acquire(prop.pool_key(), prop.appearance, prop.placement(), prop.rotation);
                match acquired {
                    Ok(id) => prop.visual = Some(id),
                    Err(e) => warn!("No visual for decoration in {coord:?} {local:?}: {e}"),
                }
            }
        }
        column.loaded = true;
        Ok(())
    }

    /// Returns every visual of a column to the pool.
    pub fn unload_column(
        &mut self,
        local: LocalColumn,
        pool: &mut InstancePool,
    ) -> WorldResult<()> {
        let column = self.column_mut(local)?;
        unload_column_visuals(column, pool);
        Ok(())
    }

    fn reload_column(&mut self, local: LocalColumn, pool: &mut InstancePool) -> WorldResult<()> {
        if self.column(local)?.loaded {
            self.unload_column(local, pool)?;
            self.load_column(local, pool)?;
        }
        Ok(())
    }

    /// Inserts a block into a column.
    ///
    /// The block is forced visible and, when `load` is set and the column is
    /// in the scene, materialized. Any ground decoration is displaced. With
    /// `persist` an Add record is appended to the log.
    pub fn insert_block(
        &mut self,
        local: LocalColumn,
        block: BlockInstance,
        load: bool,
        persist: bool,
        pool: &mut InstancePool,
    ) -> WorldResult<()> {
        let mut block = block.detached();
        block.force_visible = true;
        let record = ModificationRecord::add(local, &block);

        let column = self.column_mut(local)?;
        column.stack.push(block);
        column.sort_stack();
        if let Some(prop) = column.decoration.take() {
            if let Some(id) = prop.visual {
                if let Err(e) = pool.release(id) {
                    warn!("Failed to release decoration: {e}");
                }
            }
            column.walkable = true;
        }
        column.recompute_top();
        let materialize = load && column.loaded;

        if materialize {
            self.load_column(local, pool)?;
        }
        if persist {
            self.modifications.push(record);
        }
        Ok(())
    }

    /// Removes the blocks at a stack index.
    ///
    /// A column never loses its last block: a lone block above bedrock is
    /// lowered by one instead, and bedrock itself is never removed. The
    /// surrounding columns are reloaded because the removal may expose their
    /// side faces. Returns whether anything changed.
    pub fn remove_block(
        &mut self,
        local: LocalColumn,
        stack_index: u16,
        persist: bool,
        pool: &mut InstancePool,
    ) -> WorldResult<bool> {
        let coord = self.coord;
        let column = self.column_mut(local)?;

        if column.stack.len() == 1 {
            let block = &mut column.stack[0];
            if block.stack_index == 0 {
                return Ok(false);
            }
            let record = ModificationRecord::remove(local, block);
            block.stack_index -= 1;
            block.placement = block_placement(coord, local, block.stack_index);
            column.recompute_top();
            self.reload_column(local, pool)?;
            if persist {
                self.modifications.push(record);
            }
            return Ok(true);
        }

        if stack_index == 0 {
            return Ok(false);
        }
        let Some(removed) = column
            .block_at(stack_index)
            .map(|b| ModificationRecord::remove(local, b))
        else {
            return Err(WorldError::NoBlockAtIndex {
                column: local,
                index: stack_index,
            });
        };

        column.stack.retain(|b| {
            if b.stack_index != stack_index {
                return true;
            }
            if let Some(id) = b.visual {
                if let Err(e) = pool.release(id) {
                    warn!("Failed to release block visual: {e}");
                }
            }
            false
        });
        column.sort_stack();
        column.force_top_native_visible();
        column.recompute_top();
        if let Some(prop) = column.decoration.take() {
            if let Some(id) = prop.visual {
                if let Err(e) = pool.release(id) {
                    warn!("Failed to release decoration: {e}");
                }
            }
            column.walkable = true;
        }

        for dz in -1i32..=1 {
            for dx in -1i32..=1 {
                let x = i32::from(local.x) + dx;
                let z = i32::from(local.z) + dz;
                if x < 0 || z < 0 {
                    continue;
                }
                let neighbour = LocalColumn::new(x as u16, z as u16);
                if neighbour.in_bounds() {
                    self.reload_column(neighbour, pool)?;
                }
            }
        }

        if persist {
            self.modifications.push(removed);
        }
        Ok(true)
    }

    /// Per-column (terrain, level, mountain) triples in grid order.
    #[must_use]
    pub fn terrain_signature(&self) -> Vec<(TerrainType, i8, bool)> {
        self.grid
            .as_ref()
            .map(|grid| grid.iter().map(|c| (c.terrain, c.level, c.mountain)).collect())
            .unwrap_or_default()
    }
}

fn unload_column_visuals(column: &mut Column, pool: &mut InstancePool) {
    for block in &mut column.stack {
        if let Some(id) = block.visual.take() {
            if let Err(e) = pool.release(id) {
                warn!("Failed to release block visual: {e}");
            }
        }
    }
    if let Some(prop) = column.decoration.as_mut() {
        if let Some(id) = prop.visual.take() {
            if let Err(e) = pool.release(id) {
                warn!("Failed to release decoration: {e}");
            }
        }
    }
    column.loaded = false;
}
