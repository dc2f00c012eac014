//! Procedural island generation.
//!
//! Each column is derived from a handful of seed-map lookups, blended toward
//! already loaded neighbour islands along the borders, and turned into a
//! vertical block stack. Generation runs as a resumable task that produces
//! one grid row per step so the streaming loader can spread the work over
//! several ticks.

use archipelago_common::{IslandCoord, LocalColumn, ISLAND_SIZE};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::block::{
    block_placement, BlockInstance, DecorationKind, PropInstance, Rotation, TerrainType,
    HEIGHT_LEVELS, SNOW_HEIGHT_LEVEL,
};
use crate::column::Column;
use crate::island::{ColumnGrid, Island, BORDER_MARGIN};
use crate::mask::MaskSampler;
use crate::pool::InstancePool;
use crate::seed::IslandSeed;
use crate::style::{Style, StyleTable};

/// Channel value under which a ridge sample raises a mountain.
pub const MOUNTAIN_THRESHOLD: f32 = 0.3;

/// Stack entries from the top of a mountain that keep their own terrain.
pub const MOUNTAIN_PLATEAU: u16 = 2;

/// Highest elevation level derived from the elevation channel.
pub const MAX_BASE_LEVEL: i8 = 4;

/// Border blending tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendSettings {
    /// Width of the blended band along each border, in columns
    pub band: u16,
    /// Blend weight at the island edge
    pub edge_weight: f32,
    /// Weight above which the neighbour's terrain and mountain flag are copied
    pub copy_threshold: f32,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            band: 5,
            edge_weight: 1.0,
            copy_threshold: 0.5,
        }
    }
}

/// Side of the island being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// -X
    Left,
    /// +X
    Right,
    /// +Z (island y + 1)
    Top,
    /// -Z (island y - 1)
    Bottom,
}

impl Side {
    /// All sides.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    /// Coordinate of the neighbour island on this side.
    #[must_use]
    pub const fn neighbour(self, coord: IslandCoord) -> IslandCoord {
        match self {
            Self::Left => coord.offset(-1, 0),
            Self::Right => coord.offset(1, 0),
            Self::Top => coord.offset(0, 1),
            Self::Bottom => coord.offset(0, -1),
        }
    }

    /// Neighbour column touching position `along` of this side.
    const fn facing_column(self, along: u16) -> LocalColumn {
        let last = (ISLAND_SIZE - 1) as u16;
        match self {
            Self::Left => LocalColumn::new(last, along),
            Self::Right => LocalColumn::new(0, along),
            Self::Top => LocalColumn::new(along, 0),
            Self::Bottom => LocalColumn::new(along, last),
        }
    }

    /// Distance of a column from this side, and its position along it.
    const fn distance_and_along(self, local: LocalColumn) -> (u16, u16) {
        let last = (ISLAND_SIZE - 1) as u16;
        match self {
            Self::Left => (local.x, local.z),
            Self::Right => (last - local.x, local.z),
            Self::Top => (last - local.z, local.x),
            Self::Bottom => (local.z, local.x),
        }
    }
}

/// Terrain of one neighbour edge column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCell {
    /// Terrain type
    pub terrain: TerrainType,
    /// Elevation level
    pub level: i8,
    /// Mountain flag
    pub mountain: bool,
}

/// Copy of the edge of a loaded neighbour island that faces the new island.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeProfile {
    cells: Vec<EdgeCell>,
}

impl EdgeProfile {
    /// Reads the edge of `neighbour` that touches `side` of the new island.
    ///
    /// Returns `None` unless the neighbour is loaded.
    #[must_use]
    pub fn from_neighbour(neighbour: &Island, side: Side) -> Option<Self> {
        if !neighbour.is_loaded() {
            return None;
        }
        let grid = neighbour.grid()?;
        let cells = (0..ISLAND_SIZE as u16)
            .map(|along| {
                grid.get(side.facing_column(along)).map(|c| EdgeCell {
                    terrain: c.terrain,
                    level: c.level,
                    mountain: c.mountain,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { cells })
    }

    fn get(&self, along: u16) -> Option<&EdgeCell> {
        self.cells.get(usize::from(along))
    }
}

/// Edges of the loaded neighbours of an island.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighbourEdges {
    /// Neighbour at x - 1
    pub left: Option<EdgeProfile>,
    /// Neighbour at x + 1
    pub right: Option<EdgeProfile>,
    /// Neighbour at y + 1
    pub top: Option<EdgeProfile>,
    /// Neighbour at y - 1
    pub bottom: Option<EdgeProfile>,
}

impl NeighbourEdges {
    /// Edge on one side.
    #[must_use]
    pub const fn side(&self, side: Side) -> Option<&EdgeProfile> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
            Side::Top => self.top.as_ref(),
            Side::Bottom => self.bottom.as_ref(),
        }
    }

    /// Sets the edge on one side.
    pub fn set(&mut self, side: Side, edge: Option<EdgeProfile>) {
        match side {
            Side::Left => self.left = edge,
            Side::Right => self.right = edge,
            Side::Top => self.top = edge,
            Side::Bottom => self.bottom = edge,
        }
    }

    /// Number of sides with a loaded neighbour.
    #[must_use]
    pub fn count(&self) -> usize {
        Side::ALL.iter().filter(|s| self.side(**s).is_some()).count()
    }
}

/// Derived terrain of one column before stacking.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CellInfo {
    terrain: TerrainType,
    level: i8,
    mountain: bool,
    style: u8,
}

/// Island generator over a fixed set of seed maps.
#[derive(Debug, Clone)]
pub struct IslandGenerator {
    masks: MaskSampler,
    styles: StyleTable,
    blend: BlendSettings,
    world_map_mode: bool,
}

impl IslandGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(masks: MaskSampler, styles: StyleTable, blend: BlendSettings) -> Self {
        Self {
            masks,
            styles,
            blend,
            world_map_mode: false,
        }
    }

    /// Enables per-cell styles from the world-map mask.
    #[must_use]
    pub fn with_world_map_mode(mut self, enabled: bool) -> Self {
        self.world_map_mode = enabled;
        self
    }

    /// Configured styles.
    #[must_use]
    pub const fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Generates an island to completion and replays its modification log.
    ///
    /// `fast` has no effect on the result; it only matters for the stepped
    /// form driven by the streaming loader.
    pub fn generate(
        &self,
        island: &mut Island,
        neighbours: NeighbourEdges,
        fast: bool,
        pool: &mut InstancePool,
    ) {
        let mut task = self.start(island, neighbours, fast);
        while !task.step(self) {}
        task.finish(island, pool);
    }

    /// Starts a resumable generation task for an island.
    #[must_use]
    pub fn start(
        &self,
        island: &mut Island,
        neighbours: NeighbourEdges,
        fast: bool,
    ) -> GenerationTask {
        island.begin_generation(self.styles.normalize(island.seed().style()));
        GenerationTask {
            coord: island.coord(),
            seed: *island.seed(),
            style: island.style(),
            neighbours,
            fast,
            next_row: 0,
            columns: Vec::with_capacity((ISLAND_SIZE * ISLAND_SIZE) as usize),
        }
    }

    fn derive_cell(
        &self,
        seed: &IslandSeed,
        coord: IslandCoord,
        style: u8,
        local: LocalColumn,
    ) -> CellInfo {
        let x = i64::from(local.x);
        let z = i64::from(local.z);
        let sample = |pair: usize| {
            let (ox, oz) = seed.offset_pair(pair);
            self.masks.primary(ox + x, oz + z)
        };
        let rock = sample(0).r;
        let fertility = sample(1).g;
        let elevation = sample(2).b;
        let ridge = sample(3).r;

        let style = if self.world_map_mode {
            let column = coord.column(local);
            self.masks
                .world_map(column.x, column.z)
                .map_or(style, |s| self.styles.from_world_map(s.r, s.g, s.b))
        } else {
            style
        };
        let rules = self.styles.get(style);

        let terrain = if rock < 0.5 {
            TerrainType::Stone
        } else if fertility < 0.5 {
            if rules.lava {
                TerrainType::Lava
            } else {
                TerrainType::Mud
            }
        } else if rules.grass {
            TerrainType::Grass
        } else {
            TerrainType::Stone
        };

        let mut level = (((1.0 - elevation) * 5.0) as i8).min(MAX_BASE_LEVEL);
        if rules.water {
            level -= 1;
        }

        CellInfo {
            terrain,
            level: level.clamp(-1, rules.max_level),
            mountain: ridge < MOUNTAIN_THRESHOLD,
            style,
        }
    }

    fn blend_cell(
        &self,
        cell: CellInfo,
        local: LocalColumn,
        neighbours: &NeighbourEdges,
    ) -> CellInfo {
        let band = self.blend.band.max(1);
        let mut weight_sum = 0.0f32;
        let mut level_sum = 0.0f32;
        let mut strongest: Option<(f32, EdgeCell)> = None;

        for side in Side::ALL {
            let Some(edge) = neighbours.side(side) else {
                continue;
            };
            let (distance, along) = side.distance_and_along(local);
            if distance >= band {
                continue;
            }
            let Some(edge_cell) = edge.get(along) else {
                continue;
            };
            let weight = self.blend.edge_weight * f32::from(band - distance) / f32::from(band);
            weight_sum += weight;
            level_sum += weight * f32::from(edge_cell.level);
            if strongest.map_or(true, |(w, _)| weight > w) {
                strongest = Some((weight, *edge_cell));
            }
        }

        let Some((max_weight, edge_cell)) = strongest else {
            return cell;
        };

        let target = level_sum / weight_sum;
        let own = f32::from(cell.level);
        let rules = self.styles.get(cell.style);
        let mut blended = CellInfo {
            level: (own + (target - own) * max_weight.min(1.0))
                .round()
                .clamp(-1.0, f32::from(rules.max_level)) as i8,
            ..cell
        };
        if max_weight > self.blend.copy_threshold {
            blended.terrain = edge_cell.terrain;
            blended.mountain = edge_cell.mountain;
        }
        if blended.level == -1 {
            blended.terrain = TerrainType::Grass;
        }
        blended
    }

    fn build_column(
        &self,
        seed: &IslandSeed,
        coord: IslandCoord,
        local: LocalColumn,
        cell: CellInfo,
    ) -> Column {
        let rules: &Style = self.styles.get(cell.style);
        let mut top = (i32::from(cell.level) + 1).max(0) as u16;
        if cell.mountain {
            top = top.saturating_add(rules.mountain_height);
        }
        let border = local.edge_distance() < BORDER_MARGIN;

        let stack = (0..=top)
            .map(|index| {
                let height_level = index.min(u16::from(HEIGHT_LEVELS - 1)) as u8;
                let near_top = index.saturating_add(2) > top;
                let mut terrain = cell.terrain;

                if !near_top && terrain == TerrainType::Grass {
                    terrain = TerrainType::Mud;
                }
                if cell.mountain && index.saturating_add(MOUNTAIN_PLATEAU) <= top {
                    terrain = TerrainType::Stone;
                }
                if border && index > 1 {
                    terrain = TerrainType::Stone;
                }
                if near_top {
                    if terrain == TerrainType::Grass && !rules.grass {
                        terrain = TerrainType::Stone;
                    }
                    if height_level == SNOW_HEIGHT_LEVEL && !rules.snow {
                        terrain = TerrainType::Stone;
                    }
                }

                let (appearance, rotation) = seed.block_appearance(local, index);
                BlockInstance::new(
                    terrain,
                    height_level,
                    index,
                    block_placement(coord, local, index),
                    rotation,
                    appearance,
                )
            })
            .collect();

        let mut column = Column::with_stack(local, cell.terrain, cell.level, stack);
        column.mountain = cell.mountain;
        column.style = cell.style;

        let (ox, oz) = seed.offset_pair(3);
        let decoration = self.masks.secondary(i64::from(local.x) + oz, i64::from(local.z) + ox);
        if decoration.g > 0.5 {
            let kind = DecorationKind::from_unit(decoration.r);
            let mut rng = seed.block_rng(local, top + 1);
            column.walkable = !kind.blocks_movement();
            column.decoration = Some(PropInstance {
                kind,
                height_level: top.min(u16::from(HEIGHT_LEVELS - 1)) as u8,
                rotation: Rotation::from_quarter_turns(rng.u8(0..4)),
                style: cell.style,
                appearance: rng.u8(0..100),
                column: local,
                island: coord,
                stack_index: top,
                visual: None,
            });
        }

        column.force_top_native_visible();
        column
    }
}

/// Resumable island generation, one grid row per step.
#[derive(Debug)]
pub struct GenerationTask {
    coord: IslandCoord,
    seed: IslandSeed,
    style: u8,
    neighbours: NeighbourEdges,
    fast: bool,
    next_row: u16,
    columns: Vec<Column>,
}

impl GenerationTask {
    /// Island being generated.
    #[must_use]
    pub const fn coord(&self) -> IslandCoord {
        self.coord
    }

    /// Whether every row has been generated.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next_row as u32 >= ISLAND_SIZE
    }

    /// Rows generated so far.
    #[must_use]
    pub const fn rows_done(&self) -> u16 {
        self.next_row
    }

    /// Generates the next row (every row in fast mode).
    ///
    /// Returns `true` once the grid is complete.
    pub fn step(&mut self, generator: &IslandGenerator) -> bool {
        let rows = if self.fast { ISLAND_SIZE as u16 } else { 1 };
        for _ in 0..rows {
            if self.is_complete() {
                break;
            }
            let z = self.next_row;
            for x in 0..ISLAND_SIZE as u16 {
                let local = LocalColumn::new(x, z);
                let cell = generator.derive_cell(&self.seed, self.coord, self.style, local);
                let cell = generator.blend_cell(cell, local, &self.neighbours);
                self.columns
                    .push(generator.build_column(&self.seed, self.coord, local, cell));
            }
            self.next_row += 1;
        }
        self.is_complete()
    }

    /// Installs the generated grid into the island and replays its log.
    pub fn finish(self, island: &mut Island, pool: &mut InstancePool) {
        debug_assert!(self.is_complete());
        island.install_grid(ColumnGrid::from_columns(self.columns), pool);
        info!(
            "Generated island ({}, {}) with {} blended sides, {} edits replayed",
            self.coord.x,
            self.coord.y,
            self.neighbours.count(),
            island.modifications().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{MaskSampler, SeedMap};
    use crate::pool::PoolConfig;

    fn smoke_seed() -> IslandSeed {
        "10_10_10_10_10_10_10_10_1".parse().expect("valid seed")
    }

    fn pool() -> InstancePool {
        InstancePool::new(&PoolConfig::default(), 4)
    }

    fn generate(
        generator: &IslandGenerator,
        coord: IslandCoord,
        seed: IslandSeed,
        neighbours: NeighbourEdges,
    ) -> Island {
        let mut island = Island::new(coord, seed);
        generator.generate(&mut island, neighbours, true, &mut pool());
        island
    }

    #[test]
    fn test_flat_masks_smoke_scenario() {
        let generator = IslandGenerator::new(
            MaskSampler::flat(),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let island = generate(
            &generator,
            IslandCoord::new(0, 0),
            smoke_seed(),
            NeighbourEdges::default(),
        );

        assert!(island.is_loaded());
        let grid = island.grid().expect("generated");
        assert_eq!(grid.iter().count(), (ISLAND_SIZE * ISLAND_SIZE) as usize);
        for column in grid.iter() {
            assert_eq!(column.terrain, TerrainType::Grass);
            assert_eq!(column.level, 0);
            assert!(!column.mountain);
            assert!(column.decoration().is_none());
            assert!(column.walkable);
            assert_eq!(column.top_index(), 1);
        }
    }

    #[test]
    fn test_generation_deterministic() {
        let generator = IslandGenerator::new(
            MaskSampler::procedural(5, 64),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let seed: IslandSeed = "3_17_40_2_9_61_5_33_0".parse().expect("valid seed");
        let a = generate(&generator, IslandCoord::new(2, 3), seed, NeighbourEdges::default());
        let b = generate(&generator, IslandCoord::new(2, 3), seed, NeighbourEdges::default());

        assert_eq!(a.terrain_signature(), b.terrain_signature());
        assert_eq!(a.grid(), b.grid());
    }

    #[test]
    fn test_stepped_generation_matches_fast() {
        let generator = IslandGenerator::new(
            MaskSampler::procedural(8, 64),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let seed: IslandSeed = "1_2_3_4_5_6_7_8_3".parse().expect("valid seed");
        let fast = generate(&generator, IslandCoord::new(0, 0), seed, NeighbourEdges::default());

        let mut island = Island::new(IslandCoord::new(0, 0), seed);
        let mut task = generator.start(&mut island, NeighbourEdges::default(), false);
        let mut steps = 1;
        while !task.step(&generator) {
            steps += 1;
        }
        assert_eq!(steps, ISLAND_SIZE);
        task.finish(&mut island, &mut pool());

        assert_eq!(island.terrain_signature(), fast.terrain_signature());
    }

    #[test]
    fn test_border_blend_matches_neighbour_edge() {
        let generator = IslandGenerator::new(
            MaskSampler::procedural(11, 64),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let left = generate(
            &generator,
            IslandCoord::new(0, 0),
            "5_5_5_5_5_5_5_5_0".parse().expect("seed"),
            NeighbourEdges::default(),
        );

        let mut neighbours = NeighbourEdges::default();
        neighbours.set(Side::Left, EdgeProfile::from_neighbour(&left, Side::Left));
        assert_eq!(neighbours.count(), 1);

        let right = generate(
            &generator,
            IslandCoord::new(1, 0),
            "90_12_33_71_8_0_44_19_0".parse().expect("seed"),
            neighbours,
        );

        let last = (ISLAND_SIZE - 1) as u16;
        for z in 0..ISLAND_SIZE as u16 {
            let edge = left.column(LocalColumn::new(last, z)).expect("in bounds");
            let seam = right.column(LocalColumn::new(0, z)).expect("in bounds");
            assert_eq!(seam.level, edge.level, "level seam at z={z}");
            assert_eq!(seam.mountain, edge.mountain, "mountain seam at z={z}");
            if seam.level >= 0 {
                assert_eq!(seam.terrain, edge.terrain, "terrain seam at z={z}");
            }
        }
    }

    #[test]
    fn test_unloaded_neighbour_has_no_edge() {
        let island = Island::new(IslandCoord::new(0, 0), smoke_seed());
        assert!(EdgeProfile::from_neighbour(&island, Side::Right).is_none());
    }

    #[test]
    fn test_mountains_are_stone_below_plateau() {
        let primary = SeedMap::uniform(2, 2, [0, 255, 0, 255]);
        let generator = IslandGenerator::new(
            MaskSampler::new(primary, SeedMap::uniform(2, 2, [0, 0, 0, 255])),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let island = generate(
            &generator,
            IslandCoord::new(0, 0),
            "0_0_0_0_0_0_0_0_1".parse().expect("seed"),
            NeighbourEdges::default(),
        );

        let column = island.column(LocalColumn::new(100, 100)).expect("in bounds");
        assert!(column.mountain);
        assert_eq!(column.terrain, TerrainType::Stone);
        // level 4 + 1, plus the meadow mountain bonus of 3
        assert_eq!(column.top_index(), 8);
        assert!(column.blocks().iter().all(|b| b.terrain == TerrainType::Stone));
        assert!(column.top().is_some_and(|b| b.force_visible));
    }

    #[test]
    fn test_oversized_mountain_bonus_saturates() {
        let spire = Style {
            name: "spire".to_string(),
            water: false,
            snow: false,
            grass: true,
            lava: false,
            mountain_height: u16::MAX,
            max_level: 4,
        };
        let generator = IslandGenerator::new(
            MaskSampler::flat(),
            StyleTable::new(vec![spire]),
            BlendSettings::default(),
        );
        let cell = CellInfo {
            terrain: TerrainType::Stone,
            level: MAX_BASE_LEVEL,
            mountain: true,
            style: 0,
        };
        let column = generator.build_column(
            &smoke_seed(),
            IslandCoord::new(0, 0),
            LocalColumn::new(100, 100),
            cell,
        );
        assert_eq!(column.top_index(), u16::MAX);
    }

    #[test]
    fn test_island_style_is_normalized() {
        let generator = IslandGenerator::new(
            MaskSampler::flat(),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let seed: IslandSeed = "10_10_10_10_10_10_10_10_9".parse().expect("valid seed");
        let island = generate(&generator, IslandCoord::new(0, 0), seed, NeighbourEdges::default());

        assert_eq!(island.style(), 1);
        let column = island.column(LocalColumn::new(100, 100)).expect("in bounds");
        assert_eq!(column.style, island.style());
    }

    #[test]
    fn test_decorations_from_secondary_mask() {
        let generator = IslandGenerator::new(
            MaskSampler::new(
                SeedMap::uniform(2, 2, [255, 255, 255, 255]),
                SeedMap::uniform(2, 2, [0, 255, 0, 255]),
            ),
            StyleTable::default(),
            BlendSettings::default(),
        );
        let island = generate(
            &generator,
            IslandCoord::new(0, 0),
            smoke_seed(),
            NeighbourEdges::default(),
        );
        let column = island.column(LocalColumn::new(50, 50)).expect("in bounds");
        let prop = column.decoration().expect("decorated");
        assert_eq!(prop.kind, DecorationKind::Tree);
        assert_eq!(prop.stack_index, column.top_index());
        assert!(!column.walkable);
    }

    #[test]
    fn test_world_map_mode_overrides_style() {
        let masks = MaskSampler::new(
            SeedMap::uniform(2, 2, [255, 255, 255, 255]),
            SeedMap::uniform(2, 2, [0, 0, 0, 255]),
        )
        .with_world_map(SeedMap::uniform(2, 2, [255, 255, 255, 255]));
        let generator = IslandGenerator::new(masks, StyleTable::default(), BlendSettings::default())
            .with_world_map_mode(true);
        let island = generate(
            &generator,
            IslandCoord::new(0, 0),
            smoke_seed(),
            NeighbourEdges::default(),
        );

        // bright world map selects the last style (tundra: water, no grass)
        let column = island.column(LocalColumn::new(100, 100)).expect("in bounds");
        assert_eq!(column.style, 3);
        assert_eq!(column.terrain, TerrainType::Stone);
        assert_eq!(column.level, -1);
    }
}
