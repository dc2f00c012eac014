//! # Archipelago Engine
//!
//! Headless driver for the Archipelago island world.
//!
//! Loads `archipelago.toml` (or the path given as the first argument), walks
//! the observer across an island border while streaming, applies a few
//! edits, saves the world and loads it back.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use archipelago_common::{IslandCoord, WorldColumn, ISLAND_SIZE};
use archipelago_world::{EngineConfig, StreamingStats, TerrainType, WorldEngine, CONFIG_FILE};
use glam::Vec3;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ticks spent walking from one island centre to the next.
const WALK_TICKS: u32 = 400;

fn accumulate(total: &mut StreamingStats, tick: StreamingStats) {
    total.islands_generated += tick.islands_generated;
    total.islands_evicted += tick.islands_evicted;
    total.columns_loaded += tick.columns_loaded;
    total.columns_unloaded += tick.columns_unloaded;
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("archipelago=info".parse()?))
        .init();

    info!("Archipelago starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = EngineConfig::load_from(&config_path);
    let save_path = config.save_path.clone();
    let mut engine = WorldEngine::from_config(config).context("Failed to load masks")?;

    let half = ISLAND_SIZE as f32 * 0.5;
    let start = Vec3::new(half, 0.0, half);
    engine.teleport(start);

    let step = Vec3::new(ISLAND_SIZE as f32 / WALK_TICKS as f32, 0.0, 0.0);
    let mut totals = StreamingStats::default();
    for tick in 0..WALK_TICKS {
        let position = start + step * tick as f32;
        let height = engine.surface_height_at(position);
        engine.set_observer(Vec3::new(position.x, height, position.z), 90.0);
        accumulate(&mut totals, engine.tick());
    }
    info!(
        "Walk finished: {} islands generated, {} evicted, {} columns loaded, {} unloaded",
        totals.islands_generated,
        totals.islands_evicted,
        totals.columns_loaded,
        totals.columns_unloaded
    );

    let observer = engine.world().observer().position;
    let column = WorldColumn::from_position(observer);
    let top = engine
        .world()
        .column(column)
        .map(archipelago_world::Column::top_index)
        .context("Observer column is not generated")?;
    let placement = Vec3::new(column.x as f32, f32::from(top + 1), column.z as f32);
    engine.add_block(column, TerrainType::Custom(0), 0, 180.0, top + 1, placement)?;
    let destroyed = engine.destroy_blocks_in_area(observer + Vec3::new(4.0, 0.0, 0.0), 2.5, 2);
    info!(
        "Surface: height {}, walkable {}, speed x{}, friction {}; destroyed {destroyed}",
        engine.surface_height_at(observer),
        engine.surface_walkable_at(observer),
        engine.movement_speed_multiplier_at(observer),
        engine.friction_at(observer)
    );

    engine.save_world(&save_path)?;
    if let Some(dir) = save_path.parent() {
        let coord = IslandCoord::from_position(observer);
        if let Some(maps) = engine.maps(coord) {
            maps.save_png(dir, coord).context("Failed to write minimap")?;
        }
    }

    engine.load_world(&save_path)?;
    info!(
        "Reloaded {} islands, {} visuals active, {} spawned",
        engine.world().island_count(),
        engine.pool().active_count(),
        engine.pool().spawned_count()
    );

    info!("Archipelago shutdown complete");
    Ok(())
}
