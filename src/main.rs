//! Terrain streaming walker: moves a viewpoint in a straight line and
//! streams tiles around it without a renderer.
//!
//! Usage: cargo run --release -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>    JSON terrain config (default: built-in defaults)
//!   --steps <N>        Number of simulated frames (default: 600)
//!   --speed <M/S>      Walking speed along +X (default: 40.0)
//!   --radius <TILES>   Override generation radius
//!   --capacity <N>     Override parked-tile cache capacity
//!   --seed <SEED>      Noise seed (default: 12345)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;

use terrastream::core::{Result, logging};
use terrastream::math::GridPosition;
use terrastream::streaming::{HeadlessAttachment, TerrainConfig, TickReport, TilePool};
use terrastream::terrain::NoiseSampler;

/// Simulated frame time (60 Hz)
const FRAME: Duration = Duration::from_micros(16_667);

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let mut config = match parse_str_arg(args, "--config") {
        Some(path) => {
            let path = PathBuf::from(path);
            log::info!("Loading config from {}", path.display());
            TerrainConfig::load_sync(&path)?
        }
        None => TerrainConfig::default(),
    };
    if let Some(radius) = parse_u32_arg(args, "--radius") {
        config.generation_radius = radius;
    }
    if let Some(capacity) = parse_usize_arg(args, "--capacity") {
        config.cache_capacity = capacity;
    }

    let steps = parse_usize_arg(args, "--steps").unwrap_or(600);
    let speed = parse_f32_arg(args, "--speed").unwrap_or(40.0);
    let seed = parse_u32_arg(args, "--seed").unwrap_or(12345);

    log::info!(
        "Walking {} frames at {} m/s (seed {}, radius {}, capacity {})",
        steps, speed, seed, config.generation_radius, config.cache_capacity
    );

    let sampler = Arc::new(NoiseSampler::fbm(seed, 5, 0.5, 2.0));
    let mut pool = TilePool::new(config, sampler, HeadlessAttachment::new())?;

    let start = Instant::now();
    let mut totals = TickReport::default();
    let mut position = Vec3::new(0.5, 0.0, 0.5);
    let mut last_tile = None;

    for step in 0..steps {
        pool.set_tracked_position(Some(position));
        let report = pool.tick(FRAME);
        totals.merge(&report);

        let tile = GridPosition::from_world(position, pool.config().tile_length);
        if last_tile != Some(tile) {
            log::info!(
                "frame {:>5}: viewer at tile {} | active {} | parked {} | in flight {}",
                step,
                tile,
                pool.cache().active_count(),
                pool.cache().parked_count(),
                pool.in_flight_count()
            );
            last_tile = Some(tile);
        }

        position.x += speed * FRAME.as_secs_f32();
    }

    totals.merge(&pool.finish_in_flight());
    let elapsed = start.elapsed();
    let stats = pool.cache().stats();

    log::info!("Done in {:.2?}", elapsed);
    log::info!(
        "Tiles: {} requested, {} activated, {} recycled, {} parked, {} evicted, {} failed",
        totals.requested, totals.activated, totals.recycled, totals.parked, totals.evicted, totals.failed
    );
    log::info!(
        "Meshes: {} LOD switches, {} colliders built",
        totals.lod_updates, totals.colliders_built
    );
    log::info!(
        "Cache: {} hits, {} misses ({:.1}% hit rate), {} live entities",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0,
        pool.engine().live_count()
    );

    Ok(())
}

fn print_help() {
    println!("Usage: terrastream [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>    JSON terrain config");
    println!("  --steps <N>        Number of simulated frames (default: 600)");
    println!("  --speed <M/S>      Walking speed along +X (default: 40.0)");
    println!("  --radius <TILES>   Override generation radius");
    println!("  --capacity <N>     Override parked-tile cache capacity");
    println!("  --seed <SEED>      Noise seed (default: 12345)");
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
