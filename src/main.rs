//! # Voxel World Demo
//!
//! Streams a world around an observer walking in a straight line, making random
//! block edits along the way, then saves everything on exit.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [config.json]
//! ```

use cgmath::Point3;
use log::{error, info};

use voxel_world::{core::logging, BlockType, EngineState, WorldConfig};

const FRAMES: u32 = 600;
const WALK_SPEED: f32 = 0.5;
const EDITS_PER_FRAME: usize = 4;

fn main() {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match WorldConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Could not read config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => WorldConfig::default(),
    };
    info!("Starting with seed {} in {}", config.seed, config.chunk_dir().display());

    let mut engine = EngineState::new(config);
    let start_height = engine.get_height_at(0, 0) as f32 + 2.0;
    engine.startup(Point3::new(0.5, start_height, 0.5));

    let mut rng = fastrand::Rng::new();
    let edit_blocks = [BlockType::BRICK, BlockType::PLANKS, BlockType::COBBLESTONE];

    for frame in 0..FRAMES {
        let x = frame as f32 * WALK_SPEED;
        let z = x * 0.5;
        engine.update(Point3::new(x, start_height, z));

        for _ in 0..EDITS_PER_FRAME {
            let wx = x as i32 + rng.i32(-16..16);
            let wz = z as i32 + rng.i32(-16..16);
            let surface = engine.get_actual_height_at(wx, wz);
            if surface < 0 {
                continue;
            }
            if rng.bool() {
                let block_type = edit_blocks[rng.usize(..edit_blocks.len())];
                engine.place_block(Point3::new(wx, surface + 1, wz), block_type);
            } else {
                engine.remove_block(Point3::new(wx, surface, wz));
            }
        }

        if frame % 100 == 0 {
            info!(
                "Frame {}: {} chunks loaded, {} drawable, {:?}",
                frame,
                engine.chunk_count(),
                engine.drawable_meshes().len(),
                engine.stats()
            );
        }
    }

    let saved = engine.shutdown();
    let analytics = engine.buffer_state().analytics();
    info!(
        "Saved {} chunks. Final stats {:?}, {} bytes of mesh data live",
        saved,
        engine.stats(),
        analytics.allocated_memory
    );
}
