#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! A chunked voxel world: procedural terrain, tree structures that cross chunk
//! borders, face-culled meshing, a versioned on-disk chunk format and a worker
//! pool that streams chunks around a moving observer.
//!
//! ## Key Modules
//!
//! * `core` - Shared resources, errors, logging and configuration
//! * `engine_state` - The frame driver, the worker pool, meshing and all voxel data
//!
//! ## Architecture
//!
//! The crate keeps a clear separation between:
//! * Voxel data (blocks, chunks, the world index)
//! * Procedural content (terrain and structures)
//! * Persistence (codec and chunk storage)
//! * Meshing and the upload seam to a graphics backend
//! * Task scheduling and execution
//!
//! ## Usage
//!
//! ```ignore
//! use cgmath::Point3;
//! use voxel_world::{EngineState, WorldConfig};
//!
//! voxel_world::core::logging::init();
//! let mut engine = EngineState::new(WorldConfig::default());
//! engine.startup(Point3::new(0.0, 80.0, 0.0));
//!
//! loop {
//!     engine.update(player_position());
//!     for (chunk, mesh) in engine.drawable_meshes() {
//!         draw(chunk, mesh.handle, mesh.triangle_count);
//!     }
//! }
//! ```

pub mod core;
pub mod engine_state;

pub use crate::core::{Error, Result, WorldConfig};
pub use engine_state::buffer_state::{BufferState, MeshHandle, MeshUploader, UploadedMesh};
pub use engine_state::rendering::meshing::{ChunkMesh, MeshBuilder, TextureTable};
pub use engine_state::rendering::Vertex;
pub use engine_state::task_management::TaskManager;
pub use engine_state::voxels::block::{block_side::BlockSide, block_type::BlockType, Block};
pub use engine_state::voxels::chunk::{Chunk, ChunkState, LoadedChunk};
pub use engine_state::voxels::generation::{StructurePlacer, TerrainGenerator};
pub use engine_state::voxels::persistence::{
    decode, detect_format, encode, ChunkStorage, CodecError, FormatVersion,
};
pub use engine_state::voxels::world::World;
pub use engine_state::{EngineState, PipelineStats};
