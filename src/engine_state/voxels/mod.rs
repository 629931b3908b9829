//! # Voxel World Data
//!
//! Everything that describes the world itself: block types, the fixed-size chunk
//! grid, procedural terrain and structures, the on-disk chunk format and the sparse
//! world index that ties them together.
//!
//! ## Architecture
//!
//! * **Block**: Block types, their faces and per-face texture tiles
//! * **Chunk**: Fixed 16x128x16 block grids and the shared `LoadedChunk` wrapper
//! * **Generation**: Noise-driven terrain, biomes and tree placement
//! * **Persistence**: The versioned chunk codec and one-file-per-chunk storage
//! * **World**: The chunk index, block edits, eviction and saving
//! * **Tasks**: Background chunk generation
//!
//! ## Data Flow
//!
//! 1. A chunk is requested and a worker loads it from disk or generates it
//! 2. Generated chunks are written through to disk and get their structure pass
//! 3. Edits mark the chunk dirty and queue it for meshing
//! 4. Chunks far from the observer are saved and evicted
//!
//! ## Thread Safety
//!
//! * The index is shared behind one lock; map changes take it for writing
//! * Each chunk carries its own grid lock and a busy flag for mesh builds
//! * Lock order is always world, then chunk

pub mod block;
pub mod chunk;
pub mod generation;
pub mod persistence;
pub mod tasks;
pub mod world;
