//! # Chunk Persistence
//!
//! Chunks are written through to disk as soon as they are generated and again when
//! they are evicted. `codec` defines the binary layouts; `storage` maps chunk
//! positions to files.

pub mod codec;
pub mod storage;

pub use codec::{decode, detect_format, encode, CodecError, FormatVersion};
pub use storage::ChunkStorage;
