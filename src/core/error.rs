//! Error types for the voxel world

use thiserror::Error;

use crate::engine_state::voxels::persistence::CodecError;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunk codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Standard Result type for the engine
pub type Result<T> = std::result::Result<T, Error>;
