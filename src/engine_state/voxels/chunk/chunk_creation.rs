//! # Chunk Creation Module
//!
//! This module provides a builder that fills a chunk one block at a time in linear
//! index order (x fastest, then y, then z). Terrain generation and the legacy file
//! decoder both produce blocks in exactly that order, so they can stream cells into
//! the builder without computing indices themselves.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_type::BlockType;

use super::{Chunk, CHUNK_VOLUME};

/// A builder for creating and populating chunks in linear index order.
///
/// The builder never grows past `CHUNK_VOLUME` blocks: pushes beyond the end are
/// ignored, and `return_chunk` pads a partially filled chunk with air, so the
/// resulting chunk always has the fixed volume.
pub struct ChunkCreationIterator {
    /// The position of the chunk being created, in chunk coordinates
    position: Point3<i32>,
    /// Blocks pushed so far, in linear index order
    blocks: Vec<BlockType>,
}

impl ChunkCreationIterator {
    /// Creates a new `ChunkCreationIterator` for building a chunk at the given position.
    pub fn new(position: Point3<i32>) -> Self {
        ChunkCreationIterator {
            position,
            blocks: Vec::with_capacity(CHUNK_VOLUME),
        }
    }

    /// Finalizes the chunk creation and returns the constructed `Chunk`.
    ///
    /// Cells that were never pushed are air.
    pub fn return_chunk(mut self) -> Chunk {
        self.blocks.resize(CHUNK_VOLUME, BlockType::AIR);
        Chunk {
            position: self.position,
            blocks: self.blocks,
        }
    }

    /// Adds a block at the current position and advances to the next linear index.
    ///
    /// Returns `false` once the chunk is full; the block is then dropped.
    pub fn push_block_type(&mut self, block_type: BlockType) -> bool {
        if self.is_complete() {
            return false;
        }
        self.blocks.push(block_type);
        true
    }

    /// Number of blocks pushed so far.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no block has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns `true` once every cell of the chunk has been pushed.
    pub fn is_complete(&self) -> bool {
        self.blocks.len() >= CHUNK_VOLUME
    }
}
