//! # Chunk Iteration Module
//!
//! This module provides an iterator over the non-air blocks of a chunk. The mesher
//! and the compressed file encoders only care about solid cells, and visiting them
//! in linear index order keeps runs of equal types adjacent.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_type::BlockType;

use super::Chunk;

/// An iterator over all non-air blocks in a chunk, in linear index order.
///
/// Yields the linear index, the local position and the block type of each solid cell.
pub struct ChunkBlockIterator<'a> {
    /// Reference to the chunk being iterated over
    chunk_ref: &'a Chunk,
    /// Next linear index to inspect
    current_offset: usize,
}

/// A solid cell produced by `ChunkBlockIterator`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkCell {
    pub index: usize,
    pub local: Point3<i32>,
    pub block_type: BlockType,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates a new `ChunkBlockIterator` positioned before the first block of the chunk.
    pub fn new(chunk_ref: &'a Chunk) -> Self {
        ChunkBlockIterator {
            chunk_ref,
            current_offset: 0,
        }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = ChunkCell;

    fn next(&mut self) -> Option<Self::Item> {
        let blocks = self.chunk_ref.blocks();
        while self.current_offset < blocks.len() {
            let index = self.current_offset;
            self.current_offset += 1;

            let block_type = blocks[index];
            if block_type.is_solid() {
                return Some(ChunkCell {
                    index,
                    local: Chunk::position_of(index),
                    block_type,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_air_and_keeps_order() {
        let mut chunk = Chunk::empty(Point3::new(0, 0, 0));
        chunk.set_block_at(Point3::new(2, 3, 4), BlockType::SNOW);
        chunk.set_block_at(Point3::new(0, 0, 0), BlockType::DIRT);
        chunk.set_block_at(Point3::new(15, 127, 15), BlockType::GRAVEL);

        let cells: Vec<ChunkCell> = chunk.iter_blocks().collect();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].local, Point3::new(0, 0, 0));
        assert_eq!(cells[1].block_type, BlockType::SNOW);
        assert_eq!(cells[1].local, Point3::new(2, 3, 4));
        assert_eq!(cells[2].index, super::super::CHUNK_VOLUME - 1);
    }

    #[test]
    fn test_empty_chunk_yields_nothing() {
        let chunk = Chunk::empty(Point3::new(3, 0, -3));
        assert_eq!(chunk.iter_blocks().count(), 0);
    }
}
