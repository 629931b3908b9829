//! # Chunk Module
//!
//! This module provides the `Chunk` struct and related functionality for managing
//! 16x128x16 columns of voxel data, plus the conversions between world space and
//! chunk space.
//!
//! ## Storage
//!
//! A chunk is a dense array holding exactly `CHUNK_VOLUME` block types, indexed by
//! `x + y * CHUNK_SIZE_X + z * CHUNK_SIZE_X * CHUNK_SIZE_Y`. The length never changes
//! after construction, so a valid local coordinate always maps to a valid slot.
//!
//! Every accessor is total: local coordinates outside the chunk resolve to
//! `BlockType::AIR` and writes to them are ignored. The mesher relies on this to
//! treat the space beyond the chunk border as empty.
//!
//! ### Performance Characteristics
//! - **Block Lookup**: O(1) - a bounds check and an index
//! - **Memory Usage**: one byte per block (32 KiB per chunk)

use std::fmt;

use cgmath::{Point3, Vector3};

use super::block::block_type::BlockType;
use super::block::Block;

pub use chunk_creation::ChunkCreationIterator;
pub use chunk_iteration::ChunkBlockIterator;
pub use shared::{ChunkOrigin, ChunkState, LoadedChunk, MeshBuildGuard, MeshRebuild};

mod chunk_creation;
pub mod chunk_iteration;
pub mod shared;

/// Width of a chunk in blocks.
pub const CHUNK_SIZE_X: i32 = 16;
/// Height of a chunk in blocks.
pub const CHUNK_SIZE_Y: i32 = 128;
/// Depth of a chunk in blocks.
pub const CHUNK_SIZE_Z: i32 = 16;
/// The number of blocks in one horizontal row stack (`CHUNK_SIZE_X * CHUNK_SIZE_Y`).
pub const CHUNK_PLANE_SIZE: i32 = CHUNK_SIZE_X * CHUNK_SIZE_Y;
/// The total number of blocks in a chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_PLANE_SIZE * CHUNK_SIZE_Z) as usize;

/// Represents a 16x128x16 collection of voxel blocks in the world.
///
/// Chunks are the fundamental unit of world data: they are generated, persisted and
/// meshed as a whole. Each chunk knows its position in chunk coordinates and owns
/// the types of all of its blocks.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The position of this chunk in chunk coordinates (not block coordinates).
    pub position: Point3<i32>,

    /// Block types in linear index order. Always exactly `CHUNK_VOLUME` long.
    blocks: Vec<BlockType>,
}

impl Chunk {
    /// Creates a new, completely empty chunk (all blocks are air).
    pub fn empty(position: Point3<i32>) -> Self {
        Self::filled(position, BlockType::AIR)
    }

    /// Creates a chunk where every block has the given type.
    pub fn filled(position: Point3<i32>, block_type: BlockType) -> Self {
        Chunk {
            position,
            blocks: vec![block_type; CHUNK_VOLUME],
        }
    }

    /// Creates a chunk with roughly `density` of its blocks set to random solid types.
    pub fn random(position: Point3<i32>, density: f64) -> Self {
        let mut cci = ChunkCreationIterator::new(position);

        for _ in 0..CHUNK_VOLUME {
            if fastrand::f64() < density {
                cci.push_block_type(BlockType::get_random_type());
            } else {
                cci.push_block_type(BlockType::AIR);
            }
        }

        cci.return_chunk()
    }

    /// Linear index of a local coordinate, or `None` if it lies outside the chunk.
    #[inline]
    pub fn index_of(local: Point3<i32>) -> Option<usize> {
        if Self::in_bounds(local) {
            Some((local.x + local.y * CHUNK_SIZE_X + local.z * CHUNK_PLANE_SIZE) as usize)
        } else {
            None
        }
    }

    /// Local coordinate of a linear index. The index must be below `CHUNK_VOLUME`.
    #[inline]
    pub fn position_of(index: usize) -> Point3<i32> {
        let index = index as i32;
        Point3::new(
            index % CHUNK_SIZE_X,
            (index / CHUNK_SIZE_X) % CHUNK_SIZE_Y,
            index / CHUNK_PLANE_SIZE,
        )
    }

    /// Returns `true` if the local coordinate lies inside the chunk.
    #[inline]
    pub fn in_bounds(local: Point3<i32>) -> bool {
        (0..CHUNK_SIZE_X).contains(&local.x)
            && (0..CHUNK_SIZE_Y).contains(&local.y)
            && (0..CHUNK_SIZE_Z).contains(&local.z)
    }

    /// World-space position of this chunk's local origin.
    pub fn world_origin(&self) -> Point3<i32> {
        chunk_world_origin(self.position)
    }

    /// Type of the block at a local coordinate. Out-of-range coordinates are `AIR`.
    #[inline]
    pub fn block_type_at(&self, local: Point3<i32>) -> BlockType {
        match Self::index_of(local) {
            Some(index) => self.blocks[index],
            None => BlockType::AIR,
        }
    }

    /// Type of the block at a linear index. Indices past the end are `AIR`.
    #[inline]
    pub fn block_type_at_index(&self, index: usize) -> BlockType {
        self.blocks.get(index).copied().unwrap_or(BlockType::AIR)
    }

    /// Gets the block at the specified chunk-relative coordinates.
    ///
    /// The returned block carries its world position. Coordinates outside the chunk
    /// yield an `AIR` block at the corresponding world position.
    pub fn get_block_at(&self, local: Point3<i32>) -> Block {
        let position = self.world_origin() + Vector3::new(local.x, local.y, local.z);
        Block::new(self.block_type_at(local), position)
    }

    /// Returns `true` if the block at a local coordinate is not air.
    #[inline]
    pub fn is_block_solid(&self, local: Point3<i32>) -> bool {
        self.block_type_at(local).is_solid()
    }

    /// Sets the block at a local coordinate.
    ///
    /// Returns `false` and leaves the chunk untouched if the coordinate is out of range.
    pub fn set_block_at(&mut self, local: Point3<i32>, block_type: BlockType) -> bool {
        match Self::index_of(local) {
            Some(index) => {
                self.blocks[index] = block_type;
                true
            }
            None => false,
        }
    }

    /// Sets the block at a linear index. Returns `false` for indices past the end.
    pub fn set_block_at_index(&mut self, index: usize, block_type: BlockType) -> bool {
        match self.blocks.get_mut(index) {
            Some(slot) => {
                *slot = block_type;
                true
            }
            None => false,
        }
    }

    /// Number of blocks that are not air.
    pub fn non_empty_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.is_solid()).count()
    }

    /// All block types in linear index order.
    pub fn blocks(&self) -> &[BlockType] {
        &self.blocks
    }

    /// Iterates over the non-air blocks with their local coordinates.
    pub fn iter_blocks(&self) -> ChunkBlockIterator<'_> {
        ChunkBlockIterator::new(self)
    }

    /// Determines which faces of the block at a local coordinate border a non-solid block.
    ///
    /// The result is indexed by `BlockSide`. Neighbours outside the chunk count as air.
    pub fn generate_adjacent_blocks(&self, local: Point3<i32>) -> [bool; 6] {
        use super::block::block_side::BlockSide;

        let mut exposed = [false; 6];
        for side in BlockSide::all() {
            exposed[side as usize] = !self.is_block_solid(local + side.offset());
        }
        exposed
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("position", &self.position)
            .field("non_empty", &self.non_empty_count())
            .finish()
    }
}

/// World-space position of the local origin of the chunk at `chunk_position`.
pub fn chunk_world_origin(chunk_position: Point3<i32>) -> Point3<i32> {
    Point3::new(
        chunk_position.x * CHUNK_SIZE_X,
        chunk_position.y * CHUNK_SIZE_Y,
        chunk_position.z * CHUNK_SIZE_Z,
    )
}

/// Splits a world-space block position into its chunk position and local coordinate.
///
/// Uses floor division, so `-1` maps to the last block of chunk `-1` rather than
/// to chunk `0`.
pub fn world_to_chunk(world: Point3<i32>) -> (Point3<i32>, Point3<i32>) {
    let chunk = Point3::new(
        world.x.div_euclid(CHUNK_SIZE_X),
        world.y.div_euclid(CHUNK_SIZE_Y),
        world.z.div_euclid(CHUNK_SIZE_Z),
    );
    let local = Point3::new(
        world.x.rem_euclid(CHUNK_SIZE_X),
        world.y.rem_euclid(CHUNK_SIZE_Y),
        world.z.rem_euclid(CHUNK_SIZE_Z),
    );
    (chunk, local)
}
