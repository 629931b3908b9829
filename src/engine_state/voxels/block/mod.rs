//! # Block Module
//!
//! This module provides the core block-related functionality for the voxel world.
//! It includes block type definitions, block face handling, and block data structures.

use block_type::BlockType;
use cgmath::Point3;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
/// This is used for efficient storage and serialization of block data.
pub type BlockTypeSize = u8;

/// Maps each block type to its texture tile for each face.
///
/// The outer array is indexed by `BlockType` as a `usize`.
/// The inner array contains 6 tile ids, one for each face in the order:
/// [Front, Back, Bottom, Top, Left, Right]
pub static BLOCK_TYPE_TO_TEXTURE_INDICES: [[u32; 6]; BlockType::COUNT] = [
    [0, 0, 0, 0, 0, 0],       // AIR (never meshed)
    [0, 0, 0, 0, 0, 0],       // DIRT
    [1, 1, 0, 2, 1, 1],       // GRASS (top: 2, bottom: dirt, sides: 1)
    [3, 3, 3, 3, 3, 3],       // STONE
    [4, 4, 5, 5, 4, 4],       // WOOD (end grain on top and bottom)
    [6, 6, 6, 6, 6, 6],       // LEAF
    [7, 7, 7, 7, 7, 7],       // SAND
    [8, 8, 0, 8, 8, 8],       // SNOW (dirt underneath)
    [9, 9, 9, 9, 9, 9],       // PLANKS
    [10, 10, 10, 10, 10, 10], // BRICK
    [11, 11, 11, 11, 11, 11], // COBBLESTONE
    [12, 12, 12, 12, 12, 12], // IRON_ORE
    [13, 13, 13, 13, 13, 13], // GRAVEL
];

/// Represents a single voxel block in the world.
///
/// This is a lightweight value pairing a block type with the block's world position.
/// Blocks are never stored individually; chunks hand them out by value, so an
/// out-of-range lookup can return an `AIR` block without referencing shared state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The type of this block.
    pub block_type: BlockType,
    /// World-space position of this block.
    pub position: Point3<i32>,
}

impl Block {
    /// Creates a new block of the specified type at a world position.
    pub fn new(block_type: BlockType, position: Point3<i32>) -> Self {
        Block {
            block_type,
            position,
        }
    }

    /// An empty block at the given position.
    pub fn air(position: Point3<i32>) -> Self {
        Block::new(BlockType::AIR, position)
    }

    /// Returns `true` if this block is anything but air.
    pub fn is_solid(&self) -> bool {
        self.block_type.is_solid()
    }
}
