//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world.
//! It provides functionality for block type identification, checked conversion from
//! the on-disk byte representation, and random generation.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// Each variant represents a distinct type of block with its own textures.
/// The discriminants are stable: they are written to chunk files, so new variants
/// must only ever be appended. The `FromPrimitive` derive allows checked conversion
/// from integers, which is how persisted bytes are turned back into block types.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Non-solid, never meshed, never stored in compressed chunk files.
    #[default]
    AIR = 0,

    /// Sub-surface soil of most biomes.
    DIRT,

    /// A grass block with different textures on top and sides.
    /// The top is green, sides have grass on dirt, and bottom is plain dirt.
    GRASS,

    /// Bedrock of every column below the sub-surface band.
    STONE,

    /// Tree trunks, with end grain on top and bottom.
    WOOD,

    /// Tree foliage.
    LEAF,

    /// Desert surface and sub-surface.
    SAND,

    /// Surface of snowy biomes.
    SNOW,

    /// Surface variant found in forests.
    PLANKS,

    /// Surface variant found on mountains.
    BRICK,

    /// Mountain surface variant and underground pocket block.
    COBBLESTONE,

    /// Ore veins found deep underground.
    IRON_ORE,

    /// Surface variant found in swamps.
    GRAVEL,
}

impl BlockType {
    /// Number of block types, including `AIR`.
    pub const COUNT: usize = 13;

    /// Every block type in discriminant order.
    pub const ALL: [BlockType; BlockType::COUNT] = [
        BlockType::AIR,
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::STONE,
        BlockType::WOOD,
        BlockType::LEAF,
        BlockType::SAND,
        BlockType::SNOW,
        BlockType::PLANKS,
        BlockType::BRICK,
        BlockType::COBBLESTONE,
        BlockType::IRON_ORE,
        BlockType::GRAVEL,
    ];

    /// Converts a raw byte to a `BlockType`.
    ///
    /// Returns `None` for bytes that don't name a block type, which is how the
    /// persistence layer detects corrupt data instead of trusting the input.
    pub fn from_int(btype: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(btype)
    }

    /// The compact byte representation used in memory and on disk.
    pub fn as_int(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Returns `true` for every type except `AIR`.
    #[inline]
    pub fn is_solid(self) -> bool {
        self != BlockType::AIR
    }

    /// Generates a random block type (excluding AIR).
    ///
    /// # Returns
    /// A random `BlockType` that is not `BlockType::AIR`
    pub fn get_random_type() -> Self {
        Self::ALL[fastrand::usize(1..Self::COUNT)]
    }
}
