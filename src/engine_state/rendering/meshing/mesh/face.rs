use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

/// Unit-quad texture coordinates, in corner order.
pub const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Represents a single visible quad face of a voxel.
///
/// Corners are stored in the order lower-left, lower-right, upper-right, upper-left
/// as seen from outside the block, which makes them counter-clockwise around the
/// outward normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Corner positions in world space
    pub corners: [Point3<i32>; 4],
    /// Texture tile of the face
    pub tile: u32,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates the face on `block_side` of the unit block whose minimum corner is `origin`.
    pub fn new(origin: Point3<i32>, block_side: BlockSide, tile: u32) -> Self {
        let offsets = corner_offsets(block_side);
        let corners = offsets.map(|[x, y, z]| Point3::new(origin.x + x, origin.y + y, origin.z + z));

        Face {
            corners,
            tile,
            block_side,
        }
    }
}

/// Corner offsets of each face from the block's minimum corner.
fn corner_offsets(block_side: BlockSide) -> [[i32; 3]; 4] {
    match block_side {
        BlockSide::RIGHT => [[1, 0, 1], [1, 0, 0], [1, 1, 0], [1, 1, 1]],
        BlockSide::LEFT => [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]],
        BlockSide::FRONT => [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]],
        BlockSide::BACK => [[1, 0, 0], [0, 0, 0], [0, 1, 0], [1, 1, 0]],
        BlockSide::TOP => [[0, 1, 1], [1, 1, 1], [1, 1, 0], [0, 1, 0]],
        BlockSide::BOTTOM => [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]],
    }
}
