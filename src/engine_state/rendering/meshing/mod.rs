//! Mesh generation for voxel chunks.
//!
//! The builder emits one quad for every face that separates a solid cell from an
//! empty one. Faces are not merged across cells, so the quad count follows the
//! number of exposed faces. Cells outside the chunk count as empty; meshing never
//! looks at neighbouring chunks.
//!
//! # Architecture
//! - `MeshBuilder`: converts a chunk into a [`ChunkMesh`]
//! - `TextureTable`: block type and side to texture tile lookup
//! - `mesh/`: quad and buffer primitives

use cgmath::Vector3;

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, block_type::BlockType, BLOCK_TYPE_TO_TEXTURE_INDICES},
    chunk::Chunk,
};

pub mod mesh;

pub use mesh::{ChunkMesh, Face};

/// Texture tile for every block type and face.
///
/// Rows are indexed by `BlockType`, columns by `BlockSide`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureTable {
    tiles: [[u32; 6]; BlockType::COUNT],
}

impl TextureTable {
    pub fn new(tiles: [[u32; 6]; BlockType::COUNT]) -> Self {
        TextureTable { tiles }
    }

    pub fn tile(&self, block_type: BlockType, side: BlockSide) -> u32 {
        self.tiles[block_type as usize][side as usize]
    }
}

impl Default for TextureTable {
    fn default() -> Self {
        Self::new(BLOCK_TYPE_TO_TEXTURE_INDICES)
    }
}

/// Builds chunk meshes. Immutable and shared between workers.
#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    textures: TextureTable,
}

impl MeshBuilder {
    pub fn new(textures: TextureTable) -> Self {
        MeshBuilder { textures }
    }

    /// Builds the mesh of a chunk from scratch, in world space.
    pub fn build(&self, chunk: &Chunk) -> ChunkMesh {
        let origin = chunk.world_origin();
        let mut mesh = ChunkMesh::new();

        for cell in chunk.iter_blocks() {
            let exposed = chunk.generate_adjacent_blocks(cell.local);
            let block_origin = origin + Vector3::new(cell.local.x, cell.local.y, cell.local.z);

            for side in BlockSide::all() {
                if exposed[side as usize] {
                    let tile = self.textures.tile(cell.block_type, side);
                    mesh.push_face(&Face::new(block_origin, side, tile));
                }
            }
        }

        mesh
    }
}
