//! Mesh data structures for voxel rendering.
//!
//! A `ChunkMesh` is the CPU-side vertex and index buffer pair of one chunk. It is
//! rebuilt from scratch whenever the chunk changes and handed to the main thread
//! for upload.

use crate::engine_state::rendering::Vertex;

use super::face::{Face, FACE_UVS};

/// Vertices per quad face.
pub const VERTICES_PER_FACE: usize = 4;
/// Indices per quad face (two triangles).
pub const INDICES_PER_FACE: usize = 6;

/// Triangle mesh of a chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    /// Four vertices per face
    pub vertices: Vec<Vertex>,
    /// Six indices per face, `b, b+1, b+2, b, b+2, b+3`
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one quad.
    pub fn push_face(&mut self, face: &Face) {
        let base = self.vertices.len() as u32;
        let normal = face.block_side.normal();

        for (corner, uv) in face.corners.iter().zip(FACE_UVS) {
            self.vertices.push(Vertex::new(
                [corner.x as f32, corner.y as f32, corner.z as f32],
                uv,
                face.tile,
                normal,
            ));
        }
        self.indices
            .extend_from_slice(&Self::generate_face_indices(base));
    }

    /// Indices of the two triangles of the quad starting at vertex `base`.
    pub fn generate_face_indices(base: u32) -> [u32; INDICES_PER_FACE] {
        [base, base + 1, base + 2, base, base + 2, base + 3]
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_FACE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
