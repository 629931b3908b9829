//! Mesh generation primitives for voxel rendering.
//!
//! # Architecture
//! - [`ChunkMesh`]: vertex and index buffers for a whole chunk
//! - [`Face`]: one visible quad of a voxel with its corners and texture tile

mod face;
#[allow(clippy::module_inception)]
mod mesh;

pub use face::{Face, FACE_UVS};
pub use mesh::*;
