//! Rendering side of the chunk pipeline.
//!
//! This module turns block grids into vertex/index data. Nothing here touches a
//! graphics device: meshes are built on workers and handed to a
//! [`MeshUploader`](crate::engine_state::buffer_state::MeshUploader) on the main thread.

pub mod meshing;
pub mod tasks;
mod vertex;

// Re-export commonly used types
pub use vertex::Vertex;
