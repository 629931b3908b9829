//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: Builds the mesh of a dirty chunk and hands it to
//!   the main thread for upload

pub mod chunk_mesh_generation_task;
