//! # Voxel Task System
//!
//! Tasks that bring chunks into the world on worker threads.

pub mod chunk_generation_task;
