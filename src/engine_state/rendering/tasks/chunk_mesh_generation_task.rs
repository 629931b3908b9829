//! Task for generating mesh data for chunks in a background thread.
//!
//! The worker side rebuilds the mesh under the chunk's busy flag. The main-thread
//! side uploads the result, unless the chunk was evicted or replaced in the
//! meantime, and schedules another build if the chunk was edited while meshing.
//! A build that found the chunk busy is queued again as long as the chunk is
//! still loaded and dirty.

use std::sync::Arc;

use log::debug;

use crate::engine_state::{
    rendering::meshing::MeshBuilder,
    task_management::task::{Task, TaskContext, TaskResult},
    voxels::chunk::{ChunkState, LoadedChunk, MeshRebuild},
};

/// Rebuilds the mesh of one chunk.
pub struct ChunkMeshGenerationTask {
    chunk: Arc<LoadedChunk>,
    mesh_builder: Arc<MeshBuilder>,
}

impl ChunkMeshGenerationTask {
    pub fn new(chunk: Arc<LoadedChunk>, mesh_builder: Arc<MeshBuilder>) -> Self {
        ChunkMeshGenerationTask {
            chunk,
            mesh_builder,
        }
    }
}

impl Task for ChunkMeshGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let outcome = self.chunk.rebuild_mesh(&self.mesh_builder);
        Box::new(ChunkMeshGenerationTaskResult {
            chunk: self.chunk.clone(),
            outcome,
        })
    }
}

/// A finished (or skipped) mesh build.
pub struct ChunkMeshGenerationTaskResult {
    chunk: Arc<LoadedChunk>,
    outcome: MeshRebuild,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        let ChunkMeshGenerationTaskResult { chunk, outcome } = *self;
        let position = chunk.position();
        let still_loaded = ctx
            .world
            .get()
            .get_chunk_at(position)
            .is_some_and(|current| Arc::ptr_eq(&current, &chunk));

        match outcome {
            MeshRebuild::Built => {}
            MeshRebuild::Clean => return Vec::new(),
            MeshRebuild::Busy => {
                // Eviction can hold the flag and then keep the chunk.
                if still_loaded && chunk.is_mesh_dirty() {
                    debug!("Chunk {:?} was busy, queueing its mesh again", position);
                    ctx.world.get_mut().mark_mesh_pending(position);
                }
                return Vec::new();
            }
        }

        // A later build may already have been uploaded together with this one.
        let Some(mesh) = chunk.take_built_mesh() else {
            return Vec::new();
        };

        if !still_loaded {
            debug!("Chunk {:?} left the world before upload, dropping its mesh", position);
            ctx.stats.uploads_skipped += 1;
            return Vec::new();
        }

        let uploaded = ctx.uploader.upload(&mesh);
        if let Some(previous) = chunk.set_uploaded(uploaded) {
            ctx.uploader.release(previous.handle);
        }
        ctx.stats.meshes_uploaded += 1;

        chunk.set_state(ChunkState::MeshReady);
        if chunk.is_mesh_dirty() {
            chunk.set_state(ChunkState::MeshDirty);
            return vec![Box::new(ChunkMeshGenerationTask::new(
                chunk,
                ctx.mesh_builder.clone(),
            ))];
        }
        Vec::new()
    }
}
