//! # Chunk Generation Task
//!
//! Brings one chunk into the world on a worker thread. Loading, generation, the
//! structure pass and saving all happen outside the world lock; the lock is only
//! taken to insert chunks and queue meshes. A chunk that is already present
//! because a neighbour's structure created it only gets its structure pass.

use cgmath::Point3;
use log::{debug, error};

use crate::{
    core::MtResource,
    engine_state::{
        rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask,
        task_management::task::{Task, TaskContext, TaskResult},
        voxels::{
            chunk::ChunkOrigin,
            world::{ChunkProducer, StreamOutcome, World},
        },
    },
};

/// A task that brings the chunk at `position` into the world.
pub struct ChunkGenerationTask {
    world: MtResource<World>,
    producer: ChunkProducer,
    position: Point3<i32>,
}

impl ChunkGenerationTask {
    pub fn new(world: MtResource<World>, position: Point3<i32>) -> Self {
        let producer = world.get().producer();
        ChunkGenerationTask {
            world,
            producer,
            position,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let origin = match self.producer.stream(&self.world, self.position) {
            StreamOutcome::Inserted(origin) => Some(origin),
            StreamOutcome::StructuresCompleted | StreamOutcome::AlreadyPresent => None,
        };

        Box::new(ChunkGenerationTaskResult {
            position: self.position,
            origin,
            failed: false,
        })
    }

    fn failed(&self) -> Box<dyn TaskResult + Send> {
        Box::new(ChunkGenerationTaskResult {
            position: self.position,
            origin: None,
            failed: true,
        })
    }
}

/// The result of a chunk generation task.
pub struct ChunkGenerationTaskResult {
    position: Point3<i32>,
    /// `None` if the chunk was already present, in which case at most its structures were placed.
    origin: Option<ChunkOrigin>,
    failed: bool,
}

impl TaskResult for ChunkGenerationTaskResult {
    /// Clears the request and schedules mesh builds for everything the insertion
    /// touched, including neighbours that received structure blocks.
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        ctx.requested.remove(&self.position);

        if self.failed {
            error!("Chunk {:?} could not be produced", self.position);
            ctx.stats.tasks_failed += 1;
            return Vec::new();
        }

        match self.origin {
            Some(ChunkOrigin::Generated) => ctx.stats.chunks_generated += 1,
            Some(ChunkOrigin::Loaded) => ctx.stats.chunks_loaded += 1,
            None => debug!("Completed structures for chunk {:?}", self.position),
        }

        let pending = ctx.world.get_mut().take_pending_meshes();
        pending
            .into_iter()
            .map(|chunk| {
                Box::new(ChunkMeshGenerationTask::new(chunk, ctx.mesh_builder.clone()))
                    as Box<dyn Task + Send>
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorldConfig;
    use crate::engine_state::buffer_state::BufferState;
    use crate::engine_state::rendering::meshing::{MeshBuilder, TextureTable};
    use crate::engine_state::voxels::chunk::ChunkState;
    use crate::engine_state::PipelineStats;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_generates_inserts_and_schedules_meshes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WorldConfig {
            save_dir: dir.path().to_path_buf(),
            ..WorldConfig::default()
        };
        let world = MtResource::new(World::new(&config));
        let builder = Arc::new(MeshBuilder::new(TextureTable::default()));
        let mut buffers = BufferState::new();
        let mut requested = HashMap::new();
        let mut stats = PipelineStats::default();
        let position = Point3::new(3, 0, 3);
        requested.insert(position, ChunkState::Generating);

        let result = ChunkGenerationTask::new(world.clone(), position).process();
        assert!(world.get().contains_chunk(position));
        assert!(world.get().storage().exists(position));

        let mut ctx = TaskContext {
            world: &world,
            mesh_builder: &builder,
            uploader: &mut buffers,
            requested: &mut requested,
            stats: &mut stats,
        };
        let follow_up = result.handle_result(&mut ctx);
        assert!(!follow_up.is_empty());
        drop(ctx);

        assert!(requested.is_empty());
        assert_eq!(stats.chunks_generated, 1);

        // A second world over the same directory loads instead of generating.
        let reloaded = MtResource::new(World::new(&config));
        let result = ChunkGenerationTask::new(reloaded.clone(), position).process();
        let mut ctx = TaskContext {
            world: &reloaded,
            mesh_builder: &builder,
            uploader: &mut buffers,
            requested: &mut requested,
            stats: &mut stats,
        };
        result.handle_result(&mut ctx);
        drop(ctx);
        assert_eq!(stats.chunks_loaded, 1);
        assert_eq!(
            *reloaded.get().get_chunk_at(position).expect("loaded").read(),
            *world.get().get_chunk_at(position).expect("generated").read()
        );
    }

    #[test]
    fn test_failed_result_clears_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WorldConfig {
            save_dir: dir.path().to_path_buf(),
            ..WorldConfig::default()
        };
        let world = MtResource::new(World::new(&config));
        let builder = Arc::new(MeshBuilder::new(TextureTable::default()));
        let mut buffers = BufferState::new();
        let mut requested = HashMap::new();
        let mut stats = PipelineStats::default();
        let position = Point3::new(0, 0, 0);
        requested.insert(position, ChunkState::Loading);

        let result = ChunkGenerationTask::new(world.clone(), position).failed();
        let mut ctx = TaskContext {
            world: &world,
            mesh_builder: &builder,
            uploader: &mut buffers,
            requested: &mut requested,
            stats: &mut stats,
        };
        assert!(result.handle_result(&mut ctx).is_empty());
        drop(ctx);

        assert!(requested.is_empty());
        assert_eq!(stats.tasks_failed, 1);
        assert!(!world.get().contains_chunk(position));
    }
}
