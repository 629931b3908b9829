//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the main thread with a `TaskContext`
//! 5. The result can spawn follow-up tasks
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the main thread
//! - Anything that touches upload state lives in `TaskContext`, which never leaves
//!   the main thread

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Point3;
use log::error;

use crate::core::MtResource;
use crate::engine_state::buffer_state::MeshUploader;
use crate::engine_state::rendering::meshing::MeshBuilder;
use crate::engine_state::voxels::chunk::ChunkState;
use crate::engine_state::voxels::world::World;
use crate::engine_state::PipelineStats;

/// Main-thread services available to result handlers.
pub struct TaskContext<'a> {
    pub world: &'a MtResource<World>,
    pub mesh_builder: &'a Arc<MeshBuilder>,
    pub uploader: &'a mut dyn MeshUploader,
    /// Chunks that were requested but are not in the world yet.
    pub requested: &'a mut HashMap<Point3<i32>, ChunkState>,
    pub stats: &'a mut PipelineStats,
}

/// A unit of work executed on a worker thread.
///
/// Tasks own everything they need (shared handles are `Arc`s or `MtResource`s),
/// so they can be moved to any worker.
pub trait Task: Send {
    /// Does the work. Runs on a worker thread.
    fn process(&self) -> Box<dyn TaskResult + Send>;

    /// Result reported in place of `process()`'s when it panics.
    fn failed(&self) -> Box<dyn TaskResult + Send> {
        Box::new(FailedTask {
            description: String::from("task"),
        })
    }
}

/// The result of processing a `Task`, consumed on the main thread.
pub trait TaskResult: Send {
    /// Applies the result. Returns follow-up tasks to schedule.
    ///
    /// Runs on the main thread; keep it cheap.
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>>;
}

/// Reported when a task panicked on its worker.
pub struct FailedTask {
    pub description: String,
}

impl TaskResult for FailedTask {
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        error!("Worker task failed: {}", self.description);
        ctx.stats.tasks_failed += 1;
        Vec::new()
    }
}
