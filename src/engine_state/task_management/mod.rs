//! # Task Management System
//!
//! A fixed pool of worker threads for chunk generation and meshing.
//!
//! ## Architecture Overview
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work executed on a worker
//! - `TaskResult`: The result of a completed task, handled on the main thread
//! - `TaskChannel`: Communication channel between the main thread and one worker
//!
//! Each worker has its own task channel and result channel. The main thread hands
//! out tasks round-robin, keeps at most `MAX_TASKS_IN_FLIGHT` per worker and queues
//! the rest locally. Results are only ever handled on the main thread, which is
//! where uploads happen.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(num_workers);
//! task_manager.publish_task(Box::new(MyTask::new(...)));
//!
//! // In the main loop:
//! task_manager.process_completed_tasks(&mut ctx);
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};
use task::{Task, TaskContext, TaskResult};

/// A communication channel between the main thread and a worker thread.
struct TaskChannel {
    task_sender: Option<Sender<Box<dyn Task + Send>>>,
    result_receiver: Receiver<Box<dyn TaskResult + Send>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task + Send>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
pub const MAX_TASKS_IN_FLIGHT: usize = 2;

/// How long `wait_until_idle` sleeps when no result is ready.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl TaskManager {
    /// Creates a new `TaskManager` with `num_workers` threads (at least one).
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let mut channels = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task + Send>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult + Send>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| task.process()))
                        .unwrap_or_else(|_| task.failed());
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{index}"))
                .spawn(task_closure);
            match worker {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: Some(task_tx),
                    result_receiver: result_rx,
                    num_tasks_in_flight: 0,
                    worker: Some(worker),
                }),
                Err(e) => error!("Could not spawn worker {}: {}", index, e),
            }
        }

        info!(
            "Started {} workers (available parallelism: {:?})",
            channels.len(),
            thread::available_parallelism()
        );

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// Returns the task back if the worker is gone.
    fn try_send_task(
        &mut self,
        task: Box<dyn Task + Send>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task + Send>> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = &channel.task_sender else {
            return Err(task);
        };

        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds the next channel, round-robin from the last used one, that can take
    /// another task.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&idx| {
                let channel = &self.channels[idx];
                channel.task_sender.is_some() && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    /// Publishes a new task for execution.
    ///
    /// Returns `true` if the task went straight to a worker and `false` if it was
    /// queued because all workers are busy.
    pub fn publish_task(&mut self, task: Box<dyn Task + Send>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(()) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Moves queued tasks to workers while any have room, oldest first.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(()) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Handles every result that is ready and publishes the follow-up tasks.
    /// Returns the number of results handled.
    ///
    /// Must be called from the main thread.
    pub fn process_completed_tasks(&mut self, ctx: &mut TaskContext<'_>) -> usize {
        let mut tasks_to_queue = Vec::new();
        let mut handled = 0;

        for (index, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                        tasks_to_queue.extend(result.handle_result(ctx));
                        handled += 1;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if channel.task_sender.take().is_some() {
                            error!(
                                "Worker {} disconnected with {} tasks in flight",
                                index, channel.num_tasks_in_flight
                            );
                        }
                        channel.num_tasks_in_flight = 0;
                        break;
                    }
                }
            }
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
        handled
    }

    /// Number of tasks currently on workers.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    pub fn queued_task_count(&self) -> usize {
        self.queued_tasks.len()
    }

    /// True while any task is queued or running.
    pub fn has_work(&self) -> bool {
        !self.queued_tasks.is_empty() || self.tasks_in_flight() > 0
    }

    /// Blocks until every task, including follow-ups, has finished and its result
    /// was handled. Used for the startup burst and on shutdown.
    pub fn wait_until_idle(&mut self, ctx: &mut TaskContext<'_>) {
        loop {
            self.process_queued_tasks();
            let handled = self.process_completed_tasks(ctx);
            if !self.has_work() {
                break;
            }
            if self.find_available_channel().is_none() && self.tasks_in_flight() == 0 {
                error!(
                    "No live workers left; dropping {} queued tasks",
                    self.queued_tasks.len()
                );
                self.queued_tasks.clear();
                break;
            }
            if handled == 0 {
                thread::sleep(IDLE_POLL_INTERVAL);
            }
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    error!("Worker thread panicked during shutdown");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::task::FailedTask;
    use super::*;
    use crate::core::{MtResource, WorldConfig};
    use crate::engine_state::buffer_state::BufferState;
    use crate::engine_state::rendering::meshing::{MeshBuilder, TextureTable};
    use crate::engine_state::rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask;
    use crate::engine_state::voxels::chunk::{Chunk, ChunkOrigin, LoadedChunk};
    use crate::engine_state::voxels::world::World;
    use crate::engine_state::PipelineStats;
    use cgmath::Point3;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Harness {
        _dir: tempfile::TempDir,
        world: MtResource<World>,
        builder: Arc<MeshBuilder>,
        buffers: BufferState,
        requested: HashMap<Point3<i32>, crate::engine_state::voxels::chunk::ChunkState>,
        stats: PipelineStats,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let config = WorldConfig {
                save_dir: dir.path().to_path_buf(),
                ..WorldConfig::default()
            };
            Harness {
                world: MtResource::new(World::new(&config)),
                _dir: dir,
                builder: Arc::new(MeshBuilder::new(TextureTable::default())),
                buffers: BufferState::new(),
                requested: HashMap::new(),
                stats: PipelineStats::default(),
            }
        }

        fn ctx(&mut self) -> TaskContext<'_> {
            TaskContext {
                world: &self.world,
                mesh_builder: &self.builder,
                uploader: &mut self.buffers,
                requested: &mut self.requested,
                stats: &mut self.stats,
            }
        }

        fn insert_random(&self, count: i32) -> Vec<Arc<LoadedChunk>> {
            let mut world = self.world.get_mut();
            let chunks = (0..count)
                .map(|i| world.insert_produced(Chunk::random(Point3::new(i, 0, 0), 0.3), ChunkOrigin::Loaded))
                .collect();
            world.take_pending_meshes();
            chunks
        }
    }

    struct CountingTask {
        counter: Arc<AtomicUsize>,
        panics: bool,
    }

    impl Task for CountingTask {
        fn process(&self) -> Box<dyn TaskResult + Send> {
            if self.panics {
                panic!("boom");
            }
            self.counter.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingResult)
        }

        fn failed(&self) -> Box<dyn TaskResult + Send> {
            Box::new(FailedTask {
                description: String::from("counting task"),
            })
        }
    }

    struct CountingResult;

    impl TaskResult for CountingResult {
        fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
            ctx.stats.meshes_uploaded += 1;
            Vec::new()
        }
    }

    #[test]
    fn test_overflow_is_queued_and_drained() {
        let mut harness = Harness::new();
        let mut manager = TaskManager::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let accepted = (0..10)
            .filter(|_| {
                manager.publish_task(Box::new(CountingTask {
                    counter: counter.clone(),
                    panics: false,
                }))
            })
            .count();
        assert_eq!(accepted, MAX_TASKS_IN_FLIGHT);
        assert_eq!(manager.queued_task_count(), 10 - MAX_TASKS_IN_FLIGHT);

        manager.wait_until_idle(&mut harness.ctx());
        assert!(!manager.has_work());
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(harness.stats.meshes_uploaded, 10);
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let mut harness = Harness::new();
        let mut manager = TaskManager::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        manager.publish_task(Box::new(CountingTask {
            counter: counter.clone(),
            panics: true,
        }));
        manager.publish_task(Box::new(CountingTask {
            counter: counter.clone(),
            panics: false,
        }));
        manager.wait_until_idle(&mut harness.ctx());

        assert_eq!(harness.stats.tasks_failed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(manager.tasks_in_flight(), 0);

        // The worker that caught the panic keeps serving tasks.
        for _ in 0..4 {
            manager.publish_task(Box::new(CountingTask {
                counter: counter.clone(),
                panics: false,
            }));
        }
        manager.wait_until_idle(&mut harness.ctx());
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_every_chunk_is_meshed_exactly_once() {
        let mut harness = Harness::new();
        let chunks = harness.insert_random(12);
        let mut manager = TaskManager::new(4);

        for _ in 0..3 {
            for chunk in &chunks {
                manager.publish_task(Box::new(ChunkMeshGenerationTask::new(
                    chunk.clone(),
                    harness.builder.clone(),
                )));
            }
        }
        manager.wait_until_idle(&mut harness.ctx());

        for chunk in &chunks {
            assert_eq!(chunk.mesh_build_count(), 1);
            assert!(!chunk.is_busy());
            assert!(chunk.uploaded().is_some());
        }
        assert_eq!(harness.buffers.buffer_count(), chunks.len());
        assert_eq!(harness.stats.meshes_uploaded, chunks.len());
    }

    #[test]
    fn test_scoped_threads_never_double_build() {
        let harness = Harness::new();
        let chunks = harness.insert_random(16);
        let builder = harness.builder.clone();

        thread::scope(|scope| {
            for _ in 0..6 {
                scope.spawn(|| {
                    for chunk in chunks.iter().rev() {
                        chunk.rebuild_mesh(&builder);
                    }
                });
            }
        });

        for chunk in &chunks {
            assert_eq!(chunk.mesh_build_count(), 1);
            assert!(!chunk.is_mesh_dirty());
        }
    }

    #[test]
    fn test_drop_joins_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut manager = TaskManager::new(3);
            for _ in 0..3 {
                manager.publish_task(Box::new(CountingTask {
                    counter: counter.clone(),
                    panics: false,
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
