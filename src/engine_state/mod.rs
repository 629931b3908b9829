//! # Engine State Module
//!
//! This module contains the frame driver of the voxel world. `EngineState` owns the
//! shared `World`, the worker pool and the upload seam, and advances the chunk
//! pipeline once per frame around an observer position.
//!
//! ## Frame Flow
//!
//! 1. Chunks that drifted beyond the view distance plus margin are saved and evicted,
//!    and their uploaded buffers are released
//! 2. Missing chunks around the observer are requested, nearest first, up to the
//!    per-frame throttle
//! 3. Chunks with a dirty mesh get a mesh build task
//! 4. Finished tasks are handled on this thread, which is the only place uploads happen
//!
//! Generation and meshing never run on the calling thread during `update`; only
//! `startup` and `shutdown` block until the workers are idle.

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Point3;
use log::{debug, info};

use crate::core::{MtResource, WorldConfig};
use self::buffer_state::{BufferState, MeshUploader, UploadedMesh};
use self::rendering::meshing::{MeshBuilder, TextureTable};
use self::rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask;
use self::task_management::{task::TaskContext, TaskManager};
use self::voxels::{
    block::{block_type::BlockType, Block},
    chunk::{world_to_chunk, ChunkState},
    tasks::chunk_generation_task::ChunkGenerationTask,
    world::{chunks_in_radius, World},
};

pub mod buffer_state;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// Counters describing what the pipeline has done so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub chunks_requested: usize,
    pub chunks_generated: usize,
    pub chunks_loaded: usize,
    pub chunks_evicted: usize,
    pub meshes_uploaded: usize,
    /// Finished meshes dropped because their chunk left the world first.
    pub uploads_skipped: usize,
    pub tasks_failed: usize,
}

/// Main engine state that streams, edits and meshes the world around an observer.
pub struct EngineState {
    config: WorldConfig,
    world: MtResource<World>,
    mesh_builder: Arc<MeshBuilder>,
    task_manager: TaskManager,
    buffer_state: BufferState,
    /// Chunks with a generation task in flight.
    requested: HashMap<Point3<i32>, ChunkState>,
    stats: PipelineStats,
    center: Point3<i32>,
}

impl EngineState {
    /// Creates the world and spawns `config.worker_count` workers. No chunk is
    /// produced until `startup` or `update` is called.
    pub fn new(config: WorldConfig) -> Self {
        let world = MtResource::new(World::new(&config));
        let task_manager = TaskManager::new(config.worker_count);

        Self {
            world,
            mesh_builder: Arc::new(MeshBuilder::new(TextureTable::default())),
            task_manager,
            buffer_state: BufferState::new(),
            requested: HashMap::new(),
            stats: PipelineStats::default(),
            center: Point3::new(0, 0, 0),
            config,
        }
    }

    /// Requests every chunk in view of `player_pos` and blocks until all of them
    /// are generated, meshed and uploaded.
    ///
    /// # Arguments
    ///
    /// * `player_pos` - The observer position in world space
    pub fn startup(&mut self, player_pos: Point3<f32>) {
        let start = web_time::Instant::now();
        self.center = Self::chunk_position_of(player_pos);

        let positions = chunks_in_radius(self.center, self.config.view_distance);
        let issued = self.request_chunks(positions, usize::MAX);
        self.wait_until_idle();

        info!(
            "Startup produced {} chunks around {:?} in {:?}",
            issued,
            self.center,
            start.elapsed()
        );
    }

    /// Advances the pipeline by one frame.
    ///
    /// # Arguments
    ///
    /// * `player_pos` - The observer position in world space
    pub fn update(&mut self, player_pos: Point3<f32>) {
        self.center = Self::chunk_position_of(player_pos);

        let evicted = self.world.get_mut().unload_far_chunks(
            self.center,
            self.config.view_distance,
            self.config.unload_margin,
        );
        for chunk in &evicted {
            if let Some(uploaded) = chunk.take_uploaded() {
                self.buffer_state.release(uploaded.handle);
            }
        }
        self.stats.chunks_evicted += evicted.len();

        let positions = chunks_in_radius(self.center, self.config.view_distance);
        self.request_chunks(positions, self.config.max_generation_requests_per_frame);
        self.schedule_meshes();

        let (task_manager, mut ctx) = self.split_context();
        task_manager.process_queued_tasks();
        task_manager.process_completed_tasks(&mut ctx);
    }

    /// Blocks until every queued and running task has finished and been handled.
    pub fn wait_until_idle(&mut self) {
        self.schedule_meshes();
        let (task_manager, mut ctx) = self.split_context();
        task_manager.wait_until_idle(&mut ctx);
    }

    /// Finishes outstanding work and writes every loaded chunk. Returns the number
    /// of chunks saved.
    pub fn shutdown(&mut self) -> usize {
        self.wait_until_idle();
        self.world.get().save_all()
    }

    /// Places a block in a loaded chunk. Edits to unloaded chunks are refused.
    pub fn place_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
        self.edit_loaded(world, block_type)
    }

    pub fn remove_block(&mut self, world: Point3<i32>) -> bool {
        self.edit_loaded(world, BlockType::AIR)
    }

    /// Writes into an already loaded chunk. The world lock is not held while the
    /// chunk's grid is locked.
    fn edit_loaded(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
        let (chunk_position, local) = world_to_chunk(world);
        let Some(chunk) = self.world.get().get_chunk_at(chunk_position) else {
            debug!("Refusing edit at {:?}: chunk {:?} is not loaded", world, chunk_position);
            return false;
        };

        let changed = chunk.set_block(local, block_type);
        if changed {
            self.world.get_mut().mark_mesh_pending(chunk_position);
        }
        changed
    }

    pub fn is_block_solid(&self, world: Point3<i32>) -> bool {
        self.world.get().is_block_solid(world)
    }

    pub fn get_block_at(&self, world: Point3<i32>) -> Block {
        self.world.get().get_block_at(world)
    }

    pub fn get_height_at(&self, world_x: i32, world_z: i32) -> i32 {
        self.world.get().get_height_at(world_x, world_z)
    }

    /// Top solid block of the loaded column, `-1` if the chunk is not loaded.
    pub fn get_actual_height_at(&self, world_x: i32, world_z: i32) -> i32 {
        self.world.get().get_actual_height_at(world_x, world_z)
    }

    /// `None` means the chunk is neither requested nor loaded.
    pub fn chunk_state(&self, position: Point3<i32>) -> Option<ChunkState> {
        self.requested
            .get(&position)
            .copied()
            .or_else(|| self.world.get().chunk_state(position))
    }

    /// Uploaded meshes in view of the observer, nearest first.
    pub fn drawable_meshes(&self) -> Vec<(Point3<i32>, UploadedMesh)> {
        self.world
            .get()
            .chunks_to_draw(self.center, self.config.view_distance)
            .into_iter()
            .filter_map(|chunk| chunk.uploaded().map(|uploaded| (chunk.position(), uploaded)))
            .collect()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn buffer_state(&self) -> &BufferState {
        &self.buffer_state
    }

    pub fn chunk_count(&self) -> usize {
        self.world.get().chunk_count()
    }

    /// Chunk coordinate the observer is standing in.
    pub fn center(&self) -> Point3<i32> {
        self.center
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    fn chunk_position_of(player_pos: Point3<f32>) -> Point3<i32> {
        let block = Point3::new(
            player_pos.x.floor() as i32,
            player_pos.y.floor() as i32,
            player_pos.z.floor() as i32,
        );
        let (chunk_position, _) = world_to_chunk(block);
        Point3::new(chunk_position.x, 0, chunk_position.z)
    }

    /// Publishes generation tasks for up to `limit` of `positions` that are missing,
    /// or loaded but still waiting for their own structure pass. Returns how many
    /// were issued.
    fn request_chunks(&mut self, positions: Vec<Point3<i32>>, limit: usize) -> usize {
        let to_request: Vec<_> = {
            let world = self.world.get();
            positions
                .into_iter()
                .filter(|position| !self.requested.contains_key(position))
                .filter_map(|position| {
                    if world.contains_chunk(position) {
                        world
                            .is_awaiting_structures(position)
                            .then_some((position, ChunkState::Generating))
                    } else if world.storage().exists(position) {
                        Some((position, ChunkState::Loading))
                    } else {
                        Some((position, ChunkState::Generating))
                    }
                })
                .take(limit)
                .collect()
        };

        for (position, state) in &to_request {
            self.requested.insert(*position, *state);
            self.task_manager
                .publish_task(Box::new(ChunkGenerationTask::new(self.world.clone(), *position)));
        }
        self.stats.chunks_requested += to_request.len();
        to_request.len()
    }

    fn schedule_meshes(&mut self) {
        let pending = self.world.get_mut().take_pending_meshes();
        for chunk in pending {
            self.task_manager.publish_task(Box::new(ChunkMeshGenerationTask::new(
                chunk,
                self.mesh_builder.clone(),
            )));
        }
    }

    fn split_context(&mut self) -> (&mut TaskManager, TaskContext<'_>) {
        let ctx = TaskContext {
            world: &self.world,
            mesh_builder: &self.mesh_builder,
            uploader: &mut self.buffer_state,
            requested: &mut self.requested,
            stats: &mut self.stats,
        };
        (&mut self.task_manager, ctx)
    }
}
