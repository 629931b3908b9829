//! # World Module
//!
//! The `World` is the sparse index of every chunk currently in memory. It owns the
//! chunk lifecycle: chunks are created (loaded from disk or generated and written
//! through immediately), edited in place, meshed in the background and finally
//! saved and evicted once they fall behind the observer.
//!
//! ## Sharing
//!
//! Chunks are stored as `Arc<LoadedChunk>`, so removing one from the index never
//! invalidates a worker that is still meshing it. The map itself is guarded by the
//! lock around the whole `World` (see `MtResource`); per-chunk work only takes the
//! chunk's own locks.
//!
//! ## Structures
//!
//! Structures may reach into neighbouring chunks. Writes are routed to whichever
//! chunk owns the coordinate, creating that chunk if needed. A chunk created this
//! way has not had its own structure pass yet; it is remembered and the pass runs
//! when the chunk is requested for real.
//!
//! Workers go through [`ChunkProducer`], which records structure writes into
//! [`StructureEdits`] and applies them outside the world lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cgmath::Point3;
use log::{debug, error, info};

use crate::core::{MtResource, WorldConfig};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::block::Block;
use crate::engine_state::voxels::chunk::{
    world_to_chunk, Chunk, ChunkOrigin, ChunkState, LoadedChunk, CHUNK_SIZE_Y,
};
use crate::engine_state::voxels::generation::structures::TREE;
use crate::engine_state::voxels::generation::{BlockWriter, StructurePlacer, TerrainGenerator};
use crate::engine_state::voxels::persistence::{ChunkStorage, FormatVersion};

/// Represents a voxel world composed of multiple chunks.
///
/// # Examples
///
/// ```ignore
/// let mut world = World::new(&WorldConfig::default());
/// world.create_chunk_at(Point3::new(0, 0, 0));
///
/// world.place_block(Point3::new(3, 90, 3), BlockType::BRICK);
/// assert!(world.is_block_solid(Point3::new(3, 90, 3)));
/// ```
pub struct World {
    chunks: HashMap<Point3<i32>, Arc<LoadedChunk>>,
    generator: Arc<TerrainGenerator>,
    structures: Arc<StructurePlacer>,
    storage: ChunkStorage,
    save_format: FormatVersion,
    /// Chunks whose mesh needs a (re)build task.
    pending_meshes: HashSet<Point3<i32>>,
    /// Chunks created by a neighbour's structure write that still need their own pass.
    awaiting_structures: HashSet<Point3<i32>>,
}

impl World {
    pub fn new(config: &WorldConfig) -> Self {
        let storage = ChunkStorage::new(config.chunk_dir());
        info!(
            "World seed {} stored in {}",
            config.seed,
            storage.root().display()
        );

        World {
            chunks: HashMap::new(),
            generator: Arc::new(TerrainGenerator::from_world_config(config)),
            structures: Arc::new(StructurePlacer::from_world_config(config)),
            storage,
            save_format: config.save_format,
            pending_meshes: HashSet::new(),
            awaiting_structures: HashSet::new(),
        }
    }

    pub fn storage(&self) -> &ChunkStorage {
        &self.storage
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Loads the chunk at `position` from disk, or generates it when there is no
    /// readable file.
    ///
    /// Takes no lock and touches no world state, so [`ChunkProducer`] calls it
    /// from workers before inserting the result.
    /// A corrupt file is moved aside and the chunk is regenerated.
    pub fn produce_chunk(
        generator: &TerrainGenerator,
        storage: &ChunkStorage,
        position: Point3<i32>,
    ) -> (Chunk, ChunkOrigin) {
        if storage.exists(position) {
            match storage.load(position) {
                Ok(Some(chunk)) => return (chunk, ChunkOrigin::Loaded),
                Ok(None) => {}
                Err(crate::core::Error::Codec(e)) => {
                    error!("Chunk file for {:?} is corrupt: {}", position, e);
                    match storage.quarantine(position) {
                        Ok(path) => error!("Moved corrupt chunk file to {}", path.display()),
                        Err(e) => error!("Could not move corrupt chunk {:?}: {}", position, e),
                    }
                }
                Err(e) => error!("Could not read chunk {:?}: {}", position, e),
            }
        }

        (generator.generate(position), ChunkOrigin::Generated)
    }

    /// Adds a produced chunk to the index.
    ///
    /// Generated chunks get their structure pass and are saved right away. If a
    /// chunk already sits at that position (a neighbour's structure created it in
    /// the meantime), the existing one is kept and returned.
    pub fn insert_produced(&mut self, chunk: Chunk, origin: ChunkOrigin) -> Arc<LoadedChunk> {
        let position = chunk.position;

        if let Some(existing) = self.chunks.get(&position).cloned() {
            debug!("Chunk {:?} already present, keeping it", position);
            if self.awaiting_structures.contains(&position) {
                self.generate_structures_in_chunk(position);
            }
            return existing;
        }

        let loaded = self.insert_raw(chunk);
        match origin {
            ChunkOrigin::Generated => {
                debug!("Generated chunk {:?}", position);
                self.generate_structures_in_chunk(position);
            }
            ChunkOrigin::Loaded => debug!("Loaded chunk {:?}", position),
        }
        loaded
    }

    /// Creates the chunk at `position` on the calling thread if it isn't loaded.
    pub fn create_chunk_at(&mut self, position: Point3<i32>) -> Arc<LoadedChunk> {
        if let Some(existing) = self.chunks.get(&position).cloned() {
            if self.awaiting_structures.contains(&position) {
                self.generate_structures_in_chunk(position);
            }
            return existing;
        }

        let (chunk, origin) = Self::produce_chunk(&self.generator, &self.storage, position);
        self.insert_produced(chunk, origin)
    }

    /// Synchronously creates every chunk within a circle of `radius` chunks around
    /// `center` on the ground layer. Returns how many chunks were created or
    /// completed.
    pub fn generate_chunks(&mut self, radius: i32, center: Point3<i32>) -> usize {
        let mut created = 0;
        for position in chunks_in_radius(center, radius) {
            if !self.chunks.contains_key(&position) || self.awaiting_structures.contains(&position)
            {
                created += 1;
            }
            self.create_chunk_at(position);
        }
        created
    }

    /// Non-creating lookup.
    pub fn get_chunk_at(&self, position: Point3<i32>) -> Option<Arc<LoadedChunk>> {
        self.chunks.get(&position).cloned()
    }

    pub fn contains_chunk(&self, position: Point3<i32>) -> bool {
        self.chunks.contains_key(&position)
    }

    /// True if the chunk was only created by a neighbour's structure and still
    /// needs its own structure pass.
    pub fn is_awaiting_structures(&self, position: Point3<i32>) -> bool {
        self.awaiting_structures.contains(&position)
    }

    pub fn chunk_state(&self, position: Point3<i32>) -> Option<ChunkState> {
        self.chunks.get(&position).map(|chunk| chunk.state())
    }

    /// Sets a block at a world position, creating the owning chunk if needed.
    /// Returns `true` if the block changed.
    pub fn place_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
        let (chunk_position, local) = world_to_chunk(world);
        let chunk = self.chunk_for_write(chunk_position);

        let changed = chunk.set_block(local, block_type);
        if changed {
            self.pending_meshes.insert(chunk_position);
        }
        changed
    }

    /// Clears a block. Does nothing if the owning chunk is not loaded.
    pub fn remove_block(&mut self, world: Point3<i32>) -> bool {
        let (chunk_position, local) = world_to_chunk(world);
        let Some(chunk) = self.chunks.get(&chunk_position) else {
            return false;
        };

        let changed = chunk.set_block(local, BlockType::AIR);
        if changed {
            self.pending_meshes.insert(chunk_position);
        }
        changed
    }

    /// Unloaded chunks count as empty.
    pub fn is_block_solid(&self, world: Point3<i32>) -> bool {
        let (chunk_position, local) = world_to_chunk(world);
        self.chunks
            .get(&chunk_position)
            .is_some_and(|chunk| chunk.read().is_block_solid(local))
    }

    pub fn get_block_at(&self, world: Point3<i32>) -> Block {
        let (chunk_position, local) = world_to_chunk(world);
        match self.chunks.get(&chunk_position) {
            Some(chunk) => chunk.read().get_block_at(local),
            None => Block::air(world),
        }
    }

    /// Terrain height predicted by the generator, whether or not the chunk is loaded.
    pub fn get_height_at(&self, world_x: i32, world_z: i32) -> i32 {
        self.generator.surface_height(world_x, world_z)
    }

    /// Highest solid block in the loaded ground chunk, or `-1` if that chunk is
    /// not loaded or the column is empty.
    pub fn get_actual_height_at(&self, world_x: i32, world_z: i32) -> i32 {
        let (chunk_position, local) = world_to_chunk(Point3::new(world_x, 0, world_z));
        let Some(chunk) = self.chunks.get(&chunk_position) else {
            return -1;
        };

        let grid = chunk.read();
        (0..CHUNK_SIZE_Y)
            .rev()
            .find(|&y| grid.is_block_solid(Point3::new(local.x, y, local.z)))
            .map_or(-1, |y| grid.world_origin().y + y)
    }

    /// Runs the tree pass for a loaded chunk and saves every chunk it touched.
    /// Returns the number of blocks placed.
    pub fn generate_structures_in_chunk(&mut self, position: Point3<i32>) -> usize {
        let Some(chunk) = self.chunks.get(&position).cloned() else {
            return 0;
        };
        self.awaiting_structures.remove(&position);

        let sites = {
            let grid = chunk.read();
            self.structures.candidate_sites(&grid)
        };

        let placer = Arc::clone(&self.structures);
        let mut writer = TrackingWriter {
            world: self,
            touched: HashSet::new(),
        };
        let placed: usize = sites
            .into_iter()
            .map(|site| placer.place(TREE, site, &mut writer))
            .sum();

        let mut touched = writer.touched;
        touched.insert(position);
        for target in touched {
            self.save_chunk(target);
        }

        if placed > 0 {
            debug!("Placed {} structure blocks from chunk {:?}", placed, position);
        }
        placed
    }

    /// Places a named structure at a world-space anchor. Returns the number of
    /// blocks written.
    pub fn place_structure(&mut self, name: &str, anchor: Point3<i32>) -> usize {
        let placer = Arc::clone(&self.structures);
        placer.place(name, anchor, self)
    }

    /// Loaded chunks within a circle of `view_distance` chunks around `center`,
    /// nearest first.
    pub fn chunks_to_draw(&self, center: Point3<i32>, view_distance: i32) -> Vec<Arc<LoadedChunk>> {
        let mut visible: Vec<_> = self
            .chunks
            .iter()
            .filter_map(|(position, chunk)| {
                let distance = planar_distance_squared(*position, center);
                (distance <= view_distance * view_distance).then(|| (distance, chunk.clone()))
            })
            .collect();
        visible.sort_by_key(|(distance, _)| *distance);
        visible.into_iter().map(|(_, chunk)| chunk).collect()
    }

    /// Saves and removes chunks farther than `view_distance + margin` from `center`.
    ///
    /// A chunk is only evicted while this call holds its busy flag, so a chunk
    /// being meshed is skipped and retried on a later pass. Chunks whose save
    /// fails stay loaded.
    pub fn unload_far_chunks(
        &mut self,
        center: Point3<i32>,
        view_distance: i32,
        margin: i32,
    ) -> Vec<Arc<LoadedChunk>> {
        let limit = view_distance + margin;
        let candidates: Vec<_> = self
            .chunks
            .iter()
            .filter(|(position, _)| planar_distance_squared(**position, center) > limit * limit)
            .map(|(position, chunk)| (*position, chunk.clone()))
            .collect();

        let mut evicted = Vec::new();
        for (position, chunk) in candidates {
            let Some(_guard) = chunk.try_begin_mesh() else {
                debug!("Chunk {:?} is busy, not evicting it yet", position);
                continue;
            };

            if let Err(e) = self.storage.save_shared(&chunk, self.save_format) {
                error!("Could not save chunk {:?} before eviction: {}", position, e);
                continue;
            }

            self.chunks.remove(&position);
            self.pending_meshes.remove(&position);
            self.awaiting_structures.remove(&position);
            debug!("Evicted chunk {:?}", position);
            evicted.push(chunk.clone());
        }
        evicted
    }

    /// Writes one loaded chunk to disk. Returns `false` if it isn't loaded or the
    /// write failed.
    pub fn save_chunk(&self, position: Point3<i32>) -> bool {
        let Some(chunk) = self.chunks.get(&position) else {
            return false;
        };

        match self.storage.save_shared(chunk, self.save_format) {
            Ok(()) => true,
            Err(e) => {
                error!("Could not save chunk {:?}: {}", position, e);
                false
            }
        }
    }

    /// Writes every loaded chunk. Returns how many were saved.
    pub fn save_all(&self) -> usize {
        let saved = self
            .chunks
            .keys()
            .filter(|position| self.save_chunk(**position))
            .count();
        info!("Saved {} of {} chunks", saved, self.chunks.len());
        saved
    }

    /// Queues a loaded chunk for a mesh build. Unknown positions are ignored.
    pub fn mark_mesh_pending(&mut self, position: Point3<i32>) {
        if self.chunks.contains_key(&position) {
            self.pending_meshes.insert(position);
        }
    }

    /// Handle for workers that bring chunks into this world.
    pub fn producer(&self) -> ChunkProducer {
        ChunkProducer {
            generator: Arc::clone(&self.generator),
            structures: Arc::clone(&self.structures),
            storage: self.storage.clone(),
            save_format: self.save_format,
        }
    }

    /// Drains the chunks that need a mesh build.
    pub fn take_pending_meshes(&mut self) -> Vec<Arc<LoadedChunk>> {
        let pending: Vec<_> = self.pending_meshes.drain().collect();
        pending
            .into_iter()
            .filter_map(|position| self.chunks.get(&position).cloned())
            .collect()
    }

    /// Inserts a chunk unless the position is taken, in which case the chunk
    /// already there is returned as the error.
    fn try_insert(
        &mut self,
        chunk: Chunk,
        awaiting_structures: bool,
    ) -> std::result::Result<Arc<LoadedChunk>, Arc<LoadedChunk>> {
        if let Some(existing) = self.chunks.get(&chunk.position) {
            return Err(existing.clone());
        }
        let position = chunk.position;
        let loaded = self.insert_raw(chunk);
        if awaiting_structures {
            self.awaiting_structures.insert(position);
        }
        Ok(loaded)
    }

    /// Hands out a loaded chunk whose structure pass is still owed, at most once.
    fn claim_structure_pass(&mut self, position: Point3<i32>) -> Option<Arc<LoadedChunk>> {
        if !self.awaiting_structures.remove(&position) {
            return None;
        }
        self.chunks.get(&position).cloned()
    }

    fn insert_raw(&mut self, chunk: Chunk) -> Arc<LoadedChunk> {
        let position = chunk.position;
        let loaded = Arc::new(LoadedChunk::new(chunk));
        self.chunks.insert(position, loaded.clone());
        self.pending_meshes.insert(position);
        loaded
    }

    /// Chunk that receives a routed write. Missing chunks are created without a
    /// structure pass.
    fn chunk_for_write(&mut self, position: Point3<i32>) -> Arc<LoadedChunk> {
        if let Some(chunk) = self.chunks.get(&position) {
            return chunk.clone();
        }

        let (chunk, origin) = Self::produce_chunk(&self.generator, &self.storage, position);
        let loaded = self.insert_raw(chunk);
        if origin == ChunkOrigin::Generated {
            self.awaiting_structures.insert(position);
            self.save_chunk(position);
        }
        debug!("Created chunk {:?} for a routed write", position);
        loaded
    }
}

impl BlockWriter for World {
    fn write_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
        self.place_block(world, block_type)
    }
}

/// Structure writes recorded away from the world, grouped by the chunk each one
/// lands in. Writes keep their order within a chunk.
#[derive(Debug, Default)]
pub struct StructureEdits {
    by_chunk: HashMap<Point3<i32>, Vec<(Point3<i32>, BlockType)>>,
}

impl StructureEdits {
    /// Removes and returns the writes for one chunk as `(local, block type)` pairs.
    pub fn take(&mut self, chunk_position: Point3<i32>) -> Vec<(Point3<i32>, BlockType)> {
        self.by_chunk.remove(&chunk_position).unwrap_or_default()
    }
}

impl BlockWriter for StructureEdits {
    fn write_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
        let (chunk_position, local) = world_to_chunk(world);
        self.by_chunk
            .entry(chunk_position)
            .or_default()
            .push((local, block_type));
        true
    }
}

/// What [`ChunkProducer::stream`] did with a position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The chunk was produced and inserted.
    Inserted(ChunkOrigin),
    /// The chunk was already loaded and its owed structure pass ran now.
    StructuresCompleted,
    /// The chunk was already loaded and complete.
    AlreadyPresent,
}

/// Brings chunks into a shared world from worker threads.
///
/// Generation, loading, structure placement and saving all run without the
/// world lock. The lock is taken only to look chunks up, insert them and queue
/// mesh builds.
#[derive(Clone)]
pub struct ChunkProducer {
    generator: Arc<TerrainGenerator>,
    structures: Arc<StructurePlacer>,
    storage: ChunkStorage,
    save_format: FormatVersion,
}

impl ChunkProducer {
    pub fn stream(&self, world: &MtResource<World>, position: Point3<i32>) -> StreamOutcome {
        if world.get().contains_chunk(position) {
            return self.complete_structures(world, position);
        }

        let (mut chunk, origin) = World::produce_chunk(&self.generator, &self.storage, position);
        let mut edits = StructureEdits::default();
        if origin == ChunkOrigin::Generated {
            edits = self.collect_structures(&chunk);
            for (local, block_type) in edits.take(position) {
                chunk.set_block_at(local, block_type);
            }
        }

        let inserted = world.get_mut().try_insert(chunk, false);
        let Ok(loaded) = inserted else {
            debug!("Chunk {:?} appeared while it was produced, keeping it", position);
            return self.complete_structures(world, position);
        };

        match origin {
            ChunkOrigin::Generated => {
                debug!("Generated chunk {:?}", position);
                let mut touched = self.apply_routed(world, edits);
                touched.push(loaded);
                self.save_touched(&touched);
            }
            ChunkOrigin::Loaded => debug!("Loaded chunk {:?}", position),
        }
        StreamOutcome::Inserted(origin)
    }

    /// Tree writes for a freshly generated chunk. Nothing is applied.
    pub fn collect_structures(&self, chunk: &Chunk) -> StructureEdits {
        let mut edits = StructureEdits::default();
        for site in self.structures.candidate_sites(chunk) {
            self.structures.place(TREE, site, &mut edits);
        }
        edits
    }

    fn complete_structures(
        &self,
        world: &MtResource<World>,
        position: Point3<i32>,
    ) -> StreamOutcome {
        let claimed = world.get_mut().claim_structure_pass(position);
        let Some(chunk) = claimed else {
            return StreamOutcome::AlreadyPresent;
        };

        let mut edits = {
            let grid = chunk.read();
            self.collect_structures(&grid)
        };
        let changed = edits
            .take(position)
            .into_iter()
            .fold(false, |changed, (local, block_type)| {
                chunk.set_block(local, block_type) | changed
            });
        if changed {
            world.get_mut().mark_mesh_pending(position);
        }

        let mut touched = self.apply_routed(world, edits);
        touched.push(chunk);
        self.save_touched(&touched);
        StreamOutcome::StructuresCompleted
    }

    /// Applies writes that landed outside the chunk being produced. Missing
    /// targets are produced here, outside the lock, and inserted as still owing
    /// their own structure pass. Returns every chunk that received writes.
    fn apply_routed(
        &self,
        world: &MtResource<World>,
        edits: StructureEdits,
    ) -> Vec<Arc<LoadedChunk>> {
        let mut touched = Vec::new();
        let mut dirty = Vec::new();

        for (target, writes) in edits.by_chunk {
            let existing = world.get().get_chunk_at(target);
            let chunk = match existing {
                Some(chunk) => chunk,
                None => {
                    let (mut chunk, origin) =
                        World::produce_chunk(&self.generator, &self.storage, target);
                    for &(local, block_type) in &writes {
                        chunk.set_block_at(local, block_type);
                    }
                    let inserted = world
                        .get_mut()
                        .try_insert(chunk, origin == ChunkOrigin::Generated);
                    match inserted {
                        Ok(loaded) => {
                            debug!("Created chunk {:?} for structure writes", target);
                            touched.push(loaded);
                            continue;
                        }
                        Err(existing) => existing,
                    }
                }
            };

            let changed = writes.iter().fold(false, |changed, &(local, block_type)| {
                chunk.set_block(local, block_type) | changed
            });
            if changed {
                dirty.push(target);
            }
            touched.push(chunk);
        }

        if !dirty.is_empty() {
            let mut world = world.get_mut();
            for position in dirty {
                world.mark_mesh_pending(position);
            }
        }
        touched
    }

    fn save_touched(&self, chunks: &[Arc<LoadedChunk>]) {
        for chunk in chunks {
            if let Err(e) = self.storage.save_shared(chunk, self.save_format) {
                error!("Could not save chunk {:?}: {}", chunk.position(), e);
            }
        }
    }
}

/// Routes writes through the world and remembers which chunks changed.
struct TrackingWriter<'a> {
    world: &'a mut World,
    touched: HashSet<Point3<i32>>,
}

impl BlockWriter for TrackingWriter<'_> {
    fn write_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
        let changed = self.world.place_block(world, block_type);
        if changed {
            self.touched.insert(world_to_chunk(world).0);
        }
        changed
    }
}

fn planar_distance_squared(a: Point3<i32>, b: Point3<i32>) -> i32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Ground-layer chunk positions within a circle of `radius` around `center`,
/// nearest first.
pub fn chunks_in_radius(center: Point3<i32>, radius: i32) -> Vec<Point3<i32>> {
    let mut positions = Vec::new();
    for x in -radius..=radius {
        for z in -radius..=radius {
            if x * x + z * z <= radius * radius {
                positions.push(Point3::new(center.x + x, 0, center.z + z));
            }
        }
    }
    positions.sort_by_key(|position| planar_distance_squared(*position, center));
    positions
}
