//! # Shared Chunks
//!
//! A `LoadedChunk` is a chunk as it lives inside the world: shared through an `Arc`
//! between the world index, in-flight worker tasks and the main thread.
//!
//! ## Synchronization
//!
//! - The block grid sits behind its own `RwLock`. Mesh builds take the read lock,
//!   edits take the write lock, so a grid is never mutated while it is being meshed.
//! - `busy` is an atomic flag claimed through [`LoadedChunk::try_begin_mesh`]. Only one
//!   holder exists at a time; mesh builds and eviction both claim it, which is what
//!   keeps an in-flight chunk from being evicted. The flag is released by dropping
//!   the returned guard.
//! - `mesh_dirty` is set by every edit and consumed with a swap by the build that
//!   picks it up, so each edit leads to exactly one rebuild.
//!
//! Lock order is always world map first, then chunk grid. Nothing in this module
//! touches the world map.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cgmath::Point3;
use log::trace;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use web_time::Instant;

use crate::engine_state::buffer_state::UploadedMesh;
use crate::engine_state::rendering::meshing::{mesh::ChunkMesh, MeshBuilder};
use crate::engine_state::voxels::block::block_type::BlockType;

use super::Chunk;

/// Where a chunk handed to the world came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkOrigin {
    /// Produced by the terrain generator; still needs structures and a first save.
    Generated,
    /// Read back from a chunk file.
    Loaded,
}

/// Pipeline state of a chunk.
///
/// `Generating` and `Loading` describe chunks that were requested but are not in
/// the world yet. Once inserted, a chunk cycles through the mesh states.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ChunkState {
    Generating = 0,
    Loading,
    MeshDirty,
    MeshBuilding,
    AwaitingUpload,
    MeshReady,
}

/// Outcome of [`LoadedChunk::rebuild_mesh`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeshRebuild {
    /// A fresh mesh was built and is waiting for upload.
    Built,
    /// The mesh was already up to date.
    Clean,
    /// Another holder owns the chunk's busy flag.
    Busy,
}

/// RAII claim on a chunk's busy flag. The flag is cleared on drop.
pub struct MeshBuildGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for MeshBuildGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// A chunk owned by the world and shared with background tasks.
pub struct LoadedChunk {
    position: Point3<i32>,
    grid: RwLock<Chunk>,
    busy: AtomicBool,
    mesh_dirty: AtomicBool,
    state: AtomicU8,
    mesh_builds: AtomicU32,
    built_mesh: Mutex<Option<ChunkMesh>>,
    uploaded: Mutex<Option<UploadedMesh>>,
}

impl LoadedChunk {
    /// Wraps a chunk. New chunks start with a dirty mesh.
    pub fn new(chunk: Chunk) -> Self {
        LoadedChunk {
            position: chunk.position,
            grid: RwLock::new(chunk),
            busy: AtomicBool::new(false),
            mesh_dirty: AtomicBool::new(true),
            state: AtomicU8::new(ChunkState::MeshDirty as u8),
            mesh_builds: AtomicU32::new(0),
            built_mesh: Mutex::new(None),
            uploaded: Mutex::new(None),
        }
    }

    /// Chunk coordinate of this chunk.
    pub fn position(&self) -> Point3<i32> {
        self.position
    }

    /// Shared access to the block grid.
    pub fn read(&self) -> RwLockReadGuard<'_, Chunk> {
        self.grid.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to the block grid. Callers that change blocks must also
    /// call [`mark_dirty`](Self::mark_dirty); prefer [`set_block`](Self::set_block).
    pub fn write(&self) -> RwLockWriteGuard<'_, Chunk> {
        self.grid.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a block at a local coordinate and invalidates the mesh if anything changed.
    ///
    /// Returns `true` if the block changed.
    pub fn set_block(&self, local: Point3<i32>, block_type: BlockType) -> bool {
        let changed = {
            let mut grid = self.write();
            grid.block_type_at(local) != block_type && grid.set_block_at(local, block_type)
        };
        if changed {
            self.mark_dirty();
        }
        changed
    }

    /// Flags the mesh as out of date.
    pub fn mark_dirty(&self) {
        self.mesh_dirty.store(true, Ordering::Release);
        if !self.is_busy() {
            self.set_state(ChunkState::MeshDirty);
        }
    }

    pub fn is_mesh_dirty(&self) -> bool {
        self.mesh_dirty.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(ChunkState::MeshDirty)
    }

    pub fn set_state(&self, state: ChunkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Number of meshes built for this chunk so far.
    pub fn mesh_build_count(&self) -> u32 {
        self.mesh_builds.load(Ordering::Acquire)
    }

    /// Claims the busy flag. Returns `None` if someone else holds it.
    pub fn try_begin_mesh(&self) -> Option<MeshBuildGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| MeshBuildGuard { busy: &self.busy })
    }

    /// Rebuilds the mesh if it is dirty and nobody else holds the chunk.
    ///
    /// The built mesh is parked until the main thread takes it with
    /// [`take_built_mesh`](Self::take_built_mesh).
    pub fn rebuild_mesh(&self, builder: &MeshBuilder) -> MeshRebuild {
        let Some(_guard) = self.try_begin_mesh() else {
            return MeshRebuild::Busy;
        };

        if !self.mesh_dirty.swap(false, Ordering::AcqRel) {
            return MeshRebuild::Clean;
        }

        self.set_state(ChunkState::MeshBuilding);
        let started = Instant::now();
        let mesh = {
            let grid = self.read();
            builder.build(&grid)
        };
        trace!(
            "Meshed chunk {:?}: {} faces in {:?}",
            self.position,
            mesh.face_count(),
            started.elapsed()
        );

        *self.built_mesh.lock().unwrap_or_else(PoisonError::into_inner) = Some(mesh);
        self.mesh_builds.fetch_add(1, Ordering::AcqRel);
        self.set_state(ChunkState::AwaitingUpload);
        MeshRebuild::Built
    }

    /// Takes the most recently built mesh, if it hasn't been taken yet.
    pub fn take_built_mesh(&self) -> Option<ChunkMesh> {
        self.built_mesh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Records the uploaded mesh and returns the one it replaces.
    pub fn set_uploaded(&self, uploaded: UploadedMesh) -> Option<UploadedMesh> {
        self.uploaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(uploaded)
    }

    /// Currently uploaded mesh, if any.
    pub fn uploaded(&self) -> Option<UploadedMesh> {
        *self.uploaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forgets the uploaded mesh and returns it so its handle can be released.
    pub fn take_uploaded(&self) -> Option<UploadedMesh> {
        self.uploaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::meshing::TextureTable;

    fn single_block_chunk() -> LoadedChunk {
        let mut chunk = Chunk::empty(Point3::new(0, 0, 0));
        chunk.set_block_at(Point3::new(1, 1, 1), BlockType::DIRT);
        LoadedChunk::new(chunk)
    }

    #[test]
    fn test_new_chunk_is_dirty() {
        let chunk = single_block_chunk();
        assert!(chunk.is_mesh_dirty());
        assert_eq!(chunk.state(), ChunkState::MeshDirty);
        assert_eq!(chunk.mesh_build_count(), 0);
    }

    #[test]
    fn test_rebuild_consumes_dirty_flag() {
        let builder = MeshBuilder::new(TextureTable::default());
        let chunk = single_block_chunk();

        assert_eq!(chunk.rebuild_mesh(&builder), MeshRebuild::Built);
        assert_eq!(chunk.rebuild_mesh(&builder), MeshRebuild::Clean);
        assert_eq!(chunk.mesh_build_count(), 1);
        assert_eq!(chunk.state(), ChunkState::AwaitingUpload);

        let mesh = chunk.take_built_mesh().expect("mesh was built");
        assert_eq!(mesh.face_count(), 6);
        assert!(chunk.take_built_mesh().is_none());
    }

    #[test]
    fn test_busy_chunk_is_not_rebuilt() {
        let builder = MeshBuilder::new(TextureTable::default());
        let chunk = single_block_chunk();

        let guard = chunk.try_begin_mesh().expect("flag is free");
        assert!(chunk.is_busy());
        assert!(chunk.try_begin_mesh().is_none());
        assert_eq!(chunk.rebuild_mesh(&builder), MeshRebuild::Busy);
        drop(guard);

        assert!(!chunk.is_busy());
        assert_eq!(chunk.rebuild_mesh(&builder), MeshRebuild::Built);
    }

    #[test]
    fn test_edit_marks_dirty_only_on_change() {
        let builder = MeshBuilder::new(TextureTable::default());
        let chunk = single_block_chunk();
        chunk.rebuild_mesh(&builder);

        assert!(!chunk.set_block(Point3::new(1, 1, 1), BlockType::DIRT));
        assert!(!chunk.is_mesh_dirty());

        assert!(chunk.set_block(Point3::new(2, 1, 1), BlockType::STONE));
        assert!(chunk.is_mesh_dirty());
        assert_eq!(chunk.state(), ChunkState::MeshDirty);

        assert!(!chunk.set_block(Point3::new(99, 1, 1), BlockType::STONE));
    }

    #[test]
    fn test_uploaded_handle_replacement() {
        use crate::engine_state::buffer_state::MeshHandle;

        let chunk = single_block_chunk();
        let first = UploadedMesh {
            handle: MeshHandle(1),
            triangle_count: 12,
        };
        let second = UploadedMesh {
            handle: MeshHandle(2),
            triangle_count: 10,
        };

        assert_eq!(chunk.set_uploaded(first), None);
        assert_eq!(chunk.set_uploaded(second), Some(first));
        assert_eq!(chunk.uploaded(), Some(second));
        assert_eq!(chunk.take_uploaded(), Some(second));
        assert_eq!(chunk.uploaded(), None);
    }
}
