//! # Buffer State Module
//!
//! The main-thread side of mesh upload. Workers never touch buffer state; finished
//! meshes are handed to a [`MeshUploader`] on the main thread, which returns an
//! opaque handle plus the triangle count a draw routine needs.
//!
//! `BufferState` is the headless uploader: it keeps the raw vertex and index bytes
//! of every live mesh and tracks memory analytics, the way a GPU-backed
//! implementation would track its buffers.

use std::collections::HashMap;

use log::{trace, warn};

use crate::engine_state::rendering::meshing::ChunkMesh;

/// Opaque handle to an uploaded vertex/index buffer pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// What the renderer needs to draw one chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UploadedMesh {
    pub handle: MeshHandle,
    pub triangle_count: u32,
}

/// Seam between the chunk pipeline and the graphics backend.
///
/// Only ever called from the main thread.
pub trait MeshUploader {
    /// Uploads a mesh and returns its handle.
    fn upload(&mut self, mesh: &ChunkMesh) -> UploadedMesh;

    /// Frees the buffers behind a handle. Unknown handles are ignored.
    fn release(&mut self, handle: MeshHandle);
}

/// Analytics data for the uploaded buffers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Bytes currently held by live buffers
    pub allocated_memory: u64,
    /// Bytes ever written
    pub written_memory: u64,
    /// Number of uploads
    pub times_written: u64,
    /// Number of released handles
    pub times_released: u64,
}

#[derive(Debug)]
struct MeshBuffers {
    vertex_bytes: Vec<u8>,
    index_bytes: Vec<u8>,
}

impl MeshBuffers {
    fn len(&self) -> u64 {
        (self.vertex_bytes.len() + self.index_bytes.len()) as u64
    }
}

/// Headless mesh buffer registry.
#[derive(Debug, Default)]
pub struct BufferState {
    buffers: HashMap<MeshHandle, MeshBuffers>,
    next_handle: u64,
    analytics: BufferAnalytics,
}

impl BufferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buffer pairs.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.buffers.contains_key(&handle)
    }

    /// Raw vertex bytes behind a handle.
    pub fn vertex_bytes(&self, handle: MeshHandle) -> Option<&[u8]> {
        self.buffers
            .get(&handle)
            .map(|buffers| buffers.vertex_bytes.as_slice())
    }

    /// Raw index bytes behind a handle.
    pub fn index_bytes(&self, handle: MeshHandle) -> Option<&[u8]> {
        self.buffers
            .get(&handle)
            .map(|buffers| buffers.index_bytes.as_slice())
    }

    pub fn analytics(&self) -> BufferAnalytics {
        self.analytics
    }

    pub fn get_total_allocated_memory(&self) -> u64 {
        self.analytics.allocated_memory
    }
}

impl MeshUploader for BufferState {
    fn upload(&mut self, mesh: &ChunkMesh) -> UploadedMesh {
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;

        let buffers = MeshBuffers {
            vertex_bytes: bytemuck::cast_slice(&mesh.vertices).to_vec(),
            index_bytes: bytemuck::cast_slice(&mesh.indices).to_vec(),
        };
        let size = buffers.len();
        self.analytics.allocated_memory += size;
        self.analytics.written_memory += size;
        self.analytics.times_written += 1;
        self.buffers.insert(handle, buffers);

        trace!("Uploaded mesh {:?} ({} bytes)", handle, size);
        UploadedMesh {
            handle,
            triangle_count: mesh.triangle_count() as u32,
        }
    }

    fn release(&mut self, handle: MeshHandle) {
        match self.buffers.remove(&handle) {
            Some(buffers) => {
                self.analytics.allocated_memory -= buffers.len();
                self.analytics.times_released += 1;
            }
            None => warn!("Release of unknown mesh handle {:?}", handle),
        }
    }
}
