//! Vertex data structures for voxel rendering.
//!
//! This module defines the vertex format produced by the mesh builder. The layout is
//! `repr(C)` and `Pod`, so a vertex list can be handed to a GPU upload as raw bytes.

/// A vertex in the voxel rendering pipeline.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Tile: u32 (4 bytes)
/// - Normal: [f32; 3] (12 bytes)
///
/// Total size: 36 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in world space
    pub position: [f32; 3],
    /// UV texture coordinates of this corner within the tile
    pub uv: [f32; 2],
    /// Index of the texture tile shared by the whole face
    pub tile: u32,
    /// Outward normal of the face
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: [f32; 3], uv: [f32; 2], tile: u32, normal: [f32; 3]) -> Self {
        Vertex {
            position,
            uv,
            tile,
            normal,
        }
    }
}
