//! # World Generation
//!
//! Procedural content for new chunks:
//!
//! * **noise_field**: seeded fractal noise channels normalized to `[0, 1]`
//! * **biome**: climate-based column classification
//! * **terrain**: the block grid of a chunk from elevation, biome and ore noise
//! * **structures**: trees and other templates stamped on top of the terrain
//!
//! Both generators are immutable after construction and shared between worker
//! threads behind an `Arc`.

pub mod biome;
pub mod noise_field;
pub mod structures;
pub mod terrain;

pub use biome::Biome;
pub use noise_field::NoiseChannel;
pub use structures::{
    BlockWriter, StructureBlock, StructureLibrary, StructurePlacer, StructureTemplate,
};
pub use terrain::{ColumnSample, TerrainGenerator};
