//! # Terrain Generator
//!
//! Fills chunks from noise. Generation is pure: the output depends only on the
//! chunk position, the seed and the `TerrainConfig`, never on which other chunks
//! exist or the order chunks are generated in.
//!
//! ## Column model
//!
//! Each `(x, z)` column is sampled once for elevation, ruggedness, temperature and
//! humidity. Elevation is floored to an integer surface height exactly once, and
//! every cell compares its integer `y` against that height, so a column always has
//! exactly one surface block.
//!
//! Below the surface sits a band of `subsurface_depth` biome sub-surface blocks,
//! then stone with 3D noise pockets of iron ore and cobblestone.

use cgmath::Point3;

use crate::core::{TerrainConfig, WorldConfig};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{
    chunk_world_origin, Chunk, ChunkCreationIterator, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z,
};

use super::biome::{Biome, Climate};
use super::noise_field::{channel_offsets, NoiseChannel};

/// Per-column terrain data.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColumnSample {
    /// World `y` of the surface block.
    pub surface_height: i32,
    pub biome: Biome,
    /// Surface variant noise, in `[0, 1]`.
    pub detail: f64,
}

pub struct TerrainGenerator {
    config: TerrainConfig,
    elevation: NoiseChannel,
    temperature: NoiseChannel,
    humidity: NoiseChannel,
    ruggedness: NoiseChannel,
    detail: NoiseChannel,
    ore: NoiseChannel,
}

impl TerrainGenerator {
    pub fn new(seed: u32, config: TerrainConfig) -> Self {
        TerrainGenerator {
            elevation: NoiseChannel::new(seed, channel_offsets::ELEVATION, config.elevation),
            temperature: NoiseChannel::new(seed, channel_offsets::TEMPERATURE, config.temperature),
            humidity: NoiseChannel::new(seed, channel_offsets::HUMIDITY, config.humidity),
            ruggedness: NoiseChannel::new(seed, channel_offsets::RUGGEDNESS, config.ruggedness),
            detail: NoiseChannel::new(seed, channel_offsets::DETAIL, config.detail),
            ore: NoiseChannel::new(seed, channel_offsets::ORE, config.ore),
            config,
        }
    }

    pub fn from_world_config(config: &WorldConfig) -> Self {
        Self::new(config.seed, config.terrain.clone())
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Samples every column-level channel at a world `(x, z)`.
    pub fn column(&self, world_x: i32, world_z: i32) -> ColumnSample {
        let (x, z) = (world_x as f64, world_z as f64);

        let ruggedness = self.ruggedness.sample_2d(x, z);
        let mut elevation = self.elevation.sample_2d(x, z) * self.config.elevation_scale;
        if ruggedness > self.config.mountain_threshold {
            elevation += (ruggedness - self.config.mountain_threshold) * self.config.mountain_boost;
        }
        let surface_height = elevation.clamp(1.0, (CHUNK_SIZE_Y - 2) as f64).floor() as i32;

        let climate = Climate {
            temperature: self.temperature.sample_2d(x, z),
            humidity: self.humidity.sample_2d(x, z),
            ruggedness,
        };

        ColumnSample {
            surface_height,
            biome: Biome::classify(climate, surface_height, &self.config),
            detail: self.detail.sample_2d(x, z),
        }
    }

    /// Predicted world `y` of the surface block of a column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        self.column(world_x, world_z).surface_height
    }

    /// Generates the chunk at a chunk position.
    pub fn generate(&self, position: Point3<i32>) -> Chunk {
        let origin = chunk_world_origin(position);

        let mut columns = Vec::with_capacity((CHUNK_SIZE_X * CHUNK_SIZE_Z) as usize);
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                columns.push(self.column(origin.x + x, origin.z + z));
            }
        }

        let mut cci = ChunkCreationIterator::new(position);
        for z in 0..CHUNK_SIZE_Z {
            for y in 0..CHUNK_SIZE_Y {
                for x in 0..CHUNK_SIZE_X {
                    let column = &columns[(x + z * CHUNK_SIZE_X) as usize];
                    let world = Point3::new(origin.x + x, origin.y + y, origin.z + z);
                    cci.push_block_type(self.block_at(world, column));
                }
            }
        }

        cci.return_chunk()
    }

    fn block_at(&self, world: Point3<i32>, column: &ColumnSample) -> BlockType {
        let height = column.surface_height;

        if world.y > height {
            BlockType::AIR
        } else if world.y == height {
            self.surface_block(column)
        } else if world.y >= height - self.config.subsurface_depth {
            column.biome.subsurface_block()
        } else {
            self.deep_block(world)
        }
    }

    fn surface_block(&self, column: &ColumnSample) -> BlockType {
        let detail = column.detail;
        match column.biome {
            Biome::Forest if detail > self.config.forest_planks_threshold => BlockType::PLANKS,
            Biome::Mountains if detail > self.config.mountain_brick_threshold => BlockType::BRICK,
            Biome::Mountains if detail > self.config.mountain_cobblestone_threshold => {
                BlockType::COBBLESTONE
            }
            Biome::Swamp if detail > self.config.swamp_gravel_threshold => BlockType::GRAVEL,
            biome => biome.surface_block(),
        }
    }

    fn deep_block(&self, world: Point3<i32>) -> BlockType {
        let sample = self
            .ore
            .sample_3d(world.x as f64, world.y as f64, world.z as f64);

        if world.y < self.config.iron_max_height && sample >= self.config.iron_threshold {
            BlockType::IRON_ORE
        } else if sample >= self.config.cobblestone_threshold {
            BlockType::COBBLESTONE
        } else {
            BlockType::STONE
        }
    }
}
