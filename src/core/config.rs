//! # Configuration
//!
//! Every tunable of the world lives here: the seed, streaming distances, the
//! worker pool size, the persistence writer format and all terrain and structure
//! thresholds. Configuration is plain data, deserialized from JSON with every field
//! optional, and is handed to the generator and the world at construction time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::engine_state::voxels::persistence::FormatVersion;

/// Top-level configuration for a world and the pipeline that streams it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed shared by every noise channel.
    pub seed: u32,
    /// Root directory for saved chunks. Files go to `<save_dir>/<seed>/`.
    pub save_dir: PathBuf,
    /// Radius, in chunks, of the area kept loaded and drawn around the observer.
    pub view_distance: i32,
    /// Extra distance, in chunks, a chunk may drift beyond `view_distance` before eviction.
    pub unload_margin: i32,
    /// Number of background worker threads.
    pub worker_count: usize,
    /// Upper bound on new chunk generation requests issued per frame.
    pub max_generation_requests_per_frame: usize,
    /// Format used when writing chunk files.
    pub save_format: FormatVersion,
    pub terrain: TerrainConfig,
    pub structures: StructureConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);

        Self {
            seed: 1337,
            save_dir: PathBuf::from("chunks"),
            view_distance: 4,
            unload_margin: 2,
            worker_count,
            max_generation_requests_per_frame: 8,
            save_format: FormatVersion::IndexedRle,
            terrain: TerrainConfig::default(),
            structures: StructureConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Directory holding this world's chunk files.
    pub fn chunk_dir(&self) -> PathBuf {
        self.save_dir.join(self.seed.to_string())
    }
}

/// Noise channel parameters: how often a channel varies and how much detail it carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    pub frequency: f64,
    pub octaves: usize,
}

impl NoiseParams {
    pub const fn new(frequency: f64, octaves: usize) -> Self {
        Self { frequency, octaves }
    }
}

/// Parameters of the terrain generator.
///
/// Samples from every channel are normalized to `[0, 1]` before they are compared
/// against the thresholds below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub elevation: NoiseParams,
    /// Blocks of height represented by an elevation sample of `1.0`.
    pub elevation_scale: f64,
    pub temperature: NoiseParams,
    pub humidity: NoiseParams,
    pub ruggedness: NoiseParams,
    /// Ruggedness above this turns a column into mountains.
    pub mountain_threshold: f64,
    /// Extra height per unit of ruggedness above `mountain_threshold`.
    pub mountain_boost: f64,
    /// Temperature below this is cold.
    pub cold_threshold: f64,
    /// Temperature above this is hot.
    pub hot_threshold: f64,
    /// Humidity below this is dry.
    pub dry_threshold: f64,
    /// Humidity above this is wet.
    pub wet_threshold: f64,
    /// Highest surface that may still become swamp.
    pub swamp_max_height: i32,
    /// Local noise driving surface variants (planks, brick, cobblestone, gravel).
    pub detail: NoiseParams,
    pub forest_planks_threshold: f64,
    pub mountain_brick_threshold: f64,
    pub mountain_cobblestone_threshold: f64,
    pub swamp_gravel_threshold: f64,
    /// Thickness of the sub-surface band below the surface block.
    pub subsurface_depth: i32,
    pub ore: NoiseParams,
    /// Iron ore only forms below this world height.
    pub iron_max_height: i32,
    pub iron_threshold: f64,
    pub cobblestone_threshold: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            elevation: NoiseParams::new(0.01, 6),
            elevation_scale: 80.0,
            temperature: NoiseParams::new(0.002, 3),
            humidity: NoiseParams::new(0.0025, 3),
            ruggedness: NoiseParams::new(0.004, 2),
            mountain_threshold: 0.62,
            mountain_boost: 90.0,
            cold_threshold: 0.4,
            hot_threshold: 0.6,
            dry_threshold: 0.4,
            wet_threshold: 0.6,
            swamp_max_height: 36,
            detail: NoiseParams::new(0.15, 2),
            forest_planks_threshold: 0.8,
            mountain_brick_threshold: 0.78,
            mountain_cobblestone_threshold: 0.68,
            swamp_gravel_threshold: 0.72,
            subsurface_depth: 3,
            ore: NoiseParams::new(0.08, 3),
            iron_max_height: 40,
            iron_threshold: 0.72,
            cobblestone_threshold: 0.66,
        }
    }
}

/// Parameters of structure site selection and per-block placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Per-column density channel used to pick candidate sites.
    pub density: NoiseParams,
    /// A column is a candidate when its density sample exceeds this.
    pub site_threshold: f64,
    /// Minimum Chebyshev distance between accepted sites of one chunk.
    pub min_spacing: i32,
    /// 3D channel compared against each template block's probability.
    pub probability: NoiseParams,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            density: NoiseParams::new(0.1, 4),
            site_threshold: 0.68,
            min_spacing: 4,
            probability: NoiseParams::new(0.1, 4),
        }
    }
}
