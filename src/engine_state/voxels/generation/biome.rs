//! Biome classification of terrain columns.

use crate::core::TerrainConfig;
use crate::engine_state::voxels::block::block_type::BlockType;

/// Classification of a terrain column, driving its surface and sub-surface blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Biome {
    Plains,
    Forest,
    Desert,
    Snowy,
    Swamp,
    Mountains,
}

/// Normalized climate samples of one column.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Climate {
    pub temperature: f64,
    pub humidity: f64,
    pub ruggedness: f64,
}

impl Biome {
    /// Picks the biome of a column. Rules are checked in order, first match wins:
    ///
    /// 1. cold and dry: `Snowy`
    /// 2. hot and dry: `Desert`
    /// 3. cold and wet: `Forest`
    /// 4. moderate temperature and dry: `Swamp` on low ground, else `Plains`
    /// 5. otherwise `Mountains` when rugged, else `Plains`
    pub fn classify(climate: Climate, surface_height: i32, config: &TerrainConfig) -> Biome {
        let cold = climate.temperature < config.cold_threshold;
        let hot = climate.temperature > config.hot_threshold;
        let dry = climate.humidity < config.dry_threshold;
        let wet = climate.humidity > config.wet_threshold;
        let rugged = climate.ruggedness > config.mountain_threshold;

        if cold && dry {
            Biome::Snowy
        } else if hot && dry {
            Biome::Desert
        } else if cold && wet {
            Biome::Forest
        } else if dry && !cold && !hot {
            if surface_height <= config.swamp_max_height {
                Biome::Swamp
            } else {
                Biome::Plains
            }
        } else if rugged {
            Biome::Mountains
        } else {
            Biome::Plains
        }
    }

    pub fn surface_block(self) -> BlockType {
        match self {
            Biome::Plains | Biome::Forest | Biome::Swamp => BlockType::GRASS,
            Biome::Desert => BlockType::SAND,
            Biome::Snowy => BlockType::SNOW,
            Biome::Mountains => BlockType::STONE,
        }
    }

    pub fn subsurface_block(self) -> BlockType {
        match self {
            Biome::Plains | Biome::Forest | Biome::Swamp | Biome::Snowy => BlockType::DIRT,
            Biome::Desert => BlockType::SAND,
            Biome::Mountains => BlockType::STONE,
        }
    }
}
