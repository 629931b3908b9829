//! # Structures
//!
//! Multi-block templates (trees) stamped into the world after terrain generation.
//!
//! A template is a list of `(offset, block type, probability)` entries relative to
//! an anchor. Entries with probability `>= 1.0` are always placed and are written
//! first, so a tree never ends up with foliage and no trunk. The remaining entries
//! are placed when a dedicated 3D noise channel sampled at the target position is
//! at or below their probability, which keeps placement deterministic per seed.
//!
//! Placement goes through the [`BlockWriter`] seam. Templates ignore chunk borders;
//! the writer decides which chunk a world position belongs to.

use std::collections::HashMap;

use cgmath::{Point3, Vector3};
use log::error;

use crate::core::{StructureConfig, WorldConfig};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{Chunk, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z};

use super::noise_field::{channel_offsets, NoiseChannel};

/// Name of the built-in tree template.
pub const TREE: &str = "tree";

/// Destination of structure writes, addressed in world space.
pub trait BlockWriter {
    /// Writes a block. Returns `true` if the block was stored.
    fn write_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StructureBlock {
    pub offset: Vector3<i32>,
    pub block_type: BlockType,
    /// Chance of the block being placed. `>= 1.0` is certain, `<= 0.0` never.
    pub probability: f32,
}

impl StructureBlock {
    pub const fn new(offset: Vector3<i32>, block_type: BlockType, probability: f32) -> Self {
        Self {
            offset,
            block_type,
            probability,
        }
    }

    pub fn is_certain(&self) -> bool {
        self.probability >= 1.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructureTemplate {
    pub name: String,
    pub blocks: Vec<StructureBlock>,
}

impl StructureTemplate {
    pub fn new(name: impl Into<String>, blocks: Vec<StructureBlock>) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }

    /// Six-block trunk, a leaf ring at the top of the trunk, a sparser layer above
    /// it and a single leaf cap.
    pub fn tree() -> Self {
        let mut blocks = Vec::new();

        for y in 0..6 {
            blocks.push(StructureBlock::new(Vector3::new(0, y, 0), BlockType::WOOD, 1.0));
        }

        for x in -1..=1 {
            for z in -1..=1 {
                if x != 0 || z != 0 {
                    blocks.push(StructureBlock::new(Vector3::new(x, 4, z), BlockType::LEAF, 0.8));
                }
            }
        }

        for (x, z) in [(-1, 0), (0, -1), (1, -1), (1, 0)] {
            blocks.push(StructureBlock::new(Vector3::new(x, 5, z), BlockType::LEAF, 0.6));
        }

        blocks.push(StructureBlock::new(Vector3::new(0, 6, 0), BlockType::LEAF, 1.0));

        Self::new(TREE, blocks)
    }
}

/// Named registry of templates.
#[derive(Clone, Debug)]
pub struct StructureLibrary {
    templates: HashMap<String, StructureTemplate>,
}

impl Default for StructureLibrary {
    fn default() -> Self {
        let mut library = Self::empty();
        library.register(StructureTemplate::tree());
        library
    }
}

impl StructureLibrary {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Adds a template, replacing any template with the same name.
    pub fn register(&mut self, template: StructureTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&StructureTemplate> {
        self.templates.get(name)
    }
}

pub struct StructurePlacer {
    library: StructureLibrary,
    config: StructureConfig,
    density: NoiseChannel,
    probability: NoiseChannel,
}

impl StructurePlacer {
    pub fn new(seed: u32, config: StructureConfig, library: StructureLibrary) -> Self {
        StructurePlacer {
            density: NoiseChannel::new(seed, channel_offsets::STRUCTURE_DENSITY, config.density),
            probability: NoiseChannel::new(
                seed,
                channel_offsets::STRUCTURE_PROBABILITY,
                config.probability,
            ),
            library,
            config,
        }
    }

    pub fn from_world_config(config: &WorldConfig) -> Self {
        Self::new(config.seed, config.structures.clone(), StructureLibrary::default())
    }

    /// Places a named template at `anchor`. Returns the number of blocks written.
    ///
    /// Unknown names are logged and place nothing.
    pub fn place<W: BlockWriter + ?Sized>(
        &self,
        name: &str,
        anchor: Point3<i32>,
        writer: &mut W,
    ) -> usize {
        match self.library.get(name) {
            Some(template) => self.place_template(template, anchor, writer),
            None => {
                error!("Structure not found: {}", name);
                0
            }
        }
    }

    pub fn place_template<W: BlockWriter + ?Sized>(
        &self,
        template: &StructureTemplate,
        anchor: Point3<i32>,
        writer: &mut W,
    ) -> usize {
        let certain = template.blocks.iter().filter(|block| block.is_certain());
        let chance = template.blocks.iter().filter(|block| !block.is_certain());

        let mut placed = 0;
        for block in certain.chain(chance) {
            let target = anchor + block.offset;
            if self.should_place(block, target) && writer.write_block(target, block.block_type) {
                placed += 1;
            }
        }
        placed
    }

    fn should_place(&self, block: &StructureBlock, target: Point3<i32>) -> bool {
        if block.probability <= 0.0 {
            return false;
        }
        if block.is_certain() {
            return true;
        }
        let sample = self
            .probability
            .sample_3d(target.x as f64, target.y as f64, target.z as f64);
        sample <= block.probability as f64
    }

    /// World-space anchors for trees in a freshly generated chunk.
    ///
    /// Columns qualify when their density sample exceeds the site threshold, they
    /// are at least `min_spacing` (Chebyshev) away from every site accepted before
    /// them, and their top block is grass or dirt. The anchor is the cell right
    /// above the top block.
    pub fn candidate_sites(&self, chunk: &Chunk) -> Vec<Point3<i32>> {
        let origin = chunk.world_origin();
        let mut accepted: Vec<(i32, i32)> = Vec::new();
        let mut sites = Vec::new();

        for x in 0..CHUNK_SIZE_X {
            for z in 0..CHUNK_SIZE_Z {
                let (world_x, world_z) = (origin.x + x, origin.z + z);
                if self.density.sample_2d(world_x as f64, world_z as f64)
                    <= self.config.site_threshold
                {
                    continue;
                }

                let spacing = self.config.min_spacing;
                if accepted
                    .iter()
                    .any(|&(ax, az)| (ax - x).abs() < spacing && (az - z).abs() < spacing)
                {
                    continue;
                }

                let Some(top) = top_solid(chunk, x, z) else {
                    continue;
                };
                let ground = chunk.block_type_at(Point3::new(x, top, z));
                if ground != BlockType::GRASS && ground != BlockType::DIRT {
                    continue;
                }

                accepted.push((x, z));
                sites.push(Point3::new(world_x, origin.y + top + 1, world_z));
            }
        }

        sites
    }
}

fn top_solid(chunk: &Chunk, x: i32, z: i32) -> Option<i32> {
    (0..CHUNK_SIZE_Y)
        .rev()
        .find(|&y| chunk.is_block_solid(Point3::new(x, y, z)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MapWriter {
        blocks: HashMap<Point3<i32>, BlockType>,
        order: Vec<Point3<i32>>,
    }

    impl BlockWriter for MapWriter {
        fn write_block(&mut self, world: Point3<i32>, block_type: BlockType) -> bool {
            self.blocks.insert(world, block_type);
            self.order.push(world);
            true
        }
    }

    fn placer(seed: u32) -> StructurePlacer {
        StructurePlacer::new(seed, StructureConfig::default(), StructureLibrary::default())
    }

    #[test]
    fn test_certain_placed_and_impossible_skipped() {
        let template = StructureTemplate::new(
            "pair",
            vec![
                StructureBlock::new(Vector3::new(0, 0, 0), BlockType::WOOD, 1.0),
                StructureBlock::new(Vector3::new(0, 1, 0), BlockType::LEAF, 0.0),
            ],
        );

        for seed in [0, 1, 7, 1337, 99_999, u32::MAX] {
            let placer = placer(seed);
            for anchor in [Point3::new(0, 10, 0), Point3::new(-37, 64, 101)] {
                let mut writer = MapWriter::default();
                assert_eq!(placer.place_template(&template, anchor, &mut writer), 1);
                assert_eq!(writer.blocks.get(&anchor), Some(&BlockType::WOOD));
                assert!(!writer.blocks.contains_key(&(anchor + Vector3::new(0, 1, 0))));
            }
        }
    }

    #[test]
    fn test_tree_trunk_is_placed_first() {
        let placer = placer(3);
        let mut writer = MapWriter::default();
        let anchor = Point3::new(4, 40, 4);
        let placed = placer.place(TREE, anchor, &mut writer);

        assert!(placed >= 7);
        for y in 0..6 {
            assert_eq!(writer.order[y as usize], anchor + Vector3::new(0, y, 0));
            assert_eq!(writer.blocks[&(anchor + Vector3::new(0, y, 0))], BlockType::WOOD);
        }
        assert_eq!(writer.blocks[&(anchor + Vector3::new(0, 6, 0))], BlockType::LEAF);
    }

    #[test]
    fn test_placement_is_deterministic() {
        let anchor = Point3::new(-20, 50, 33);
        let mut a = MapWriter::default();
        let mut b = MapWriter::default();
        placer(8).place(TREE, anchor, &mut a);
        placer(8).place(TREE, anchor, &mut b);
        assert_eq!(a.blocks, b.blocks);
    }

    #[test]
    fn test_unknown_structure_places_nothing() {
        let mut writer = MapWriter::default();
        assert_eq!(placer(1).place("castle", Point3::new(0, 0, 0), &mut writer), 0);
        assert!(writer.blocks.is_empty());
    }

    #[test]
    fn test_sites_need_grass_or_dirt_ground() {
        let config = StructureConfig {
            site_threshold: -1.0,
            min_spacing: 1,
            ..StructureConfig::default()
        };
        let placer = StructurePlacer::new(1, config, StructureLibrary::default());

        let mut sand = Chunk::empty(Point3::new(0, 0, 0));
        let mut grass = Chunk::empty(Point3::new(0, 0, 0));
        for x in 0..CHUNK_SIZE_X {
            for z in 0..CHUNK_SIZE_Z {
                sand.set_block_at(Point3::new(x, 20, z), BlockType::SAND);
                grass.set_block_at(Point3::new(x, 20, z), BlockType::GRASS);
            }
        }

        assert!(placer.candidate_sites(&sand).is_empty());
        let sites = placer.candidate_sites(&grass);
        assert_eq!(sites.len(), (CHUNK_SIZE_X * CHUNK_SIZE_Z) as usize);
        assert!(sites.iter().all(|site| site.y == 21));
    }

    #[test]
    fn test_sites_respect_min_spacing() {
        let config = StructureConfig {
            site_threshold: -1.0,
            min_spacing: 4,
            ..StructureConfig::default()
        };
        let placer = StructurePlacer::new(1, config, StructureLibrary::default());

        let mut chunk = Chunk::empty(Point3::new(2, 0, -1));
        for x in 0..CHUNK_SIZE_X {
            for z in 0..CHUNK_SIZE_Z {
                chunk.set_block_at(Point3::new(x, 30, z), BlockType::DIRT);
            }
        }

        let sites = placer.candidate_sites(&chunk);
        assert_eq!(sites.len(), 16);
        for (i, a) in sites.iter().enumerate() {
            for b in &sites[i + 1..] {
                let chebyshev = (a.x - b.x).abs().max((a.z - b.z).abs());
                assert!(chebyshev >= 4);
            }
        }
    }
}
