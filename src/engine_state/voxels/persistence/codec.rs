//! # Chunk Codec
//!
//! Binary chunk layouts, all little endian. Three layouts exist:
//!
//! * **Legacy**: chunk position (`i32` x3) followed by every cell in linear order,
//!   16 bytes each (`f32` local x, y, z and a `u32` block type). There is no tag;
//!   a blob is legacy exactly when it is `LEGACY_LEN` bytes long, a length neither
//!   tagged layout can reach.
//! * **PositionRle** (tag `2`): position, `u32` count of non-empty blocks, `count`
//!   `u8` (x, y, z) positions, then `(u8 type, u8 run)` pairs covering `count`.
//! * **IndexedRle** (tag `3`): position, `u32` count, then `(u32 start, u8 type,
//!   u32 run)` triples. Each run covers the linear indices `start..start + run`.
//!
//! Decoding never trusts a count: counts are checked against the chunk volume,
//! every read is bounds checked against the input, and every index is checked
//! against the grid before it is written. Blocks are decoded into a fresh chunk
//! that is only returned on success.

use cgmath::Point3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{
    Chunk, ChunkCreationIterator, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_VOLUME,
};

pub const POSITION_RLE_TAG: u32 = 2;
pub const INDEXED_RLE_TAG: u32 = 3;

const HEADER_LEN: usize = 12;
const LEGACY_CELL_LEN: usize = 16;
/// Exact size of a legacy chunk file.
pub const LEGACY_LEN: usize = HEADER_LEN + CHUNK_VOLUME * LEGACY_CELL_LEN;

/// On-disk layout of a chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatVersion {
    Legacy,
    PositionRle,
    #[default]
    IndexedRle,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("chunk data truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("block count {count} exceeds the chunk volume {max}")]
    CountTooLarge { count: u64, max: usize },

    #[error("block index {index} lies outside the chunk")]
    IndexOutOfRange { index: u64 },

    #[error("unknown block type {0}")]
    UnknownBlockType(u32),

    #[error("unknown chunk format tag {0}")]
    UnknownVersion(u32),

    #[error("runs cover more than the {count} declared blocks")]
    RunOverflow { count: usize },

    #[error("run of length zero")]
    ZeroLengthRun,

    #[error("run of empty blocks in a compressed chunk")]
    EmptyBlockInRun,

    #[error("{0} trailing bytes after chunk data")]
    TrailingBytes(usize),
}

type CodecResult<T> = std::result::Result<T, CodecError>;

/// Serializes a chunk in the given layout.
pub fn encode(chunk: &Chunk, format: FormatVersion) -> Vec<u8> {
    match format {
        FormatVersion::Legacy => encode_legacy(chunk),
        FormatVersion::PositionRle => encode_position_rle(chunk),
        FormatVersion::IndexedRle => encode_indexed_rle(chunk),
    }
}

/// Works out which layout a blob uses.
pub fn detect_format(bytes: &[u8]) -> CodecResult<FormatVersion> {
    if bytes.len() == LEGACY_LEN {
        return Ok(FormatVersion::Legacy);
    }

    match ByteReader::new(bytes).read_u32()? {
        POSITION_RLE_TAG => Ok(FormatVersion::PositionRle),
        INDEXED_RLE_TAG => Ok(FormatVersion::IndexedRle),
        tag => Err(CodecError::UnknownVersion(tag)),
    }
}

/// Deserializes a chunk written in any supported layout.
pub fn decode(bytes: &[u8]) -> CodecResult<Chunk> {
    match detect_format(bytes)? {
        FormatVersion::Legacy => decode_legacy(bytes),
        FormatVersion::PositionRle => decode_position_rle(bytes),
        FormatVersion::IndexedRle => decode_indexed_rle(bytes),
    }
}

fn encode_legacy(chunk: &Chunk) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEGACY_LEN);
    write_position(&mut out, chunk.position);

    for (index, block_type) in chunk.blocks().iter().enumerate() {
        let local = Chunk::position_of(index);
        out.extend_from_slice(&(local.x as f32).to_le_bytes());
        out.extend_from_slice(&(local.y as f32).to_le_bytes());
        out.extend_from_slice(&(local.z as f32).to_le_bytes());
        out.extend_from_slice(&(block_type.as_int() as u32).to_le_bytes());
    }
    out
}

fn decode_legacy(bytes: &[u8]) -> CodecResult<Chunk> {
    let mut reader = ByteReader::new(bytes);
    let position = reader.read_position()?;

    let mut cci = ChunkCreationIterator::new(position);
    for _ in 0..CHUNK_VOLUME {
        // Cell positions are implied by the cell order.
        reader.take(12)?;
        let raw = reader.read_u32()?;
        let block_type = u8::try_from(raw)
            .ok()
            .and_then(BlockType::from_int)
            .ok_or(CodecError::UnknownBlockType(raw))?;
        cci.push_block_type(block_type);
    }
    reader.finish()?;

    Ok(cci.return_chunk())
}

fn encode_position_rle(chunk: &Chunk) -> Vec<u8> {
    let cells: Vec<_> = chunk.iter_blocks().collect();

    let mut out = Vec::with_capacity(HEADER_LEN + 8 + cells.len() * 5);
    out.extend_from_slice(&POSITION_RLE_TAG.to_le_bytes());
    write_position(&mut out, chunk.position);
    out.extend_from_slice(&(cells.len() as u32).to_le_bytes());

    for cell in &cells {
        out.push(cell.local.x as u8);
        out.push(cell.local.y as u8);
        out.push(cell.local.z as u8);
    }

    let mut cells = cells.iter().peekable();
    while let Some(first) = cells.next() {
        let mut run: u8 = 1;
        while run < u8::MAX {
            match cells.peek() {
                Some(next) if next.block_type == first.block_type => {
                    cells.next();
                    run += 1;
                }
                _ => break,
            }
        }
        out.push(first.block_type.as_int());
        out.push(run);
    }
    out
}

fn decode_position_rle(bytes: &[u8]) -> CodecResult<Chunk> {
    let mut reader = ByteReader::new(bytes);
    reader.read_u32()?;
    let position = reader.read_position()?;
    let count = reader.read_count()?;

    let positions = reader.take(count * 3)?;
    let mut indices = Vec::with_capacity(count);
    for xyz in positions.chunks_exact(3) {
        let (x, y, z) = (xyz[0] as i32, xyz[1] as i32, xyz[2] as i32);
        let index = Chunk::index_of(Point3::new(x, y, z)).ok_or(CodecError::IndexOutOfRange {
            index: (x + y * CHUNK_SIZE_X + z * CHUNK_SIZE_X * CHUNK_SIZE_Y) as u64,
        })?;
        indices.push(index);
    }

    let mut chunk = Chunk::empty(position);
    let mut covered = 0;
    while covered < count {
        let block_type = read_solid_type(&mut reader)?;
        let run = reader.read_u8()? as usize;
        check_run(run, covered, count)?;

        for &index in &indices[covered..covered + run] {
            chunk.set_block_at_index(index, block_type);
        }
        covered += run;
    }
    reader.finish()?;

    Ok(chunk)
}

fn encode_indexed_rle(chunk: &Chunk) -> Vec<u8> {
    let mut runs: Vec<(u32, BlockType, u32)> = Vec::new();
    let mut count: u32 = 0;

    for cell in chunk.iter_blocks() {
        count += 1;
        match runs.last_mut() {
            Some((start, block_type, run))
                if *block_type == cell.block_type && (*start + *run) as usize == cell.index =>
            {
                *run += 1;
            }
            _ => runs.push((cell.index as u32, cell.block_type, 1)),
        }
    }

    let mut out = Vec::with_capacity(HEADER_LEN + 8 + runs.len() * 9);
    out.extend_from_slice(&INDEXED_RLE_TAG.to_le_bytes());
    write_position(&mut out, chunk.position);
    out.extend_from_slice(&count.to_le_bytes());
    for (start, block_type, run) in runs {
        out.extend_from_slice(&start.to_le_bytes());
        out.push(block_type.as_int());
        out.extend_from_slice(&run.to_le_bytes());
    }
    out
}

fn decode_indexed_rle(bytes: &[u8]) -> CodecResult<Chunk> {
    let mut reader = ByteReader::new(bytes);
    reader.read_u32()?;
    let position = reader.read_position()?;
    let count = reader.read_count()?;

    let mut chunk = Chunk::empty(position);
    let mut covered = 0;
    while covered < count {
        let start = reader.read_u32()? as u64;
        let block_type = read_solid_type(&mut reader)?;
        let run = reader.read_u32()? as usize;
        check_run(run, covered, count)?;

        let end = start + run as u64;
        if end > CHUNK_VOLUME as u64 {
            return Err(CodecError::IndexOutOfRange { index: end - 1 });
        }
        for index in start as usize..end as usize {
            chunk.set_block_at_index(index, block_type);
        }
        covered += run;
    }
    reader.finish()?;

    Ok(chunk)
}

fn read_solid_type(reader: &mut ByteReader<'_>) -> CodecResult<BlockType> {
    let raw = reader.read_u8()?;
    match BlockType::from_int(raw) {
        Some(BlockType::AIR) => Err(CodecError::EmptyBlockInRun),
        Some(block_type) => Ok(block_type),
        None => Err(CodecError::UnknownBlockType(raw as u32)),
    }
}

fn check_run(run: usize, covered: usize, count: usize) -> CodecResult<()> {
    if run == 0 {
        Err(CodecError::ZeroLengthRun)
    } else if covered + run > count {
        Err(CodecError::RunOverflow { count })
    } else {
        Ok(())
    }
}

fn write_position(out: &mut Vec<u8>, position: Point3<i32>) {
    out.extend_from_slice(&position.x.to_le_bytes());
    out.extend_from_slice(&position.y.to_le_bytes());
    out.extend_from_slice(&position.z.to_le_bytes());
}

/// Bounds-checked little endian cursor.
struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let available = self.data.len();
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= available)
            .ok_or(CodecError::Truncated {
                needed: self.offset.saturating_add(len),
                available,
            })?;
        let data = self.data;
        let slice = &data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_position(&mut self) -> CodecResult<Point3<i32>> {
        Ok(Point3::new(self.read_i32()?, self.read_i32()?, self.read_i32()?))
    }

    /// Reads a block count and rejects counts larger than a chunk can hold.
    fn read_count(&mut self) -> CodecResult<usize> {
        let count = self.read_u32()?;
        if count as usize > CHUNK_VOLUME {
            return Err(CodecError::CountTooLarge {
                count: count as u64,
                max: CHUNK_VOLUME,
            });
        }
        Ok(count as usize)
    }

    fn finish(self) -> CodecResult<()> {
        match self.data.len() - self.offset {
            0 => Ok(()),
            trailing => Err(CodecError::TrailingBytes(trailing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TerrainConfig;
    use crate::engine_state::voxels::chunk::CHUNK_SIZE_Z;
    use crate::engine_state::voxels::generation::TerrainGenerator;

    const ALL_FORMATS: [FormatVersion; 3] = [
        FormatVersion::Legacy,
        FormatVersion::PositionRle,
        FormatVersion::IndexedRle,
    ];

    fn terrain_chunk() -> Chunk {
        TerrainGenerator::new(1337, TerrainConfig::default()).generate(Point3::new(2, 0, -3))
    }

    fn assert_roundtrip(chunk: &Chunk) {
        for format in ALL_FORMATS {
            let bytes = encode(chunk, format);
            assert_eq!(detect_format(&bytes), Ok(format));
            let decoded = decode(&bytes).unwrap_or_else(|e| panic!("{format:?}: {e}"));
            assert_eq!(decoded.position, chunk.position);
            assert_eq!(decoded.blocks(), chunk.blocks(), "{format:?}");
        }
    }

    #[test]
    fn test_roundtrip_empty() {
        assert_roundtrip(&Chunk::empty(Point3::new(-4, 0, 9)));
    }

    #[test]
    fn test_roundtrip_half_full() {
        let chunk = Chunk::random(Point3::new(1, 0, 1), 0.5);
        let density = chunk.non_empty_count() as f64 / CHUNK_VOLUME as f64;
        assert!((0.4..0.6).contains(&density));
        assert_roundtrip(&chunk);
    }

    #[test]
    fn test_roundtrip_full() {
        assert_roundtrip(&Chunk::filled(Point3::new(0, -1, 0), BlockType::STONE));
        assert_roundtrip(&Chunk::random(Point3::new(7, 0, 7), 1.0));
    }

    #[test]
    fn test_roundtrip_terrain() {
        assert_roundtrip(&terrain_chunk());
    }

    #[test]
    fn test_long_runs_are_split_in_position_rle() {
        let chunk = Chunk::filled(Point3::new(0, 0, 0), BlockType::DIRT);
        let bytes = encode(&chunk, FormatVersion::PositionRle);
        let pairs = CHUNK_VOLUME.div_ceil(255);
        assert_eq!(bytes.len(), 4 + HEADER_LEN + 4 + CHUNK_VOLUME * 3 + pairs * 2);
    }

    #[test]
    fn test_indexed_rle_is_compact_for_layers() {
        let mut chunk = Chunk::empty(Point3::new(0, 0, 0));
        for z in 0..CHUNK_SIZE_Z {
            for y in 0..44 {
                for x in 0..CHUNK_SIZE_X {
                    let block_type = match y {
                        0..=39 => BlockType::STONE,
                        40..=42 => BlockType::DIRT,
                        _ => BlockType::GRASS,
                    };
                    chunk.set_block_at(Point3::new(x, y, z), block_type);
                }
            }
        }

        let bytes = encode(&chunk, FormatVersion::IndexedRle);
        // Three runs per z slice.
        assert_eq!(bytes.len(), 20 + 3 * CHUNK_SIZE_Z as usize * 9);
        assert_roundtrip(&chunk);
    }

    #[test]
    fn test_truncation_at_every_offset_fails_cleanly() {
        let chunk = terrain_chunk();
        for format in [FormatVersion::PositionRle, FormatVersion::IndexedRle] {
            let bytes = encode(&chunk, format);
            let step = (bytes.len() / 4096).max(1);
            for len in (0..bytes.len()).step_by(step).chain(bytes.len() - 16..bytes.len()) {
                assert!(decode(&bytes[..len]).is_err(), "{format:?} cut at {len}");
            }
        }

        let small = {
            let mut chunk = Chunk::empty(Point3::new(0, 0, 0));
            chunk.set_block_at(Point3::new(3, 4, 5), BlockType::WOOD);
            chunk.set_block_at(Point3::new(4, 4, 5), BlockType::WOOD);
            chunk.set_block_at(Point3::new(9, 0, 0), BlockType::LEAF);
            chunk
        };
        for format in [FormatVersion::PositionRle, FormatVersion::IndexedRle] {
            let bytes = encode(&small, format);
            for len in 0..bytes.len() {
                assert!(decode(&bytes[..len]).is_err(), "{format:?} cut at {len}");
            }
        }
    }

    #[test]
    fn test_truncated_legacy_is_not_guessed() {
        let bytes = encode(&Chunk::empty(Point3::new(0, 0, 0)), FormatVersion::Legacy);
        for len in [0, 3, 4, 100, LEGACY_LEN / 2, LEGACY_LEN - 1] {
            assert!(decode(&bytes[..len]).is_err());
        }
        let mut longer = bytes.clone();
        longer.push(0);
        assert_eq!(decode(&longer).err(), Some(CodecError::UnknownVersion(0)));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut bytes = encode(&terrain_chunk(), FormatVersion::IndexedRle);
        bytes[..4].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(decode(&bytes).err(), Some(CodecError::UnknownVersion(9)));
    }

    #[test]
    fn test_excessive_count_is_rejected() {
        for format in [FormatVersion::PositionRle, FormatVersion::IndexedRle] {
            let mut bytes = encode(&Chunk::empty(Point3::new(0, 0, 0)), format);
            bytes[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
            assert_eq!(
                decode(&bytes).err(),
                Some(CodecError::CountTooLarge {
                    count: u32::MAX as u64,
                    max: CHUNK_VOLUME
                })
            );

            bytes[16..20].copy_from_slice(&100u32.to_le_bytes());
            assert!(matches!(decode(&bytes), Err(CodecError::Truncated { .. })));
        }
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut chunk = Chunk::empty(Point3::new(0, 0, 0));
        chunk.set_block_at(Point3::new(15, 127, 15), BlockType::BRICK);

        let mut bytes = encode(&chunk, FormatVersion::IndexedRle);
        // Stretch the only run past the end of the grid.
        let run_offset = bytes.len() - 4;
        bytes[run_offset..].copy_from_slice(&2u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(
            decode(&bytes).err(),
            Some(CodecError::IndexOutOfRange {
                index: CHUNK_VOLUME as u64
            })
        );

        let mut bytes = encode(&chunk, FormatVersion::PositionRle);
        bytes[20] = 16;
        assert!(matches!(decode(&bytes), Err(CodecError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_bad_runs_are_rejected() {
        let mut chunk = Chunk::empty(Point3::new(0, 0, 0));
        chunk.set_block_at(Point3::new(0, 0, 0), BlockType::SAND);
        let bytes = encode(&chunk, FormatVersion::IndexedRle);
        // Layout: tag, position, count, start, type, run.
        let (type_offset, run_offset) = (24, 25);

        let mut zero = bytes.clone();
        zero[run_offset..].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(decode(&zero).err(), Some(CodecError::ZeroLengthRun));

        let mut overflow = bytes.clone();
        overflow[run_offset..].copy_from_slice(&5u32.to_le_bytes());
        assert_eq!(decode(&overflow).err(), Some(CodecError::RunOverflow { count: 1 }));

        let mut air = bytes.clone();
        air[type_offset] = BlockType::AIR.as_int();
        assert_eq!(decode(&air).err(), Some(CodecError::EmptyBlockInRun));

        let mut unknown = bytes.clone();
        unknown[type_offset] = 200;
        assert_eq!(decode(&unknown).err(), Some(CodecError::UnknownBlockType(200)));

        let mut trailing = bytes;
        trailing.extend_from_slice(&[0, 0]);
        assert_eq!(decode(&trailing).err(), Some(CodecError::TrailingBytes(2)));
    }

    #[test]
    fn test_legacy_unknown_type_is_rejected() {
        let mut bytes = encode(&Chunk::empty(Point3::new(0, 0, 0)), FormatVersion::Legacy);
        let first_type = HEADER_LEN + 12;
        bytes[first_type..first_type + 4].copy_from_slice(&77u32.to_le_bytes());
        assert_eq!(decode(&bytes).err(), Some(CodecError::UnknownBlockType(77)));
    }

    #[test]
    fn test_random_corruption_never_panics() {
        let original = encode(&terrain_chunk(), FormatVersion::PositionRle);
        fastrand::seed(12);
        for _ in 0..200 {
            let mut bytes = original.clone();
            for _ in 0..4 {
                let at = fastrand::usize(..bytes.len());
                bytes[at] = fastrand::u8(..);
            }
            if let Ok(chunk) = decode(&bytes) {
                assert_eq!(chunk.blocks().len(), CHUNK_VOLUME);
            }
        }
    }
}
