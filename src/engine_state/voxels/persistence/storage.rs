//! One file per chunk under a root directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use cgmath::Point3;
use log::{debug, warn};

use crate::core::Result;
use crate::engine_state::voxels::chunk::{Chunk, LoadedChunk};

use super::codec::{self, FormatVersion};

const CHUNK_EXTENSION: &str = "blk";
const CORRUPT_SUFFIX: &str = "corrupt";

/// Chunk files on disk.
///
/// File names pack the low 20 bits of each chunk coordinate into one integer,
/// `chunk_<packed>.blk`, so coordinates within +/-524288 chunks map to distinct files.
///
/// Clones share one write lock, so two saves of the same chunk land on disk in
/// the order their grids were read.
#[derive(Clone, Debug)]
pub struct ChunkStorage {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ChunkStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `(x & 0xFFFFF) << 40 | (y & 0xFFFFF) << 20 | (z & 0xFFFFF)`
    pub fn packed_index(position: Point3<i32>) -> u64 {
        let pack = |v: i32| (v as i64 as u64) & 0xFFFFF;
        pack(position.x) << 40 | pack(position.y) << 20 | pack(position.z)
    }

    pub fn path_for(&self, position: Point3<i32>) -> PathBuf {
        self.root.join(format!(
            "chunk_{}.{}",
            Self::packed_index(position),
            CHUNK_EXTENSION
        ))
    }

    /// Checks whether a file exists for the chunk without reading it.
    pub fn exists(&self, position: Point3<i32>) -> bool {
        fs::metadata(self.path_for(position))
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Writes a chunk. The file is written beside its final path and renamed into
    /// place, so a crash never leaves a half-written chunk file behind.
    pub fn save(&self, chunk: &Chunk, format: FormatVersion) -> Result<()> {
        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_file(chunk, format)
    }

    /// Writes a shared chunk. Its grid is read only once the write lock is held.
    pub fn save_shared(&self, chunk: &LoadedChunk, format: FormatVersion) -> Result<()> {
        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_file(&chunk.read(), format)
    }

    fn write_file(&self, chunk: &Chunk, format: FormatVersion) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let path = self.path_for(chunk.position);
        let tmp = path.with_extension(format!("{CHUNK_EXTENSION}.tmp"));
        fs::write(&tmp, codec::encode(chunk, format))?;
        fs::rename(&tmp, &path)?;

        debug!("Saved chunk {:?} to {}", chunk.position, path.display());
        Ok(())
    }

    /// Reads a chunk. Returns `Ok(None)` if no file exists.
    pub fn load(&self, position: Point3<i32>) -> Result<Option<Chunk>> {
        let path = self.path_for(position);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut chunk = codec::decode(&bytes)?;
        if chunk.position != position {
            warn!(
                "Chunk file {} holds chunk {:?}, expected {:?}",
                path.display(),
                chunk.position,
                position
            );
            chunk.position = position;
        }

        debug!("Loaded chunk {:?} from {}", position, path.display());
        Ok(Some(chunk))
    }

    /// Moves an unreadable chunk file aside so it can be inspected later and is
    /// not overwritten. Returns the new path.
    pub fn quarantine(&self, position: Point3<i32>) -> Result<PathBuf> {
        let path = self.path_for(position);
        let mut target = path.clone().into_os_string();
        target.push(".");
        target.push(CORRUPT_SUFFIX);
        let target = PathBuf::from(target);

        fs::rename(&path, &target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::engine_state::voxels::block::block_type::BlockType;

    fn sample_chunk(position: Point3<i32>) -> Chunk {
        let mut chunk = Chunk::empty(position);
        chunk.set_block_at(Point3::new(1, 2, 3), BlockType::IRON_ORE);
        chunk.set_block_at(Point3::new(15, 0, 0), BlockType::GRAVEL);
        chunk
    }

    #[test]
    fn test_packed_index() {
        assert_eq!(ChunkStorage::packed_index(Point3::new(0, 0, 0)), 0);
        assert_eq!(ChunkStorage::packed_index(Point3::new(1, 2, 3)), 1 << 40 | 2 << 20 | 3);
        assert_eq!(
            ChunkStorage::packed_index(Point3::new(-1, 0, -1)),
            0xFFFFF << 40 | 0xFFFFF
        );
    }

    #[test]
    fn test_path_for() {
        let storage = ChunkStorage::new("/tmp/world");
        assert_eq!(
            storage.path_for(Point3::new(0, 0, 1)),
            PathBuf::from("/tmp/world/chunk_1.blk")
        );
    }

    #[test]
    fn test_save_load_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = ChunkStorage::new(dir.path().join("nested"));
        let position = Point3::new(-3, 0, 8);

        assert!(!storage.exists(position));
        assert!(storage.load(position).expect("load").is_none());

        for format in [
            FormatVersion::Legacy,
            FormatVersion::PositionRle,
            FormatVersion::IndexedRle,
        ] {
            let chunk = sample_chunk(position);
            storage.save(&chunk, format).expect("save");
            assert!(storage.exists(position));

            let loaded = storage.load(position).expect("load").expect("present");
            assert_eq!(loaded, chunk);
        }
    }

    #[test]
    fn test_corrupt_file_is_an_error_and_can_be_quarantined() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = ChunkStorage::new(dir.path());
        let position = Point3::new(4, 0, 4);

        fs::write(storage.path_for(position), [9, 9, 9, 9, 9]).expect("write");
        assert!(matches!(storage.load(position), Err(Error::Codec(_))));

        let moved = storage.quarantine(position).expect("quarantine");
        assert!(moved.to_string_lossy().ends_with(".blk.corrupt"));
        assert!(moved.exists());
        assert!(!storage.exists(position));
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = ChunkStorage::new(dir.path());
        let position = Point3::new(0, 0, 0);

        fs::create_dir_all(storage.path_for(position)).expect("mkdir");
        assert!(!storage.exists(position));
        assert!(matches!(storage.load(position), Err(Error::Io(_))));
    }

    #[test]
    fn test_concurrent_shared_saves_keep_latest_grid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = ChunkStorage::new(dir.path());
        let position = Point3::new(1, 0, 1);
        let chunk = LoadedChunk::new(sample_chunk(position));

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let storage = storage.clone();
                let chunk = &chunk;
                scope.spawn(move || {
                    for y in 0..8 {
                        chunk.set_block(Point3::new(worker, 10 + y, 0), BlockType::BRICK);
                        storage
                            .save_shared(chunk, FormatVersion::IndexedRle)
                            .expect("save");
                    }
                });
            }
        });

        let loaded = storage.load(position).expect("load").expect("present");
        assert_eq!(loaded, *chunk.read());
        assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), 1);
    }
}
