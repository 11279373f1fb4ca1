//! File-backed block device
//!
//! Uses positional reads and writes (`pread`/`pwrite`), so concurrent
//! callers never share a seek position. `barrier` maps to `fdatasync`.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::errors::{DiskError, DiskResult};
use super::Disk;
use crate::block::{Block, BLOCK_SIZE};

/// Block device stored in a regular file.
#[derive(Debug)]
pub struct FileDisk {
    path: PathBuf,
    file: File,
    nblocks: u64,
}

impl FileDisk {
    /// Creates (or truncates) an image of `nblocks` zeroed blocks.
    pub fn create(path: &Path, nblocks: u64) -> DiskResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(DiskError::Open)?;
        file.set_len(nblocks * BLOCK_SIZE as u64)
            .map_err(DiskError::Open)?;
        file.sync_all().map_err(DiskError::Sync)?;

        debug!(path = %path.display(), nblocks, "created disk image");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            nblocks,
        })
    }

    /// Opens an existing image. Its size is rounded down to whole blocks.
    pub fn open(path: &Path) -> DiskResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(DiskError::Open)?;
        let len = file.metadata().map_err(DiskError::Open)?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            nblocks: len / BLOCK_SIZE as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check(&self, blkno: u64) -> DiskResult<u64> {
        if blkno >= self.nblocks {
            return Err(DiskError::OutOfRange {
                blkno,
                size: self.nblocks,
            });
        }
        Ok(blkno * BLOCK_SIZE as u64)
    }
}

impl Disk for FileDisk {
    fn read(&self, blkno: u64) -> DiskResult<Block> {
        let offset = self.check(blkno)?;
        let mut blk = Block::zeroed();
        self.file
            .read_exact_at(blk.as_bytes_mut(), offset)
            .map_err(|source| DiskError::Io { blkno, source })?;
        Ok(blk)
    }

    fn write(&self, blkno: u64, blk: &Block) -> DiskResult<()> {
        let offset = self.check(blkno)?;
        self.file
            .write_all_at(blk.as_bytes(), offset)
            .map_err(|source| DiskError::Io { blkno, source })
    }

    fn barrier(&self) -> DiskResult<()> {
        self.file.sync_data().map_err(DiskError::Sync)
    }

    fn size(&self) -> u64 {
        self.nblocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_sets_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.img");
        let disk = FileDisk::create(&path, 16).unwrap();
        assert_eq!(disk.size(), 16);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            16 * BLOCK_SIZE as u64
        );
    }

    #[test]
    fn test_write_read_roundtrip_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.img");
        {
            let disk = FileDisk::create(&path, 8).unwrap();
            disk.write(3, &Block::with_prefix(b"hello")).unwrap();
            disk.barrier().unwrap();
        }
        let disk = FileDisk::open(&path).unwrap();
        assert_eq!(disk.size(), 8);
        assert_eq!(&disk.read(3).unwrap()[..5], b"hello");
        assert_eq!(disk.read(2).unwrap(), Block::zeroed());
    }

    #[test]
    fn test_out_of_range() {
        let dir = TempDir::new().unwrap();
        let disk = FileDisk::create(&dir.path().join("d.img"), 4).unwrap();
        assert!(matches!(
            disk.read(4),
            Err(DiskError::OutOfRange { blkno: 4, size: 4 })
        ));
        assert!(disk.write(10, &Block::zeroed()).is_err());
    }
}
