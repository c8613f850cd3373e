//! Byte sources backing a snapshot model.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use thiserror::Error;

/// Error raised while loading snapshot bytes.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contiguous readable bytes that outlive every model built over them.
pub trait ByteSource: Send + Sync + fmt::Debug {
    fn bytes(&self) -> &[u8];

    fn len(&self) -> usize {
        self.bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl ByteSource for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }
}

/// Read-only memory mapping of a snapshot file.
pub struct MmapSource {
    path: PathBuf,
    map: Mmap,
}

impl fmt::Debug for MmapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapSource").field("path", &self.path).field("len", &self.map.len()).finish()
    }
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let io = |source| SourceError::Io { path: path.to_path_buf(), source };
        let file = File::open(path).map_err(io)?;
        // SAFETY: the mapping is read-only and snapshot files are written once
        // and never modified while loaded.
        let map = unsafe { Mmap::map(&file) }.map_err(io)?;
        Ok(Self { path: path.to_path_buf(), map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for MmapSource {
    fn bytes(&self) -> &[u8] {
        &self.map
    }
}

/// Map a snapshot file, or read it into memory when it is empty
/// (zero-length files cannot be mapped on every platform).
pub fn load_file(path: &Path) -> Result<Arc<dyn ByteSource>, SourceError> {
    let io = |source| SourceError::Io { path: path.to_path_buf(), source };
    let len = std::fs::metadata(path).map_err(io)?.len();
    if len == 0 {
        return Ok(Arc::new(Vec::<u8>::new()));
    }
    Ok(Arc::new(MmapSource::open(path)?))
}
