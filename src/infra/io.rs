use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::core::errors::ReadError;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// File bytes, either mapped or owned. UTF-8 is validated on construction,
/// so `as_ref` never has to guess.
pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl AsRef<str> for FileContent {
    fn as_ref(&self) -> &str {
        match self {
            // Validated in `read_file_smart`; a mapping is never mutated by us.
            FileContent::Mapped(mmap) => std::str::from_utf8(mmap).unwrap_or_default(),
            FileContent::Buffered(s) => s.as_str(),
        }
    }
}

impl std::fmt::Debug for FileContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileContent::Mapped(m) => write!(f, "Mapped({} bytes)", m.len()),
            FileContent::Buffered(s) => write!(f, "Buffered({} bytes)", s.len()),
        }
    }
}

/// Read a file, refusing anything above `max_bytes`.
///
/// Files above 1 MiB are memory-mapped, smaller ones are read into memory.
pub fn read_file_smart<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<FileContent, ReadError> {
    let path = path.as_ref();
    let metadata =
        std::fs::metadata(path).map_err(|e| ReadError::from_io(path.to_path_buf(), &e))?;

    if !metadata.is_file() {
        return Err(ReadError::Unreadable {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    if metadata.len() > max_bytes {
        return Err(ReadError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    if metadata.len() > MMAP_THRESHOLD {
        let file = File::open(path).map_err(|e| ReadError::from_io(path.to_path_buf(), &e))?;

        // Safety: read-only mapping; the source tree is treated as immutable for the run.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ReadError::from_io(path.to_path_buf(), &e))?;

        if std::str::from_utf8(&mmap).is_err() {
            return Err(ReadError::NotUtf8 {
                path: path.to_path_buf(),
            });
        }

        Ok(FileContent::Mapped(mmap))
    } else {
        let bytes = std::fs::read(path).map_err(|e| ReadError::from_io(path.to_path_buf(), &e))?;
        let content = String::from_utf8(bytes).map_err(|_| ReadError::NotUtf8 {
            path: path.to_path_buf(),
        })?;

        Ok(FileContent::Buffered(content))
    }
}
