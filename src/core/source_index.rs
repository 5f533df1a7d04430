//! Run-scoped source index.
//!
//! Maps repo-relative paths to loaded [`SourceFile`]s. Each path is loaded at
//! most once per index (concurrent callers for the same path wait for the
//! first loader), failures included, and the loaded files are read-only.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use moka::sync::Cache;
use tracing::debug;

use crate::core::errors::{RangeError, ReadError};
use crate::core::scan::mask::mask_code;
use crate::infra::io::{FileContent, read_file_smart};
use crate::infra::line_index::NewlineIndex;
use crate::infra::walk::FileWalker;

/// Pluggable file access, so tests can simulate unreadable files.
pub trait SourceReader: Send + Sync
{
    fn read(
        &self,
        path: &Path,
        max_bytes: u64,
    ) -> Result<FileContent, ReadError>;
}

/// Default reader backed by the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl SourceReader for FsReader
{
    fn read(
        &self,
        path: &Path,
        max_bytes: u64,
    ) -> Result<FileContent, ReadError>
    {
        read_file_smart(path, max_bytes)
    }
}

/// An immutable loaded file with its line index.
#[derive(Debug)]
pub struct SourceFile
{
    path: PathBuf,
    content: FileContent,
    index: NewlineIndex,
    /// Literal/comment-blanked copy of the bytes, built on first use
    mask: OnceLock<Vec<u8>>,
}

impl SourceFile
{
    pub fn new(
        path: PathBuf,
        content: FileContent,
    ) -> Self
    {
        let index = NewlineIndex::build(
            content
                .as_ref()
                .as_bytes(),
        );
        Self { path, content, index, mask: OnceLock::new() }
    }

    /// Convenience constructor for in-memory sources.
    pub fn from_text(
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Self
    {
        Self::new(path.into(), FileContent::Buffered(text.into()))
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    pub fn text(&self) -> &str
    {
        self.content
            .as_ref()
    }

    pub fn bytes(&self) -> &[u8]
    {
        self.text()
            .as_bytes()
    }

    /// Number of lines; an empty file counts as one empty line.
    pub fn line_count(&self) -> usize
    {
        self.index
            .line_count()
            .max(1)
    }

    pub fn clamp_line(
        &self,
        line: usize,
    ) -> usize
    {
        self.index
            .clamp_line(line)
    }

    /// 1-based line covering a byte offset.
    pub fn line_of_byte(
        &self,
        byte: usize,
    ) -> usize
    {
        self.index
            .line_of_byte(byte)
            .max(1)
    }

    /// Start byte of a 1-based line (file length for lines past the end).
    pub fn line_start(
        &self,
        line: usize,
    ) -> usize
    {
        self.index
            .start_byte_of_line(line)
            .unwrap_or(self.bytes().len())
    }

    /// End byte (exclusive, newline excluded) of a 1-based line.
    pub fn line_end(
        &self,
        line: usize,
    ) -> usize
    {
        self.index
            .end_byte_of_line(line, self.bytes())
            .unwrap_or(self.bytes().len())
    }

    /// Text of the inclusive 1-based line range. Callers clamp first.
    pub fn line_range(
        &self,
        start: usize,
        end: usize,
    ) -> Result<&str, RangeError>
    {
        let err = || RangeError { start, end, line_count: self.line_count() };

        if start == 0 || start > end || end > self.line_count()
        {
            return Err(err());
        }
        if self
            .text()
            .is_empty()
        {
            return Ok("");
        }

        let (lo, hi) = self
            .index
            .byte_range_for_lines(start, end, self.bytes())
            .ok_or_else(err)?;
        Ok(&self.text()[lo..hi])
    }

    /// Bytes with comments, literals and preprocessor lines blanked out.
    pub fn masked(&self) -> &[u8]
    {
        self.mask
            .get_or_init(|| mask_code(self.bytes()))
    }
}

/// Builder for [`SourceIndex`].
pub struct SourceIndexBuilder
{
    root: PathBuf,
    max_file_bytes: u64,
    ignore_patterns: Vec<String>,
    extensions: Vec<String>,
    reader: Arc<dyn SourceReader>,
}

impl SourceIndexBuilder
{
    pub fn max_file_bytes(
        mut self,
        bytes: u64,
    ) -> Self
    {
        self.max_file_bytes = bytes;
        self
    }

    pub fn ignore_patterns(
        mut self,
        patterns: &[String],
    ) -> Self
    {
        self.ignore_patterns = patterns.to_vec();
        self
    }

    pub fn extensions(
        mut self,
        exts: &[String],
    ) -> Self
    {
        self.extensions = exts.to_vec();
        self
    }

    pub fn reader(
        mut self,
        reader: Arc<dyn SourceReader>,
    ) -> Self
    {
        self.reader = reader;
        self
    }

    pub fn build(self) -> Result<SourceIndex>
    {
        let walker = FileWalker::new(&self.ignore_patterns)?.with_extensions(&self.extensions);

        Ok(SourceIndex {
            root: self.root,
            max_file_bytes: self.max_file_bytes,
            reader: self.reader,
            walker,
            files: Cache::builder().build(),
            project_files: OnceLock::new(),
            loads: AtomicUsize::new(0),
        })
    }
}

/// Path → [`SourceFile`] cache for one run.
pub struct SourceIndex
{
    root: PathBuf,
    max_file_bytes: u64,
    reader: Arc<dyn SourceReader>,
    walker: FileWalker,
    files: Cache<PathBuf, Result<Arc<SourceFile>, ReadError>>,
    project_files: OnceLock<Vec<PathBuf>>,
    loads: AtomicUsize,
}

impl SourceIndex
{
    pub fn builder(root: impl Into<PathBuf>) -> SourceIndexBuilder
    {
        SourceIndexBuilder {
            root: root.into(),
            max_file_bytes: 2 * 1024 * 1024,
            ignore_patterns: Vec::new(),
            extensions: Vec::new(),
            reader: Arc::new(FsReader),
        }
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    /// Canonical cache key: repo-relative, with `.` and `..` resolved
    /// lexically. Paths that leave the root are refused.
    pub fn normalize(
        &self,
        path: &Path,
    ) -> Result<PathBuf, ReadError>
    {
        let outside = || ReadError::OutsideRoot { path: path.to_path_buf() };
        let rel = match path.strip_prefix(&self.root)
        {
            Ok(rel) => rel,
            Err(_) if path.is_absolute() => return Err(outside()),
            Err(_) => path,
        };

        let mut key = PathBuf::new();
        for component in rel.components()
        {
            match component
            {
                Component::Normal(part) => key.push(part),
                Component::CurDir => {}
                Component::ParentDir =>
                {
                    if !key.pop()
                    {
                        return Err(outside());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(outside()),
            }
        }
        Ok(key)
    }

    /// Load (or reuse) the file at `path`.
    pub fn load(
        &self,
        path: &Path,
    ) -> Result<Arc<SourceFile>, ReadError>
    {
        let key = self.normalize(path)?;
        self.files
            .get_with(key.clone(), || {
                self.loads
                    .fetch_add(1, Ordering::Relaxed);
                let abs = self
                    .root
                    .join(&key);
                debug!(path = %key.display(), "loading source file");
                self.reader
                    .read(&abs, self.max_file_bytes)
                    .map(|content| Arc::new(SourceFile::new(key, content)))
            })
    }

    /// Repo-relative paths of every indexed source file, sorted.
    pub fn project_files(&self) -> &[PathBuf]
    {
        self.project_files
            .get_or_init(|| {
                let files: Vec<PathBuf> = self
                    .walker
                    .walk_files(&self.root)
                    .into_iter()
                    .filter_map(|abs| {
                        self.normalize(&abs)
                            .ok()
                    })
                    .collect();
                debug!(count = files.len(), root = %self.root.display(), "indexed project files");
                files
            })
    }

    /// Number of distinct load attempts so far.
    pub fn loads(&self) -> usize
    {
        self.loads
            .load(Ordering::Relaxed)
    }
}
