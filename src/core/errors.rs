//! Error taxonomy for the enrichment engine.
//!
//! Only [`ConfigError`] and [`EnrichError`] ever fail a batch. [`ReadError`]
//! is captured per issue and surfaced as a diagnostic in the output stream.

use std::path::PathBuf;

use miette::Diagnostic;

/// Failure to load a source file into the index.
///
/// `Clone` because load results (including failures) are cached per path,
/// so every issue touching a broken file sees the same error without
/// touching the filesystem again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError
{
    #[error("source file not found: {path}")]
    NotFound
    {
        path: PathBuf
    },

    #[error("failed to read {path}: {message}")]
    Unreadable
    {
        path: PathBuf, message: String
    },

    #[error("{path} is {size} bytes, above the {limit}-byte index limit")]
    TooLarge
    {
        path: PathBuf, size: u64, limit: u64
    },

    #[error("{path} resolves outside the source root")]
    OutsideRoot
    {
        path: PathBuf
    },

    #[error("{path} is not valid UTF-8")]
    NotUtf8
    {
        path: PathBuf
    },
}

impl ReadError
{
    /// Classify an `io::Error` for `path`.
    pub fn from_io(
        path: PathBuf,
        err: &std::io::Error,
    ) -> Self
    {
        match err.kind()
        {
            std::io::ErrorKind::NotFound => ReadError::NotFound { path },
            _ => ReadError::Unreadable { path, message: err.to_string() },
        }
    }
}

/// Requested line range falls outside `[1, line_count]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line range {start}-{end} is outside 1-{line_count}")]
pub struct RangeError
{
    pub start: usize,
    pub end: usize,
    pub line_count: usize,
}

/// Invalid numeric configuration. Fatal: reported before any extraction.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, thiserror::Error)]
pub enum ConfigError
{
    #[error("{field} must be greater than zero")]
    #[diagnostic(code(issuectx::config::zero), help("set the value in issuectx.toml or pass the matching CLI flag"))]
    Zero
    {
        field: &'static str
    },

    #[error("{field} = {value} exceeds the maximum of {max}")]
    #[diagnostic(code(issuectx::config::too_large), help("lower the value in issuectx.toml or on the command line"))]
    TooLarge
    {
        field: &'static str, value: usize, max: usize
    },

    #[error("{field} = {value} is below {floor_field} = {floor}")]
    #[diagnostic(
        code(issuectx::config::below),
        help("the fallback window of an unstructured block must be at least as wide as the snippet window")
    )]
    Below
    {
        field: &'static str, value: usize, floor_field: &'static str, floor: usize
    },
}

/// Batch-level failure of [`crate::core::enrich::Enricher::enrich`].
#[derive(Debug, thiserror::Error)]
pub enum EnrichError
{
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("enrichment cancelled after {completed} issue(s)")]
    Cancelled
    {
        completed: usize
    },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}
