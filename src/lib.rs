//! **issuectx** - Enrich static-analysis findings with bounded source context
//!
//! Each issue gets a line snippet, its enclosing function/class block and,
//! optionally, the callers and callees around it, extracted once per run and
//! shared across every issue that needs them.

/// Command-line interface with clap integration
pub mod cli;

/// Command handlers (enrich, block, refs)
pub mod cli_ext;

/// Shell completion generation
pub mod completion;

/// Enrichment engine
pub mod core {
    /// Error taxonomy (read, range, config, batch)
    pub mod errors;
    pub use errors::{ConfigError, EnrichError, RangeError, ReadError};

    /// Issue, snippet, bug block and anchor records
    pub mod model;

    /// Shared path → file cache with line indexes
    pub mod source_index;
    pub use source_index::{SourceFile, SourceIndex, SourceReader};

    /// Literal-aware structure and reference scanning
    pub mod scan;

    /// Fixed-radius snippet windows
    pub mod snippet;

    /// Enclosing-unit extraction and fingerprinting
    pub mod bug_block;

    /// Run-scoped single-flight caches
    pub mod cache;
    pub use cache::{CacheStats, RunCache};

    /// Bounded callsite traversal
    pub mod callgraph;

    /// JSONL issue input and enriched output
    pub mod issues;

    /// Batch orchestrator
    pub mod enrich;
    pub use enrich::{CancelToken, Enricher};
}

/// Infrastructure - Configuration, I/O, and utilities
pub mod infra {
    /// Configuration management with TOML/env layering
    pub mod config;
    pub use config::{Config, EnrichConfig, init as config_init, load_config};

    /// Memory-mapped file I/O for large files
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// CRLF/LF-robust line indexing for O(1) line→byte mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Gitignore-aware directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Text and identifier helpers
    pub mod utils;
}

pub use cli::{AppContext, Cli, Commands};
pub use core::model::{BugBlock, CallsiteAnchor, EnrichedIssue, EnrichmentLevel, Issue, Snippet};
pub use core::{CancelToken, Enricher, SourceIndex};
pub use infra::{Config, EnrichConfig, load_config};
