//! Run-scoped single-flight caches.
//!
//! Every cache is an unbounded `moka::sync::Cache` driven through
//! `get_with`: the first caller for a key runs the initializer, concurrent
//! callers for the same key wait for it and share the value, and different
//! keys proceed in parallel. Entries are never evicted during a run, so each
//! counter below counts distinct keys, not requests.
//!
//! Boundary results are the exception: they are grouped per file behind a
//! lock, so a unit found for one line answers every other line it is known
//! to cover, and scans count distinct units rather than distinct lines.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use moka::sync::Cache;
use serde::Serialize;
use tracing::debug;

use crate::core::model::{BugBlock, CallsiteAnchor};
use crate::core::scan::{Reference, ReferenceFinder, StructureScanner, UnitSpan};
use crate::core::source_index::SourceFile;

/// Anchor sets are keyed by seed symbol, its defining file and the depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorKey
{
    pub symbol: String,
    pub definition_file: PathBuf,
    pub max_depth: usize,
}

#[derive(Debug, Default)]
struct Counters
{
    boundary_scans: AtomicUsize,
    block_extractions: AtomicUsize,
    reference_scans: AtomicUsize,
    definition_lookups: AtomicUsize,
    anchor_builds: AtomicUsize,
}

fn bump(counter: &AtomicUsize)
{
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Boundary results of one file.
#[derive(Debug, Default)]
struct FileUnits
{
    by_line: HashMap<usize, Option<UnitSpan>>,
    resolved: Vec<(RangeInclusive<usize>, UnitSpan)>,
}

/// Point-in-time copy of the work counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats
{
    pub files_loaded: usize,
    pub boundary_scans: usize,
    pub block_extractions: usize,
    pub reference_scans: usize,
    pub definition_lookups: usize,
    pub anchor_builds: usize,
}

/// Caches shared by every worker of one run.
pub struct RunCache
{
    units: Cache<PathBuf, Arc<Mutex<FileUnits>>>,
    blocks: Cache<String, Arc<BugBlock>>,
    refs: Cache<(PathBuf, String), Arc<Vec<Reference>>>,
    definitions: Cache<String, Arc<Vec<(PathBuf, usize)>>>,
    anchors: Cache<AnchorKey, Arc<Vec<CallsiteAnchor>>>,
    includes: Cache<PathBuf, Arc<Vec<String>>>,
    counters: Counters,
}

impl Default for RunCache
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl RunCache
{
    pub fn new() -> Self
    {
        Self {
            units: Cache::builder().build(),
            blocks: Cache::builder().build(),
            refs: Cache::builder().build(),
            definitions: Cache::builder().build(),
            anchors: Cache::builder().build(),
            includes: Cache::builder().build(),
            counters: Counters::default(),
        }
    }

    /// Enclosing unit of `line`. A file is scanned again only for lines
    /// that no earlier result covers.
    pub fn enclosing_unit(
        &self,
        scanner: &dyn StructureScanner,
        file: &SourceFile,
        line: usize,
    ) -> Option<UnitSpan>
    {
        let slot = self
            .units
            .get_with(file.path().to_path_buf(), Arc::default);
        let mut units = slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(known) = units
            .by_line
            .get(&line)
        {
            return known.clone();
        }
        let covering = units
            .resolved
            .iter()
            .find(|(lines, _)| lines.contains(&line))
            .map(|(_, span)| span.clone());

        let found = match covering
        {
            Some(span) => Some(span),
            None =>
            {
                bump(&self.counters.boundary_scans);
                let found = scanner.find_enclosing_unit(file, line);
                if let Some(span) = &found
                    && let Some(lines) = scanner.resolved_lines(file, span)
                {
                    units
                        .resolved
                        .push((lines, span.clone()));
                }
                found
            }
        };
        units
            .by_line
            .insert(line, found.clone());
        found
    }

    /// Bug block for `fingerprint`; `init` runs at most once per fingerprint.
    pub fn bug_block(
        &self,
        fingerprint: &str,
        init: impl FnOnce() -> BugBlock,
    ) -> Arc<BugBlock>
    {
        self.blocks
            .get_with(fingerprint.to_string(), || {
                bump(&self.counters.block_extractions);
                debug!(fingerprint, "extracting bug block");
                Arc::new(init())
            })
    }

    /// Occurrences of `name` in `file`, scanned at most once.
    pub fn references(
        &self,
        finder: &dyn ReferenceFinder,
        file: &SourceFile,
        name: &str,
    ) -> Arc<Vec<Reference>>
    {
        let key = (file.path().to_path_buf(), name.to_string());
        self.refs
            .get_with(key, || {
                bump(&self.counters.reference_scans);
                Arc::new(finder.find_references(file, name))
            })
    }

    /// Definition sites of `name` across the project, resolved at most once.
    pub fn definitions(
        &self,
        name: &str,
        init: impl FnOnce() -> Vec<(PathBuf, usize)>,
    ) -> Arc<Vec<(PathBuf, usize)>>
    {
        self.definitions
            .get_with(name.to_string(), || {
                bump(&self.counters.definition_lookups);
                Arc::new(init())
            })
    }

    /// Anchor set for `key`; built at most once.
    pub fn anchors(
        &self,
        key: AnchorKey,
        init: impl FnOnce() -> Vec<CallsiteAnchor>,
    ) -> Arc<Vec<CallsiteAnchor>>
    {
        self.anchors
            .get_with(key, || {
                bump(&self.counters.anchor_builds);
                Arc::new(init())
            })
    }

    /// Include preamble of `file`, computed once.
    pub fn includes(
        &self,
        file: &SourceFile,
        init: impl FnOnce() -> Vec<String>,
    ) -> Arc<Vec<String>>
    {
        self.includes
            .get_with(file.path().to_path_buf(), || Arc::new(init()))
    }

    /// Work counters; `files_loaded` comes from the source index.
    pub fn stats(
        &self,
        files_loaded: usize,
    ) -> CacheStats
    {
        let c = &self.counters;
        CacheStats {
            files_loaded,
            boundary_scans: c
                .boundary_scans
                .load(Ordering::Relaxed),
            block_extractions: c
                .block_extractions
                .load(Ordering::Relaxed),
            reference_scans: c
                .reference_scans
                .load(Ordering::Relaxed),
            definition_lookups: c
                .definition_lookups
                .load(Ordering::Relaxed),
            anchor_builds: c
                .anchor_builds
                .load(Ordering::Relaxed),
        }
    }
}
