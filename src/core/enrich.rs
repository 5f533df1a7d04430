//! Enrichment orchestrator.
//!
//! Turns a batch of issues into enriched records, one per issue and in
//! input order, on a dedicated rayon pool. The source index is injected;
//! the run caches belong to one [`Enricher`], so independent enrichers never
//! see each other's caches while repeated batches on one of them reuse them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::core::bug_block::BugBlockExtractor;
use crate::core::cache::{AnchorKey, CacheStats, RunCache};
use crate::core::callgraph::{AnchorPolicy, GraphBuilder};
use crate::core::errors::EnrichError;
use crate::core::model::{Diagnostic, DiagnosticKind, EnrichedIssue, EnrichmentLevel, Issue};
use crate::core::scan::{HeuristicScanner, ReferenceFinder, StructureScanner, include_preamble};
use crate::core::snippet::SnippetExtractor;
use crate::core::source_index::SourceIndex;
use crate::infra::config::EnrichConfig;

/// Cooperative cancellation, checked before each issue.
#[derive(Debug, Clone, Default)]
pub struct CancelToken
{
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self
    {
        Self { flag: Arc::default(), deadline: Instant::now().checked_add(timeout) }
    }

    pub fn cancel(&self)
    {
        self.flag
            .store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool
    {
        self.flag
            .load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|d| Instant::now() >= d)
    }
}

/// Batch driver over a shared [`SourceIndex`] and [`RunCache`].
pub struct Enricher
{
    config: EnrichConfig,
    index: Arc<SourceIndex>,
    cache: Arc<RunCache>,
    structure: Arc<dyn StructureScanner>,
    references: Arc<dyn ReferenceFinder>,
}

impl Enricher
{
    /// Orchestrator with a fresh cache and the heuristic scanners.
    /// Configuration is checked when a batch starts.
    pub fn new(
        config: EnrichConfig,
        index: Arc<SourceIndex>,
    ) -> Self
    {
        let scanner = Arc::new(HeuristicScanner::new(config.max_scan_lines));
        Self { config, index, cache: Arc::new(RunCache::new()), structure: scanner.clone(), references: scanner }
    }

    /// Swap in other scanner implementations, e.g. a parser-backed one.
    pub fn with_scanners(
        mut self,
        structure: Arc<dyn StructureScanner>,
        references: Arc<dyn ReferenceFinder>,
    ) -> Self
    {
        self.structure = structure;
        self.references = references;
        self
    }

    pub fn config(&self) -> &EnrichConfig
    {
        &self.config
    }

    pub fn stats(&self) -> CacheStats
    {
        self.cache
            .stats(
                self.index
                    .loads(),
            )
    }

    /// Enrich a batch. Fails only on invalid configuration, pool setup or
    /// cancellation; per-issue failures become diagnostics.
    pub fn enrich(
        &self,
        issues: &[Issue],
        cancel: &CancelToken,
    ) -> Result<Vec<EnrichedIssue>, EnrichError>
    {
        self.enrich_with(issues, cancel, &|| {})
    }

    /// Like [`Enricher::enrich`], calling `on_done` after each issue.
    #[instrument(skip_all, fields(issues = issues.len(), level = ?self.config.level))]
    pub fn enrich_with(
        &self,
        issues: &[Issue],
        cancel: &CancelToken,
        on_done: &(dyn Fn() + Sync),
    ) -> Result<Vec<EnrichedIssue>, EnrichError>
    {
        self.config
            .validate()?;

        let workers = self
            .config
            .resolved_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ictx-worker-{i}"))
            .build()
            .map_err(|e| EnrichError::WorkerPool(e.to_string()))?;

        // Order-preserving parallel map; cancelled slots stay None
        let results: Vec<Option<EnrichedIssue>> = pool.install(|| {
            issues
                .par_iter()
                .map(|issue| {
                    if cancel.is_cancelled()
                    {
                        return None;
                    }
                    let record = self.enrich_one(issue);
                    on_done();
                    Some(record)
                })
                .collect()
        });

        let completed = results
            .iter()
            .filter(|r| r.is_some())
            .count();
        if completed < issues.len()
        {
            warn!(completed, total = issues.len(), "enrichment cancelled");
            return Err(EnrichError::Cancelled { completed });
        }

        let out: Vec<EnrichedIssue> = results
            .into_iter()
            .flatten()
            .collect();
        let stats = self.stats();
        info!(
            issues = out.len(),
            files = stats.files_loaded,
            blocks = stats.block_extractions,
            anchor_sets = stats.anchor_builds,
            "enrichment finished"
        );
        Ok(out)
    }

    /// Enrich a single issue. Never fails: problems become diagnostics.
    pub fn enrich_one(
        &self,
        issue: &Issue,
    ) -> EnrichedIssue
    {
        let mut record = EnrichedIssue {
            issue: issue.clone(),
            snippet: None,
            bug_block: None,
            includes: None,
            anchors: None,
            diagnostics: Vec::new(),
        };

        let file = match self
            .index
            .load(&issue.file_path)
        {
            Ok(file) => file,
            Err(e) =>
            {
                warn!(issue = %issue.id, error = %e, "degraded: source not loadable");
                record
                    .diagnostics
                    .push(Diagnostic { kind: DiagnosticKind::ReadError, reason: e.to_string() });
                return record;
            }
        };

        record.snippet = Some(
            self.snippet_extractor()
                .extract(&file, issue),
        );
        if self.config.level == EnrichmentLevel::Snippet
        {
            return record;
        }

        let line = file.clamp_line(issue.line);
        let blocks = self.block_extractor();
        let unit = self
            .cache
            .enclosing_unit(self.structure.as_ref(), &file, line);
        let plan = blocks.plan(&file, line, unit.as_ref());
        let block = self
            .cache
            .bug_block(&plan.fingerprint, || blocks.materialize(&file, &plan));

        record.includes = Some(
            self.cache
                .includes(&file, || include_preamble(&file)),
        );

        if self.config.level == EnrichmentLevel::Callsite
        {
            match block.enclosing_symbol()
            {
                Some(seed) =>
                {
                    let depth = self
                        .config
                        .callsite_max_depth;
                    let key = AnchorKey {
                        symbol: seed
                            .name
                            .clone(),
                        definition_file: seed
                            .definition_file
                            .clone(),
                        max_depth: depth,
                    };
                    let policy = self.anchor_policy();
                    let anchors = self
                        .cache
                        .anchors(key, || {
                            GraphBuilder {
                                index: &self.index,
                                cache: &self.cache,
                                scanner: self
                                    .structure
                                    .as_ref(),
                                finder: self
                                    .references
                                    .as_ref(),
                                policy: &policy,
                            }
                            .build_anchors(&seed, depth)
                            .anchors
                        });
                    record.anchors = Some(anchors);
                }
                None =>
                {
                    warn!(issue = %issue.id, line, "degraded: no enclosing symbol for callsite anchors");
                    record
                        .diagnostics
                        .push(Diagnostic {
                            kind: DiagnosticKind::NoEnclosingSymbol,
                            reason: format!("no enclosing function or class around line {line}"),
                        });
                }
            }
        }

        record.bug_block = Some(block);
        record
    }

    fn snippet_extractor(&self) -> SnippetExtractor
    {
        SnippetExtractor {
            radius: self
                .config
                .snippet_radius,
            max_chars: self
                .config
                .max_snippet_chars,
            normalize_tabs: self
                .config
                .normalize_tabs,
        }
    }

    fn block_extractor(&self) -> BugBlockExtractor
    {
        BugBlockExtractor {
            max_lines: self
                .config
                .max_bug_block_lines,
            fallback_radius: self
                .config
                .fallback_radius,
            max_chars: self
                .config
                .max_snippet_chars,
            normalize_tabs: self
                .config
                .normalize_tabs,
        }
    }

    pub fn anchor_policy(&self) -> AnchorPolicy
    {
        AnchorPolicy {
            max_depth: self
                .config
                .callsite_max_depth,
            max_anchors: self
                .config
                .callsite_max_anchors,
            context_radius: self
                .config
                .anchor_context_radius,
            skip_header_callsites: self
                .config
                .skip_header_callsites,
            excluded_dirs: self
                .config
                .excluded_dirs
                .clone(),
        }
    }
}
