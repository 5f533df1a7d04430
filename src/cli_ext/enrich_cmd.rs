//! `ictx enrich`: issues JSONL in, enriched JSONL out.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::Style;
use serde_json::json;
use tracing::{info, instrument};

use crate::cli::{AppContext, EnrichArgs};
use crate::cli_ext::{build_index, paint, resolve_root};
use crate::core::enrich::{CancelToken, Enricher};
use crate::core::issues::{read_issues, write_jsonl};
use crate::infra::config::{Config, load_config};

/// Fold command-line overrides into the loaded config.
pub fn apply_overrides(
    cfg: &mut Config,
    args: &EnrichArgs,
)
{
    let e = &mut cfg.enrich;
    if let Some(level) = args.level
    {
        e.level = level.into();
    }
    if let Some(v) = args.radius
    {
        e.snippet_radius = v;
    }
    if let Some(v) = args.fallback_radius
    {
        e.fallback_radius = v;
    }
    if let Some(v) = args.max_block_lines
    {
        e.max_bug_block_lines = v;
    }
    if let Some(v) = args.depth
    {
        e.callsite_max_depth = v;
    }
    if let Some(v) = args.max_anchors
    {
        e.callsite_max_anchors = v;
    }
    if let Some(v) = args.anchor_radius
    {
        e.anchor_context_radius = v;
    }
    if let Some(v) = args.max_file_size
    {
        e.max_file_bytes = v;
    }
    if let Some(v) = args.workers
    {
        e.workers = v;
    }
}

fn to_stdout(path: &Path) -> bool
{
    path.as_os_str() == "-"
}

#[instrument(skip_all, fields(issues = %args.issues.display()))]
pub fn run(
    args: EnrichArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = load_config()?;
    apply_overrides(&mut cfg, &args);
    cfg.enrich
        .validate()?;

    let root = resolve_root(&args.root)?;
    let issues = read_issues(&args.issues)?;
    let stdout_sink = to_stdout(&args.output);

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            let warn = Style::new().yellow();
            eprintln!("{}", paint(ctx, "DRY RUN: Would enrich:", warn));
            eprintln!("  {} issues from {}", issues.len(), args.issues.display());
            eprintln!("  level {:?}, root {}", cfg.enrich.level, root.display());
            eprintln!(
                "{}",
                paint(ctx, format!("Would write {} records to {}", issues.len(), args.output.display()), warn)
            );
        }
        return Ok(());
    }

    let index = build_index(root, &cfg)?;
    let enricher = Enricher::new(cfg.enrich, index);

    let cancel = match args.timeout_secs
    {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    // Set up progress bar (unless quiet mode)
    let progress = if ctx.quiet
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(issues.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    };

    let tick = || progress.inc(1);
    let records = enricher.enrich_with(&issues, &cancel, &tick);
    progress.finish_and_clear();
    let records = records?;

    if stdout_sink
    {
        let out = io::stdout();
        write_jsonl(out.lock(), &records)?;
    }
    else
    {
        let file = File::create(&args.output)
            .with_context(|| format!("Failed to create output file: {}", args.output.display()))?;
        let mut writer = BufWriter::new(file);
        write_jsonl(&mut writer, &records)?;
        writer
            .flush()
            .with_context(|| format!("Failed to write to {}", args.output.display()))?;
    }

    let degraded = records
        .iter()
        .filter(|r| r.is_degraded())
        .count();
    let stats = enricher.stats();
    info!(records = records.len(), degraded, "enrich command done");

    if args.json_summary
    {
        let summary = json!({
            "issues": records.len(),
            "degraded": degraded,
            "level": enricher.config().level,
            "output": args.output.display().to_string(),
            "stats": stats,
        });
        eprintln!("{summary}");
    }
    else if !ctx.quiet
    {
        let ok = paint(ctx, "✓", Style::new().green());
        let warn = paint(ctx, "!", Style::new().yellow());
        // stdout may carry the records, so the summary goes to stderr
        eprintln!("{ok} Enriched {} issues into {}", records.len(), args.output.display());
        if degraded > 0
        {
            eprintln!("  {warn} {degraded} degraded (see diagnostics)");
        }
        eprintln!(
            "  files {}, blocks {}, reference scans {}, anchor sets {}",
            stats.files_loaded, stats.block_extractions, stats.reference_scans, stats.anchor_builds
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::core::model::EnrichmentLevel;

    fn parse(argv: &[&str]) -> EnrichArgs
    {
        match Cli::try_parse_from(argv)
            .unwrap()
            .command
        {
            Commands::Enrich(args) => args,
            _ => panic!("expected enrich"),
        }
    }

    #[test]
    fn overrides_replace_only_given_fields()
    {
        let args = parse(&["ictx", "enrich", "i.jsonl", "--level", "snippet", "--radius", "9", "--workers", "3"]);
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, &args);

        assert_eq!(cfg.enrich.level, EnrichmentLevel::Snippet);
        assert_eq!(cfg.enrich.snippet_radius, 9);
        assert_eq!(cfg.enrich.workers, 3);
        assert_eq!(cfg.enrich.max_bug_block_lines, 120);
    }

    #[test]
    fn dash_means_stdout()
    {
        assert!(to_stdout(Path::new("-")));
        assert!(!to_stdout(Path::new("out.jsonl")));
    }
}
