//! `ictx block` and `ictx refs`: one-off views of the engine's building
//! blocks, handy when tuning limits for a code base.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use owo_colors::Style;
use serde_json::json;
use tracing::{debug, instrument};

use crate::cli::{AppContext, BlockArgs, RefsArgs};
use crate::cli_ext::{Location, build_index, paint, resolve_root};
use crate::core::bug_block::BugBlockExtractor;
use crate::core::cache::RunCache;
use crate::core::callgraph::{AnchorPolicy, GraphBuilder};
use crate::core::model::{Direction, Symbol};
use crate::core::scan::HeuristicScanner;
use crate::core::source_index::SourceIndex;
use crate::infra::config::load_config;

#[instrument(skip_all, fields(location = %args.location))]
pub fn run_block(
    args: BlockArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let loc = Location::parse(&args.location)?;
    let mut cfg = load_config()?;
    if let Some(v) = args.max_block_lines
    {
        cfg.enrich
            .max_bug_block_lines = v;
    }
    if let Some(v) = args.fallback_radius
    {
        cfg.enrich
            .fallback_radius = v;
    }
    cfg.enrich
        .validate()?;

    let index = build_index(resolve_root(&args.root)?, &cfg)?;
    let file = index
        .load(&loc.file)
        .with_context(|| format!("Failed to load {}", loc.file.display()))?;

    let scanner = HeuristicScanner::new(cfg.enrich.max_scan_lines);
    let extractor = BugBlockExtractor {
        max_lines: cfg
            .enrich
            .max_bug_block_lines,
        fallback_radius: cfg
            .enrich
            .fallback_radius,
        max_chars: cfg
            .enrich
            .max_snippet_chars,
        normalize_tabs: cfg
            .enrich
            .normalize_tabs,
    };
    let block = extractor.extract(&scanner, &file, file.clamp_line(loc.line));

    println!("{}", serde_json::to_string_pretty(&block)?);

    if !ctx.quiet
    {
        let mut summary = format!(
            "{}:{}-{} ({:?}",
            block
                .file_path
                .display(),
            block.start_line,
            block.end_line,
            block.kind
        );
        if let Some(sym) = &block.symbol
        {
            summary.push_str(&format!(" {sym}"));
        }
        if block.truncated
        {
            summary.push_str(", truncated");
        }
        summary.push(')');

        eprintln!("{}", paint(ctx, summary, Style::new().cyan()));
    }
    Ok(())
}

#[instrument(skip_all, fields(symbol = %args.symbol))]
pub fn run_refs(
    args: RefsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = load_config()?;
    if let Some(v) = args.depth
    {
        cfg.enrich
            .callsite_max_depth = v;
    }
    if let Some(v) = args.max_anchors
    {
        cfg.enrich
            .callsite_max_anchors = v;
    }
    cfg.enrich
        .validate()?;

    let index = build_index(resolve_root(&args.root)?, &cfg)?;
    let cache = RunCache::new();
    let scanner = HeuristicScanner::new(cfg.enrich.max_scan_lines);

    // Every occurrence across the project, in (file, line) order
    let mut hits: Vec<(PathBuf, usize, bool, bool)> = Vec::new();
    for path in index.project_files()
    {
        let Ok(src) = index.load(path)
        else
        {
            continue;
        };
        hits.extend(
            cache
                .references(&scanner, &src, &args.symbol)
                .iter()
                .map(|r| (path.clone(), r.line, r.is_definition, r.is_call)),
        );
    }
    debug!(occurrences = hits.len(), "reference scan done");

    let Some(depth) = args.depth
    else
    {
        return print_references(&args, &hits, ctx);
    };

    let seed = pick_definition(&index, &args, &hits)?;
    let policy = AnchorPolicy {
        max_depth: depth,
        max_anchors: cfg
            .enrich
            .callsite_max_anchors,
        context_radius: cfg
            .enrich
            .anchor_context_radius,
        skip_header_callsites: cfg
            .enrich
            .skip_header_callsites,
        excluded_dirs: cfg
            .enrich
            .excluded_dirs
            .clone(),
    };
    let traversal = GraphBuilder { index: &index, cache: &cache, scanner: &scanner, finder: &scanner, policy: &policy }
        .build_anchors(&seed, depth);

    if args.dot
    {
        print!(
            "{}",
            traversal
                .graph
                .to_dot()
        );
        return Ok(());
    }

    if args.json
    {
        let out = json!({
            "symbol": seed,
            "depth": depth,
            "anchors": traversal.anchors,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !ctx.quiet
    {
        eprintln!(
            "{} {} defined at {}:{}",
            paint(ctx, "→", Style::new().cyan()),
            seed.name,
            seed.definition_file
                .display(),
            seed.definition_line
        );
    }
    for a in &traversal.anchors
    {
        let arrow = match a.direction
        {
            Direction::Calls => "calls",
            Direction::CalledBy => "called by",
        };
        println!("hop {} {:<10} {} {}:{}", a.hop_distance, arrow, a.symbol_name, a.file.display(), a.line);
    }
    if traversal
        .anchors
        .is_empty()
        && !ctx.quiet
    {
        eprintln!("{}", paint(ctx, "No callers or callees found", Style::new().yellow()));
    }
    Ok(())
}

fn print_references(
    args: &RefsArgs,
    hits: &[(PathBuf, usize, bool, bool)],
    ctx: &AppContext,
) -> Result<()>
{
    if args.json
    {
        let list: Vec<_> = hits
            .iter()
            .map(|(file, line, def, call)| json!({ "file": file, "line": line, "definition": def, "call": call }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    for (file, line, def, call) in hits
    {
        let tag = match (def, call)
        {
            (true, _) => "def",
            (false, true) => "call",
            (false, false) => "ref",
        };
        println!("{}:{} {}", file.display(), line, tag);
    }
    if !ctx.quiet
    {
        eprintln!("{} {} occurrences of {}", paint(ctx, "✓", Style::new().green()), hits.len(), args.symbol);
    }
    Ok(())
}

/// Definition used as the traversal seed: `--file` first, else the first one found.
fn pick_definition(
    index: &SourceIndex,
    args: &RefsArgs,
    hits: &[(PathBuf, usize, bool, bool)],
) -> Result<Symbol>
{
    let preferred = args
        .file
        .as_deref()
        .map(|f| index.normalize(f))
        .transpose()?;
    let mut defs = hits
        .iter()
        .filter(|h| h.2);
    let chosen = match &preferred
    {
        Some(want) => defs.find(|h| &h.0 == want),
        None => defs.next(),
    };
    let Some((file, line, _, _)) = chosen
    else
    {
        bail!("No definition of {} found", args.symbol);
    };
    Ok(Symbol { name: args.symbol.clone(), definition_file: file.clone(), definition_line: *line })
}
