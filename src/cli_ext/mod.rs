//! Command handlers and the small helpers they share.

pub mod enrich_cmd;
pub mod inspect_cmd;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Style};

use crate::cli::AppContext;
use crate::core::source_index::SourceIndex;
use crate::infra::config::Config;

/// Render `text` in `style`, or plain under `--no-color`.
pub fn paint(
    ctx: &AppContext,
    text: impl std::fmt::Display,
    style: Style,
) -> String
{
    if ctx.no_color
    {
        text.to_string()
    }
    else
    {
        text.style(style)
            .to_string()
    }
}

/// Expand `~` and canonicalize the source root (no UNC prefixes on Windows).
pub fn resolve_root(root: &Path) -> Result<PathBuf>
{
    let raw = root.to_string_lossy();
    let expanded = shellexpand::tilde(&raw);
    let path = PathBuf::from(expanded.as_ref());
    let canonical =
        dunce::canonicalize(&path).with_context(|| format!("Source root not found: {}", path.display()))?;
    if !canonical.is_dir()
    {
        bail!("Source root is not a directory: {}", canonical.display());
    }
    Ok(canonical)
}

/// Source index over `root` configured from `cfg`.
pub fn build_index(
    root: PathBuf,
    cfg: &Config,
) -> Result<Arc<SourceIndex>>
{
    let index = SourceIndex::builder(root)
        .max_file_bytes(cfg.enrich.max_file_bytes)
        .ignore_patterns(&cfg.ignore_patterns)
        .extensions(&cfg.source_extensions)
        .build()
        .context("Failed to set up source index")?;
    Ok(Arc::new(index))
}

/// `FILE:LINE` location given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location
{
    pub file: PathBuf,
    pub line: usize,
}

impl Location
{
    /// Parse "src/a.cpp:42" or "C:\\src\\a.cpp:42".
    pub fn parse(input: &str) -> Result<Self>
    {
        let s = input.trim();

        // Split from the right once so drive letters survive
        let mut it = s.rsplitn(2, ':');
        let line_str = it
            .next()
            .context("missing line after ':'")?
            .trim();
        let path_str = it
            .next()
            .context("expected FILE:LINE")?
            .trim();

        if path_str.is_empty()
        {
            bail!("missing file path before ':'");
        }
        let line: usize = line_str
            .parse()
            .with_context(|| format!("invalid line number: {line_str}"))?;
        if line == 0
        {
            bail!("line numbers must be >= 1: {s}");
        }

        Ok(Self { file: PathBuf::from(path_str), line })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn paint_is_plain_under_no_color()
    {
        let plain = AppContext { quiet: false, no_color: true, dry_run: false };
        assert_eq!(paint(&plain, "✓", Style::new().green()), "✓");

        let colored = AppContext { no_color: false, ..plain };
        let out = paint(&colored, "✓", Style::new().green());
        assert!(out.contains('\u{1b}'));
        assert!(out.contains('✓'));
    }

    #[test]
    fn parses_unix_and_windows_locations()
    {
        let loc = Location::parse("src/a.cpp:42").unwrap();
        assert_eq!(loc, Location { file: "src/a.cpp".into(), line: 42 });

        let win = Location::parse(r"C:\src\a.cpp:7").unwrap();
        assert_eq!(win.file, PathBuf::from(r"C:\src\a.cpp"));
        assert_eq!(win.line, 7);
    }

    #[test]
    fn rejects_missing_or_zero_line()
    {
        assert!(Location::parse("a.cpp").is_err());
        assert!(Location::parse("a.cpp:0").is_err());
        assert!(Location::parse(":3").is_err());
        assert!(Location::parse("a.cpp:x").is_err());
    }

    #[test]
    fn resolve_root_rejects_missing_dirs()
    {
        let tmp = tempfile::tempdir().unwrap();
        assert!(resolve_root(tmp.path()).is_ok());
        assert!(
            resolve_root(
                &tmp.path()
                    .join("nope")
            )
            .is_err()
        );
    }
}
