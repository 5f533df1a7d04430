//! Bug block sizing and fingerprinting.
//!
//! Planning (boundary → bounded line range → fingerprint) is separate from
//! materializing the text, so the orchestrator can key its dedup cache on
//! the fingerprint before any text is copied.

use std::path::Path;

use xxhash_rust::xxh64::Xxh64;

use crate::core::model::{BlockKind, BugBlock};
use crate::core::scan::{StructureScanner, UnitSpan};
use crate::core::snippet::window_bounds;
use crate::core::source_index::SourceFile;
use crate::infra::utils::TextUtils;

const FINGERPRINT_SEED: u64 = 0x1c7c_0b10_c4e5_2d01;

/// Stable 16-hex-digit identity of an extracted region.
pub fn fingerprint(
    path: &Path,
    kind: BlockKind,
    start_line: usize,
    end_line: usize,
) -> String
{
    let mut hasher = Xxh64::new(FINGERPRINT_SEED);
    hasher.update(
        path.to_string_lossy()
            .as_bytes(),
    );
    hasher.update(&[0, kind_tag(kind)]);
    hasher.update(&(start_line as u64).to_le_bytes());
    hasher.update(&(end_line as u64).to_le_bytes());
    format!("{:016x}", hasher.digest())
}

fn kind_tag(kind: BlockKind) -> u8
{
    match kind
    {
        BlockKind::Function => b'f',
        BlockKind::Class => b'c',
        BlockKind::Scope => b's',
        BlockKind::Window => b'w',
    }
}

/// A sized region, ready to be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan
{
    pub fingerprint: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: BlockKind,
    pub truncated: bool,
    pub unstructured: bool,
    pub symbol: Option<String>,
    pub symbol_line: Option<usize>,
}

/// Size policy for bug blocks.
#[derive(Debug, Clone, Copy)]
pub struct BugBlockExtractor
{
    pub max_lines: usize,
    pub fallback_radius: usize,
    pub max_chars: usize,
    pub normalize_tabs: bool,
}

impl BugBlockExtractor
{
    /// Bound a boundary result. Oversized units keep their head (signature
    /// and lead-up) and lose the tail; a missing unit becomes a widened
    /// window no taller than `max_lines`.
    pub fn plan(
        &self,
        file: &SourceFile,
        line: usize,
        unit: Option<&UnitSpan>,
    ) -> BlockPlan
    {
        let max_lines = self
            .max_lines
            .max(1);

        let (start_line, end_line, kind, truncated, unstructured, symbol, symbol_line) = match unit
        {
            Some(u) =>
            {
                let natural = u.end_line - u.start_line + 1;
                let (end, truncated) = if natural > max_lines
                {
                    (u.start_line + max_lines - 1, true)
                }
                else
                {
                    (u.end_line, false)
                };
                (u.start_line, end, u.kind, truncated, false, u.name.clone(), Some(u.header_line))
            }
            None =>
            {
                let radius = self
                    .fallback_radius
                    .min((max_lines - 1) / 2);
                let (s, e) = window_bounds(file, line, line, radius);
                (s, e, BlockKind::Window, false, true, None, None)
            }
        };

        BlockPlan {
            fingerprint: fingerprint(file.path(), kind, start_line, end_line),
            start_line,
            end_line,
            kind,
            truncated,
            unstructured,
            symbol_line: symbol
                .as_ref()
                .and(symbol_line),
            symbol,
        }
    }

    /// Copy the planned text out of the file.
    pub fn materialize(
        &self,
        file: &SourceFile,
        plan: &BlockPlan,
    ) -> BugBlock
    {
        let mut text = file
            .line_range(plan.start_line, plan.end_line)
            .unwrap_or_default()
            .to_string();
        if self.normalize_tabs
        {
            text = TextUtils::normalize_tabs(text);
        }
        text = TextUtils::truncate_chars(text, self.max_chars);
        let token_estimate = TextUtils::estimate_tokens(&text).max(1);

        BugBlock {
            fingerprint: plan
                .fingerprint
                .clone(),
            file_path: file
                .path()
                .to_path_buf(),
            start_line: plan.start_line,
            end_line: plan.end_line,
            text,
            truncated: plan.truncated,
            unstructured: plan.unstructured,
            kind: plan.kind,
            symbol: plan
                .symbol
                .clone(),
            symbol_line: plan.symbol_line,
            token_estimate,
        }
    }

    /// Uncached scan + plan + materialize, for one-off lookups.
    pub fn extract(
        &self,
        scanner: &dyn StructureScanner,
        file: &SourceFile,
        line: usize,
    ) -> BugBlock
    {
        let unit = scanner.find_enclosing_unit(file, line);
        let plan = self.plan(file, line, unit.as_ref());
        self.materialize(file, &plan)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::scan::HeuristicScanner;

    /// 50 lines; `foo` spans lines 10-30.
    fn foo_file() -> SourceFile
    {
        let mut lines: Vec<String> = (1..=50)
            .map(|i| format!("// filler {i}"))
            .collect();
        lines[9] = "int foo(int a)".into();
        lines[10] = "{".into();
        for l in &mut lines[11..29]
        {
            *l = "    a += 1;".into();
        }
        lines[29] = "}".into();
        SourceFile::from_text("src/foo.cpp", lines.join("\n"))
    }

    fn extractor(max_lines: usize) -> BugBlockExtractor
    {
        BugBlockExtractor { max_lines, fallback_radius: 10, max_chars: 100_000, normalize_tabs: false }
    }

    #[test]
    fn whole_function_when_it_fits()
    {
        let b = extractor(120).extract(&HeuristicScanner::default(), &foo_file(), 20);
        assert_eq!((b.start_line, b.end_line), (10, 30));
        assert!(!b.truncated);
        assert!(!b.unstructured);
        assert_eq!(b.symbol.as_deref(), Some("foo"));
        assert_eq!(b.kind, BlockKind::Function);
        assert!(b.token_estimate >= 1);
    }

    #[test]
    fn oversized_function_keeps_its_head()
    {
        let b = extractor(10).extract(&HeuristicScanner::default(), &foo_file(), 20);
        assert_eq!((b.start_line, b.end_line), (10, 19));
        assert!(b.truncated);
        // The issue line falls outside the kept head
        assert!(b.end_line < 20);
    }

    #[test]
    fn fallback_window_is_unstructured_not_truncated()
    {
        let b = extractor(120).extract(&HeuristicScanner::default(), &foo_file(), 40);
        assert!(b.unstructured);
        assert!(!b.truncated);
        assert_eq!(b.kind, BlockKind::Window);
        assert_eq!((b.start_line, b.end_line), (30, 50));
        assert!(b.symbol.is_none());
    }

    #[test]
    fn fallback_window_respects_line_cap()
    {
        let b = extractor(5).extract(&HeuristicScanner::default(), &foo_file(), 40);
        assert_eq!((b.start_line, b.end_line), (38, 42));
    }

    #[test]
    fn fingerprint_is_stable_and_range_sensitive()
    {
        let p = Path::new("a/b.cpp");
        let a = fingerprint(p, BlockKind::Function, 10, 30);
        assert_eq!(a, fingerprint(p, BlockKind::Function, 10, 30));
        assert_eq!(a.len(), 16);
        assert_ne!(a, fingerprint(p, BlockKind::Function, 10, 29));
        assert_ne!(a, fingerprint(Path::new("a/c.cpp"), BlockKind::Function, 10, 30));
    }
}
