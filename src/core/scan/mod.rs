//! Heuristic structure and reference scanning for C-family sources.
//!
//! The orchestrator and graph builder only talk to the two traits below, so
//! a parser-backed implementation can replace [`HeuristicScanner`] without
//! touching either of them.

pub mod boundary;
pub mod mask;
pub mod references;

use std::ops::RangeInclusive;

use crate::core::model::BlockKind;
use crate::core::source_index::SourceFile;

/// A balanced structural region around an issue line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpan
{
    pub start_line: usize,
    pub end_line: usize,
    pub kind: BlockKind,
    /// Function or class name; `None` for bare scopes and anonymous types
    pub name: Option<String>,
    /// Line holding the signature
    pub header_line: usize,
}

/// One occurrence of a symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference
{
    pub line: usize,
    pub is_definition: bool,
    /// Name is immediately followed by `(`
    pub is_call: bool,
}

/// An `ident(` token found inside a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallToken
{
    pub name: String,
    pub line: usize,
}

/// Finds the enclosing function/class/scope of a line.
pub trait StructureScanner: Send + Sync
{
    /// `None` means no balanced region encloses `line` within the scan window.
    fn find_enclosing_unit(
        &self,
        file: &SourceFile,
        line: usize,
    ) -> Option<UnitSpan>;

    /// Lines for which `span`, already found for one of them, is also the
    /// answer. Callers reuse it for these lines instead of scanning again.
    fn resolved_lines(
        &self,
        _file: &SourceFile,
        _span: &UnitSpan,
    ) -> Option<RangeInclusive<usize>>
    {
        None
    }
}

/// Finds occurrences of symbol names.
pub trait ReferenceFinder: Send + Sync
{
    fn find_references(
        &self,
        file: &SourceFile,
        symbol_name: &str,
    ) -> Vec<Reference>;

    /// Names called from inside the inclusive line range.
    fn calls_within(
        &self,
        file: &SourceFile,
        start_line: usize,
        end_line: usize,
    ) -> Vec<CallToken>;
}

/// Brace/paren heuristics over literal- and comment-masked bytes.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicScanner
{
    max_scan_lines: usize,
}

impl HeuristicScanner
{
    pub fn new(max_scan_lines: usize) -> Self
    {
        Self { max_scan_lines: max_scan_lines.max(1) }
    }
}

impl Default for HeuristicScanner
{
    fn default() -> Self
    {
        Self::new(2000)
    }
}

impl StructureScanner for HeuristicScanner
{
    fn find_enclosing_unit(
        &self,
        file: &SourceFile,
        line: usize,
    ) -> Option<UnitSpan>
    {
        boundary::find_enclosing_unit(file, line, self.max_scan_lines)
    }

    fn resolved_lines(
        &self,
        file: &SourceFile,
        span: &UnitSpan,
    ) -> Option<RangeInclusive<usize>>
    {
        boundary::resolved_lines(file, span, self.max_scan_lines)
    }
}

impl ReferenceFinder for HeuristicScanner
{
    fn find_references(
        &self,
        file: &SourceFile,
        symbol_name: &str,
    ) -> Vec<Reference>
    {
        references::find_references(file, symbol_name, self.max_scan_lines)
    }

    fn calls_within(
        &self,
        file: &SourceFile,
        start_line: usize,
        end_line: usize,
    ) -> Vec<CallToken>
    {
        references::calls_within(file, start_line, end_line)
    }
}

/// Leading run of blank lines, comments and `#include` directives, without
/// trailing blank lines.
pub fn include_preamble(file: &SourceFile) -> Vec<String>
{
    let mut out: Vec<String> = Vec::new();
    let mut in_block_comment = false;

    for line in file
        .text()
        .lines()
    {
        let trimmed = line.trim_start();
        let keep = if in_block_comment
        {
            true
        }
        else
        {
            trimmed.is_empty()
                || trimmed.starts_with("//")
                || trimmed.starts_with("/*")
                || trimmed.starts_with("#include")
        };
        if !keep
        {
            break;
        }

        if trimmed.starts_with("/*") || in_block_comment
        {
            in_block_comment = !line.contains("*/");
        }
        out.push(line.to_string());
    }

    while out
        .last()
        .is_some_and(|l| {
            l.trim()
                .is_empty()
        })
    {
        out.pop();
    }
    out
}
