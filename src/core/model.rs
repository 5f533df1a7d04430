//! Records flowing through the enrichment engine.
//!
//! Everything here is immutable once built. Shared units (bug blocks and
//! anchor sets) are handed out as `Arc`s so issues resolving to the same
//! fingerprint or symbol hold the very same value.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// How much context to attach to each issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentLevel
{
    /// Line window only
    Snippet,
    /// Line window plus enclosing function/class block
    Block,
    /// Block plus cross-file callsite anchors
    Callsite,
}

/// A single static-analysis finding (read-only input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue
{
    pub id: String,
    #[serde(alias = "file_path")]
    pub file_path: PathBuf,
    /// 1-based line of the finding
    pub line: usize,
    /// Optional last line of a multi-line finding
    #[serde(default, alias = "end_line", skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
}

/// Fixed-radius line window around an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet
{
    #[serde(skip)]
    pub issue_id: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// What kind of region a bug block covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind
{
    Function,
    Class,
    /// A bare `{}` region with no recognizable signature
    Scope,
    /// Widened line window (no balanced region found)
    Window,
}

/// Enclosing-unit text for an issue, keyed by fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugBlock
{
    pub fingerprint: String,
    pub file_path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    /// Natural unit exceeded the line cap and lost its tail
    pub truncated: bool,
    /// No balanced region was found; text is a widened window
    pub unstructured: bool,
    pub kind: BlockKind,
    /// Name of the enclosing function/class when one was recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Line of the unit's signature (seed for callsite traversal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_line: Option<usize>,
    pub token_estimate: usize,
}

impl BugBlock
{
    /// Graph seed for callsite traversal, when the block names a unit.
    pub fn enclosing_symbol(&self) -> Option<Symbol>
    {
        let name = self
            .symbol
            .clone()?;
        Some(Symbol {
            name,
            definition_file: self
                .file_path
                .clone(),
            definition_line: self
                .symbol_line
                .unwrap_or(self.start_line),
        })
    }
}

/// A function/class discovered while scanning; graph node key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol
{
    pub name: String,
    pub definition_file: PathBuf,
    pub definition_line: usize,
}

/// Edge direction relative to the traversed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction
{
    /// The traversed symbol calls the anchor symbol
    Calls,
    /// The anchor symbol calls the traversed symbol
    CalledBy,
}

/// Short line window attached to an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineWindow
{
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// One bounded-hop neighbor of an issue's enclosing symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsiteAnchor
{
    pub symbol_name: String,
    /// Callers: file of the call site. Callees: file of the definition.
    pub file: PathBuf,
    pub line: usize,
    pub direction: Direction,
    pub hop_distance: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LineWindow>,
    #[serde(flatten)]
    pub relevance: Relevance,
}

/// How closely an anchor's file relates to the file that defines the
/// traversed symbol. Informational; anchor ordering ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relevance
{
    #[serde(default)]
    pub same_dir: bool,
    /// First path component matches the defining file's
    #[serde(default)]
    pub same_top_module: bool,
    /// Include preamble names the header sharing the defining file's stem
    #[serde(default)]
    pub includes_bug_header: bool,
}

/// Why an issue was emitted with reduced context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind
{
    ReadError,
    NoEnclosingSymbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic
{
    pub kind: DiagnosticKind,
    pub reason: String,
}

/// Terminal output unit; one per input issue, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedIssue
{
    #[serde(flatten)]
    pub issue: Issue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<Snippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug_block: Option<Arc<BugBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Arc<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<Arc<Vec<CallsiteAnchor>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl EnrichedIssue
{
    /// True when extraction failed and only partial context is present.
    pub fn is_degraded(&self) -> bool
    {
        !self
            .diagnostics
            .is_empty()
    }
}
