use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::model::EnrichmentLevel;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "ictx")]
#[command(about = "Enrich static-analysis issues with bounded, deduplicated source context")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); ICTX_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enrich a JSONL issue file with snippets, bug blocks and callsite anchors
    Enrich(EnrichArgs),

    /// Print the bug block enclosing FILE:LINE
    Block(BlockArgs),

    /// List references of a symbol, or its callsite anchors with --depth
    Refs(RefsArgs),

    /// Initialize an issuectx.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Context escalation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    /// Line window only
    Snippet,
    /// Snippet plus enclosing function/class block
    Block,
    /// Block plus cross-file callers/callees
    Callsite,
}

impl From<LevelArg> for EnrichmentLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Snippet => EnrichmentLevel::Snippet,
            LevelArg::Block => EnrichmentLevel::Block,
            LevelArg::Callsite => EnrichmentLevel::Callsite,
        }
    }
}

#[derive(Parser, Debug)]
pub struct EnrichArgs {
    /// Issues file (JSON Lines: normalized, raw scanner issues, or result pages)
    pub issues: PathBuf,

    /// Source tree the issue paths are relative to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Output file ("-" for stdout)
    #[arg(short, long, default_value = "enriched_issues.jsonl")]
    pub output: PathBuf,

    /// Context level (overrides config)
    #[arg(long, value_enum)]
    pub level: Option<LevelArg>,

    /// Snippet radius in lines
    #[arg(long)]
    pub radius: Option<usize>,

    /// Radius of the widened window used when no enclosing unit is found
    #[arg(long)]
    pub fallback_radius: Option<usize>,

    /// Maximum bug block height in lines
    #[arg(long)]
    pub max_block_lines: Option<usize>,

    /// Callsite hop limit
    #[arg(long)]
    pub depth: Option<usize>,

    /// Maximum anchors per issue
    #[arg(long)]
    pub max_anchors: Option<usize>,

    /// Lines of context around each anchor
    #[arg(long)]
    pub anchor_radius: Option<usize>,

    /// Refuse source files larger than this many bytes
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Worker threads (0 = available cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Abort the batch after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the run summary as JSON on stderr
    #[arg(long)]
    pub json_summary: bool,
}

#[derive(Parser, Debug)]
pub struct BlockArgs {
    /// Location as FILE:LINE (FILE relative to --root)
    #[arg(value_name = "FILE:LINE")]
    pub location: String,

    /// Source tree root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Maximum bug block height in lines
    #[arg(long)]
    pub max_block_lines: Option<usize>,

    /// Radius of the widened fallback window
    #[arg(long)]
    pub fallback_radius: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct RefsArgs {
    /// Function or class name
    pub symbol: String,

    /// Source tree root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Walk callers/callees up to this many hops from the definition
    #[arg(long)]
    pub depth: Option<usize>,

    /// Maximum anchors to print
    #[arg(long)]
    pub max_anchors: Option<usize>,

    /// Prefer the definition in this file when the name is defined more than once
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Print the discovered reference graph as Graphviz DOT
    #[arg(long, requires = "depth")]
    pub dot: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
