use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::errors::ConfigError;
use crate::core::model::EnrichmentLevel;

/// Config file names probed in priority order (first hit wins)
const CONFIG_FILES: [&str; 4] = ["issuectx.toml", "issuectx.yaml", "issuectx.json", ".issuectx.toml"];

/// Upper bound for the callsite hop count
pub const MAX_CALLSITE_DEPTH: usize = 16;

/// Upper bound for the worker pool size
pub const MAX_WORKERS: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Extra ignore globs applied while walking the source tree (in addition to .gitignore)
    pub ignore_patterns: Vec<String>,

    /// File extensions indexed for cross-file reference scanning
    pub source_extensions: Vec<String>,

    /// Enrichment engine settings
    pub enrich: EnrichConfig,
}

/// Numeric/boolean knobs of the enrichment engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrichConfig
{
    /// Context escalation level
    pub level: EnrichmentLevel,

    /// Lines above/below the issue line in the snippet window
    pub snippet_radius: usize,

    /// Radius of the widened window used when no enclosing unit is found
    pub fallback_radius: usize,

    /// Bug blocks longer than this are truncated from the tail
    pub max_bug_block_lines: usize,

    /// Boundary scans give up after this many lines in either direction
    pub max_scan_lines: usize,

    /// Maximum hop count for callsite anchors
    pub callsite_max_depth: usize,

    /// Maximum number of anchors kept per issue
    pub callsite_max_anchors: usize,

    /// Lines of context attached around each anchor (0 disables)
    pub anchor_context_radius: usize,

    /// Files above this size are refused by the source index
    pub max_file_bytes: u64,

    /// Worker pool size; 0 means one per available core
    pub workers: usize,

    /// Snippet texts are capped to this many characters
    pub max_snippet_chars: usize,

    /// Replace TABs with four spaces in snippets
    pub normalize_tabs: bool,

    /// Ignore call sites found in header files
    pub skip_header_callsites: bool,

    /// Call sites under these directory names are ignored
    pub excluded_dirs: Vec<String>,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            ignore_patterns: vec![
                "build/".to_string(),
                "out/".to_string(),
                "obj/".to_string(),
                "bin/".to_string(),
                ".git/".to_string(),
                ".vs/".to_string(),
                "packages/".to_string(),
            ],
            source_extensions: ["c", "cc", "cpp", "cxx", "c++", "h", "hh", "hpp", "hxx", "inl", "ipp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            enrich: EnrichConfig::default(),
        }
    }
}

impl Default for EnrichConfig
{
    fn default() -> Self
    {
        Self {
            level: EnrichmentLevel::Block,
            snippet_radius: 3,
            fallback_radius: 10,
            max_bug_block_lines: 120,
            max_scan_lines: 2000,
            callsite_max_depth: 2,
            callsite_max_anchors: 20,
            anchor_context_radius: 3,
            max_file_bytes: 2 * 1024 * 1024,
            workers: 0,
            max_snippet_chars: 20_000,
            normalize_tabs: false,
            skip_header_callsites: true,
            excluded_dirs: ["test", "tests", "testing", "example", "examples", "demo", "demos", "tool", "tools"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EnrichConfig
{
    /// Reject settings that indicate a caller mistake.
    pub fn validate(&self) -> Result<(), ConfigError>
    {
        let nonzero = [
            ("max_bug_block_lines", self.max_bug_block_lines),
            ("max_scan_lines", self.max_scan_lines),
            ("max_snippet_chars", self.max_snippet_chars),
        ];
        for (field, value) in nonzero
        {
            if value == 0
            {
                return Err(ConfigError::Zero { field });
            }
        }

        // The line cap may still narrow the fallback window below this
        if self.fallback_radius < self.snippet_radius
        {
            return Err(ConfigError::Below {
                field: "fallback_radius",
                value: self.fallback_radius,
                floor_field: "snippet_radius",
                floor: self.snippet_radius,
            });
        }

        if self.max_file_bytes == 0
        {
            return Err(ConfigError::Zero { field: "max_file_bytes" });
        }

        if self.level == EnrichmentLevel::Callsite && self.callsite_max_anchors == 0
        {
            return Err(ConfigError::Zero { field: "callsite_max_anchors" });
        }

        if self.callsite_max_depth > MAX_CALLSITE_DEPTH
        {
            return Err(ConfigError::TooLarge {
                field: "callsite_max_depth",
                value: self.callsite_max_depth,
                max: MAX_CALLSITE_DEPTH,
            });
        }

        if self.workers > MAX_WORKERS
        {
            return Err(ConfigError::TooLarge {
                field: "workers",
                value: self.workers,
                max: MAX_WORKERS,
            });
        }

        Ok(())
    }

    /// Effective worker count (resolves 0 to the available cores)
    pub fn resolved_workers(&self) -> usize
    {
        if self.workers > 0
        {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Load configuration from the current directory.
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load configuration from `dir`, overlaid with `ISSUECTX_*` env vars.
/// Nested keys use a double underscore: `ISSUECTX_ENRICH__SNIPPET_RADIUS=5`.
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
    {
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ISSUECTX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path: PathBuf = args
        .path
        .join("issuectx.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        print!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_validate()
    {
        assert!(
            EnrichConfig::default()
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn zero_block_lines_is_rejected()
    {
        let cfg = EnrichConfig { max_bug_block_lines: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::Zero { field: "max_bug_block_lines" }));
    }

    #[test]
    fn fallback_narrower_than_snippet_is_rejected()
    {
        let cfg = EnrichConfig { snippet_radius: 5, fallback_radius: 4, ..Default::default() };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Below { field: "fallback_radius", value: 4, floor_field: "snippet_radius", floor: 5 })
        );

        let equal = EnrichConfig { snippet_radius: 5, fallback_radius: 5, ..Default::default() };
        assert!(
            equal
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn excessive_depth_is_rejected()
    {
        let cfg = EnrichConfig { callsite_max_depth: 99, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::TooLarge { field: "callsite_max_depth", .. })));
    }

    #[test]
    fn zero_anchor_cap_only_matters_at_callsite_level()
    {
        let block = EnrichConfig { callsite_max_anchors: 0, ..Default::default() };
        assert!(
            block
                .validate()
                .is_ok()
        );

        let callsite = EnrichConfig { level: EnrichmentLevel::Callsite, ..block };
        assert!(
            callsite
                .validate()
                .is_err()
        );
    }

    #[test]
    fn default_config_roundtrips_through_toml()
    {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.enrich, EnrichConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults()
    {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path()
                .join("issuectx.toml"),
            "[enrich]\nsnippet_radius = 7\n",
        )
        .unwrap();

        let cfg = load_config_from(tmp.path()).unwrap();
        assert_eq!(cfg.enrich.snippet_radius, 7);
        assert_eq!(cfg.enrich.max_bug_block_lines, 120);
    }
}
