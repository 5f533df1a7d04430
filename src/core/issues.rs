//! Issue ingestion and enriched-record output (JSON Lines).
//!
//! Three input shapes are accepted, one JSON object per line:
//! - normalized records (`id`, `filePath`, `line`, ...)
//! - raw scanner issues (`key`, `component` = `project:path`, `textRange`)
//! - scanner result pages (`{"issues": [...], "components": [...]}`), where
//!   component keys resolve to paths through the page's component list

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::model::{EnrichedIssue, Issue};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextRange
{
    start_line: Option<usize>,
    end_line: Option<usize>,
}

/// Union of the normalized and raw scanner field names.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawIssue
{
    id: Option<String>,
    #[serde(alias = "issue_key")]
    key: Option<String>,
    #[serde(alias = "file_path")]
    file_path: Option<String>,
    path: Option<String>,
    component: Option<String>,
    line: Option<usize>,
    #[serde(alias = "start_line")]
    start_line: Option<usize>,
    #[serde(alias = "end_line")]
    end_line: Option<usize>,
    text_range: Option<TextRange>,
    #[serde(alias = "rule_key")]
    rule: Option<String>,
    severity: Option<String>,
    #[serde(alias = "rule_message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Component
{
    key: String,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page
{
    issues: Vec<RawIssue>,
    #[serde(default)]
    components: Vec<Component>,
}

impl RawIssue
{
    fn into_issue(
        self,
        components: &HashMap<String, String>,
    ) -> Option<Issue>
    {
        let path = self
            .file_path
            .or(self.path)
            .or_else(|| {
                let component = self
                    .component
                    .as_ref()?;
                components
                    .get(component)
                    .cloned()
                    .or_else(|| {
                        component
                            .split_once(':')
                            .map(|(_, p)| p.to_string())
                    })
            })
            .filter(|p| !p.is_empty())?;

        let range = self
            .text_range
            .unwrap_or_default();
        let line = range
            .start_line
            .or(self.start_line)
            .or(self.line)
            .filter(|&l| l > 0)?;
        let end_line = range
            .end_line
            .or(self.end_line)
            .filter(|&e| e > line);

        let id = self
            .id
            .or(self.key)
            .unwrap_or_else(|| format!("{path}:{line}"));

        Some(Issue {
            id,
            file_path: PathBuf::from(path),
            line,
            end_line,
            rule: self
                .rule
                .unwrap_or_default(),
            severity: self
                .severity
                .unwrap_or_default(),
            message: self
                .message
                .unwrap_or_default(),
        })
    }
}

/// Parse JSONL text into issues, skipping (and logging) unusable lines.
pub fn parse_issues(text: &str) -> Vec<Issue>
{
    let mut out = Vec::new();
    let no_components = HashMap::new();

    for (idx, raw) in text
        .lines()
        .enumerate()
    {
        let line_no = idx + 1;
        let raw = raw.trim();
        if raw.is_empty()
        {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(raw)
        {
            Ok(v) => v,
            Err(e) =>
            {
                warn!(line = line_no, error = %e, "skipping unparseable issue line");
                continue;
            }
        };

        if value
            .get("issues")
            .is_some_and(|v| v.is_array())
        {
            match serde_json::from_value::<Page>(value)
            {
                Ok(page) =>
                {
                    let components: HashMap<String, String> = page
                        .components
                        .into_iter()
                        .filter_map(|c| {
                            c.path
                                .map(|p| (c.key, p))
                        })
                        .collect();
                    let total = page
                        .issues
                        .len();
                    let before = out.len();
                    out.extend(
                        page.issues
                            .into_iter()
                            .filter_map(|i| i.into_issue(&components)),
                    );
                    let kept = out.len() - before;
                    if kept < total
                    {
                        warn!(line = line_no, skipped = total - kept, "page issues without path or line skipped");
                    }
                }
                Err(e) => warn!(line = line_no, error = %e, "skipping malformed issue page"),
            }
            continue;
        }

        match serde_json::from_value::<RawIssue>(value)
            .ok()
            .and_then(|i| i.into_issue(&no_components))
        {
            Some(issue) => out.push(issue),
            None => warn!(line = line_no, "skipping issue without path or line"),
        }
    }

    debug!(count = out.len(), "issues parsed");
    out
}

/// Read and parse an issues JSONL file.
pub fn read_issues(path: &Path) -> Result<Vec<Issue>>
{
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read issues file: {}", path.display()))?;
    Ok(parse_issues(&text))
}

/// Write one JSON object per record.
pub fn write_jsonl<W: Write>(
    mut writer: W,
    records: &[EnrichedIssue],
) -> Result<()>
{
    for record in records
    {
        serde_json::to_writer(&mut writer, record).context("Failed to serialize enriched issue")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
