//! Shared test utilities for integration tests
//!
//! Fixture trees and issue builders used across the test files.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use assert_fs::prelude::*;
use issuectx::core::source_index::SourceIndex;
use issuectx::{EnrichConfig, Enricher, Issue};

/// 50 lines of filler with `foo` spanning lines 10-30.
pub fn foo_source() -> String
{
    let mut lines: Vec<String> = (1..=50)
        .map(|i| format!("// filler {i}"))
        .collect();
    lines[9] = "int foo(int a)".to_string();
    lines[10] = "{".to_string();
    for l in &mut lines[11..29]
    {
        *l = "    a += 1;".to_string();
    }
    lines[29] = "}".to_string();
    lines.join("\n")
}

/// Write `files` (relative path, contents) into a fresh temp dir.
pub fn tree(files: &[(&str, &str)]) -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    for (rel, body) in files
    {
        tmp.child(rel)
            .write_str(body)
            .expect("write fixture");
    }
    tmp
}

/// Minimal issue at `file:line`.
pub fn issue(
    id: &str,
    file: &str,
    line: usize,
) -> Issue
{
    Issue {
        id: id.to_string(),
        file_path: PathBuf::from(file),
        line,
        end_line: None,
        rule: "cpp:S100".to_string(),
        severity: "MAJOR".to_string(),
        message: format!("finding {id}"),
    }
}

/// Source index over a fixture with the default C/C++ extensions.
pub fn index_for(tmp: &assert_fs::TempDir) -> Arc<SourceIndex>
{
    let exts: Vec<String> = ["c", "cpp", "h", "hpp"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Arc::new(
        SourceIndex::builder(tmp.path())
            .extensions(&exts)
            .build()
            .expect("index"),
    )
}

/// Enricher over a fixture with the given engine settings.
pub fn enricher(
    tmp: &assert_fs::TempDir,
    cfg: EnrichConfig,
) -> Enricher
{
    Enricher::new(cfg, index_for(tmp))
}
