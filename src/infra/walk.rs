//! Gitignore-aware source tree walker.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs (early directory prune + late file filter)
//! - Optional extension allow-list (C/C++ sources and headers by default in config)
//! - Deterministic ordering so reference scans visit files in a stable order
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Gitignore-aware walker with extra ignore globs and an extension filter.
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Lowercase extensions to keep; empty keeps everything
    extensions: HashSet<String>,
}

impl FileWalker
{
    /// Build a walker with additional ignore patterns. Directory-style
    /// patterns (`build/`) are widened to match at any depth.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            for glob in expand_pattern(pattern)
            {
                builder.add(Glob::new(&glob)?);
            }
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            extensions: HashSet::new(),
        })
    }

    /// Keep only files whose extension (case-insensitive) is listed.
    pub fn with_extensions<S: AsRef<str>>(
        mut self,
        exts: &[S],
    ) -> Self
    {
        self.extensions = exts
            .iter()
            .map(|e| {
                e.as_ref()
                    .trim_start_matches('.')
                    .to_ascii_lowercase()
            })
            .collect();
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // Dotfiles are never sources
        b.hidden(true);
        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);
        b.follow_links(false);

        let extra = self
            .ignore_patterns
            .clone();
        let root_owned = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if !is_dir
            {
                return true;
            }
            let rel = ent
                .path()
                .strip_prefix(&root_owned)
                .unwrap_or(ent.path());
            !extra.is_match(rel)
        });

        b
    }

    fn extension_allowed(
        &self,
        path: &Path,
    ) -> bool
    {
        if self
            .extensions
            .is_empty()
        {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                self.extensions
                    .contains(&e.to_ascii_lowercase())
            })
    }

    /// Traverse files under `root`; returns a **sorted** list of absolute paths.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            .filter(|abs| self.extension_allowed(abs))
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .collect();

        out.sort();
        out
    }
}

/// `build/` → `build`, `build/**`, `**/build`, `**/build/**`; globs with a
/// `*` are used as written.
fn expand_pattern(pattern: &str) -> Vec<String>
{
    if pattern.contains('*')
    {
        return vec![pattern.to_string()];
    }
    let bare = pattern.trim_end_matches('/');
    vec![
        bare.to_string(),
        format!("{bare}/**"),
        format!("**/{bare}"),
        format!("**/{bare}/**"),
    ]
}
