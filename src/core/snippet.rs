//! Fixed-radius line windows.
//!
//! Pure functions of (file, line, radius): no caching, always in bounds.

use crate::core::model::{Issue, LineWindow, Snippet};
use crate::core::source_index::SourceFile;
use crate::infra::utils::TextUtils;

/// Inclusive `[start, end]` window of `radius` lines around `first..=last`,
/// clamped to the file.
pub fn window_bounds(
    file: &SourceFile,
    first: usize,
    last: usize,
    radius: usize,
) -> (usize, usize)
{
    let first = file.clamp_line(first);
    let last = file
        .clamp_line(last)
        .max(first);
    let start = first
        .saturating_sub(radius)
        .max(1);
    let end = last
        .saturating_add(radius)
        .min(file.line_count());
    (start, end)
}

/// Raw line window around a single line.
pub fn line_window(
    file: &SourceFile,
    line: usize,
    radius: usize,
) -> LineWindow
{
    let (start_line, end_line) = window_bounds(file, line, line, radius);
    LineWindow {
        start_line,
        end_line,
        text: file
            .line_range(start_line, end_line)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Snippet policy: radius plus text shaping.
#[derive(Debug, Clone, Copy)]
pub struct SnippetExtractor
{
    pub radius: usize,
    pub max_chars: usize,
    pub normalize_tabs: bool,
}

impl SnippetExtractor
{
    /// Window around the issue (or its `line..=endLine` span).
    pub fn extract(
        &self,
        file: &SourceFile,
        issue: &Issue,
    ) -> Snippet
    {
        let last = issue
            .end_line
            .unwrap_or(issue.line);
        let (start_line, end_line) = window_bounds(file, issue.line, last, self.radius);

        let mut text = file
            .line_range(start_line, end_line)
            .unwrap_or_default()
            .to_string();
        if self.normalize_tabs
        {
            text = TextUtils::normalize_tabs(text);
        }
        text = TextUtils::truncate_chars(text, self.max_chars);

        Snippet { issue_id: issue.id.clone(), start_line, end_line, text }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::infra::utils::TRUNCATION_MARKER;

    fn numbered(n: usize) -> SourceFile
    {
        let text: String = (1..=n)
            .map(|i| format!("line {i}\n"))
            .collect();
        SourceFile::from_text("n.cpp", text)
    }

    fn issue(
        line: usize,
        end_line: Option<usize>,
    ) -> Issue
    {
        Issue {
            id: "i".into(),
            file_path: "n.cpp".into(),
            line,
            end_line,
            rule: String::new(),
            severity: String::new(),
            message: String::new(),
        }
    }

    const EX: SnippetExtractor = SnippetExtractor { radius: 3, max_chars: 20_000, normalize_tabs: false };

    #[test]
    fn symmetric_window_inside_file()
    {
        let s = EX.extract(&numbered(50), &issue(20, None));
        assert_eq!((s.start_line, s.end_line), (17, 23));
        assert!(
            s.text
                .starts_with("line 17")
        );
        assert!(
            s.text
                .ends_with("line 23")
        );
    }

    #[test]
    fn clamps_at_both_ends()
    {
        let f = numbered(5);
        let s = EX.extract(&f, &issue(1, None));
        assert_eq!((s.start_line, s.end_line), (1, 4));
        let s = EX.extract(&f, &issue(99, None));
        assert_eq!(s.start_line, 3);
        assert_eq!(s.end_line, f.line_count());
    }

    #[test]
    fn multi_line_issue_widens_the_window()
    {
        let s = EX.extract(&numbered(50), &issue(20, Some(25)));
        assert_eq!((s.start_line, s.end_line), (17, 28));
    }

    #[test]
    fn long_text_is_capped_with_marker()
    {
        let ex = SnippetExtractor { max_chars: 10, ..EX };
        let s = ex.extract(&numbered(50), &issue(20, None));
        assert!(
            s.text
                .ends_with(TRUNCATION_MARKER)
        );
    }

    #[test]
    fn tabs_are_optionally_expanded()
    {
        let f = SourceFile::from_text("t.cpp", "\tx();\n");
        let ex = SnippetExtractor { normalize_tabs: true, ..EX };
        assert_eq!(ex.extract(&f, &issue(1, None)).text, "    x();\n");
    }
}
