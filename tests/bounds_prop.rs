//! Property tests: snippet and bug-block windows stay inside the file and
//! under the configured caps for arbitrary brace soups.

use issuectx::Issue;
use issuectx::core::bug_block::BugBlockExtractor;
use issuectx::core::scan::HeuristicScanner;
use issuectx::core::snippet::SnippetExtractor;
use issuectx::core::source_index::SourceFile;
use proptest::prelude::*;

const LINE_KINDS: [&str; 10] = [
    "int f(int a)",
    "{",
    "}",
    "    x += 1;",
    "// { comment",
    "    s = \"}{\";",
    "class W {",
    "};",
    "",
    "    if (x) { y(); }",
];

fn source() -> impl Strategy<Value = String>
{
    prop::collection::vec(prop::sample::select(LINE_KINDS.to_vec()), 0..80).prop_map(|lines| lines.join("\n"))
}

fn issue_at(
    line: usize,
    end_line: Option<usize>,
) -> Issue
{
    Issue {
        id: "p".into(),
        file_path: "p.cpp".into(),
        line,
        end_line,
        rule: String::new(),
        severity: String::new(),
        message: String::new(),
    }
}

proptest! {
    #[test]
    fn snippet_stays_in_bounds(
        text in source(),
        line in 1usize..120,
        span in prop::option::of(0usize..10),
        radius in 0usize..20,
    ) {
        let file = SourceFile::from_text("p.cpp", text);
        let ex = SnippetExtractor { radius, max_chars: 100_000, normalize_tabs: false };
        let s = ex.extract(&file, &issue_at(line, span.map(|d| line + d)));

        prop_assert!(s.start_line >= 1);
        prop_assert!(s.start_line <= s.end_line);
        prop_assert!(s.end_line <= file.line_count());
        prop_assert!(s.end_line - s.start_line <= 2 * radius + span.unwrap_or(0));
    }

    #[test]
    fn bug_block_respects_cap_and_file(
        text in source(),
        line in 1usize..120,
        max_lines in 1usize..40,
        fallback_radius in 0usize..15,
    ) {
        let file = SourceFile::from_text("p.cpp", text);
        let ex = BugBlockExtractor { max_lines, fallback_radius, max_chars: 100_000, normalize_tabs: false };
        let b = ex.extract(&HeuristicScanner::default(), &file, file.clamp_line(line));

        prop_assert!(b.start_line >= 1);
        prop_assert!(b.start_line <= b.end_line);
        prop_assert!(b.end_line <= file.line_count());
        prop_assert!(b.end_line - b.start_line < max_lines);
        prop_assert!(!(b.truncated && b.unstructured));
        prop_assert_eq!(b.fingerprint.len(), 16);
    }
}
