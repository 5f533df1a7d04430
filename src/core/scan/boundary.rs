//! Enclosing-unit detection over masked source bytes.
//!
//! Walks backward from the issue line looking for a function or class
//! header, forward-matches the header's body braces, and takes the first
//! header whose region covers the issue line. Headers closer to the issue
//! are tried first, so the innermost unit wins. When no header encloses the
//! line, the smallest enclosing `{}` region is used instead.
//!
//! Every scan is bounded to `max_scan_lines` lines on either side of the
//! issue line.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::core::model::BlockKind;
use crate::core::scan::UnitSpan;
use crate::core::source_index::SourceFile;
use crate::infra::utils::IdentUtils;

static TYPE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(class|struct|union|enum)\b").expect("static pattern"));

/// Byte window `[lo, hi)` a scan may touch around `line`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScanWindow {
    pub lo: usize,
    pub hi: usize,
}

impl ScanWindow {
    pub(crate) fn around(file: &SourceFile, line: usize, max_scan_lines: usize) -> Self {
        let first = line.saturating_sub(max_scan_lines).max(1);
        let last = (line + max_scan_lines).min(file.line_count());
        Self { lo: file.line_start(first), hi: file.line_end(last) }
    }
}

/// Smallest structural unit around `line`, or `None` when nothing balanced
/// encloses it inside the scan window.
pub fn find_enclosing_unit(file: &SourceFile, line: usize, max_scan_lines: usize) -> Option<UnitSpan> {
    let line = file.clamp_line(line);
    let masked = file.masked();
    let window = ScanWindow::around(file, line, max_scan_lines);
    let first = line.saturating_sub(max_scan_lines).max(1);

    for header_line in (first..=line).rev() {
        let (lo, hi) = (file.line_start(header_line), file.line_end(header_line));
        let candidate = function_header(masked, lo, hi, window.hi)
            .map(|(name, open)| (BlockKind::Function, Some(name), open))
            .or_else(|| class_header(masked, lo, hi, window.hi).map(|(name, open)| (BlockKind::Class, name, open)));

        let Some((kind, name, open)) = candidate else {
            continue;
        };
        let Some(close) = match_forward(masked, open, window.hi) else {
            continue;
        };
        let end_line = file.line_of_byte(close);
        if header_line <= line && line <= end_line {
            return Some(UnitSpan { start_line: header_line, end_line, kind, name, header_line });
        }
    }

    enclosing_scope(file, masked, line, window)
}

/// Lines that resolve to `span` without another scan: a function or type
/// whose body holds no further header, limited to lines whose scan window
/// still reaches both ends of it.
pub fn resolved_lines(file: &SourceFile, span: &UnitSpan, max_scan_lines: usize) -> Option<RangeInclusive<usize>> {
    if span.kind == BlockKind::Scope || span.header_line != span.start_line {
        return None;
    }
    let masked = file.masked();
    let limit = file.line_end(span.end_line);
    let nested = (span.header_line + 1..=span.end_line).any(|l| {
        let (lo, hi) = (file.line_start(l), file.line_end(l));
        function_header(masked, lo, hi, limit).is_some() || class_header(masked, lo, hi, limit).is_some()
    });
    if nested {
        return None;
    }

    let first = span.start_line.max(span.end_line.saturating_sub(max_scan_lines));
    let last = span.end_line.min(span.header_line + max_scan_lines);
    (first <= last).then_some(first..=last)
}

/// Nearest unmatched `{` before the issue line whose match closes at or after it.
fn enclosing_scope(file: &SourceFile, masked: &[u8], line: usize, window: ScanWindow) -> Option<UnitSpan> {
    let target = file.line_start(line);
    let mut depth = 0usize;
    let mut open = None;

    for pos in (window.lo..target).rev() {
        match masked[pos] {
            b'}' => depth += 1,
            b'{' if depth == 0 => {
                open = Some(pos);
                break;
            }
            b'{' => depth -= 1,
            _ => {}
        }
    }

    let open = open?;
    let close = match_forward(masked, open, window.hi)?;
    let start_line = file.line_of_byte(open);
    let end_line = file.line_of_byte(close);

    (end_line >= line).then_some(UnitSpan {
        start_line,
        end_line,
        kind: BlockKind::Scope,
        name: None,
        header_line: start_line,
    })
}

/// `name(...)` on this line followed by a body brace: `(name, open_brace)`.
/// Every `(` is tried, so leading `__attribute__((...))` or `__declspec(...)`
/// specifiers do not hide the real signature.
pub(crate) fn function_header(masked: &[u8], lo: usize, hi: usize, limit: usize) -> Option<(String, usize)> {
    memchr::memchr_iter(b'(', &masked[lo..hi]).find_map(|rel| signature_at(masked, lo, lo + rel, limit))
}

fn signature_at(masked: &[u8], lo: usize, paren: usize, limit: usize) -> Option<(String, usize)> {
    let (s, e) = IdentUtils::ident_before(masked, paren)?;
    if s < lo {
        return None;
    }
    let name = std::str::from_utf8(&masked[s..e]).ok()?;
    if IdentUtils::is_call_like_keyword(name) || inside_expression(masked, lo, s) {
        return None;
    }

    let close = match_parens(masked, paren, limit)?;
    let open = body_open_after(masked, close + 1, limit)?;
    Some((name.to_string(), open))
}

/// `class|struct|union|enum [Name] ... {` on this line: `(name, open_brace)`.
fn class_header(masked: &[u8], lo: usize, hi: usize, limit: usize) -> Option<(Option<String>, usize)> {
    let line = &masked[lo..hi];
    TYPE_KEYWORD.find_iter(line).find_map(|kw| {
        // `template <class T>` and `f(struct X *)` are not type definitions
        let before = line[..kw.start()].iter().rev().find(|b| !b.is_ascii_whitespace());
        if matches!(before, Some(b'<' | b',' | b'(')) {
            return None;
        }

        let mut p = lo + kw.end();
        let mut name = next_ident(masked, &mut p, hi);
        if kw.as_bytes() == b"enum" && matches!(name.as_deref(), Some("class" | "struct")) {
            name = next_ident(masked, &mut p, hi);
        }

        type_body_open(masked, p, limit).map(|open| (name, open))
    })
}

/// Body `{` of a type definition whose name ends at `from`; `None` for
/// forward declarations and variable declarations.
pub(crate) fn type_body_open(masked: &[u8], from: usize, limit: usize) -> Option<usize> {
    let mut j = from;
    while j < limit {
        match masked[j] {
            b'{' => return Some(j),
            b';' | b'(' | b')' | b'}' | b'=' => return None,
            _ => j += 1,
        }
    }
    None
}

fn next_ident(masked: &[u8], p: &mut usize, hi: usize) -> Option<String> {
    while *p < hi && masked[*p].is_ascii_whitespace() {
        *p += 1;
    }
    let s = *p;
    if s >= hi || !IdentUtils::is_ident_start(masked[s]) {
        return None;
    }
    while *p < hi && IdentUtils::is_ident_byte(masked[*p]) {
        *p += 1;
    }
    std::str::from_utf8(&masked[s..*p]).ok().map(str::to_string)
}

/// The identifier sits inside an expression (`obj.name(`, `a, name(`,
/// `: member(` ...), so it cannot start a signature.
fn inside_expression(masked: &[u8], lo: usize, s: usize) -> bool {
    let head = masked[lo..s].trim_ascii_end();
    let Some((&last, rest)) = head.split_last() else {
        return false;
    };
    match last {
        b':' => rest.last() != Some(&b':'),
        b'>' => rest.last() == Some(&b'-'),
        b'.' | b',' | b'(' | b'=' | b'!' | b'+' | b'-' | b'|' | b'?' | b'[' | b'/' | b'%' | b'<' => true,
        _ => false,
    }
}

/// After a signature's closing paren: the body `{`, skipping qualifiers,
/// trailing return types and constructor initializer lists. `None` when a
/// `;` (declaration or call) or a stray closer comes first.
pub(crate) fn body_open_after(masked: &[u8], from: usize, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_init_list = false;
    let mut j = from;

    while j < limit {
        match masked[j] {
            b'(' => depth += 1,
            b')' if depth == 0 => return None,
            b')' => depth -= 1,
            b';' | b'}' if depth == 0 => return None,
            b':' if depth == 0 => {
                let scope_op = masked.get(j + 1) == Some(&b':') || (j > 0 && masked[j - 1] == b':');
                if scope_op {
                    j += 1;
                } else {
                    in_init_list = true;
                }
            }
            b'{' if depth == 0 => {
                // `member{value}` inside an initializer list
                let prev = masked[..j].iter().rev().find(|b| !b.is_ascii_whitespace());
                if in_init_list && prev.is_some_and(|&b| IdentUtils::is_ident_byte(b) || b == b'>') {
                    j = match_forward(masked, j, limit)?;
                } else {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// Matching `)` for the `(` at `open`.
pub(crate) fn match_parens(masked: &[u8], open: usize, limit: usize) -> Option<usize> {
    match_pair(masked, open, limit, b'(', b')')
}

/// Matching `}` for the `{` at `open`.
pub(crate) fn match_forward(masked: &[u8], open: usize, limit: usize) -> Option<usize> {
    match_pair(masked, open, limit, b'{', b'}')
}

fn match_pair(masked: &[u8], open: usize, limit: usize, lhs: u8, rhs: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (pos, &b) in masked.iter().enumerate().take(limit.min(masked.len())).skip(open) {
        if b == lhs {
            depth += 1;
        } else if b == rhs {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(pos);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(src: &str, line: usize) -> Option<UnitSpan> {
        find_enclosing_unit(&SourceFile::from_text("t.cpp", src), line, 2000)
    }

    const SAMPLE: &str = "\
#include <vector>

int helper(int x)
{
    return x + 1;
}

class Widget : public Base {
public:
    void draw() const {
        if (ready) {
            paint();
        }
    }
};
";

    #[test]
    fn finds_function_with_brace_on_next_line() {
        let u = unit(SAMPLE, 5).unwrap();
        assert_eq!((u.start_line, u.end_line), (3, 6));
        assert_eq!(u.kind, BlockKind::Function);
        assert_eq!(u.name.as_deref(), Some("helper"));
    }

    #[test]
    fn innermost_unit_wins_over_enclosing_class() {
        let u = unit(SAMPLE, 12).unwrap();
        assert_eq!((u.start_line, u.end_line), (10, 14));
        assert_eq!(u.name.as_deref(), Some("draw"));

        let c = unit(SAMPLE, 9).unwrap();
        assert_eq!(c.kind, BlockKind::Class);
        assert_eq!(c.name.as_deref(), Some("Widget"));
        assert_eq!((c.start_line, c.end_line), (8, 15));
    }

    #[test]
    fn qualified_names_are_stripped() {
        let src = "void Foo::Bar::run(int *p)\n{\n    go(p);\n}\n";
        let u = unit(src, 3).unwrap();
        assert_eq!(u.name.as_deref(), Some("run"));
    }

    #[test]
    fn global_scope_outside_any_braces_is_not_found() {
        assert!(unit(SAMPLE, 1).is_none());
        assert!(unit(SAMPLE, 7).is_none());
    }

    #[test]
    fn bare_scope_is_used_when_no_header_encloses() {
        let src = "namespace app {\nint counter = 0;\n}\n";
        let u = unit(src, 2).unwrap();
        assert_eq!(u.kind, BlockKind::Scope);
        assert_eq!((u.start_line, u.end_line), (1, 3));
        assert!(u.name.is_none());
    }

    #[test]
    fn braces_in_literals_do_not_shift_boundaries() {
        let noisy = "int f()\n{\n    s = \"{\";\n    /* { */\n    c = '}';\n    x();\n}\n";
        let clean = "int f()\n{\n    s = \"\";\n    /*   */\n    c = ' ';\n    x();\n}\n";
        let a = unit(noisy, 6).unwrap();
        let b = unit(clean, 6).unwrap();
        assert_eq!((a.start_line, a.end_line), (b.start_line, b.end_line));
        assert_eq!((a.start_line, a.end_line), (1, 7));
    }

    #[test]
    fn unbalanced_body_is_not_found() {
        assert!(unit("void f() {\n  x();\n", 2).is_none());
    }

    #[test]
    fn scan_window_bounds_the_search() {
        let mut src = String::from("void f() {\n");
        for _ in 0..50 {
            src.push_str("  x();\n");
        }
        src.push_str("}\n");
        let file = SourceFile::from_text("w.cpp", src);
        assert!(find_enclosing_unit(&file, 30, 5).is_none());
        assert_eq!(find_enclosing_unit(&file, 30, 100).map(|u| u.start_line), Some(1));
    }

    #[test]
    fn initializer_lists_do_not_end_the_signature() {
        let src = "Foo::Foo(int a)\n    : a_{a}, b_(2)\n{\n    init();\n}\n";
        let u = unit(src, 4).unwrap();
        assert_eq!(u.name.as_deref(), Some("Foo"));
        assert_eq!((u.start_line, u.end_line), (1, 5));
    }

    #[test]
    fn declarations_and_calls_are_not_headers() {
        let src = "int g(int);\nvoid h() {\n    g(1);\n}\n";
        let u = unit(src, 3).unwrap();
        assert_eq!(u.name.as_deref(), Some("h"));
    }

    #[test]
    fn attribute_specifiers_do_not_hide_the_signature() {
        let src = "static int x;\n__attribute__((noinline)) int work(int a)\n{\n    return a;\n}\n";
        let u = unit(src, 4).unwrap();
        assert_eq!(u.kind, BlockKind::Function);
        assert_eq!(u.name.as_deref(), Some("work"));
        assert_eq!((u.start_line, u.end_line), (2, 5));

        let msvc = "__declspec(dllexport) void f()\n{\n    g();\n}\n";
        assert_eq!(unit(msvc, 3).and_then(|u| u.name), Some("f".to_string()));
    }

    #[test]
    fn template_parameter_keywords_are_skipped() {
        let src = "#include <x>\ntemplate <class T> class Box {\n    T value;\n};\n";
        let u = unit(src, 3).unwrap();
        assert_eq!(u.kind, BlockKind::Class);
        assert_eq!(u.name.as_deref(), Some("Box"));
        assert_eq!((u.start_line, u.end_line), (2, 4));
    }

    #[test]
    fn flat_function_resolves_every_body_line() {
        let file = SourceFile::from_text("r.cpp", SAMPLE);
        let helper = find_enclosing_unit(&file, 5, 2000).unwrap();
        assert_eq!(resolved_lines(&file, &helper, 2000), Some(3..=6));
        for line in 3..=6 {
            assert_eq!(find_enclosing_unit(&file, line, 2000).as_ref(), Some(&helper));
        }

        // The class holds a method, so its lines need their own scan
        let widget = find_enclosing_unit(&file, 9, 2000).unwrap();
        assert_eq!(resolved_lines(&file, &widget, 2000), None);
    }

    #[test]
    fn resolved_lines_respect_the_scan_window() {
        let mut src = String::from("void f() {\n");
        for _ in 0..20 {
            src.push_str("  x();\n");
        }
        src.push_str("}\n");
        let file = SourceFile::from_text("w.cpp", src);
        let span = find_enclosing_unit(&file, 12, 15).unwrap();
        assert_eq!((span.start_line, span.end_line), (1, 22));
        assert_eq!(resolved_lines(&file, &span, 15), Some(7..=16));
        assert!(find_enclosing_unit(&file, 6, 15).is_none());
        assert!(find_enclosing_unit(&file, 17, 15).is_none());
    }
}
