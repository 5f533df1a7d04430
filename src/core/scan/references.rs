//! Token-level reference search over masked source bytes.
//!
//! Occurrences inside literals and comments never match because the search
//! runs on the mask. Matching is by bare name: `ns::f`, `a.f` and `f` all
//! count as `f`.

use itertools::Itertools;
use memchr::memmem;

use crate::core::scan::boundary::{body_open_after, match_parens, type_body_open};
use crate::core::scan::{CallToken, Reference};
use crate::core::source_index::SourceFile;
use crate::infra::utils::IdentUtils;

/// Word-boundary occurrences of `name`, at most one per line, in line order.
pub fn find_references(file: &SourceFile, name: &str, lookahead_lines: usize) -> Vec<Reference> {
    let masked = file.masked();
    let needle = name.as_bytes();
    let mut out: Vec<Reference> = Vec::new();

    if needle.is_empty() {
        return out;
    }

    for start in memmem::find_iter(masked, needle) {
        let end = start + needle.len();
        if !is_word(masked, start, end) {
            continue;
        }

        let line = file.line_of_byte(start);
        let limit = file.line_end((line + lookahead_lines).min(file.line_count()));
        let paren = next_non_space(masked, end).filter(|&p| masked[p] == b'(');

        let is_call = paren.is_some();
        let is_definition = match paren {
            Some(p) => match_parens(masked, p, limit)
                .and_then(|close| body_open_after(masked, close + 1, limit))
                .is_some(),
            None => after_type_keyword(masked, start) && type_body_open(masked, end, limit).is_some(),
        };

        // One record per line; flags accumulate
        match out.last_mut() {
            Some(prev) if prev.line == line => {
                prev.is_call |= is_call;
                prev.is_definition |= is_definition;
            }
            _ => out.push(Reference { line, is_definition, is_call }),
        }
    }

    out
}

/// Distinct call tokens (`ident(`) in the inclusive line range, first
/// occurrence order. Control keywords are skipped.
pub fn calls_within(file: &SourceFile, start_line: usize, end_line: usize) -> Vec<CallToken> {
    let masked = file.masked();
    let lo = file.line_start(start_line);
    let hi = file.line_end(end_line.min(file.line_count()));
    if lo >= hi {
        return Vec::new();
    }

    // First occurrence of each name wins
    memchr::memchr_iter(b'(', &masked[lo..hi])
        .filter_map(|rel| IdentUtils::ident_before(masked, lo + rel))
        .filter_map(|(s, e)| {
            let name = std::str::from_utf8(&masked[s..e]).ok()?;
            (!IdentUtils::is_call_like_keyword(name)).then(|| CallToken {
                name: name.to_string(),
                line: file.line_of_byte(s),
            })
        })
        .unique_by(|c| c.name.clone())
        .collect()
}

fn is_word(masked: &[u8], start: usize, end: usize) -> bool {
    let before_ok = start == 0 || !IdentUtils::is_ident_byte(masked[start - 1]);
    let after_ok = masked
        .get(end)
        .is_none_or(|&b| !IdentUtils::is_ident_byte(b));
    before_ok && after_ok
}

fn next_non_space(masked: &[u8], from: usize) -> Option<usize> {
    masked[from..]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|p| from + p)
}

/// `class Name`, `struct Name`, `union Name`.
fn after_type_keyword(masked: &[u8], start: usize) -> bool {
    let head = masked[..start].trim_ascii_end();
    [b"class".as_slice(), b"struct", b"union"].iter().any(|kw| {
        head.ends_with(kw)
            && (head.len() == kw.len() || !IdentUtils::is_ident_byte(head[head.len() - kw.len() - 1]))
    })
}
