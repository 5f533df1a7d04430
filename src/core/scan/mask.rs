//! Literal/comment-aware code mask for C-family sources.
//!
//! `mask_code` returns a byte buffer of the same length as the input in
//! which every byte that is not code (comments, string and char literals,
//! raw strings, preprocessor directives) is replaced by a space. Newlines are
//! kept, so byte offsets and line numbers map 1:1 onto the original text and
//! the structural scanners never see a brace or identifier that lives inside
//! a literal or comment.

use memchr::memmem;

use crate::infra::utils::IdentUtils;

/// Prefixes allowed in front of a raw string quote (`R"(..)"`, `u8R"(..)"`, ...).
const RAW_PREFIXES: [&[u8]; 5] = [b"R", b"u8R", b"uR", b"UR", b"LR"];

/// Longest raw-string delimiter the language allows.
const MAX_RAW_DELIM: usize = 16;

pub fn mask_code(src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();
    let n = src.len();
    let mut i = 0;
    // Only whitespace seen since the last newline
    let mut at_line_start = true;

    while i < n {
        match src[i] {
            b'\n' => {
                at_line_start = true;
                i += 1;
            }
            b' ' | b'\t' | b'\r' | 0x0b | 0x0c => i += 1,
            b'#' if at_line_start => {
                let end = skip_directive(src, i);
                blank(&mut out, i, end);
                i = end;
            }
            b'/' if src.get(i + 1) == Some(&b'/') => {
                let end = line_end(src, i);
                blank(&mut out, i, end);
                i = end;
            }
            b'/' if src.get(i + 1) == Some(&b'*') => {
                let end = memmem::find(&src[i + 2..], b"*/").map_or(n, |p| i + 2 + p + 2);
                blank(&mut out, i, end);
                at_line_start = false;
                i = end;
            }
            b'"' => {
                let end = match raw_string_end(src, i) {
                    Some(end) => end,
                    None => quoted_end(src, i, b'"'),
                };
                blank(&mut out, i, end);
                at_line_start = false;
                i = end;
            }
            b'\'' if !is_digit_separator(src, i) => {
                let end = quoted_end(src, i, b'\'');
                blank(&mut out, i, end);
                at_line_start = false;
                i = end;
            }
            _ => {
                at_line_start = false;
                i += 1;
            }
        }
    }

    out
}

/// End of a preprocessor directive starting at `start`, following `\` continuations.
fn skip_directive(src: &[u8], start: usize) -> usize {
    let mut i = start;
    loop {
        let end = line_end(src, i);
        let mut e = end;
        if e > i && src[e - 1] == b'\r' {
            e -= 1;
        }
        if e > i && src[e - 1] == b'\\' && end < src.len() {
            i = end + 1;
            continue;
        }
        return end;
    }
}

/// Offset of the '\n' ending the line that holds `from` (or EOF).
fn line_end(src: &[u8], from: usize) -> usize {
    memchr::memchr(b'\n', &src[from..]).map_or(src.len(), |p| from + p)
}

/// End (exclusive) of a quoted literal opened at `open`. Unterminated
/// literals stop before the newline so the damage stays on one line.
fn quoted_end(src: &[u8], open: usize, quote: u8) -> usize {
    let mut j = open + 1;
    while j < src.len() {
        match src[j] {
            b'\\' if j + 1 < src.len() && src[j + 1] != b'\n' => j += 2,
            b'\n' => return j,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    src.len()
}

/// End of a raw string literal whose quote sits at `quote`, if it is one.
fn raw_string_end(src: &[u8], quote: usize) -> Option<usize> {
    let (s, e) = IdentUtils::ident_before(src, quote)?;
    if e != quote || !RAW_PREFIXES.contains(&&src[s..e]) {
        return None;
    }

    let rest = &src[quote + 1..];
    let paren = memchr::memchr(b'(', &rest[..rest.len().min(MAX_RAW_DELIM + 1)])?;
    let delim = &rest[..paren];
    if delim
        .iter()
        .any(|b| matches!(b, b' ' | b')' | b'\\' | b'\t' | b'\n' | b'"'))
    {
        return None;
    }

    let mut closing = Vec::with_capacity(delim.len() + 2);
    closing.push(b')');
    closing.extend_from_slice(delim);
    closing.push(b'"');

    let body = quote + 1 + paren + 1;
    Some(memmem::find(&src[body..], &closing).map_or(src.len(), |p| body + p + closing.len()))
}

/// `1'000'000` and `0xFF'FF`: a quote inside a numeric token.
fn is_digit_separator(src: &[u8], quote: usize) -> bool {
    let mut s = quote;
    while s > 0 && (IdentUtils::is_ident_byte(src[s - 1]) || src[s - 1] == b'\'') {
        s -= 1;
    }
    s < quote
        && src[s].is_ascii_digit()
        && src
            .get(quote + 1)
            .is_some_and(|b| b.is_ascii_alphanumeric())
}

fn blank(out: &mut [u8], start: usize, end: usize) {
    let len = out.len();
    for b in &mut out[start..end.min(len)] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masked(src: &str) -> String {
        String::from_utf8(mask_code(src.as_bytes())).unwrap()
    }

    #[test]
    fn keeps_length_and_newlines() {
        let src = "int a; // {\n/* {\n } */ int b;\n";
        let out = mask_code(src.as_bytes());
        assert_eq!(out.len(), src.len());
        assert_eq!(
            out.iter().filter(|&&b| b == b'\n').count(),
            src.matches('\n').count()
        );
    }

    #[test]
    fn braces_in_literals_and_comments_are_blanked() {
        let out = masked("f() { s = \"{\\\"}\"; c = '{'; /* { */ // }\n}");
        assert_eq!(out.matches('{').count(), 1);
        assert_eq!(out.matches('}').count(), 1);
        assert!(out.starts_with("f() {"));
    }

    #[test]
    fn raw_strings_are_blanked_to_their_delimiter() {
        let out = masked("x = R\"xy(a \" } )\" b)xy\"; y();");
        assert!(!out.contains('}'));
        assert!(out.contains("y();"));
    }

    #[test]
    fn preprocessor_lines_and_continuations_are_blanked() {
        let out = masked("#define M(x) { \\\n  x; }\nint f() {}\n");
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].trim().is_empty());
        assert!(lines[1].trim().is_empty());
        assert_eq!(lines[2], "int f() {}");
    }

    #[test]
    fn digit_separators_are_not_char_literals() {
        let out = masked("n = 1'000'000; f() { }");
        assert!(out.contains("f() { }"));
        assert!(out.contains("1'000'000"));
    }

    #[test]
    fn unterminated_string_stops_at_newline() {
        let out = masked("s = \"oops\nint g() {}\n");
        assert!(out.contains("int g() {}"));
    }

    #[test]
    fn hash_inside_code_is_not_a_directive() {
        let out = masked("a = b # c;\n");
        assert_eq!(out, "a = b # c;\n");
    }
}
