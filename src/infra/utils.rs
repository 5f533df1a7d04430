//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

/// Marker appended to snippets cut at `max_snippet_chars`
pub const TRUNCATION_MARKER: &str = "\n/* ...TRUNCATED... */\n";

/// Identifier and keyword helpers for C-family sources
pub struct IdentUtils;

impl IdentUtils
{
    /// Byte may appear inside an identifier
    pub fn is_ident_byte(b: u8) -> bool
    {
        b == b'_' || b.is_ascii_alphanumeric()
    }

    /// Byte may start an identifier
    pub fn is_ident_start(b: u8) -> bool
    {
        b == b'_' || b.is_ascii_alphabetic()
    }

    /// Keywords that look like `name(` but never name a function
    pub fn is_call_like_keyword(word: &str) -> bool
    {
        matches!(
            word,
            "if" | "for"
                | "while"
                | "switch"
                | "catch"
                | "return"
                | "sizeof"
                | "alignof"
                | "decltype"
                | "typeid"
                | "static_assert"
                | "noexcept"
                | "throw"
                | "new"
                | "delete"
                | "else"
                | "do"
                | "case"
                | "defined"
                | "__attribute__"
                | "__declspec"
                | "requires"
                | "co_await"
                | "co_return"
                | "co_yield"
        )
    }

    /// Identifier ending right before byte offset `end` (skipping spaces)
    pub fn ident_before(
        bytes: &[u8],
        end: usize,
    ) -> Option<(usize, usize)>
    {
        let mut e = end;
        while e > 0 && bytes[e - 1].is_ascii_whitespace()
        {
            e -= 1;
        }
        let mut s = e;
        while s > 0 && Self::is_ident_byte(bytes[s - 1])
        {
            s -= 1;
        }
        (s < e && Self::is_ident_start(bytes[s])).then_some((s, e))
    }
}

/// Text shaping helpers for emitted windows
pub struct TextUtils;

impl TextUtils
{
    /// Rough token estimate (~3.5 bytes per token), at least 1 for non-empty text
    pub fn estimate_tokens(text: &str) -> usize
    {
        if text.is_empty()
        {
            return 0;
        }
        ((text.len() as f64 / 3.5) as usize).max(1)
    }

    /// Cap `text` at `max_chars` characters, appending the truncation marker
    pub fn truncate_chars(
        text: String,
        max_chars: usize,
    ) -> String
    {
        match text
            .char_indices()
            .nth(max_chars)
        {
            Some((cut, _)) =>
            {
                let mut out = text[..cut].to_string();
                out.push_str(TRUNCATION_MARKER);
                out
            }
            None => text,
        }
    }

    /// Replace TABs with four spaces
    pub fn normalize_tabs(text: String) -> String
    {
        if text.contains('\t')
        {
            text.replace('\t', "    ")
        }
        else
        {
            text
        }
    }
}
