//! Newline index with LF/CRLF-robust line/byte mapping.
//!
//! Built once per loaded source file and shared by every extractor that
//! needs line windows, so line→byte lookups stay O(1) for the run.
//!
//! Notes
//! - External line numbers are 1-based.
//! - An empty buffer has 0 lines; callers that need "at least one line"
//!   semantics (the source index) apply that policy on top.
//! - For ranges, end is exclusive (Rust slicing convention).
//! - Line ends exclude the trailing '\r' of CRLF lines.

#[derive(Debug, Clone)]
pub struct NewlineIndex {
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex {
    /// Build an index recording positions of '\n'.
    pub fn build(bytes: &[u8]) -> Self {
        let nl_positions: Vec<usize> = memchr::memchr_iter(b'\n', bytes).collect();

        Self {
            nl_positions,
            len: bytes.len(),
        }
    }

    /// Total number of logical lines.
    /// Empty buffer => 0 lines; else (#'\n' + 1).
    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.nl_positions.len() + 1
        }
    }

    /// Start byte (inclusive) of a 1-based line.
    pub fn start_byte_of_line(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }
        if line1 == 1 {
            return Some(0);
        }
        self.nl_positions
            .get(line1 - 2)
            .map(|&prev_nl| prev_nl + 1)
    }

    /// End byte (exclusive) of a 1-based line, excluding "\r\n" / "\n".
    pub fn end_byte_of_line(&self, line1: usize, bytes: &[u8]) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }

        match self.nl_positions.get(line1 - 1) {
            Some(&nl) if nl > 0 && bytes.get(nl - 1) == Some(&b'\r') => Some(nl - 1),
            Some(&nl) => Some(nl),
            // Last line without a trailing '\n' ends at EOF.
            None => Some(self.len),
        }
    }

    /// Byte range (start..end) for an inclusive 1-based line span.
    /// Returns None when the span is empty or out of range; no clamping.
    pub fn byte_range_for_lines(
        &self,
        start_line1: usize,
        end_line1: usize,
        bytes: &[u8],
    ) -> Option<(usize, usize)> {
        if start_line1 == 0 || start_line1 > end_line1 || end_line1 > self.line_count() {
            return None;
        }

        let s = self.start_byte_of_line(start_line1)?;
        let e = self.end_byte_of_line(end_line1, bytes)?;

        (s <= e && e <= self.len).then_some((s, e))
    }

    /// 1-based line number covering the given byte offset.
    /// Offsets at '\n' belong to the line the newline terminates.
    /// Returns 0 for empty buffers.
    pub fn line_of_byte(&self, byte: usize) -> usize {
        if self.len == 0 {
            return 0;
        }
        // Number of '\n' strictly before `byte`.
        let before = self.nl_positions.partition_point(|&nl| nl < byte);
        before + 1
    }

    /// Clamp a 1-based line into `[1, line_count]` (1 for empty buffers).
    pub fn clamp_line(&self, line1: usize) -> usize {
        line1.clamp(1, self.line_count().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_with_and_without_trailing_newline() {
        assert_eq!(NewlineIndex::build(b"").line_count(), 0);
        assert_eq!(NewlineIndex::build(b"a").line_count(), 1);
        assert_eq!(NewlineIndex::build(b"a\nb").line_count(), 2);
        assert_eq!(NewlineIndex::build(b"a\nb\n").line_count(), 3);
    }

    #[test]
    fn crlf_line_ends_exclude_carriage_return() {
        let text = b"ab\r\ncd\r\nef";
        let idx = NewlineIndex::build(text);
        let (s, e) = idx.byte_range_for_lines(1, 2, text).unwrap();
        assert_eq!(&text[s..e], b"ab\r\ncd");
        let (s, e) = idx.byte_range_for_lines(3, 3, text).unwrap();
        assert_eq!(&text[s..e], b"ef");
    }

    #[test]
    fn byte_to_line_mapping() {
        let text = b"one\ntwo\nthree";
        let idx = NewlineIndex::build(text);
        assert_eq!(idx.line_of_byte(0), 1);
        assert_eq!(idx.line_of_byte(3), 1); // the '\n' itself
        assert_eq!(idx.line_of_byte(4), 2);
        assert_eq!(idx.line_of_byte(12), 3);
    }

    #[test]
    fn out_of_range_spans_are_rejected() {
        let text = b"one\ntwo";
        let idx = NewlineIndex::build(text);
        assert!(idx.byte_range_for_lines(0, 1, text).is_none());
        assert!(idx.byte_range_for_lines(2, 1, text).is_none());
        assert!(idx.byte_range_for_lines(1, 3, text).is_none());
        assert_eq!(idx.clamp_line(99), 2);
        assert_eq!(idx.clamp_line(0), 1);
    }
}
