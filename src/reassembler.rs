//! Line reassembly across arbitrary chunk boundaries.
//!
//! Serial delivery hands the pipeline byte chunks cut wherever the driver
//! felt like it: mid-line, mid-UTF-8 code point, several lines at once. The
//! reassembler turns that stream back into complete, trimmed text lines,
//! carrying the partial tail of the last delivery until its terminator shows
//! up.

use memchr::memchr;

/// Stateful chunk-to-line converter.
///
/// Single-writer by contract: callers must serialize `feed` invocations (the
/// connection manager confines them to its one reader thread). The pending
/// remainder is held as raw bytes, not text, so a multi-byte code point split
/// across deliveries decodes intact once the line completes; only genuinely
/// malformed sequences degrade to replacement characters.
#[derive(Debug, Default)]
pub struct LineReassembler {
    pending: Vec<u8>,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one delivery and return every line it completed, in order.
    ///
    /// Lines are trimmed of surrounding whitespace (including the `\r` of
    /// CRLF-terminated output); a line that trims to empty is dropped here and
    /// never reaches classification. A chunk ending exactly on `\n` leaves the
    /// remainder empty.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = memchr(b'\n', &self.pending[consumed..]) {
            let end = consumed + offset;
            let text = String::from_utf8_lossy(&self.pending[consumed..end]);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
            consumed = end + 1;
        }
        self.pending.drain(..consumed);

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_single_complete_line() {
        let mut r = LineReassembler::new();
        assert_eq!(r.feed(b"I (100) wifi: connected\n"), vec![
            "I (100) wifi: connected"
        ]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut r = LineReassembler::new();
        assert!(r.feed(b"E (100) boot: ok\nW (101) low b").len() == 1);
        assert_eq!(r.feed(b"attery\n"), vec!["W (101) low battery"]);
    }

    #[test]
    fn test_terminator_at_chunk_end_clears_remainder() {
        let mut r = LineReassembler::new();
        assert_eq!(r.feed(b"abc\n"), vec!["abc"]);
        // No stale remainder: the next partial line starts from scratch.
        assert_eq!(r.feed(b"x"), Vec::<String>::new());
        assert_eq!(r.feed(b"\n"), vec!["x"]);
    }

    #[test]
    fn test_crlf_and_whitespace_trimmed() {
        let mut r = LineReassembler::new();
        assert_eq!(r.feed(b"  I (1) spaced  \r\n"), vec!["I (1) spaced"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let mut r = LineReassembler::new();
        assert_eq!(r.feed(b"\n\r\n   \nreal\n"), vec!["real"]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut r = LineReassembler::new();
        assert_eq!(r.feed(b"a\nb\nc"), vec!["a", "b"]);
        assert_eq!(r.feed(b"\n"), vec!["c"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut r = LineReassembler::new();
        let bytes = "I (1) 温度 ok\n".as_bytes();
        // Cut inside the first multi-byte code point.
        assert_eq!(r.feed(&bytes[..8]), Vec::<String>::new());
        assert_eq!(r.feed(&bytes[8..]), vec!["I (1) 温度 ok"]);
    }

    #[test]
    fn test_malformed_bytes_degrade_to_replacement() {
        let mut r = LineReassembler::new();
        let lines = r.feed(b"bad \xff byte\nnext\n");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains('\u{FFFD}'));
        // Malformed input never aborts ingestion of subsequent lines.
        assert_eq!(lines[1], "next");
    }

    proptest! {
        /// Feeding a byte stream chunk-by-chunk yields the same lines as
        /// feeding it whole, for any chunk boundaries.
        #[test]
        fn chunking_is_boundary_invariant(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            cuts in proptest::collection::vec(0usize..256, 0..8),
        ) {
            let mut whole = LineReassembler::new();
            let expected = whole.feed(&data);

            let mut cuts: Vec<usize> = cuts.into_iter()
                .map(|c| c % (data.len() + 1))
                .collect();
            cuts.sort_unstable();

            let mut chunked = LineReassembler::new();
            let mut lines = Vec::new();
            let mut start = 0;
            for cut in cuts {
                lines.extend(chunked.feed(&data[start..cut.max(start)]));
                start = cut.max(start);
            }
            lines.extend(chunked.feed(&data[start..]));

            prop_assert_eq!(lines, expected);
        }
    }
}
