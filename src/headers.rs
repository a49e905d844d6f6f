use crate::util::{is_forbidden_value_octet, is_space_or_tab, is_token, trimmed, FlagOperations};

/// Syntactic anomalies found while splitting a header or trailer block
/// into lines. The framer maps these to warnings or fatal errors
/// depending on whether the block is a header or a trailer and on the
/// active validation policy.
#[derive(Debug, PartialEq, Eq)]
pub struct Flags;

impl Flags {
    pub const MISSING_COLON: u64 = 0x0001;
    pub const NAME_EMPTY: u64 = 0x0002;
    pub const NAME_NON_TOKEN_CHARS: u64 = 0x0004;
    pub const FOLDING: u64 = 0x0008;
    pub const VALUE_EMPTY: u64 = 0x0010;
    pub const FORBIDDEN_VALUE_CHARS: u64 = 0x0020;
}

/// An index-based region of a storage buffer. Spans stay valid for as
/// long as the buffer they index into only grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolves the span against the buffer it was recorded in.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.start + self.len]
    }

    pub(crate) fn offset(self, base: usize) -> Span {
        Span::new(self.start + base, self.len)
    }
}

/// One parsed header or trailer line: name and value spans plus the
/// anomaly flags collected while parsing. Spans are immutable once the
/// line has been emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: Span,
    pub value: Span,
    pub flags: u64,
}

/// The result of splitting a block region into logical lines.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ParsedBlock {
    pub lines: Vec<HeaderLine>,
    /// The very first line of the block began with whitespace, so there
    /// is no predecessor to fold it onto.
    pub begins_with_fold: bool,
}

/// Splits `block[start..end]` into logical header lines, honoring
/// obs-fold continuations, and parses each into name/value spans.
///
/// Every physical line in the region is expected to end with LF (the
/// caller hands over complete, terminator-delimited blocks). A CR
/// immediately before the LF is absorbed. Spans are relative to
/// `block`; folded values keep their embedded CR/LF bytes, which is
/// what keeps every value a single contiguous span.
pub(crate) fn parse_block_lines(block: &[u8], start: usize, end: usize) -> ParsedBlock {
    let mut logical: Vec<(usize, usize, u64)> = Vec::with_capacity(16);
    let mut begins_with_fold = false;
    let mut pos = start;
    while pos < end {
        let nl = match block[pos..end].iter().position(|&c| c == b'\n') {
            Some(i) => pos + i,
            None => end, // unterminated tail; tolerated for robustness
        };
        let mut content_end = nl;
        if content_end > pos && block[content_end - 1] == b'\r' {
            content_end -= 1;
        }
        if content_end > pos && is_space_or_tab(block[pos]) {
            match logical.last_mut() {
                Some(last) => {
                    last.1 = content_end;
                    last.2.set(Flags::FOLDING);
                }
                None => {
                    begins_with_fold = true;
                    logical.push((pos, content_end, Flags::FOLDING));
                }
            }
        } else if content_end > pos {
            logical.push((pos, content_end, 0));
        }
        pos = nl + 1;
    }
    let lines = logical
        .into_iter()
        .map(|(s, e, flags)| parse_line(block, s, e, flags))
        .collect();
    ParsedBlock {
        lines,
        begins_with_fold,
    }
}

/// Parses one logical line `block[start..end]` into a record.
fn parse_line(block: &[u8], start: usize, end: usize, mut flags: u64) -> HeaderLine {
    let line = &block[start..end];
    let colon = match line.iter().position(|&c| c == b':') {
        Some(i) => i,
        None => {
            flags.set(Flags::MISSING_COLON);
            return HeaderLine {
                name: Span::new(start, 0),
                value: Span::new(start, end - start),
                flags,
            };
        }
    };
    let name_raw = &line[..colon];
    if trimmed(name_raw).is_empty() {
        flags.set(Flags::NAME_EMPTY);
    } else if name_raw.iter().any(|&c| !is_token(c)) {
        flags.set(Flags::NAME_NON_TOKEN_CHARS);
    }
    let value_raw = &line[colon + 1..];
    let value = match value_raw.iter().position(|&c| !is_space_or_tab(c)) {
        Some(lead) => {
            let last = value_raw
                .iter()
                .rposition(|&c| !is_space_or_tab(c))
                .unwrap_or(lead);
            let value = &value_raw[lead..=last];
            if value.iter().any(|&c| is_forbidden_value_octet(c)) {
                flags.set(Flags::FORBIDDEN_VALUE_CHARS);
            }
            Span::new(start + colon + 1 + lead, last + 1 - lead)
        }
        None => {
            flags.set(Flags::VALUE_EMPTY);
            Span::new(end, 0)
        }
    };
    HeaderLine {
        name: Span::new(start, colon),
        value,
        flags,
    }
}

/// Caller-owned header storage: a monotonically growing byte buffer
/// plus the record table of lines parsed out of it. The framer only
/// appends; spans handed out through records stay valid until the
/// caller invokes [`BalsaHeaders::clear`].
///
/// First-line tokens are retained so consumers can re-inspect
/// method/target/version (requests) or version/status/reason
/// (responses) after parsing. The two views alias the same three token
/// slots.
#[derive(Clone, Debug, Default)]
pub struct BalsaHeaders {
    buf: Vec<u8>,
    lines: Vec<HeaderLine>,
    first_line: Span,
    tokens: [Span; 3],
    parsed_response_code: u32,
}

impl BalsaHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw bytes accumulated so far, including line terminators.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Resolves a span recorded in this storage.
    pub fn bytes(&self, span: Span) -> &[u8] {
        span.slice(&self.buf)
    }

    /// Appends a complete block and its parsed records, rebasing all
    /// spans onto this storage's buffer.
    pub(crate) fn commit_block(
        &mut self,
        block: &[u8],
        first_line: Span,
        tokens: [Span; 3],
        parsed_response_code: u32,
        lines: &[HeaderLine],
    ) {
        let base = self.buf.len();
        self.buf.extend_from_slice(block);
        self.first_line = first_line.offset(base);
        self.tokens = [
            tokens[0].offset(base),
            tokens[1].offset(base),
            tokens[2].offset(base),
        ];
        self.parsed_response_code = parsed_response_code;
        for line in lines {
            self.lines.push(HeaderLine {
                name: line.name.offset(base),
                value: line.value.offset(base),
                flags: line.flags,
            });
        }
    }

    /// The most recently committed start line, without its terminator.
    pub fn first_line(&self) -> &[u8] {
        self.bytes(self.first_line)
    }

    /// Request view: the method token.
    pub fn method(&self) -> &[u8] {
        self.bytes(self.tokens[0])
    }

    /// Request view: the request-target token.
    pub fn request_uri(&self) -> &[u8] {
        self.bytes(self.tokens[1])
    }

    /// Request view: the version token (empty for HTTP/0.9 requests).
    pub fn request_version(&self) -> &[u8] {
        self.bytes(self.tokens[2])
    }

    /// Response view: the version token.
    pub fn response_version(&self) -> &[u8] {
        self.bytes(self.tokens[0])
    }

    /// Response view: the status-code token.
    pub fn response_code(&self) -> &[u8] {
        self.bytes(self.tokens[1])
    }

    /// Response view: the reason phrase (may be empty).
    pub fn response_reason_phrase(&self) -> &[u8] {
        self.bytes(self.tokens[2])
    }

    /// The status code as an integer; 0 until a response line has been
    /// committed.
    pub fn parsed_response_code(&self) -> u32 {
        self.parsed_response_code
    }

    /// Looks up the first header with the given name, ignoring ASCII
    /// case, and returns its value.
    pub fn get<K: AsRef<[u8]>>(&self, name: K) -> Option<&[u8]> {
        let name = name.as_ref();
        self.lines
            .iter()
            .find(|line| self.bytes(line.name).eq_ignore_ascii_case(name))
            .map(|line| self.bytes(line.value))
    }

    /// Collects the values of every header with the given name, in
    /// insertion order.
    pub fn get_all<K: AsRef<[u8]>>(&self, name: K) -> Vec<&[u8]> {
        let name = name.as_ref();
        self.lines
            .iter()
            .filter(|line| self.bytes(line.name).eq_ignore_ascii_case(name))
            .map(|line| self.bytes(line.value))
            .collect()
    }

    /// Iterates over all recorded (name, value) pairs.
    pub fn lines(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.lines
            .iter()
            .map(move |line| (self.bytes(line.name), self.bytes(line.value)))
    }

    /// The raw records, for consumers that need the anomaly flags.
    pub fn records(&self) -> &[HeaderLine] {
        &self.lines
    }

    pub fn header_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Discards all bytes and records. Invalidates every span handed
    /// out so far; the framer never calls this on the caller's behalf.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.lines.clear();
        self.first_line = Span::default();
        self.tokens = [Span::default(); 3];
        self.parsed_response_code = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn line_at<'a>(block: &'a [u8], parsed: &ParsedBlock, i: usize) -> (&'a [u8], &'a [u8], u64) {
        let line = &parsed.lines[i];
        (line.name.slice(block), line.value.slice(block), line.flags)
    }

    #[rstest]
    #[case::simple(b"Key: value\r\n", b"Key", b"value", 0)]
    #[case::no_value_space(b"Key:value\r\n", b"Key", b"value", 0)]
    #[case::bare_lf(b"Key: value\n", b"Key", b"value", 0)]
    #[case::tab_ws(b"Key:\tvalue\t\r\n", b"Key", b"value", 0)]
    #[case::trailing_ws(b"Key: value   \r\n", b"Key", b"value", 0)]
    #[case::empty_value(b"Key:\r\n", b"Key", b"", Flags::VALUE_EMPTY)]
    #[case::empty_value_ws(b"Key:   \r\n", b"Key", b"", Flags::VALUE_EMPTY)]
    #[case::empty_name(b": value\r\n", b"", b"value", Flags::NAME_EMPTY)]
    #[case::space_in_name(b"Key Name: value\r\n", b"Key Name", b"value", Flags::NAME_NON_TOKEN_CHARS)]
    #[case::space_before_colon(b"Key : value\r\n", b"Key ", b"value", Flags::NAME_NON_TOKEN_CHARS)]
    #[case::tab_in_name(b"Key\tName: value\r\n", b"Key\tName", b"value", Flags::NAME_NON_TOKEN_CHARS)]
    #[case::paren_in_name(b"Key(1): value\r\n", b"Key(1)", b"value", Flags::NAME_NON_TOKEN_CHARS)]
    #[case::ctl_in_value(b"Key: va\x01lue\r\n", b"Key", b"va\x01lue", Flags::FORBIDDEN_VALUE_CHARS)]
    #[case::del_in_value(b"Key: va\x7flue\r\n", b"Key", b"va\x7flue", Flags::FORBIDDEN_VALUE_CHARS)]
    fn test_single_line(
        #[case] block: &[u8],
        #[case] name: &[u8],
        #[case] value: &[u8],
        #[case] flags: u64,
    ) {
        let parsed = parse_block_lines(block, 0, block.len());
        assert_eq!(parsed.lines.len(), 1);
        assert!(!parsed.begins_with_fold);
        assert_eq!(line_at(block, &parsed, 0), (name, value, flags));
    }

    #[test]
    fn test_missing_colon() {
        let block = b"this line has no colon\r\n";
        let parsed = parse_block_lines(block, 0, block.len());
        assert_eq!(parsed.lines.len(), 1);
        let (name, value, flags) = line_at(block, &parsed, 0);
        assert_eq!(name, b"");
        assert_eq!(value, b"this line has no colon");
        assert!(flags.is_set(Flags::MISSING_COLON));
    }

    #[test]
    fn test_folded_value_keeps_embedded_bytes() {
        let block = b"Key: one\r\n two\r\n\tthree\r\nNext: x\r\n";
        let parsed = parse_block_lines(block, 0, block.len());
        assert_eq!(parsed.lines.len(), 2);
        let (name, value, flags) = line_at(block, &parsed, 0);
        assert_eq!(name, b"Key");
        assert_eq!(value, b"one\r\n two\r\n\tthree");
        assert!(flags.is_set(Flags::FOLDING));
        let (name, value, flags) = line_at(block, &parsed, 1);
        assert_eq!(name, b"Next");
        assert_eq!(value, b"x");
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_fold_with_no_predecessor() {
        let block = b" leading fold\r\nKey: v\r\n";
        let parsed = parse_block_lines(block, 0, block.len());
        assert!(parsed.begins_with_fold);
        assert_eq!(parsed.lines.len(), 2);
    }

    #[test]
    fn test_region_bounds_respected() {
        let block = b"GET / HTTP/1.1\r\nKey: v\r\n\r\n";
        // Region excludes the start line and the final blank line.
        let parsed = parse_block_lines(block, 16, block.len() - 2);
        assert_eq!(parsed.lines.len(), 1);
        assert_eq!(line_at(block, &parsed, 0).0, b"Key");
    }

    #[test]
    fn test_commit_and_lookup() {
        let block = b"GET /path HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n";
        let parsed = parse_block_lines(block, 20, block.len() - 2);
        let mut headers = BalsaHeaders::new();
        headers.commit_block(
            block,
            Span::new(0, 18),
            [Span::new(0, 3), Span::new(4, 5), Span::new(10, 8)],
            0,
            &parsed.lines,
        );
        assert_eq!(headers.first_line(), b"GET /path HTTP/1.1");
        assert_eq!(headers.method(), b"GET");
        assert_eq!(headers.request_uri(), b"/path");
        assert_eq!(headers.request_version(), b"HTTP/1.1");
        assert_eq!(headers.get("host"), Some(&b"example.com"[..]));
        assert_eq!(headers.get("HOST"), Some(&b"example.com"[..]));
        assert_eq!(headers.get("missing"), None);
        assert_eq!(headers.header_count(), 2);
        let all: Vec<_> = headers.lines().collect();
        assert_eq!(all[1], (&b"Accept"[..], &b"*/*"[..]));
    }

    #[test]
    fn test_first_match_wins_and_spans_survive_growth() {
        let mut headers = BalsaHeaders::new();
        let block1 = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\n\r\n";
        let parsed1 = parse_block_lines(block1, 17, block1.len() - 2);
        headers.commit_block(
            block1,
            Span::new(0, 15),
            [Span::new(0, 8), Span::new(9, 3), Span::new(13, 2)],
            200,
            &parsed1.lines,
        );
        let first = headers.get("set-cookie").map(<[u8]>::to_vec);
        // A second commit only appends; earlier records must not move.
        let block2 = b"HTTP/1.1 200 OK\r\nSet-Cookie: b=2\r\n\r\n";
        let parsed2 = parse_block_lines(block2, 17, block2.len() - 2);
        headers.commit_block(
            block2,
            Span::new(0, 15),
            [Span::new(0, 8), Span::new(9, 3), Span::new(13, 2)],
            200,
            &parsed2.lines,
        );
        assert_eq!(headers.get("set-cookie").map(<[u8]>::to_vec), first);
        assert_eq!(
            headers.get_all("set-cookie"),
            vec![&b"a=1"[..], &b"b=2"[..]]
        );
        assert_eq!(headers.parsed_response_code(), 200);
    }
}
