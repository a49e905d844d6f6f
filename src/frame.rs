use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bstr::ByteSlice;
use log::{debug, warn};

use crate::error::BalsaFrameError;
use crate::headers::{parse_block_lines, BalsaHeaders, Flags, HeaderLine, ParsedBlock, Span};
use crate::parsers::{
    parse_content_length, parse_request_line, parse_response_line, parse_transfer_encoding,
    ResponseLine, TransferCoding,
};
use crate::util::{is_forbidden_value_octet, FlagOperations};
use crate::visitor::BalsaVisitor;

/// Default bound on the header block, terminator included. Trailers
/// are held to the same bound.
pub const DEFAULT_MAX_HEADER_LENGTH: usize = 64 * 1024;

/// The framer's parse state. `MessageFullyRead` and `Error` are
/// terminal; `reset()` is the only way out of either.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseState {
    ReadingHeaderAndFirstline,
    ReadingChunkLength,
    ReadingChunkExtension,
    ReadingChunkData,
    ReadingChunkTerm,
    ReadingLastChunkTerm,
    ReadingTrailer,
    ReadingUntilClose,
    ReadingContent,
    MessageFullyRead,
    Error,
}

/// What to do about forbidden octets in header values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidCharsLevel {
    /// Accept them silently.
    Off,
    /// Warn once per message and count each offending octet.
    Warn,
    /// Stop the parse.
    Fatal,
}

/// Tunable strictness knobs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HttpValidationPolicy {
    /// Treat an unrecognized Transfer-Encoding as if the header were
    /// absent instead of failing.
    pub accept_unknown_te: bool,
    /// Fail POST/PUT requests that carry neither Content-Length nor
    /// chunked Transfer-Encoding.
    pub require_content_length: bool,
    /// Accept obs-fold continuation lines in header blocks. Trailers
    /// never accept them.
    pub allow_obs_fold_in_header: bool,
}

impl Default for HttpValidationPolicy {
    fn default() -> Self {
        Self {
            accept_unknown_te: false,
            require_content_length: false,
            allow_obs_fold_in_header: true,
        }
    }
}

type SharedHeaders = Rc<RefCell<BalsaHeaders>>;
type SharedVisitor = Rc<RefCell<dyn BalsaVisitor>>;

/// An incremental HTTP/1.x message framer.
///
/// Bytes are pushed in with [`BalsaFrame::process_input`]; structured
/// events come out through the attached [`BalsaVisitor`]. Parsed
/// header bytes and records land in caller-owned [`BalsaHeaders`]
/// storage attached through the `set_*_storage` methods; any storage
/// (and the visitor) may be absent, which suppresses the corresponding
/// events while the rest of the parse proceeds.
///
/// A framer handles exactly one message; after `message_done` the
/// caller calls [`BalsaFrame::reset`] to frame the next message on the
/// same connection.
pub struct BalsaFrame {
    state: ParseState,
    is_request: bool,
    request_was_head: bool,
    headers: Option<SharedHeaders>,
    trailer: Option<SharedHeaders>,
    continue_headers: Option<SharedHeaders>,
    visitor: Option<SharedVisitor>,
    policy: HttpValidationPolicy,
    invalid_chars_level: InvalidCharsLevel,
    invalid_chars: HashMap<u8, usize>,
    invalid_char_warned: bool,
    max_header_length: usize,
    buf: Vec<u8>,
    seen_first_nl: bool,
    last_error: BalsaFrameError,
    error_is_fatal: bool,
    content_length: Option<u64>,
    content_remaining: u64,
    transfer_encoding_is_chunked: bool,
    chunk_length_remaining: u64,
    chunk_seen_digit: bool,
    chunk_had_ws: bool,
    chunk_length_reported: bool,
    half_term: bool,
}

impl Default for BalsaFrame {
    fn default() -> Self {
        Self {
            state: ParseState::ReadingHeaderAndFirstline,
            is_request: true,
            request_was_head: false,
            headers: None,
            trailer: None,
            continue_headers: None,
            visitor: None,
            policy: HttpValidationPolicy::default(),
            invalid_chars_level: InvalidCharsLevel::Off,
            invalid_chars: HashMap::new(),
            invalid_char_warned: false,
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
            buf: Vec::new(),
            seen_first_nl: false,
            last_error: BalsaFrameError::BalsaNoError,
            error_is_fatal: false,
            content_length: None,
            content_remaining: 0,
            transfer_encoding_is_chunked: false,
            chunk_length_remaining: 0,
            chunk_seen_digit: false,
            chunk_had_ws: false,
            chunk_length_reported: false,
            half_term: false,
        }
    }
}

impl BalsaFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the framer to its initial state. The role, visitor,
    /// storage attachments, limits and policy are preserved; attached
    /// storages are left untouched (they belong to the caller).
    pub fn reset(&mut self) {
        self.state = ParseState::ReadingHeaderAndFirstline;
        self.buf.clear();
        self.seen_first_nl = false;
        self.last_error = BalsaFrameError::BalsaNoError;
        self.error_is_fatal = false;
        self.content_length = None;
        self.content_remaining = 0;
        self.transfer_encoding_is_chunked = false;
        self.chunk_length_remaining = 0;
        self.chunk_seen_digit = false;
        self.chunk_had_ws = false;
        self.chunk_length_reported = false;
        self.half_term = false;
        self.invalid_chars.clear();
        self.invalid_char_warned = false;
    }

    /// Selects the message role. Must be called before the first byte.
    pub fn set_is_request(&mut self, is_request: bool) {
        self.is_request = is_request;
    }

    /// Hints that a framed response answers a HEAD request and so
    /// carries no body regardless of its framing headers.
    pub fn set_request_was_head(&mut self, was_head: bool) {
        self.request_was_head = was_head;
    }

    pub fn set_headers_storage(&mut self, storage: Option<SharedHeaders>) {
        self.headers = storage;
    }

    pub fn set_trailer_storage(&mut self, storage: Option<SharedHeaders>) {
        self.trailer = storage;
    }

    pub fn set_continue_storage(&mut self, storage: Option<SharedHeaders>) {
        self.continue_headers = storage;
    }

    /// Attaches or detaches the event sink. Detaching mid-parse
    /// suppresses subsequent events; side tables (storage, error
    /// state, splice credit) keep updating.
    pub fn set_visitor(&mut self, visitor: Option<SharedVisitor>) {
        self.visitor = visitor;
    }

    /// Bounds header and trailer blocks, terminator included. May be
    /// lowered mid-block; the next consumed byte then trips the limit.
    pub fn set_max_header_length(&mut self, limit: usize) {
        self.max_header_length = limit;
    }

    pub fn set_invalid_chars_level(&mut self, level: InvalidCharsLevel) {
        self.invalid_chars_level = level;
        if level == InvalidCharsLevel::Off {
            self.invalid_chars.clear();
        }
    }

    pub fn set_http_validation_policy(&mut self, policy: HttpValidationPolicy) {
        self.policy = policy;
    }

    pub fn parse_state(&self) -> ParseState {
        self.state
    }

    /// The most recent error or warning code raised.
    pub fn error_code(&self) -> BalsaFrameError {
        self.last_error
    }

    pub fn is_error(&self) -> bool {
        self.error_is_fatal
    }

    pub fn message_fully_read(&self) -> bool {
        self.state == ParseState::MessageFullyRead
    }

    /// The Content-Length recorded for this message, if one was
    /// accepted. Recorded even when chunked framing wins.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn is_chunked(&self) -> bool {
        self.transfer_encoding_is_chunked
    }

    /// Frequency of forbidden value octets seen so far. Populated only
    /// at [`InvalidCharsLevel::Warn`].
    pub fn invalid_chars(&self) -> &HashMap<u8, usize> {
        &self.invalid_chars
    }

    pub fn invalid_char_count(&self) -> usize {
        self.invalid_chars.values().sum()
    }

    /// Signals that the peer closed the connection. A read-until-close
    /// body is complete at that point.
    pub fn connection_closed(&mut self) {
        if self.state == ParseState::ReadingUntilClose {
            self.finish_message();
        }
    }

    /// The number of body bytes the framer expects next, which the
    /// caller may transport out-of-band and report via
    /// [`BalsaFrame::bytes_spliced`].
    pub fn bytes_safe_to_splice(&self) -> u64 {
        match self.state {
            ParseState::ReadingChunkData => self.chunk_length_remaining,
            ParseState::ReadingContent => self.content_remaining,
            ParseState::ReadingUntilClose => u64::MAX,
            _ => 0,
        }
    }

    /// Deducts `count` body bytes delivered through a side channel.
    pub fn bytes_spliced(&mut self, count: u64) {
        match self.state {
            ParseState::ReadingChunkData => {
                if count > self.chunk_length_remaining {
                    self.fatal(BalsaFrameError::CalledBytesSplicedAndExceededSafeSpliceAmount);
                    return;
                }
                self.chunk_length_remaining -= count;
                if self.chunk_length_remaining == 0 {
                    self.half_term = false;
                    self.state = ParseState::ReadingChunkTerm;
                }
            }
            ParseState::ReadingContent => {
                if count > self.content_remaining {
                    self.fatal(BalsaFrameError::CalledBytesSplicedAndExceededSafeSpliceAmount);
                    return;
                }
                self.content_remaining -= count;
                if self.content_remaining == 0 {
                    self.finish_message();
                }
            }
            ParseState::ReadingUntilClose => {}
            _ => self.fatal(BalsaFrameError::CalledBytesSplicedWhenUnsafeToDoSo),
        }
    }

    /// Feeds bytes to the framer and returns how many were consumed.
    ///
    /// The return value never exceeds `input.len()`. Consumption stops
    /// at the end of a message (the caller must `reset()` before the
    /// next one) and at a fatal error; after a fatal error every call
    /// returns 0.
    pub fn process_input(&mut self, input: &[u8]) -> usize {
        if self.error_is_fatal {
            return 0;
        }
        let mut i = 0;
        while i < input.len() {
            match self.state {
                ParseState::ReadingHeaderAndFirstline => i = self.process_headers_phase(input, i),
                ParseState::ReadingChunkLength => i = self.process_chunk_length(input, i),
                ParseState::ReadingChunkExtension => i = self.process_chunk_extension(input, i),
                ParseState::ReadingChunkData => i = self.process_chunk_data(input, i),
                ParseState::ReadingChunkTerm => i = self.process_chunk_term(input, i),
                ParseState::ReadingLastChunkTerm => i = self.process_last_chunk_term(input, i),
                ParseState::ReadingTrailer => i = self.process_trailer_phase(input, i),
                ParseState::ReadingContent => i = self.process_content(input, i),
                ParseState::ReadingUntilClose => i = self.process_until_close(input, i),
                ParseState::MessageFullyRead | ParseState::Error => break,
            }
            if self.error_is_fatal || self.state == ParseState::MessageFullyRead {
                break;
            }
        }
        i
    }

    fn visit<F: FnOnce(&mut dyn BalsaVisitor)>(&self, f: F) {
        if let Some(visitor) = &self.visitor {
            f(&mut *visitor.borrow_mut());
        }
    }

    fn emit_raw(&self, input: &[u8], start: usize, end: usize) {
        if end > start {
            self.visit(|v| v.on_raw_body_input(&input[start..end]));
        }
    }

    fn fatal(&mut self, code: BalsaFrameError) {
        warn!("framing error: {}", code);
        self.last_error = code;
        self.error_is_fatal = true;
        self.state = ParseState::Error;
        self.visit(|v| v.handle_error(code));
    }

    fn warning(&mut self, code: BalsaFrameError) {
        warn!("framing anomaly: {}", code);
        self.last_error = code;
        self.visit(|v| v.handle_warning(code));
    }

    fn finish_message(&mut self) {
        debug!("message fully read");
        self.state = ParseState::MessageFullyRead;
        self.visit(|v| v.message_done());
    }

    // -- header and trailer accumulation ---------------------------------

    /// Matches the two accepted terminator shapes against the tail of
    /// the accumulated block: an empty line ending in LF whose
    /// predecessor line also ended in LF. Returns the length of the
    /// final blank line.
    fn terminator_matched(&self) -> Option<usize> {
        let b = &self.buf;
        let n = b.len();
        if n >= 2 && b[n - 1] == b'\n' && b[n - 2] == b'\n' {
            return Some(1);
        }
        if n >= 3 && b[n - 1] == b'\n' && b[n - 2] == b'\r' && b[n - 3] == b'\n' {
            return Some(2);
        }
        None
    }

    /// A trailer may also be terminated by an immediate blank line,
    /// in which case the whole block is the blank line.
    fn trailer_terminator_matched(&self) -> Option<usize> {
        if self.buf == b"\n" || self.buf == b"\r\n" {
            return Some(self.buf.len());
        }
        self.terminator_matched()
    }

    fn process_headers_phase(&mut self, input: &[u8], mut i: usize) -> usize {
        while i < input.len() {
            let c = input[i];
            if self.buf.is_empty() && (c == b'\r' || c == b'\n') {
                // Blank lines before the start line are discarded.
                i += 1;
                continue;
            }
            if self.buf.len() + 1 > self.max_header_length {
                i += 1;
                self.fatal(BalsaFrameError::HeadersTooLong);
                return i;
            }
            self.buf.push(c);
            i += 1;
            if let Some(blank_len) = self.terminator_matched() {
                self.process_header_block(blank_len);
                return i;
            }
            if c == b'\n' && !self.seen_first_nl {
                self.seen_first_nl = true;
                // An HTTP/0.9 request is its request line; there is no
                // header block to wait for.
                if self.is_request && self.request_line_is_http09() {
                    self.process_header_block(0);
                    return i;
                }
            }
        }
        i
    }

    fn request_line_is_http09(&self) -> bool {
        let mut end = self.buf.len() - 1;
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        match parse_request_line(&self.buf[..end]) {
            Ok(line) => line.version.is_empty(),
            Err(_) => false,
        }
    }

    fn process_trailer_phase(&mut self, input: &[u8], mut i: usize) -> usize {
        let start = i;
        while i < input.len() {
            let c = input[i];
            if self.buf.len() + 1 > self.max_header_length {
                i += 1;
                self.fatal(BalsaFrameError::TrailerTooLong);
                return i;
            }
            self.buf.push(c);
            i += 1;
            if let Some(blank_len) = self.trailer_terminator_matched() {
                self.emit_raw(input, start, i);
                self.process_trailer_block(blank_len);
                return i;
            }
        }
        self.emit_raw(input, start, i);
        i
    }

    // -- block processing -------------------------------------------------

    fn process_header_block(&mut self, blank_len: usize) {
        let block = std::mem::take(&mut self.buf);
        self.seen_first_nl = false;
        let lines_end = block.len() - blank_len;
        let first_nl = match block.iter().position(|&c| c == b'\n') {
            Some(i) => i,
            None => {
                self.fatal(BalsaFrameError::InternalLogicError);
                return;
            }
        };
        let mut fl_end = first_nl;
        if fl_end > 0 && block[fl_end - 1] == b'\r' {
            fl_end -= 1;
        }
        let first_line = &block[..fl_end];
        let lines_start = first_nl + 1;
        debug!("header block complete, first line {:?}", first_line.as_bstr());

        let (tokens, status) = if self.is_request {
            match parse_request_line(first_line) {
                Ok(line) => {
                    if let Some(code) = line.warning {
                        self.warning(code);
                    }
                    self.visit(|v| {
                        v.on_request_first_line(
                            first_line,
                            line.method.slice(first_line),
                            line.uri.slice(first_line),
                            line.version.slice(first_line),
                        )
                    });
                    ([line.method, line.uri, line.version], 0)
                }
                Err(code) => {
                    self.fatal(code);
                    return;
                }
            }
        } else {
            match parse_response_line(first_line) {
                Ok(line) => {
                    if line.status / 100 == 1 && self.continue_headers.is_some() {
                        self.process_continue_block(&block, lines_start, lines_end, fl_end, &line);
                        return;
                    }
                    if let Some(code) = line.warning {
                        self.warning(code);
                    }
                    self.visit(|v| {
                        v.on_response_first_line(
                            first_line,
                            line.version.slice(first_line),
                            line.code.slice(first_line),
                            line.reason.slice(first_line),
                        )
                    });
                    ([line.version, line.code, line.reason], line.status)
                }
                Err(code) => {
                    self.fatal(code);
                    return;
                }
            }
        };

        let parsed = parse_block_lines(&block, lines_start, lines_end);
        let good = match self.screen_lines(&block, &parsed, false) {
            Some(good) => good,
            None => return,
        };
        for line in &good {
            self.visit(|v| v.on_header(line.name.slice(&block), line.value.slice(&block)));
        }
        let method = tokens[0].slice(first_line);
        let method_may_have_body = self.is_request
            && (method.eq_ignore_ascii_case(b"POST") || method.eq_ignore_ascii_case(b"PUT"));
        if !self.resolve_body_semantics(&block, &good) {
            return;
        }
        self.visit(|v| v.on_header_input(&block));
        if let Some(store) = self.headers.clone() {
            store
                .borrow_mut()
                .commit_block(&block, Span::new(0, fl_end), tokens, status, &good);
            let store = store.borrow();
            self.visit(|v| v.process_headers(&store));
        }
        self.visit(|v| v.header_done());
        self.enter_body(status, method_may_have_body);
    }

    /// A 1xx prelude: committed to the continue storage, delivered
    /// through the interim events, and then the header machinery is
    /// rearmed for the final response on the same connection.
    fn process_continue_block(
        &mut self,
        block: &[u8],
        lines_start: usize,
        lines_end: usize,
        fl_end: usize,
        line: &ResponseLine,
    ) {
        let first_line = &block[..fl_end];
        let parsed = parse_block_lines(block, lines_start, lines_end);
        let good = match self.screen_lines(block, &parsed, false) {
            Some(good) => good,
            None => return,
        };
        if let Some(code) = line.warning {
            self.warning(code);
        }
        self.visit(|v| {
            v.on_response_first_line(
                first_line,
                line.version.slice(first_line),
                line.code.slice(first_line),
                line.reason.slice(first_line),
            )
        });
        let store = match self.continue_headers.clone() {
            Some(store) => store,
            None => {
                self.fatal(BalsaFrameError::InternalLogicError);
                return;
            }
        };
        store.borrow_mut().commit_block(
            block,
            Span::new(0, fl_end),
            [line.version, line.code, line.reason],
            line.status,
            &good,
        );
        {
            let store = store.borrow();
            self.visit(|v| v.on_interim_headers(&store));
            self.visit(|v| v.process_headers(&store));
        }
        self.visit(|v| v.continue_header_done());
        debug!("1xx prelude complete, awaiting final response");
    }

    fn process_trailer_block(&mut self, blank_len: usize) {
        let block = std::mem::take(&mut self.buf);
        let lines_end = block.len() - blank_len;
        let parsed = parse_block_lines(&block, 0, lines_end);
        let good = match self.screen_lines(&block, &parsed, true) {
            Some(good) => good,
            None => return,
        };
        for line in &good {
            self.visit(|v| v.on_header(line.name.slice(&block), line.value.slice(&block)));
        }
        self.visit(|v| v.on_trailer_input(&block));
        if let Some(store) = self.trailer.clone() {
            store
                .borrow_mut()
                .commit_block(&block, Span::new(0, 0), [Span::default(); 3], 0, &good);
            let store = store.borrow();
            self.visit(|v| v.process_trailers(&store));
        }
        self.finish_message();
    }

    /// Maps the syntactic anomaly flags collected by the line parser to
    /// warnings or fatal errors, under the header or trailer policy.
    /// Lines that survive screening are returned for emission.
    fn screen_lines(
        &mut self,
        block: &[u8],
        parsed: &ParsedBlock,
        is_trailer: bool,
    ) -> Option<Vec<HeaderLine>> {
        let name_char_error = if is_trailer {
            BalsaFrameError::InvalidTrailerNameCharacter
        } else {
            BalsaFrameError::InvalidHeaderNameCharacter
        };
        if parsed.begins_with_fold {
            self.fatal(name_char_error);
            return None;
        }
        let mut good = Vec::with_capacity(parsed.lines.len());
        for line in &parsed.lines {
            if line.flags.is_set(Flags::FOLDING)
                && (is_trailer || !self.policy.allow_obs_fold_in_header)
            {
                self.fatal(name_char_error);
                return None;
            }
            if line.flags.is_set(Flags::MISSING_COLON) {
                self.warning(if is_trailer {
                    BalsaFrameError::TrailerMissingColon
                } else {
                    BalsaFrameError::HeaderMissingColon
                });
                continue;
            }
            if line.flags.is_set(Flags::NAME_EMPTY) {
                self.fatal(if is_trailer {
                    BalsaFrameError::InvalidTrailerFormat
                } else {
                    BalsaFrameError::InvalidHeaderFormat
                });
                return None;
            }
            if line.flags.is_set(Flags::NAME_NON_TOKEN_CHARS) {
                self.fatal(name_char_error);
                return None;
            }
            if line.flags.is_set(Flags::FORBIDDEN_VALUE_CHARS)
                && !self.handle_forbidden_value(line.value.slice(block))
            {
                return None;
            }
            good.push(*line);
        }
        Some(good)
    }

    /// Returns false when the policy made the octets fatal.
    fn handle_forbidden_value(&mut self, value: &[u8]) -> bool {
        match self.invalid_chars_level {
            InvalidCharsLevel::Off => true,
            InvalidCharsLevel::Warn => {
                if !self.invalid_char_warned {
                    self.invalid_char_warned = true;
                    self.warning(BalsaFrameError::InvalidHeaderCharacter);
                }
                for &c in value {
                    if is_forbidden_value_octet(c) {
                        *self.invalid_chars.entry(c).or_insert(0) += 1;
                    }
                }
                true
            }
            InvalidCharsLevel::Fatal => {
                self.fatal(BalsaFrameError::InvalidHeaderCharacter);
                false
            }
        }
    }

    /// Computes the body framing from the screened header lines.
    /// Returns false when a fatal error was raised.
    fn resolve_body_semantics(&mut self, block: &[u8], lines: &[HeaderLine]) -> bool {
        let mut content_length: Option<u64> = None;
        let mut te_seen = false;
        let mut chunked = false;
        for line in lines {
            let name = line.name.slice(block);
            if name.eq_ignore_ascii_case(b"content-length") {
                let parsed = match parse_content_length(line.value.slice(block)) {
                    Ok(parsed) => parsed,
                    Err(code) => {
                        self.fatal(code);
                        return false;
                    }
                };
                match content_length {
                    None => content_length = Some(parsed),
                    Some(previous) if previous == parsed => {}
                    Some(_) => {
                        self.fatal(BalsaFrameError::MultipleContentLengthKeys);
                        return false;
                    }
                }
            } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
                if te_seen {
                    self.fatal(BalsaFrameError::MultipleTransferEncodingKeys);
                    return false;
                }
                te_seen = true;
                match parse_transfer_encoding(line.value.slice(block)) {
                    TransferCoding::Chunked => chunked = true,
                    TransferCoding::Identity => {}
                    TransferCoding::Unknown => {
                        if !self.policy.accept_unknown_te {
                            self.fatal(BalsaFrameError::UnknownTransferEncoding);
                            return false;
                        }
                    }
                }
            }
        }
        self.content_length = content_length;
        self.transfer_encoding_is_chunked = chunked;
        true
    }

    fn enter_body(&mut self, status: u32, method_may_have_body: bool) {
        let no_body_response = !self.is_request
            && (status / 100 == 1 || status == 204 || status == 304 || self.request_was_head);
        if no_body_response {
            self.finish_message();
            return;
        }
        if self.transfer_encoding_is_chunked {
            // Chunked framing wins over Content-Length.
            self.start_chunk();
            return;
        }
        if let Some(length) = self.content_length {
            if length == 0 {
                self.finish_message();
            } else {
                self.content_remaining = length;
                self.state = ParseState::ReadingContent;
            }
            return;
        }
        if self.is_request {
            if method_may_have_body {
                if self.policy.require_content_length {
                    self.fatal(BalsaFrameError::RequiredBodyButNoContentLength);
                    return;
                }
                self.warning(BalsaFrameError::MaybeBodyButNoContentLength);
            }
            self.finish_message();
        } else {
            self.state = ParseState::ReadingUntilClose;
        }
    }

    // -- body decoding ----------------------------------------------------

    fn start_chunk(&mut self) {
        self.state = ParseState::ReadingChunkLength;
        self.chunk_length_remaining = 0;
        self.chunk_seen_digit = false;
        self.chunk_had_ws = false;
        self.chunk_length_reported = false;
        self.half_term = false;
    }

    fn report_chunk_length(&mut self) {
        if !self.chunk_length_reported {
            self.chunk_length_reported = true;
            let length = self.chunk_length_remaining;
            self.visit(|v| v.on_chunk_length(length));
        }
    }

    fn finish_chunk_length(&mut self) {
        self.half_term = false;
        if self.chunk_length_remaining == 0 {
            self.state = ParseState::ReadingLastChunkTerm;
        } else {
            self.state = ParseState::ReadingChunkData;
        }
    }

    fn process_chunk_length(&mut self, input: &[u8], mut i: usize) -> usize {
        let start = i;
        while i < input.len() {
            let c = input[i];
            if self.half_term {
                i += 1;
                if c == b'\n' {
                    self.emit_raw(input, start, i);
                    self.finish_chunk_length();
                } else {
                    self.fatal(BalsaFrameError::InvalidChunkLength);
                }
                return i;
            }
            match c {
                b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                    i += 1;
                    if self.chunk_had_ws {
                        self.fatal(BalsaFrameError::InvalidChunkLength);
                        return i;
                    }
                    if self.chunk_length_remaining > u64::MAX / 16 {
                        self.fatal(BalsaFrameError::ChunkLengthOverflow);
                        return i;
                    }
                    let digit = (c as char).to_digit(16).map(u64::from).unwrap_or(0);
                    self.chunk_length_remaining = self.chunk_length_remaining * 16 + digit;
                    self.chunk_seen_digit = true;
                }
                b' ' | b'\t' => {
                    i += 1;
                    self.chunk_had_ws = true;
                }
                b';' => {
                    i += 1;
                    if !self.chunk_seen_digit {
                        self.fatal(BalsaFrameError::InvalidChunkLength);
                        return i;
                    }
                    self.report_chunk_length();
                    self.emit_raw(input, start, i);
                    self.state = ParseState::ReadingChunkExtension;
                    return i;
                }
                b'\r' => {
                    i += 1;
                    if !self.chunk_seen_digit {
                        self.fatal(BalsaFrameError::InvalidChunkLength);
                        return i;
                    }
                    self.report_chunk_length();
                    self.half_term = true;
                }
                b'\n' => {
                    i += 1;
                    if !self.chunk_seen_digit {
                        self.fatal(BalsaFrameError::InvalidChunkLength);
                        return i;
                    }
                    self.report_chunk_length();
                    self.emit_raw(input, start, i);
                    self.finish_chunk_length();
                    return i;
                }
                _ => {
                    i += 1;
                    self.fatal(BalsaFrameError::InvalidChunkLength);
                    return i;
                }
            }
        }
        self.emit_raw(input, start, i);
        i
    }

    fn process_chunk_extension(&mut self, input: &[u8], mut i: usize) -> usize {
        let start = i;
        let mut seg_start = i;
        while i < input.len() {
            let c = input[i];
            if self.half_term {
                self.half_term = false;
                if c == b'\n' {
                    i += 1;
                    self.emit_raw(input, start, i);
                    self.finish_chunk_length();
                    return i;
                }
                // A lone CR belongs to the extension bytes.
                self.visit(|v| v.on_chunk_extension_input(b"\r"));
            }
            match c {
                b'\r' => {
                    if i > seg_start {
                        self.visit(|v| v.on_chunk_extension_input(&input[seg_start..i]));
                    }
                    self.half_term = true;
                    i += 1;
                    seg_start = i;
                }
                b'\n' => {
                    if i > seg_start {
                        self.visit(|v| v.on_chunk_extension_input(&input[seg_start..i]));
                    }
                    i += 1;
                    self.emit_raw(input, start, i);
                    self.finish_chunk_length();
                    return i;
                }
                _ => i += 1,
            }
        }
        if i > seg_start {
            self.visit(|v| v.on_chunk_extension_input(&input[seg_start..i]));
        }
        self.emit_raw(input, start, i);
        i
    }

    fn process_chunk_data(&mut self, input: &[u8], i: usize) -> usize {
        let available = (input.len() - i) as u64;
        let take = available.min(self.chunk_length_remaining) as usize;
        let end = i + take;
        self.emit_raw(input, i, end);
        self.visit(|v| v.on_body_chunk_input(&input[i..end]));
        self.chunk_length_remaining -= take as u64;
        if self.chunk_length_remaining == 0 {
            self.half_term = false;
            self.state = ParseState::ReadingChunkTerm;
        }
        end
    }

    fn process_chunk_term(&mut self, input: &[u8], mut i: usize) -> usize {
        let start = i;
        while i < input.len() {
            let c = input[i];
            i += 1;
            if self.half_term {
                if c == b'\n' {
                    self.half_term = false;
                    self.emit_raw(input, start, i);
                    self.start_chunk();
                } else {
                    self.fatal(BalsaFrameError::InvalidChunkLength);
                }
                return i;
            }
            match c {
                b'\r' => self.half_term = true,
                b'\n' => {
                    self.emit_raw(input, start, i);
                    self.start_chunk();
                    return i;
                }
                _ => {
                    self.fatal(BalsaFrameError::InvalidChunkLength);
                    return i;
                }
            }
        }
        self.emit_raw(input, start, i);
        i
    }

    fn process_last_chunk_term(&mut self, input: &[u8], mut i: usize) -> usize {
        let start = i;
        while i < input.len() {
            let c = input[i];
            if self.half_term {
                self.half_term = false;
                if c == b'\n' {
                    i += 1;
                    self.emit_raw(input, start, i);
                    self.finish_message();
                    return i;
                }
                // The CR we swallowed begins a trailer line after all.
                self.buf.clear();
                self.buf.push(b'\r');
                self.emit_raw(input, start, i);
                self.state = ParseState::ReadingTrailer;
                return i;
            }
            match c {
                b'\r' => {
                    self.half_term = true;
                    i += 1;
                }
                b'\n' => {
                    i += 1;
                    self.emit_raw(input, start, i);
                    self.finish_message();
                    return i;
                }
                _ => {
                    self.buf.clear();
                    self.emit_raw(input, start, i);
                    self.state = ParseState::ReadingTrailer;
                    return i;
                }
            }
        }
        self.emit_raw(input, start, i);
        i
    }

    fn process_content(&mut self, input: &[u8], i: usize) -> usize {
        let available = (input.len() - i) as u64;
        let take = available.min(self.content_remaining) as usize;
        let end = i + take;
        self.emit_raw(input, i, end);
        self.visit(|v| v.on_body_chunk_input(&input[i..end]));
        self.content_remaining -= take as u64;
        if self.content_remaining == 0 {
            self.finish_message();
        }
        end
    }

    fn process_until_close(&mut self, input: &[u8], i: usize) -> usize {
        self.emit_raw(input, i, input.len());
        self.visit(|v| v.on_body_chunk_input(&input[i..]));
        input.len()
    }
}
