use crate::error::BalsaFrameError;
use crate::headers::BalsaHeaders;

/// The event sink for the framer.
///
/// Every method has a no-op default so partial visitors compose
/// cleanly; implementors override only the events they care about.
/// For a well-formed message the framer delivers, in order: one
/// first-line event, `on_header` per field, `on_header_input`,
/// `process_headers`, `header_done`, the body events, the trailer
/// events if a trailer is present, and finally `message_done`.
///
/// `handle_warning` may fire at any point without stopping the parse;
/// `handle_error` is always the last event a framer delivers.
pub trait BalsaVisitor {
    /// The request start line, whole and split into its three tokens.
    /// Missing tokens (HTTP/0.9 forms) are empty slices.
    fn on_request_first_line(
        &mut self,
        _line: &[u8],
        _method: &[u8],
        _request_uri: &[u8],
        _version: &[u8],
    ) {
    }

    /// The response start line, whole and split into its three tokens.
    /// The reason phrase may be empty.
    fn on_response_first_line(
        &mut self,
        _line: &[u8],
        _version: &[u8],
        _status_code: &[u8],
        _reason: &[u8],
    ) {
    }

    /// One parsed header or trailer field.
    fn on_header(&mut self, _name: &[u8], _value: &[u8]) {}

    /// The raw bytes of the entire header block, terminator included.
    fn on_header_input(&mut self, _raw: &[u8]) {}

    /// The batched, structured view of the parsed header block.
    fn process_headers(&mut self, _headers: &BalsaHeaders) {}

    /// The header block is complete; body bytes follow, if any.
    fn header_done(&mut self) {}

    /// The structured view of a 1xx prelude's header block.
    fn on_interim_headers(&mut self, _headers: &BalsaHeaders) {}

    /// A 1xx prelude is complete; the final response follows.
    fn continue_header_done(&mut self) {}

    /// Body bytes as they appeared on the wire, chunk framing and
    /// trailer bytes included.
    fn on_raw_body_input(&mut self, _raw: &[u8]) {}

    /// Decoded body bytes only.
    fn on_body_chunk_input(&mut self, _data: &[u8]) {}

    /// The length parsed from a chunk header; 0 for the last chunk.
    fn on_chunk_length(&mut self, _length: u64) {}

    /// Chunk-extension bytes, delivered as consumed.
    fn on_chunk_extension_input(&mut self, _ext: &[u8]) {}

    /// The raw bytes of the trailer block, terminator included.
    fn on_trailer_input(&mut self, _raw: &[u8]) {}

    /// The batched, structured view of the parsed trailer block.
    fn process_trailers(&mut self, _trailers: &BalsaHeaders) {}

    /// The message is fully framed.
    fn message_done(&mut self) {}

    /// A fatal framing error; no further events will be delivered.
    fn handle_error(&mut self, _code: BalsaFrameError) {}

    /// A recoverable anomaly; parsing continues.
    fn handle_warning(&mut self, _code: BalsaFrameError) {}
}

/// A visitor that ignores every event. Attaching it is equivalent to
/// detaching the visitor, and it is useful as a placeholder in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpVisitor;

impl BalsaVisitor for NoOpVisitor {}
