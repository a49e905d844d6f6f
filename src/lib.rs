//! Incremental HTTP/1.x message framing.
//!
//! The crate's core is [`BalsaFrame`], a push parser fed arbitrary
//! slices of a request or response stream. It recognizes the start
//! line, the header block, the body (sized, chunked, or read until
//! close) and an optional trailer, delivering structured events to a
//! [`BalsaVisitor`] and recording parsed header spans in caller-owned
//! [`BalsaHeaders`] storage.
//!
//! The framer is tolerant of the syntactic variation real traffic
//! exhibits (bare-LF line endings, HTTP/0.9 two-token requests, empty
//! reason phrases, tab runs between tokens, 1xx preludes) while
//! rejecting the constructs that enable request smuggling: conflicting
//! Content-Length headers, repeated or unknown Transfer-Encoding,
//! whitespace in header names, control bytes in values, and chunk
//! lengths that overflow the accumulator.
//!
//! It is single threaded and allocation bounded: everything buffered
//! inside [`BalsaFrame::process_input`] is limited by the configured
//! maximum header length plus the record table of emitted headers.

pub mod error;
pub mod frame;
pub mod headers;
pub mod parsers;
pub mod util;
pub mod visitor;

pub use crate::error::BalsaFrameError;
pub use crate::frame::{
    BalsaFrame, HttpValidationPolicy, InvalidCharsLevel, ParseState, DEFAULT_MAX_HEADER_LENGTH,
};
pub use crate::headers::{BalsaHeaders, HeaderLine, Span};
pub use crate::visitor::{BalsaVisitor, NoOpVisitor};
