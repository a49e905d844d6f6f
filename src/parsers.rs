use crate::error::BalsaFrameError;
use crate::headers::Span;
use crate::util::is_space_or_tab;
use nom::{
    bytes::complete::{take_till, take_till1, take_while},
    error::ErrorKind,
    sequence::tuple,
    IResult,
};

/// A parsed request start line. Token spans are relative to the line;
/// absent tokens are empty spans at the end of the line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RequestLine {
    pub method: Span,
    pub uri: Span,
    pub version: Span,
    pub warning: Option<BalsaFrameError>,
}

/// A parsed response start line. Token spans are relative to the line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ResponseLine {
    pub version: Span,
    pub code: Span,
    pub reason: Span,
    pub status: u32,
    pub warning: Option<BalsaFrameError>,
}

fn span_of(line: &[u8], sub: &[u8]) -> Span {
    Span::new(sub.as_ptr() as usize - line.as_ptr() as usize, sub.len())
}

fn end_span(line: &[u8]) -> Span {
    Span::new(line.len(), 0)
}

/// Consumes a run of SP/HT followed by one token (a run of anything
/// that is not SP/HT).
fn ws_then_token(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    tuple((take_while(is_space_or_tab), take_till1(is_space_or_tab)))(input)
}

/// The remainder of a line with surrounding SP/HT removed. Interior
/// whitespace is kept; reason phrases and deviant request-targets may
/// legitimately contain it.
fn rest_of_line(input: &[u8]) -> &[u8] {
    crate::util::trimmed(input)
}

/// Splits a request line into method, request-target and version.
///
/// The parser is lenient: one- and two-token lines (HTTP/0.9 style) are
/// accepted with a warning and the missing tokens left empty. Only a
/// line with no token at all is fatal.
pub(crate) fn parse_request_line(line: &[u8]) -> Result<RequestLine, BalsaFrameError> {
    let (rest, (_, method)) =
        ws_then_token(line).map_err(|_| BalsaFrameError::NoRequestLineInRequest)?;
    let method = span_of(line, method);
    match ws_then_token(rest) {
        Ok((rest, (_, uri))) => {
            let uri = span_of(line, uri);
            let version = rest_of_line(rest);
            if version.is_empty() {
                Ok(RequestLine {
                    method,
                    uri,
                    version: end_span(line),
                    warning: Some(BalsaFrameError::FailedToFindWsAfterRequestRequestUri),
                })
            } else {
                Ok(RequestLine {
                    method,
                    uri,
                    version: span_of(line, version),
                    warning: None,
                })
            }
        }
        Err(_) => Ok(RequestLine {
            method,
            uri: end_span(line),
            version: end_span(line),
            warning: Some(BalsaFrameError::FailedToFindWsAfterRequestMethod),
        }),
    }
}

/// Splits a response line into version, status code and reason phrase.
///
/// A missing status code is fatal; a missing reason phrase is tolerated
/// with a warning. The status code must be plain decimal digits.
pub(crate) fn parse_response_line(line: &[u8]) -> Result<ResponseLine, BalsaFrameError> {
    let (rest, (_, version)) =
        ws_then_token(line).map_err(|_| BalsaFrameError::NoStatusLineInResponse)?;
    let version = span_of(line, version);
    let (rest, (_, code)) =
        ws_then_token(rest).map_err(|_| BalsaFrameError::FailedToFindWsAfterResponseVersion)?;
    let status = parse_status_code(code)?;
    let code = span_of(line, code);
    let reason = rest_of_line(rest);
    if reason.is_empty() {
        Ok(ResponseLine {
            version,
            code,
            reason: end_span(line),
            status,
            warning: Some(BalsaFrameError::FailedToFindWsAfterResponseStatuscode),
        })
    } else {
        Ok(ResponseLine {
            version,
            code,
            reason: span_of(line, reason),
            status,
            warning: None,
        })
    }
}

/// Parses a status-code token: decimal digits only, 32 bits. Signs,
/// hex, non-ASCII and overflow are all the same failure.
pub fn parse_status_code(code: &[u8]) -> Result<u32, BalsaFrameError> {
    if code.is_empty() || !code.iter().all(u8::is_ascii_digit) {
        return Err(BalsaFrameError::FailedConvertingStatusCodeToInt);
    }
    std::str::from_utf8(code)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(BalsaFrameError::FailedConvertingStatusCodeToInt)
}

/// Parses a Content-Length value (already LWS-trimmed): a non-negative
/// decimal integer that fits in 63 bits. Anything else, including an
/// empty token, a sign or overflow, is unparsable.
pub fn parse_content_length(value: &[u8]) -> Result<u64, BalsaFrameError> {
    let parsed: IResult<&[u8], &[u8], (&[u8], ErrorKind)> =
        take_till(|c: u8| !c.is_ascii_digit())(value);
    match parsed {
        Ok((rest, digits)) if rest.is_empty() && !digits.is_empty() => {
            let length = std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(BalsaFrameError::UnparsableContentLength)?;
            if length >= 1 << 63 {
                return Err(BalsaFrameError::UnparsableContentLength);
            }
            Ok(length)
        }
        _ => Err(BalsaFrameError::UnparsableContentLength),
    }
}

/// Recognized transfer codings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferCoding {
    Chunked,
    Identity,
    Unknown,
}

/// Classifies a Transfer-Encoding value (already LWS-trimmed). Only
/// the exact single tokens `chunked` and `identity` are recognized;
/// lists such as `chunked, identity` are unknown codings.
pub fn parse_transfer_encoding(value: &[u8]) -> TransferCoding {
    if value.eq_ignore_ascii_case(b"chunked") {
        TransferCoding::Chunked
    } else if value.eq_ignore_ascii_case(b"identity") {
        TransferCoding::Identity
    } else {
        TransferCoding::Unknown
    }
}
