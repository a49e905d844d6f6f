use std::fmt;

/// The closed set of framing error and warning codes.
///
/// Whether a code is fatal or a warning is decided where it is raised:
/// the same code can be a warning for a request and fatal for a
/// response (the start-line whitespace codes behave this way).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BalsaFrameError {
    BalsaNoError,
    NoStatusLineInResponse,
    NoRequestLineInRequest,
    FailedToFindWsAfterResponseVersion,
    FailedToFindWsAfterRequestMethod,
    FailedToFindWsAfterResponseStatuscode,
    FailedToFindWsAfterRequestRequestUri,
    FailedToFindNlAfterResponseReasonPhrase,
    FailedToFindNlAfterRequestHttpVersion,
    FailedConvertingStatusCodeToInt,
    HeadersTooLong,
    UnparsableContentLength,
    MaybeBodyButNoContentLength,
    RequiredBodyButNoContentLength,
    HeaderMissingColon,
    InvalidChunkLength,
    ChunkLengthOverflow,
    CalledBytesSplicedWhenUnsafeToDoSo,
    CalledBytesSplicedAndExceededSafeSpliceAmount,
    MultipleContentLengthKeys,
    MultipleTransferEncodingKeys,
    UnknownTransferEncoding,
    InvalidHeaderFormat,
    InvalidHeaderCharacter,
    InvalidHeaderNameCharacter,
    InvalidTrailerFormat,
    InvalidTrailerNameCharacter,
    TrailerTooLong,
    TrailerMissingColon,
    InternalLogicError,
}

impl BalsaFrameError {
    /// Returns the stable identifier for the code, suitable for logs
    /// and test expectations.
    pub fn as_str(self) -> &'static str {
        use BalsaFrameError::*;
        match self {
            BalsaNoError => "BalsaNoError",
            NoStatusLineInResponse => "NoStatusLineInResponse",
            NoRequestLineInRequest => "NoRequestLineInRequest",
            FailedToFindWsAfterResponseVersion => "FailedToFindWsAfterResponseVersion",
            FailedToFindWsAfterRequestMethod => "FailedToFindWsAfterRequestMethod",
            FailedToFindWsAfterResponseStatuscode => "FailedToFindWsAfterResponseStatuscode",
            FailedToFindWsAfterRequestRequestUri => "FailedToFindWsAfterRequestRequestUri",
            FailedToFindNlAfterResponseReasonPhrase => "FailedToFindNlAfterResponseReasonPhrase",
            FailedToFindNlAfterRequestHttpVersion => "FailedToFindNlAfterRequestHttpVersion",
            FailedConvertingStatusCodeToInt => "FailedConvertingStatusCodeToInt",
            HeadersTooLong => "HeadersTooLong",
            UnparsableContentLength => "UnparsableContentLength",
            MaybeBodyButNoContentLength => "MaybeBodyButNoContentLength",
            RequiredBodyButNoContentLength => "RequiredBodyButNoContentLength",
            HeaderMissingColon => "HeaderMissingColon",
            InvalidChunkLength => "InvalidChunkLength",
            ChunkLengthOverflow => "ChunkLengthOverflow",
            CalledBytesSplicedWhenUnsafeToDoSo => "CalledBytesSplicedWhenUnsafeToDoSo",
            CalledBytesSplicedAndExceededSafeSpliceAmount => {
                "CalledBytesSplicedAndExceededSafeSpliceAmount"
            }
            MultipleContentLengthKeys => "MultipleContentLengthKeys",
            MultipleTransferEncodingKeys => "MultipleTransferEncodingKeys",
            UnknownTransferEncoding => "UnknownTransferEncoding",
            InvalidHeaderFormat => "InvalidHeaderFormat",
            InvalidHeaderCharacter => "InvalidHeaderCharacter",
            InvalidHeaderNameCharacter => "InvalidHeaderNameCharacter",
            InvalidTrailerFormat => "InvalidTrailerFormat",
            InvalidTrailerNameCharacter => "InvalidTrailerNameCharacter",
            TrailerTooLong => "TrailerTooLong",
            TrailerMissingColon => "TrailerMissingColon",
            InternalLogicError => "InternalLogicError",
        }
    }
}

impl Default for BalsaFrameError {
    fn default() -> Self {
        BalsaFrameError::BalsaNoError
    }
}

impl fmt::Display for BalsaFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::BalsaFrameError::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BalsaNoError, "BalsaNoError")]
    #[case(NoStatusLineInResponse, "NoStatusLineInResponse")]
    #[case(NoRequestLineInRequest, "NoRequestLineInRequest")]
    #[case(FailedToFindWsAfterResponseVersion, "FailedToFindWsAfterResponseVersion")]
    #[case(FailedToFindWsAfterRequestMethod, "FailedToFindWsAfterRequestMethod")]
    #[case(
        FailedToFindWsAfterResponseStatuscode,
        "FailedToFindWsAfterResponseStatuscode"
    )]
    #[case(
        FailedToFindWsAfterRequestRequestUri,
        "FailedToFindWsAfterRequestRequestUri"
    )]
    #[case(
        FailedToFindNlAfterResponseReasonPhrase,
        "FailedToFindNlAfterResponseReasonPhrase"
    )]
    #[case(
        FailedToFindNlAfterRequestHttpVersion,
        "FailedToFindNlAfterRequestHttpVersion"
    )]
    #[case(FailedConvertingStatusCodeToInt, "FailedConvertingStatusCodeToInt")]
    #[case(HeadersTooLong, "HeadersTooLong")]
    #[case(UnparsableContentLength, "UnparsableContentLength")]
    #[case(MaybeBodyButNoContentLength, "MaybeBodyButNoContentLength")]
    #[case(RequiredBodyButNoContentLength, "RequiredBodyButNoContentLength")]
    #[case(HeaderMissingColon, "HeaderMissingColon")]
    #[case(InvalidChunkLength, "InvalidChunkLength")]
    #[case(ChunkLengthOverflow, "ChunkLengthOverflow")]
    #[case(
        CalledBytesSplicedWhenUnsafeToDoSo,
        "CalledBytesSplicedWhenUnsafeToDoSo"
    )]
    #[case(
        CalledBytesSplicedAndExceededSafeSpliceAmount,
        "CalledBytesSplicedAndExceededSafeSpliceAmount"
    )]
    #[case(MultipleContentLengthKeys, "MultipleContentLengthKeys")]
    #[case(MultipleTransferEncodingKeys, "MultipleTransferEncodingKeys")]
    #[case(UnknownTransferEncoding, "UnknownTransferEncoding")]
    #[case(InvalidHeaderFormat, "InvalidHeaderFormat")]
    #[case(InvalidHeaderCharacter, "InvalidHeaderCharacter")]
    #[case(InvalidHeaderNameCharacter, "InvalidHeaderNameCharacter")]
    #[case(InvalidTrailerFormat, "InvalidTrailerFormat")]
    #[case(InvalidTrailerNameCharacter, "InvalidTrailerNameCharacter")]
    #[case(TrailerTooLong, "TrailerTooLong")]
    #[case(TrailerMissingColon, "TrailerMissingColon")]
    #[case(InternalLogicError, "InternalLogicError")]
    fn test_stable_identifiers(#[case] code: BalsaFrameError, #[case] expected: &str) {
        assert_eq!(code.as_str(), expected);
        assert_eq!(code.to_string(), expected);
    }

    #[test]
    fn test_default_is_no_error() {
        assert_eq!(BalsaFrameError::default(), BalsaNoError);
    }
}
