//! Typed SPDY frames consumed and produced by the HTTP translation layer.
//!
//! Parsing raw bytes into these frames belongs to the transport codec; this
//! module only fixes the shape of the frames the translator works with.

use std::fmt;

use bytes::Bytes;

use crate::headers::Headers;

/// Identifier of a multiplexed stream.
///
/// Client-initiated streams carry odd identifiers and server-initiated
/// (pushed) streams carry even identifiers. Zero never names a live stream.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StreamId(pub u32);

impl StreamId {
    /// Placeholder used where the protocol reserves "no stream".
    pub const NONE: Self = Self(0);

    /// Whether the identifier belongs to a server-initiated stream.
    #[must_use]
    pub const fn is_server_initiated(self) -> bool { self.0 != 0 && self.0 % 2 == 0 }

    /// Whether the identifier is the reserved zero value.
    #[must_use]
    pub const fn is_none(self) -> bool { self.0 == 0 }
}

impl From<u32> for StreamId {
    fn from(value: u32) -> Self { Self(value) }
}

impl From<StreamId> for u32 {
    fn from(value: StreamId) -> Self { value.0 }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Supported SPDY protocol revisions.
///
/// The revisions differ in the names of the reserved request/response
/// fields carried in the name/value block.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize)]
#[serde(try_from = "u8")]
pub enum SpdyVersion {
    /// SPDY/2: bare field names, host carried as a normal header.
    V2,
    /// SPDY/3: colon-prefixed field names and a dedicated `:host` field.
    #[default]
    V3,
}

/// Raised when a numeric protocol revision is not supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported SPDY version {0}; expected 2 or 3")]
pub struct UnsupportedVersion(pub u8);

impl TryFrom<u8> for SpdyVersion {
    type Error = UnsupportedVersion;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            other => Err(UnsupportedVersion(other)),
        }
    }
}

impl SpdyVersion {
    /// Name of the request method field.
    #[must_use]
    pub const fn method_field(self) -> &'static str {
        match self {
            Self::V2 => "method",
            Self::V3 => ":method",
        }
    }

    /// Name of the request target field.
    #[must_use]
    pub const fn url_field(self) -> &'static str {
        match self {
            Self::V2 => "url",
            Self::V3 => ":path",
        }
    }

    /// Name of the HTTP version field.
    #[must_use]
    pub const fn version_field(self) -> &'static str {
        match self {
            Self::V2 => "version",
            Self::V3 => ":version",
        }
    }

    /// Name of the response status field.
    #[must_use]
    pub const fn status_field(self) -> &'static str {
        match self {
            Self::V2 => "status",
            Self::V3 => ":status",
        }
    }

    /// Name of the scheme field.
    #[must_use]
    pub const fn scheme_field(self) -> &'static str {
        match self {
            Self::V2 => "scheme",
            Self::V3 => ":scheme",
        }
    }

    /// Name of the dedicated host field, if the revision has one.
    #[must_use]
    pub const fn host_field(self) -> Option<&'static str> {
        match self {
            Self::V2 => None,
            Self::V3 => Some(":host"),
        }
    }
}

/// Status codes carried by `RST_STREAM` frames.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RstStatus {
    ProtocolError,
    InvalidStream,
    RefusedStream,
    UnsupportedVersion,
    Cancel,
    InternalError,
    FlowControlError,
    StreamInUse,
    StreamAlreadyClosed,
    FrameTooLarge,
}

impl RstStatus {
    /// Numeric code written on the wire.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::ProtocolError => 1,
            Self::InvalidStream => 2,
            Self::RefusedStream => 3,
            Self::UnsupportedVersion => 4,
            Self::Cancel => 5,
            Self::InternalError => 6,
            Self::FlowControlError => 7,
            Self::StreamInUse => 8,
            Self::StreamAlreadyClosed => 9,
            Self::FrameTooLarge => 11,
        }
    }
}

/// `SYN_STREAM`: opens a stream and carries the request (or pushed
/// response) name/value block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynStreamFrame {
    pub stream_id: StreamId,
    pub associated_to: StreamId,
    pub priority: u8,
    pub last: bool,
    pub unidirectional: bool,
    /// The name/value block exceeded the parser's limit and was cut short.
    pub truncated: bool,
    pub headers: Headers,
}

impl SynStreamFrame {
    /// Open `stream_id` with an empty header block.
    #[must_use]
    pub fn new(stream_id: StreamId, associated_to: StreamId, priority: u8) -> Self {
        Self {
            stream_id,
            associated_to,
            priority,
            last: false,
            unidirectional: false,
            truncated: false,
            headers: Headers::new(),
        }
    }
}

/// `SYN_REPLY`: the response name/value block for a client stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynReplyFrame {
    pub stream_id: StreamId,
    pub last: bool,
    pub truncated: bool,
    pub headers: Headers,
}

impl SynReplyFrame {
    #[must_use]
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            last: false,
            truncated: false,
            headers: Headers::new(),
        }
    }
}

/// `HEADERS`: additional name/value pairs for an open stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadersFrame {
    pub stream_id: StreamId,
    pub last: bool,
    pub truncated: bool,
    pub headers: Headers,
}

impl HeadersFrame {
    #[must_use]
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            last: false,
            truncated: false,
            headers: Headers::new(),
        }
    }
}

/// `DATA`: a slice of a stream's body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: StreamId,
    pub last: bool,
    pub data: Bytes,
}

impl DataFrame {
    #[must_use]
    pub fn new(stream_id: StreamId, data: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            last: false,
            data: data.into(),
        }
    }

    /// Mark the frame as the final one of its stream.
    #[must_use]
    pub fn into_last(mut self) -> Self {
        self.last = true;
        self
    }
}

/// `RST_STREAM`: abnormal termination of a single stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub stream_id: StreamId,
    pub status: RstStatus,
}

impl RstStreamFrame {
    #[must_use]
    pub const fn new(stream_id: StreamId, status: RstStatus) -> Self { Self { stream_id, status } }
}

/// Stream-level SPDY frames handled by the HTTP translation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpdyFrame {
    SynStream(SynStreamFrame),
    SynReply(SynReplyFrame),
    Headers(HeadersFrame),
    Data(DataFrame),
    RstStream(RstStreamFrame),
}

impl SpdyFrame {
    /// Stream the frame belongs to.
    #[must_use]
    pub const fn stream_id(&self) -> StreamId {
        match self {
            Self::SynStream(f) => f.stream_id,
            Self::SynReply(f) => f.stream_id,
            Self::Headers(f) => f.stream_id,
            Self::Data(f) => f.stream_id,
            Self::RstStream(f) => f.stream_id,
        }
    }

    /// Whether the frame closes its stream from the sender's side.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        match self {
            Self::SynStream(f) => f.last,
            Self::SynReply(f) => f.last,
            Self::Headers(f) => f.last,
            Self::Data(f) => f.last,
            Self::RstStream(_) => true,
        }
    }
}

impl From<SynStreamFrame> for SpdyFrame {
    fn from(frame: SynStreamFrame) -> Self { Self::SynStream(frame) }
}

impl From<SynReplyFrame> for SpdyFrame {
    fn from(frame: SynReplyFrame) -> Self { Self::SynReply(frame) }
}

impl From<HeadersFrame> for SpdyFrame {
    fn from(frame: HeadersFrame) -> Self { Self::Headers(frame) }
}

impl From<DataFrame> for SpdyFrame {
    fn from(frame: DataFrame) -> Self { Self::Data(frame) }
}

impl From<RstStreamFrame> for SpdyFrame {
    fn from(frame: RstStreamFrame) -> Self { Self::RstStream(frame) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{SpdyVersion, StreamId, UnsupportedVersion};

    #[rstest]
    #[case(1, false)]
    #[case(2, true)]
    #[case(3, false)]
    #[case(0, false)]
    fn server_initiated_streams_are_even(#[case] id: u32, #[case] expected: bool) {
        assert_eq!(StreamId(id).is_server_initiated(), expected);
    }

    #[test]
    fn version_conversion_rejects_unknown_revisions() {
        assert_eq!(SpdyVersion::try_from(2), Ok(SpdyVersion::V2));
        assert_eq!(SpdyVersion::try_from(4), Err(UnsupportedVersion(4)));
    }
}
