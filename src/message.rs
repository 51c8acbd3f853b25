//! HTTP message types exchanged with application code.
//!
//! Inbound, the translator produces either a [`FullMessage`] whose body sits
//! in memory or a [`SpilledMessage`] whose body sits in a temporary file.
//! Outbound, applications hand [`OutboundItem`]s to the writer: complete
//! messages, bare heads followed by streamed [`HttpContent`], or raw frames.

use std::path::Path;

use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode, Version};

use crate::{
    frame::{SpdyFrame, StreamId},
    headers::Headers,
    spill::SpillFile,
};

/// Extension header carrying the SPDY stream identifier.
pub const STREAM_ID: &str = "X-SPDY-Stream-ID";
/// Extension header carrying the associated stream of a pushed response.
pub const ASSOCIATED_TO_STREAM_ID: &str = "X-SPDY-Associated-To-Stream-ID";
/// Extension header carrying the stream priority.
pub const PRIORITY: &str = "X-SPDY-Priority";
/// Extension header carrying the URL of a pushed resource.
pub const URL: &str = "X-SPDY-URL";
/// Extension header selecting the scheme of an encoded request.
pub const SCHEME: &str = "X-SPDY-Scheme";

/// Extension headers that only make sense inside this layer.
pub(crate) const EXTENSION_HEADERS: [&str; 5] =
    [STREAM_ID, ASSOCIATED_TO_STREAM_ID, PRIORITY, URL, SCHEME];

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONNECTION: &str = "Connection";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const TRAILER: &str = "Trailer";
pub const HOST: &str = "Host";

/// Request line and headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub uri: String,
    pub version: Version,
    pub headers: Headers,
}

impl RequestHead {
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>, version: Version) -> Self {
        Self {
            method,
            uri: uri.into(),
            version,
            headers: Headers::new(),
        }
    }

    /// Whether the declared content type is a multipart body.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .is_some_and(|ctype| ctype.trim_start().to_ascii_lowercase().starts_with("multipart"))
    }

    /// Declared `Content-Length`, when present and numeric.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.trim().parse().ok())
    }
}

/// Status line and headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    pub headers: Headers,
}

impl ResponseHead {
    #[must_use]
    pub fn new(status: StatusCode, version: Version) -> Self {
        Self {
            status,
            version,
            headers: Headers::new(),
        }
    }
}

/// Either side of an HTTP exchange, without its body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageHead {
    Request(RequestHead),
    Response(ResponseHead),
}

impl MessageHead {
    #[must_use]
    pub fn headers(&self) -> &Headers {
        match self {
            Self::Request(head) => &head.headers,
            Self::Response(head) => &head.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            Self::Request(head) => &mut head.headers,
            Self::Response(head) => &mut head.headers,
        }
    }

    #[must_use]
    pub fn version(&self) -> Version {
        match self {
            Self::Request(head) => head.version,
            Self::Response(head) => head.version,
        }
    }

    /// Request view, if this head is a request.
    #[must_use]
    pub fn as_request(&self) -> Option<&RequestHead> {
        match self {
            Self::Request(head) => Some(head),
            Self::Response(_) => None,
        }
    }

    /// Declared `Content-Length`, when present and numeric.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Self::Request(head) => head.content_length(),
            Self::Response(head) => head
                .headers
                .get(CONTENT_LENGTH)
                .and_then(|value| value.trim().parse().ok()),
        }
    }

    /// Overwrite `Content-Length`.
    pub fn set_content_length(&mut self, len: u64) {
        self.headers_mut().set(CONTENT_LENGTH, len.to_string());
    }

    /// Stream identifier recorded in the extension headers.
    #[must_use]
    pub fn stream_id(&self) -> Option<StreamId> { parse_u32(self.headers(), STREAM_ID).map(StreamId) }

    /// Record (or clear) the stream identifier extension header.
    pub fn set_stream_id(&mut self, stream_id: Option<StreamId>) {
        match stream_id {
            Some(id) => self.headers_mut().set(STREAM_ID, id.to_string()),
            None => {
                self.headers_mut().remove(STREAM_ID);
            }
        }
    }

    /// Associated stream of a pushed response.
    #[must_use]
    pub fn associated_to(&self) -> Option<StreamId> {
        parse_u32(self.headers(), ASSOCIATED_TO_STREAM_ID).map(StreamId)
    }

    /// Priority recorded in the extension headers.
    #[must_use]
    pub fn priority(&self) -> Option<u8> {
        self.headers()
            .get(PRIORITY)
            .and_then(|value| value.trim().parse().ok())
    }

    /// Force persistent-connection semantics.
    ///
    /// HTTP/1.1 is persistent by default so any `Connection` header is
    /// dropped; HTTP/1.0 needs an explicit `keep-alive`.
    pub fn set_keep_alive(&mut self) {
        let version = self.version();
        let headers = self.headers_mut();
        if version == Version::HTTP_10 {
            headers.set(CONNECTION, "keep-alive");
        } else {
            headers.remove(CONNECTION);
        }
    }
}

fn parse_u32(headers: &Headers, name: &str) -> Option<u32> {
    headers.get(name).and_then(|value| value.trim().parse().ok())
}

impl From<RequestHead> for MessageHead {
    fn from(head: RequestHead) -> Self { Self::Request(head) }
}

impl From<ResponseHead> for MessageHead {
    fn from(head: ResponseHead) -> Self { Self::Response(head) }
}

/// A message whose whole body is held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullMessage {
    pub head: MessageHead,
    pub body: BytesMut,
}

impl FullMessage {
    #[must_use]
    pub fn new(head: impl Into<MessageHead>) -> Self {
        Self {
            head: head.into(),
            body: BytesMut::new(),
        }
    }

    #[must_use]
    pub fn with_body(head: impl Into<MessageHead>, body: impl AsRef<[u8]>) -> Self {
        Self {
            head: head.into(),
            body: BytesMut::from(body.as_ref()),
        }
    }
}

/// A message whose body was written to a temporary file.
///
/// The file belongs to this value: dropping it deletes the file, while
/// [`SpilledMessage::into_parts`] hands the file over to the caller.
#[derive(Debug)]
pub struct SpilledMessage {
    head: MessageHead,
    file: SpillFile,
}

impl SpilledMessage {
    pub(crate) fn new(head: impl Into<MessageHead>, file: SpillFile) -> Self {
        Self {
            head: head.into(),
            file,
        }
    }

    #[must_use]
    pub fn head(&self) -> &MessageHead { &self.head }

    pub fn head_mut(&mut self) -> &mut MessageHead { &mut self.head }

    /// Location of the body on disk.
    #[must_use]
    pub fn path(&self) -> &Path { self.file.path() }

    /// Split into the head and the owned body file.
    #[must_use]
    pub fn into_parts(self) -> (MessageHead, SpillFile) { (self.head, self.file) }
}

/// A reconstructed inbound message.
#[derive(Debug)]
pub enum InboundMessage {
    /// Body accumulated in memory.
    Full(FullMessage),
    /// Body spilled to disk.
    Spilled(SpilledMessage),
}

impl InboundMessage {
    #[must_use]
    pub fn head(&self) -> &MessageHead {
        match self {
            Self::Full(message) => &message.head,
            Self::Spilled(message) => message.head(),
        }
    }

    pub fn head_mut(&mut self) -> &mut MessageHead {
        match self {
            Self::Full(message) => &mut message.head,
            Self::Spilled(message) => message.head_mut(),
        }
    }
}

/// A piece of a streamed body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpContent {
    /// An intermediate chunk.
    Chunk(Bytes),
    /// The final chunk, optionally followed by trailing headers.
    Last { data: Bytes, trailers: Headers },
}

impl HttpContent {
    /// Final chunk without trailers.
    #[must_use]
    pub fn last(data: impl Into<Bytes>) -> Self {
        Self::Last {
            data: data.into(),
            trailers: Headers::new(),
        }
    }

    #[must_use]
    pub fn data(&self) -> &Bytes {
        match self {
            Self::Chunk(data) | Self::Last { data, .. } => data,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.data().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.data().is_empty() }

    #[must_use]
    pub const fn is_last(&self) -> bool { matches!(self, Self::Last { .. }) }
}

/// Plain HTTP request pieces produced by an HTTP/1.x parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpPiece {
    Request(RequestHead),
    Content(HttpContent),
}

/// Anything an application can send back through the writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundItem {
    /// A complete message with an in-memory body.
    Message(FullMessage),
    /// A head whose body follows as [`OutboundItem::Content`] pieces.
    Head(MessageHead),
    /// A piece of the body of the most recent [`OutboundItem::Head`].
    Content(HttpContent),
    /// A frame passed to the transport untouched.
    Frame(SpdyFrame),
}

impl From<HttpContent> for OutboundItem {
    fn from(content: HttpContent) -> Self { Self::Content(content) }
}

impl From<FullMessage> for OutboundItem {
    fn from(message: FullMessage) -> Self { Self::Message(message) }
}

impl From<SpdyFrame> for OutboundItem {
    fn from(frame: SpdyFrame) -> Self { Self::Frame(frame) }
}

/// Parse an HTTP version token such as `HTTP/1.1`.
#[must_use]
pub fn parse_version(token: &str) -> Option<Version> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("HTTP/1.1") {
        Some(Version::HTTP_11)
    } else if token.eq_ignore_ascii_case("HTTP/1.0") {
        Some(Version::HTTP_10)
    } else {
        None
    }
}

/// Canonical text of an HTTP version.
#[must_use]
pub fn version_text(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

/// Parse a status field such as `200 OK` or `404`.
#[must_use]
pub fn parse_status(field: &str) -> Option<StatusCode> {
    let code = field.split_whitespace().next()?;
    let code: u16 = code.parse().ok()?;
    StatusCode::from_u16(code).ok()
}

/// Status field text, e.g. `431 Request Header Fields Too Large`.
#[must_use]
pub fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}
