//! HTTP message to SPDY frame encoding.

use std::num::NonZeroUsize;

use bytes::Bytes;

use super::error::EncodeError;
use crate::{
    config::BridgeConfig,
    frame::{DataFrame, HeadersFrame, SpdyFrame, SpdyVersion, StreamId, SynReplyFrame, SynStreamFrame},
    headers::Headers,
    message::{
        self,
        CONNECTION,
        EXTENSION_HEADERS,
        FullMessage,
        HOST,
        HttpContent,
        MessageHead,
        OutboundItem,
        RequestHead,
        ResponseHead,
        SCHEME,
        TRANSFER_ENCODING,
        URL,
    },
    metrics::{self, Direction},
};

/// Hop-by-hop headers that have no meaning on a SPDY stream.
const CONNECTION_HEADERS: [&str; 4] = [CONNECTION, "Keep-Alive", "Proxy-Connection", TRANSFER_ENCODING];

const DEFAULT_SCHEME: &str = "https";

/// Turns outbound HTTP items into SPDY frames.
///
/// A head always becomes the stream's first frame: `SYN_STREAM` for
/// requests and pushed responses, `SYN_REPLY` otherwise. Bodies follow as
/// `DATA` frames no larger than the configured cap, and the final frame of
/// the message carries the `last` flag. Streamed content is attached to the
/// stream of the most recent [`OutboundItem::Head`].
#[derive(Debug)]
pub struct SpdyHttpEncoder {
    version: SpdyVersion,
    max_data_frame_len: NonZeroUsize,
    current_stream: Option<StreamId>,
}

impl SpdyHttpEncoder {
    #[must_use]
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            version: config.spdy_version(),
            max_data_frame_len: config.max_data_frame_len(),
            current_stream: None,
        }
    }

    /// Stream receiving streamed content, if a head is open.
    #[must_use]
    pub const fn current_stream(&self) -> Option<StreamId> { self.current_stream }

    /// Append the frames for `item` to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::MissingStreamId`] for heads without an
    /// `X-SPDY-Stream-ID`, [`EncodeError::MissingPushUrl`] for pushed
    /// responses without a URL, and [`EncodeError::NoActiveStream`] for
    /// content that does not follow a head. Nothing is appended on error.
    pub fn encode(&mut self, item: OutboundItem, out: &mut Vec<SpdyFrame>) -> Result<(), EncodeError> {
        let start = out.len();
        match item {
            OutboundItem::Message(message) => self.encode_message(message, out)?,
            OutboundItem::Head(head) => {
                let stream_id = self.encode_head(&head, false, out)?;
                self.current_stream = Some(stream_id);
            }
            OutboundItem::Content(content) => self.encode_content(content, out)?,
            OutboundItem::Frame(frame) => out.push(frame),
        }
        for _ in start..out.len() {
            metrics::inc_frames(Direction::Outbound);
        }
        Ok(())
    }

    fn encode_message(&mut self, message: FullMessage, out: &mut Vec<SpdyFrame>) -> Result<(), EncodeError> {
        let FullMessage { head, body } = message;
        let body = body.freeze();
        let stream_id = self.encode_head(&head, body.is_empty(), out)?;
        self.current_stream = None;
        if !body.is_empty() {
            self.push_data(stream_id, body, true, out);
        }
        Ok(())
    }

    fn encode_content(&mut self, content: HttpContent, out: &mut Vec<SpdyFrame>) -> Result<(), EncodeError> {
        let stream_id = self.current_stream.ok_or(EncodeError::NoActiveStream)?;
        match content {
            HttpContent::Chunk(data) => {
                if !data.is_empty() {
                    self.push_data(stream_id, data, false, out);
                }
            }
            HttpContent::Last { data, trailers } => {
                self.current_stream = None;
                if trailers.is_empty() {
                    self.push_data(stream_id, data, true, out);
                } else {
                    if !data.is_empty() {
                        self.push_data(stream_id, data, false, out);
                    }
                    let mut frame = HeadersFrame::new(stream_id);
                    frame.last = true;
                    copy_fields(&trailers, &mut frame.headers, &[]);
                    out.push(frame.into());
                }
            }
        }
        Ok(())
    }

    /// Push the opening frame for `head` and return its stream id.
    fn encode_head(
        &self,
        head: &MessageHead,
        last: bool,
        out: &mut Vec<SpdyFrame>,
    ) -> Result<StreamId, EncodeError> {
        let stream_id = head
            .stream_id()
            .filter(|id| !id.is_none())
            .ok_or(EncodeError::MissingStreamId)?;
        let frame: SpdyFrame = match head {
            MessageHead::Request(request) => self.request_frame(stream_id, head, request, last).into(),
            MessageHead::Response(response) => match head.associated_to().filter(|id| !id.is_none()) {
                Some(associated_to) => self
                    .pushed_frame(stream_id, associated_to, head, response, last)?
                    .into(),
                None => {
                    let mut frame = SynReplyFrame::new(stream_id);
                    frame.last = last;
                    self.response_fields(response, &mut frame.headers);
                    frame.into()
                }
            },
        };
        out.push(frame);
        Ok(stream_id)
    }

    fn request_frame(
        &self,
        stream_id: StreamId,
        head: &MessageHead,
        request: &RequestHead,
        last: bool,
    ) -> SynStreamFrame {
        let version = self.version;
        let mut frame = SynStreamFrame::new(
            stream_id,
            head.associated_to().unwrap_or(StreamId::NONE),
            head.priority().unwrap_or(0),
        );
        frame.last = last;
        let fields = &mut frame.headers;
        fields.add(version.method_field(), request.method.as_str());
        fields.add(version.url_field(), request.uri.as_str());
        fields.add(version.version_field(), message::version_text(request.version));
        fields.add(
            version.scheme_field(),
            request.headers.get(SCHEME).unwrap_or(DEFAULT_SCHEME),
        );
        let mut skip: Vec<&str> = Vec::new();
        if let Some(host_field) = version.host_field() {
            if let Some(host) = request.headers.get(HOST) {
                fields.add(host_field, host);
            }
            skip.push(HOST);
        }
        copy_fields(&request.headers, fields, &skip);
        frame
    }

    fn pushed_frame(
        &self,
        stream_id: StreamId,
        associated_to: StreamId,
        head: &MessageHead,
        response: &ResponseHead,
        last: bool,
    ) -> Result<SynStreamFrame, EncodeError> {
        let url = response
            .headers
            .get(URL)
            .ok_or(EncodeError::MissingPushUrl(stream_id))?;
        let mut frame = SynStreamFrame::new(stream_id, associated_to, head.priority().unwrap_or(0));
        frame.last = last;
        frame.unidirectional = true;
        frame.headers.add(self.version.url_field(), url);
        self.response_fields(response, &mut frame.headers);
        Ok(frame)
    }

    fn response_fields(&self, response: &ResponseHead, fields: &mut Headers) {
        fields.add(self.version.status_field(), message::status_text(response.status));
        fields.add(self.version.version_field(), message::version_text(response.version));
        copy_fields(&response.headers, fields, &[]);
    }

    fn push_data(&self, stream_id: StreamId, mut data: Bytes, last: bool, out: &mut Vec<SpdyFrame>) {
        let max = self.max_data_frame_len.get();
        while data.len() > max {
            out.push(DataFrame::new(stream_id, data.split_to(max)).into());
        }
        let frame = DataFrame::new(stream_id, data);
        out.push(if last { frame.into_last() } else { frame }.into());
    }
}

/// Copy ordinary header fields into a SPDY name/value block.
///
/// SPDY requires lower-case names. Extension and hop-by-hop headers stay
/// behind, as does anything named in `skip`.
fn copy_fields(from: &Headers, to: &mut Headers, skip: &[&str]) {
    let excluded = |name: &str| {
        EXTENSION_HEADERS
            .iter()
            .chain(CONNECTION_HEADERS.iter())
            .chain(skip.iter())
            .any(|other| other.eq_ignore_ascii_case(name))
    };
    for (name, value) in from.iter() {
        if !excluded(name) {
            to.add(name.to_ascii_lowercase(), value);
        }
    }
}
