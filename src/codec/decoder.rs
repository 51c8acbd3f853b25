//! SPDY frame to HTTP message decoding.

use std::{num::NonZeroUsize, sync::Arc};

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Method, StatusCode, Version};
use log::{debug, info, warn};

use super::{
    error::DecodeError,
    table::{StreamBody, StreamState, StreamTable},
};
use crate::{
    config::BridgeConfig,
    frame::{
        DataFrame,
        HeadersFrame,
        RstStatus,
        RstStreamFrame,
        SpdyFrame,
        SpdyVersion,
        StreamId,
        SynReplyFrame,
        SynStreamFrame,
    },
    headers::Headers,
    message::{
        self,
        ASSOCIATED_TO_STREAM_ID,
        EXTENSION_HEADERS,
        FullMessage,
        HOST,
        InboundMessage,
        MessageHead,
        PRIORITY,
        RequestHead,
        ResponseHead,
        SpilledMessage,
        TRAILER,
        TRANSFER_ENCODING,
        URL,
    },
    metrics::{self, Direction},
    spill::{BodySpill, ProgressListener, TempStore},
};

/// Everything produced by decoding one frame.
///
/// `replies` are frames to send back to the peer on the same connection:
/// error responses and stream resets. They remain valid when
/// [`SpdyHttpDecoder::decode`] returns an error and should be written
/// before the error is handled.
#[derive(Debug, Default)]
pub struct DecodeOutput {
    pub messages: Vec<InboundMessage>,
    pub replies: Vec<SpdyFrame>,
}

impl DecodeOutput {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.messages.is_empty() && self.replies.is_empty() }
}

/// Why a header block could not become an HTTP head.
#[derive(Debug)]
enum HeadError {
    Missing(&'static str),
    Malformed(&'static str),
    InvalidField(String),
}

impl std::fmt::Display for HeadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "missing {field}"),
            Self::Malformed(field) => write!(f, "malformed {field}"),
            Self::InvalidField(name) => write!(f, "invalid header field {name:?}"),
        }
    }
}

/// Rebuilds HTTP messages from the frames of one SPDY connection.
///
/// Each stream accumulates in a table keyed by stream id until its last
/// frame arrives. Bodies of multipart requests whose declared length exceeds
/// the memory threshold are written to disk as they arrive and the message
/// is emitted as a [`SpilledMessage`].
///
/// # Examples
///
/// ```no_run
/// use spillframe::{
///     codec::{DecodeOutput, SpdyHttpDecoder},
///     config::BridgeConfig,
///     frame::{StreamId, SynStreamFrame},
/// };
///
/// let config = BridgeConfig::builder().build()?;
/// let mut decoder = SpdyHttpDecoder::new(&config);
///
/// let mut open = SynStreamFrame::new(StreamId(1), StreamId::NONE, 0);
/// open.last = true;
/// open.headers.add(":method", "GET");
/// open.headers.add(":path", "/x");
/// open.headers.add(":version", "HTTP/1.1");
///
/// let mut out = DecodeOutput::new();
/// decoder.decode(open.into(), &mut out)?;
/// assert_eq!(out.messages.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SpdyHttpDecoder {
    version: SpdyVersion,
    max_content_length: NonZeroUsize,
    memory_threshold: u64,
    store: TempStore,
    listener: Option<Arc<dyn ProgressListener>>,
    streams: StreamTable,
}

impl SpdyHttpDecoder {
    #[must_use]
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            version: config.spdy_version(),
            max_content_length: config.max_content_length(),
            memory_threshold: config.memory_threshold(),
            store: config.temp_store().clone(),
            listener: None,
            streams: StreamTable::default(),
        }
    }

    /// Attach an observer notified while multipart request bodies arrive.
    #[must_use]
    pub fn with_progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Number of streams with a head received and a body outstanding.
    #[must_use]
    pub fn active_streams(&self) -> usize { self.streams.len() }

    /// Translate one inbound frame.
    ///
    /// Completed messages are appended to `out.messages`; protocol
    /// violations are answered per stream through `out.replies` and do not
    /// produce an error.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ContentTooLarge`] if an in-memory body would
    /// exceed the configured cap or a spilled body its declared length, or [`DecodeError::Spill`] if a spill file
    /// fails. Either way the stream's state has been discarded and the
    /// decoder is ready for the next frame.
    pub fn decode(&mut self, frame: SpdyFrame, out: &mut DecodeOutput) -> Result<(), DecodeError> {
        metrics::inc_frames(Direction::Inbound);
        match frame {
            SpdyFrame::SynStream(frame) if frame.stream_id.is_server_initiated() => {
                self.on_pushed_stream(frame, out);
                Ok(())
            }
            SpdyFrame::SynStream(frame) => self.on_request_stream(frame, out),
            SpdyFrame::SynReply(frame) => {
                self.on_reply(frame, out);
                Ok(())
            }
            SpdyFrame::Headers(frame) => self.on_headers(frame, out),
            SpdyFrame::Data(frame) => self.on_data(frame, out),
            SpdyFrame::RstStream(frame) => {
                self.on_reset(&frame);
                Ok(())
            }
        }
    }

    /// Discard every stream in flight, deleting any partial spill files.
    /// Returns how many streams were dropped.
    pub fn close(&mut self) -> usize {
        let dropped = self.streams.clear();
        if dropped > 0 {
            debug!("discarded in-flight streams on close: count={dropped}");
        }
        dropped
    }

    fn on_request_stream(
        &mut self,
        frame: SynStreamFrame,
        out: &mut DecodeOutput,
    ) -> Result<(), DecodeError> {
        let stream_id = frame.stream_id;
        if frame.truncated {
            warn!("request header block truncated: stream_id={stream_id}");
            self.reply_error(out, stream_id, StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
            return Ok(());
        }

        let mut head = match parse_request(self.version, frame.headers) {
            Ok(head) => head,
            Err(e) => {
                warn!("rejecting request: stream_id={stream_id}, reason={e}");
                self.reply_error(out, stream_id, StatusCode::BAD_REQUEST);
                return Ok(());
            }
        };
        head.set_stream_id(Some(stream_id));

        if frame.last {
            head.set_content_length(0);
            debug!("request complete on open: stream_id={stream_id}");
            out.messages.push(InboundMessage::Full(FullMessage::new(head)));
            return Ok(());
        }

        let (body, observed) = match self.prepare_body(stream_id, &head) {
            Ok(prepared) => prepared,
            Err(e) => {
                reset(out, stream_id, RstStatus::InternalError);
                return Err(e);
            }
        };
        let mut state = StreamState::new(head, body);
        state.observed = observed;
        self.streams.insert(stream_id, state);
        debug!("request stream opened: stream_id={stream_id}");
        Ok(())
    }

    /// Choose the body mode of a multipart request from its declared length.
    fn prepare_body(
        &self,
        stream_id: StreamId,
        head: &MessageHead,
    ) -> Result<(StreamBody, bool), DecodeError> {
        let Some(request) = head.as_request().filter(|request| request.is_multipart()) else {
            return Ok((StreamBody::Unset, false));
        };
        let Some(declared) = request
            .content_length()
            .filter(|declared| *declared > self.memory_threshold)
        else {
            if let Some(listener) = &self.listener {
                listener.upload_started(request);
            }
            return Ok((StreamBody::Unset, self.listener.is_some()));
        };

        let spill = BodySpill::create(&self.store, request, self.listener.clone())
            .map_err(|source| DecodeError::Spill { stream_id, source })?;
        info!(
            "spilling request body to disk: stream_id={stream_id}, path={}",
            spill.path().display()
        );
        metrics::inc_spilled_bodies();
        Ok((StreamBody::Disk { spill, declared }, false))
    }

    fn on_pushed_stream(&mut self, frame: SynStreamFrame, out: &mut DecodeOutput) {
        let stream_id = frame.stream_id;
        if frame.associated_to.is_none() {
            warn!("pushed stream without associated stream: stream_id={stream_id}");
            reset(out, stream_id, RstStatus::InvalidStream);
            return;
        }

        let mut headers = frame.headers;
        let Some(url) = headers.take(self.version.url_field()) else {
            warn!("pushed stream without url: stream_id={stream_id}");
            reset(out, stream_id, RstStatus::ProtocolError);
            return;
        };
        if frame.truncated {
            warn!("pushed stream header block truncated: stream_id={stream_id}");
            reset(out, stream_id, RstStatus::InternalError);
            return;
        }

        let mut head = match parse_response(self.version, headers) {
            Ok(head) => head,
            Err(e) => {
                warn!("rejecting pushed stream: stream_id={stream_id}, reason={e}");
                reset(out, stream_id, RstStatus::ProtocolError);
                return;
            }
        };
        head.set_stream_id(Some(stream_id));
        let ext = head.headers_mut();
        ext.set(ASSOCIATED_TO_STREAM_ID, frame.associated_to.to_string());
        ext.set(PRIORITY, frame.priority.to_string());
        ext.set(URL, url);
        self.open_response(stream_id, head, frame.last, out);
    }

    fn on_reply(&mut self, frame: SynReplyFrame, out: &mut DecodeOutput) {
        let stream_id = frame.stream_id;
        if frame.truncated {
            warn!("reply header block truncated: stream_id={stream_id}");
            reset(out, stream_id, RstStatus::InternalError);
            return;
        }
        let mut head = match parse_response(self.version, frame.headers) {
            Ok(head) => head,
            Err(e) => {
                warn!("rejecting reply: stream_id={stream_id}, reason={e}");
                reset(out, stream_id, RstStatus::ProtocolError);
                return;
            }
        };
        head.set_stream_id(Some(stream_id));
        self.open_response(stream_id, head, frame.last, out);
    }

    fn open_response(
        &mut self,
        stream_id: StreamId,
        mut head: MessageHead,
        last: bool,
        out: &mut DecodeOutput,
    ) {
        if last {
            head.set_content_length(0);
            out.messages.push(InboundMessage::Full(FullMessage::new(head)));
        } else {
            self.streams
                .insert(stream_id, StreamState::new(head, StreamBody::Unset));
        }
    }

    fn on_headers(&mut self, frame: HeadersFrame, out: &mut DecodeOutput) -> Result<(), DecodeError> {
        let stream_id = frame.stream_id;
        let Some(state) = self.streams.get_mut(stream_id) else {
            debug!("discarding headers for unknown stream: stream_id={stream_id}");
            return Ok(());
        };
        if frame.truncated {
            warn!("dropping truncated trailing headers: stream_id={stream_id}");
            state.truncated_headers = true;
        } else {
            let mut fields = frame.headers;
            strip_extension_headers(&mut fields);
            fields.remove(TRANSFER_ENCODING);
            if matches!(state.head, MessageHead::Response(_)) {
                fields.remove(TRAILER);
            }
            state.head.headers_mut().extend_from(&fields);
        }
        if frame.last {
            self.complete_stream(stream_id, out)?;
        }
        Ok(())
    }

    fn on_data(&mut self, frame: DataFrame, out: &mut DecodeOutput) -> Result<(), DecodeError> {
        let stream_id = frame.stream_id;
        let limit = self.max_content_length;
        let Some(state) = self.streams.get_mut(stream_id) else {
            debug!(
                "discarding data for unknown stream: stream_id={stream_id}, len={}",
                frame.data.len()
            );
            return Ok(());
        };

        let appended = match &mut state.body {
            StreamBody::Disk { spill, declared } => {
                append_on_disk(stream_id, spill, *declared, &frame.data)
            }
            StreamBody::Memory(buffer) => append_in_memory(stream_id, buffer, &frame.data, limit),
            StreamBody::Unset => {
                let mut buffer = BytesMut::new();
                let appended = append_in_memory(stream_id, &mut buffer, &frame.data, limit);
                state.body = StreamBody::Memory(buffer);
                appended
            }
        };

        match appended {
            Ok(()) => {
                if state.observed
                    && let Some(listener) = &self.listener
                {
                    listener.bytes_written(frame.data.len() as u64);
                }
            }
            Err(e) => {
                self.streams.remove(stream_id);
                if matches!(e, DecodeError::Spill { .. }) {
                    reset(out, stream_id, RstStatus::InternalError);
                }
                return Err(e);
            }
        }

        if frame.last {
            self.complete_stream(stream_id, out)?;
        }
        Ok(())
    }

    fn on_reset(&mut self, frame: &RstStreamFrame) {
        if self.streams.remove(frame.stream_id).is_some() {
            metrics::inc_streams_reset();
            debug!(
                "stream reset by peer: stream_id={}, status={:?}",
                frame.stream_id, frame.status
            );
        }
    }

    /// Remove the stream and emit its message.
    fn complete_stream(&mut self, stream_id: StreamId, out: &mut DecodeOutput) -> Result<(), DecodeError> {
        let Some(state) = self.streams.remove(stream_id) else {
            return Ok(());
        };
        let StreamState {
            mut head,
            body,
            truncated_headers,
            observed,
        } = state;
        if truncated_headers {
            debug!("stream completed without its truncated trailers: stream_id={stream_id}");
        }
        if observed && let Some(listener) = &self.listener {
            listener.upload_finished();
        }

        let message = match body {
            StreamBody::Unset => {
                head.set_content_length(0);
                InboundMessage::Full(FullMessage::new(head))
            }
            StreamBody::Memory(body) => {
                head.set_content_length(body.len() as u64);
                InboundMessage::Full(FullMessage { head, body })
            }
            StreamBody::Disk { spill, .. } => {
                let written = spill.bytes_written();
                let file = match spill.finish() {
                    Ok(file) => file,
                    Err(source) => {
                        reset(out, stream_id, RstStatus::InternalError);
                        return Err(DecodeError::Spill { stream_id, source });
                    }
                };
                head.set_content_length(written);
                info!(
                    "spilled request body complete: stream_id={stream_id}, bytes={written}, path={}",
                    file.path().display()
                );
                InboundMessage::Spilled(SpilledMessage::new(head, file))
            }
        };
        debug!("stream complete: stream_id={stream_id}");
        out.messages.push(message);
        Ok(())
    }

    /// Answer a client stream with an HTTP/1.0 error response.
    fn reply_error(&self, out: &mut DecodeOutput, stream_id: StreamId, status: StatusCode) {
        metrics::inc_protocol_violations();
        let mut reply = SynReplyFrame::new(stream_id);
        reply.last = true;
        reply
            .headers
            .add(self.version.status_field(), message::status_text(status));
        reply
            .headers
            .add(self.version.version_field(), message::version_text(Version::HTTP_10));
        out.replies.push(reply.into());
    }
}

#[cfg(test)]
impl SpdyHttpDecoder {
    pub(super) fn stream_body_mut(&mut self, stream_id: StreamId) -> Option<&mut StreamBody> {
        self.streams.get_mut(stream_id).map(|state| &mut state.body)
    }
}

impl std::fmt::Debug for SpdyHttpDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpdyHttpDecoder")
            .field("version", &self.version)
            .field("max_content_length", &self.max_content_length)
            .field("memory_threshold", &self.memory_threshold)
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

fn reset(out: &mut DecodeOutput, stream_id: StreamId, status: RstStatus) {
    metrics::inc_protocol_violations();
    out.replies.push(RstStreamFrame::new(stream_id, status).into());
}

/// Append `data` unless the body would grow past `limit`.
fn append_in_memory(
    stream_id: StreamId,
    buffer: &mut BytesMut,
    data: &[u8],
    limit: NonZeroUsize,
) -> Result<(), DecodeError> {
    let Some(new_len) = buffer.len().checked_add(data.len()) else {
        return Err(DecodeError::ContentTooLarge {
            stream_id,
            attempted: usize::MAX,
            limit: limit.get(),
        });
    };
    if new_len > limit.get() {
        return Err(DecodeError::ContentTooLarge {
            stream_id,
            attempted: new_len,
            limit: limit.get(),
        });
    }
    buffer.extend_from_slice(data);
    Ok(())
}

/// Write `data` to the spill unless the file would outgrow `declared`.
fn append_on_disk(
    stream_id: StreamId,
    spill: &mut BodySpill,
    declared: u64,
    data: &[u8],
) -> Result<(), DecodeError> {
    let attempted = spill.bytes_written().saturating_add(data.len() as u64);
    if attempted > declared {
        warn!(
            "spilled body overran its declared length: stream_id={stream_id}, declared={declared}, attempted={attempted}"
        );
        return Err(DecodeError::ContentTooLarge {
            stream_id,
            attempted: usize::try_from(attempted).unwrap_or(usize::MAX),
            limit: usize::try_from(declared).unwrap_or(usize::MAX),
        });
    }
    spill
        .write(data)
        .map_err(|source| DecodeError::Spill { stream_id, source })?;
    metrics::add_spilled_bytes(data.len() as u64);
    Ok(())
}

fn parse_request(version: SpdyVersion, mut fields: Headers) -> Result<MessageHead, HeadError> {
    let method = fields
        .take(version.method_field())
        .ok_or(HeadError::Missing("method"))?;
    let method =
        Method::from_bytes(method.trim().as_bytes()).map_err(|_| HeadError::Malformed("method"))?;
    let uri = fields
        .take(version.url_field())
        .filter(|uri| !uri.trim().is_empty())
        .ok_or(HeadError::Missing("url"))?;
    let http_version = fields
        .take(version.version_field())
        .ok_or(HeadError::Missing("version"))?;
    let http_version =
        message::parse_version(&http_version).ok_or(HeadError::Malformed("version"))?;
    fields.remove(version.scheme_field());
    let host = version.host_field().and_then(|name| fields.take(name));
    strip_extension_headers(&mut fields);
    validate_fields(&fields)?;

    let mut request = RequestHead::new(method, uri, http_version);
    if let Some(host) = host {
        request.headers.set(HOST, host);
    }
    request.headers.extend_from(&fields);
    request.headers.remove(TRANSFER_ENCODING);

    let mut head = MessageHead::Request(request);
    head.set_keep_alive();
    Ok(head)
}

fn parse_response(version: SpdyVersion, mut fields: Headers) -> Result<MessageHead, HeadError> {
    let status = fields
        .take(version.status_field())
        .ok_or(HeadError::Missing("status"))?;
    let status = message::parse_status(&status).ok_or(HeadError::Malformed("status"))?;
    let http_version = fields
        .take(version.version_field())
        .ok_or(HeadError::Missing("version"))?;
    let http_version =
        message::parse_version(&http_version).ok_or(HeadError::Malformed("version"))?;
    strip_extension_headers(&mut fields);
    validate_fields(&fields)?;

    let mut response = ResponseHead::new(status, http_version);
    response.headers.extend_from(&fields);
    response.headers.remove(TRANSFER_ENCODING);
    response.headers.remove(TRAILER);

    let mut head = MessageHead::Response(response);
    head.set_keep_alive();
    Ok(head)
}

/// Drop extension headers a peer may have smuggled into the block.
fn strip_extension_headers(fields: &mut Headers) {
    for name in EXTENSION_HEADERS {
        fields.remove(name);
    }
}

fn validate_fields(fields: &Headers) -> Result<(), HeadError> {
    for (name, value) in fields.iter() {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            return Err(HeadError::InvalidField(name.to_owned()));
        }
    }
    Ok(())
}
