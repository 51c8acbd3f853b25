//! Per-connection composition of the translation stages.
//!
//! [`SpdyHttpBridge`] owns the inbound half: it feeds frames to the decoder,
//! tags decoded requests and records their stream ids for correlation. The
//! outbound half is a [`FramingSink`], which encodes whatever the
//! [`ChunkedWriter`](crate::writer::ChunkedWriter) hands it into frames for
//! the transport.

use std::{io, sync::Arc};

use log::{debug, info};

use crate::{
    codec::{DecodeError, DecodeOutput, SpdyHttpDecoder, SpdyHttpEncoder},
    config::BridgeConfig,
    correlation::StreamIdCorrelator,
    frame::{SpdyFrame, StreamId},
    message::{InboundMessage, MessageHead, OutboundItem},
    spill::ProgressListener,
    writer::OutboundSink,
};

/// Header stamped on decoded requests when a scheme is configured.
pub const SCHEME_TAG: &str = "X-Scheme";

/// Inbound translation and reply correlation for one connection.
///
/// # Examples
///
/// ```
/// use spillframe::{
///     bridge::SpdyHttpBridge,
///     codec::DecodeOutput,
///     config::BridgeConfig,
///     frame::{StreamId, SynStreamFrame},
///     message::{FullMessage, OutboundItem, ResponseHead},
/// };
///
/// let config = BridgeConfig::builder().build()?;
/// let mut bridge = SpdyHttpBridge::new(&config);
///
/// let mut open = SynStreamFrame::new(StreamId(5), StreamId::NONE, 0);
/// open.last = true;
/// open.headers.add(":method", "GET");
/// open.headers.add(":path", "/");
/// open.headers.add(":version", "HTTP/1.1");
///
/// let mut out = DecodeOutput::new();
/// bridge.on_frame(open.into(), &mut out)?;
///
/// let mut reply = OutboundItem::from(FullMessage::new(ResponseHead::new(
///     http::StatusCode::OK,
///     http::Version::HTTP_11,
/// )));
/// assert_eq!(bridge.prepare_outbound(&mut reply), Some(StreamId(5)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct SpdyHttpBridge {
    decoder: SpdyHttpDecoder,
    correlator: StreamIdCorrelator,
    scheme: Option<String>,
}

impl SpdyHttpBridge {
    #[must_use]
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            decoder: SpdyHttpDecoder::new(config),
            correlator: StreamIdCorrelator::new(),
            scheme: config.scheme().map(str::to_owned),
        }
    }

    /// Attach an observer for multipart request bodies.
    #[must_use]
    pub fn with_progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.decoder = self.decoder.with_progress_listener(listener);
        self
    }

    #[must_use]
    pub fn decoder(&self) -> &SpdyHttpDecoder { &self.decoder }

    #[must_use]
    pub fn correlator(&self) -> &StreamIdCorrelator { &self.correlator }

    /// Translate one inbound frame and record any completed messages.
    ///
    /// A reset also removes its stream from the correlation queue, so a
    /// reply already in preparation is not tagged with a dead stream.
    ///
    /// # Errors
    ///
    /// Propagates [`DecodeError`] from the decoder. Messages completed
    /// before the failure remain in `out` and are already recorded.
    pub fn on_frame(&mut self, frame: SpdyFrame, out: &mut DecodeOutput) -> Result<(), DecodeError> {
        if let SpdyFrame::RstStream(reset) = &frame {
            self.correlator.observe_reset(reset.stream_id);
        }
        let start = out.messages.len();
        let result = self.decoder.decode(frame, out);
        for message in &mut out.messages[start..] {
            self.tag_scheme(message);
            self.correlator.observe_inbound(message);
        }
        result
    }

    /// Tag an outbound message with the stream of the oldest unanswered
    /// request. Content and raw frames pass through untouched.
    ///
    /// Returns the stream id taken from the queue, if any.
    pub fn prepare_outbound(&mut self, item: &mut OutboundItem) -> Option<StreamId> {
        match item {
            OutboundItem::Message(message) => self.correlator.stamp_outbound(message),
            OutboundItem::Head(head) => self.correlator.stamp_outbound(head),
            OutboundItem::Content(_) | OutboundItem::Frame(_) => None,
        }
    }

    /// Tear the connection down: drop partial bodies and pending replies.
    ///
    /// Returns how many in-flight streams were discarded.
    pub fn close(&mut self) -> usize {
        let dropped = self.decoder.close();
        let unanswered = self.correlator.pending_len();
        self.correlator.clear();
        info!("bridge closed: streams_dropped={dropped}, replies_unsent={unanswered}");
        dropped
    }

    fn tag_scheme(&self, message: &mut InboundMessage) {
        let Some(scheme) = self.scheme.as_deref() else {
            return;
        };
        if let MessageHead::Request(_) = message.head() {
            message.head_mut().headers_mut().set(SCHEME_TAG, scheme);
        }
    }
}

/// Encodes outbound items into frames for an inner frame sink.
///
/// Writability and activity are those of the inner sink, so flow control
/// applies to the frames actually leaving the connection. An item the
/// encoder rejects surfaces as an [`io::ErrorKind::InvalidInput`] write
/// error and fails only that item.
#[derive(Debug)]
pub struct FramingSink<T> {
    encoder: SpdyHttpEncoder,
    inner: T,
    frames: Vec<SpdyFrame>,
}

impl<T> FramingSink<T>
where
    T: OutboundSink<Item = SpdyFrame>,
{
    #[must_use]
    pub fn new(config: &BridgeConfig, inner: T) -> Self {
        Self {
            encoder: SpdyHttpEncoder::new(config),
            inner,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &T { &self.inner }

    pub fn inner_mut(&mut self) -> &mut T { &mut self.inner }

    #[must_use]
    pub fn into_inner(self) -> T { self.inner }
}

impl<T> OutboundSink for FramingSink<T>
where
    T: OutboundSink<Item = SpdyFrame>,
{
    type Item = OutboundItem;

    fn is_writable(&self) -> bool { self.inner.is_writable() }

    fn is_active(&self) -> bool { self.inner.is_active() }

    fn write(&mut self, item: OutboundItem) -> io::Result<()> {
        self.frames.clear();
        if let Err(e) = self.encoder.encode(item, &mut self.frames) {
            debug!("outbound item rejected by encoder: {e}");
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e));
        }
        for frame in self.frames.drain(..) {
            self.inner.write(frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{StatusCode, Version};
    use rstest::{fixture, rstest};
    use spillframe_testing::TempDirGuard;

    use super::*;
    use crate::{
        frame::{DataFrame, RstStatus, RstStreamFrame, SynStreamFrame},
        message::{FullMessage, HttpContent, ResponseHead, STREAM_ID},
        writer::{BytesChunkSource, ChunkedWriter, Payload},
    };

    #[derive(Debug, Default)]
    struct Frames {
        sent: Vec<SpdyFrame>,
        blocked: bool,
    }

    impl OutboundSink for Frames {
        type Item = SpdyFrame;

        fn is_writable(&self) -> bool { !self.blocked }

        fn is_active(&self) -> bool { true }

        fn write(&mut self, frame: SpdyFrame) -> io::Result<()> {
            self.sent.push(frame);
            Ok(())
        }
    }

    #[fixture]
    fn temp_dir() -> TempDirGuard { TempDirGuard::new() }

    fn config(dir: &TempDirGuard, scheme: Option<&str>) -> BridgeConfig {
        let mut builder = BridgeConfig::builder()
            .temp_dir(dir.path())
            .max_data_frame_len(4);
        if let Some(scheme) = scheme {
            builder = builder.scheme(scheme);
        }
        builder.build().expect("valid config")
    }

    fn get(id: u32) -> SpdyFrame {
        let mut open = SynStreamFrame::new(StreamId(id), StreamId::NONE, 0);
        open.last = true;
        open.headers.add(":method", "GET");
        open.headers.add(":path", "/");
        open.headers.add(":version", "HTTP/1.1");
        open.into()
    }

    fn reply() -> OutboundItem {
        FullMessage::new(ResponseHead::new(StatusCode::OK, Version::HTTP_11)).into()
    }

    #[rstest]
    fn replies_follow_request_order(temp_dir: TempDirGuard) {
        let mut bridge = SpdyHttpBridge::new(&config(&temp_dir, None));
        let mut out = DecodeOutput::new();
        for id in [1, 3, 5] {
            bridge.on_frame(get(id), &mut out).expect("decode");
        }
        assert_eq!(bridge.correlator().pending_len(), 3);

        let stamped: Vec<_> = (0..3)
            .map(|_| bridge.prepare_outbound(&mut reply()))
            .collect();
        assert_eq!(stamped, [Some(StreamId(1)), Some(StreamId(3)), Some(StreamId(5))]);
    }

    #[rstest]
    fn reset_removes_stream_from_queue(temp_dir: TempDirGuard) {
        let mut bridge = SpdyHttpBridge::new(&config(&temp_dir, None));
        let mut out = DecodeOutput::new();
        bridge.on_frame(get(1), &mut out).expect("decode");
        bridge.on_frame(get(3), &mut out).expect("decode");
        bridge
            .on_frame(
                RstStreamFrame::new(StreamId(1), RstStatus::Cancel).into(),
                &mut out,
            )
            .expect("reset");

        let mut item = reply();
        assert_eq!(bridge.prepare_outbound(&mut item), Some(StreamId(3)));
        let OutboundItem::Message(message) = item else {
            panic!("expected message");
        };
        assert_eq!(message.head.headers().get(STREAM_ID), Some("3"));
    }

    #[rstest]
    #[case(Some("https"), Some("https"))]
    #[case(None, None)]
    fn scheme_tag_applied_to_requests(
        temp_dir: TempDirGuard,
        #[case] scheme: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let mut bridge = SpdyHttpBridge::new(&config(&temp_dir, scheme));
        let mut out = DecodeOutput::new();
        bridge.on_frame(get(1), &mut out).expect("decode");
        assert_eq!(out.messages[0].head().headers().get(SCHEME_TAG), expected);
    }

    #[rstest]
    fn content_items_are_not_correlated(temp_dir: TempDirGuard) {
        let mut bridge = SpdyHttpBridge::new(&config(&temp_dir, None));
        let mut out = DecodeOutput::new();
        bridge.on_frame(get(1), &mut out).expect("decode");
        let mut content = OutboundItem::Content(HttpContent::last(Bytes::new()));
        assert_eq!(bridge.prepare_outbound(&mut content), None);
        assert_eq!(bridge.correlator().pending_len(), 1);
    }

    #[rstest]
    fn close_discards_streams_and_queue(temp_dir: TempDirGuard) {
        let mut bridge = SpdyHttpBridge::new(&config(&temp_dir, None));
        let mut out = DecodeOutput::new();
        bridge.on_frame(get(1), &mut out).expect("decode");
        let mut open = SynStreamFrame::new(StreamId(3), StreamId::NONE, 0);
        open.headers.add(":method", "POST");
        open.headers.add(":path", "/upload");
        open.headers.add(":version", "HTTP/1.1");
        bridge.on_frame(open.into(), &mut out).expect("decode");

        assert_eq!(bridge.close(), 1);
        assert_eq!(bridge.decoder().active_streams(), 0);
        assert_eq!(bridge.correlator().pending_len(), 0);
    }

    #[rstest]
    fn framing_sink_encodes_writer_output(temp_dir: TempDirGuard) {
        let config = config(&temp_dir, None);
        let mut writer = ChunkedWriter::new(FramingSink::new(&config, Frames::default()));
        let mut head = MessageHead::from(ResponseHead::new(StatusCode::OK, Version::HTTP_11));
        head.set_stream_id(Some(StreamId(7)));
        writer.enqueue(Payload::Item(OutboundItem::Head(head)));
        let mut body = writer.enqueue(Payload::chunks(BytesChunkSource::new(
            &b"abcdef"[..],
            std::num::NonZeroUsize::new(6).expect("non-zero"),
        )));
        writer.flush();

        assert_eq!(body.try_result().expect("done").expect("ok"), 6);
        let sent = &writer.sink().inner().sent;
        assert!(matches!(&sent[0], SpdyFrame::SynReply(reply) if !reply.last));
        assert_eq!(
            sent[1..],
            [
                SpdyFrame::from(DataFrame::new(StreamId(7), &b"abcd"[..])),
                SpdyFrame::from(DataFrame::new(StreamId(7), &b"ef"[..]).into_last()),
            ]
        );
    }

    #[rstest]
    fn framing_sink_follows_inner_writability(temp_dir: TempDirGuard) {
        let config = config(&temp_dir, None);
        let mut sink = FramingSink::new(&config, Frames::default());
        assert!(sink.is_writable());
        sink.inner_mut().blocked = true;
        assert!(!sink.is_writable());
    }

    #[rstest]
    fn framing_sink_rejects_unencodable_items(temp_dir: TempDirGuard) {
        let config = config(&temp_dir, None);
        let mut sink = FramingSink::new(&config, Frames::default());
        let err = sink
            .write(OutboundItem::Content(HttpContent::Chunk(Bytes::from_static(b"x"))))
            .expect_err("no open stream");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(sink.into_inner().sent.is_empty());
    }
}
