//! End-to-end tests for one connection: frames in, messages out, replies
//! correlated and framed back onto the right streams.

use std::{fs, num::NonZeroUsize, sync::Arc};

use bytes::Bytes;
use http::{StatusCode, Version};
use rstest::{fixture, rstest};
use spillframe::{
    bridge::{FramingSink, SpdyHttpBridge},
    codec::{DecodeError, DecodeOutput},
    config::BridgeConfig,
    frame::{RstStatus, SpdyFrame, StreamId},
    message::{
        CONTENT_LENGTH,
        FullMessage,
        InboundMessage,
        MessageHead,
        OutboundItem,
        ResponseHead,
        STREAM_ID,
    },
    writer::{ChunkedWriter, FileChunkSource, Payload},
};
use spillframe_testing::{
    ProgressEvent,
    RecordingProgress,
    RecordingSink,
    TempDirGuard,
    frames,
    temp_dir,
};

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

fn config(dir: &TempDirGuard) -> BridgeConfig {
    BridgeConfig::builder()
        .temp_dir(dir.path())
        .max_content_length(MIB)
        .memory_threshold(MIB as u64)
        .max_data_frame_len(64 * KIB)
        .build()
        .expect("valid config")
}

struct Connection {
    bridge: SpdyHttpBridge,
    out: DecodeOutput,
}

impl Connection {
    fn feed(&mut self, frame: SpdyFrame) -> Result<(), DecodeError> { self.bridge.on_frame(frame, &mut self.out) }

    fn take_messages(&mut self) -> Vec<InboundMessage> { std::mem::take(&mut self.out.messages) }
}

#[fixture]
fn progress() -> Arc<RecordingProgress> { Arc::new(RecordingProgress::new()) }

fn connection(dir: &TempDirGuard, progress: &Arc<RecordingProgress>) -> Connection {
    Connection {
        bridge: SpdyHttpBridge::new(&config(dir)).with_progress_listener(progress.clone()),
        out: DecodeOutput::new(),
    }
}

fn ok_reply() -> OutboundItem {
    FullMessage::with_body(ResponseHead::new(StatusCode::OK, Version::HTTP_11), b"done").into()
}

#[rstest]
fn large_upload_spills_and_reply_reaches_its_stream(
    temp_dir: TempDirGuard,
    progress: Arc<RecordingProgress>,
) {
    let mut conn = connection(&temp_dir, &progress);
    let body_len = 2 * MIB;
    conn.feed(frames::multipart_upload(1, "/upload", body_len as u64))
        .expect("open");
    for index in 0..4 {
        let chunk = Bytes::from(vec![b'a' + index; body_len / 4]);
        conn.feed(frames::data(1, chunk, index == 3)).expect("data");
    }

    let mut messages = conn.take_messages();
    assert_eq!(messages.len(), 1);
    let InboundMessage::Spilled(upload) = messages.remove(0) else {
        panic!("expected a spilled upload");
    };
    assert_eq!(
        upload.head().headers().get(CONTENT_LENGTH),
        Some("2097152")
    );
    assert_eq!(upload.head().stream_id(), Some(StreamId(1)));
    assert_eq!(
        fs::metadata(upload.path()).expect("spill file").len(),
        body_len as u64
    );
    assert_eq!(progress.total_bytes(), body_len as u64);
    assert_eq!(progress.events().last(), Some(&ProgressEvent::Finished));

    let mut reply = ok_reply();
    assert_eq!(conn.bridge.prepare_outbound(&mut reply), Some(StreamId(1)));

    let frames_out = RecordingSink::new();
    let mut writer = ChunkedWriter::new(FramingSink::new(&config(&temp_dir), frames_out.clone()));
    let mut written = writer.enqueue(Payload::Item(reply));
    writer.flush();
    assert!(written.try_result().expect("done").is_ok());

    let sent = frames_out.items();
    assert!(sent.iter().all(|frame| frame.stream_id() == StreamId(1)));
    assert!(sent.last().is_some_and(SpdyFrame::is_last));

    drop(upload);
    assert_eq!(temp_dir.file_count(), 0);
}

#[rstest]
fn spilled_body_can_be_streamed_back(temp_dir: TempDirGuard, progress: Arc<RecordingProgress>) {
    let mut conn = connection(&temp_dir, &progress);
    conn.feed(frames::multipart_upload(3, "/echo", (MIB + 10) as u64))
        .expect("open");
    conn.feed(frames::data(3, vec![7u8; MIB + 10], true))
        .expect("data");
    let InboundMessage::Spilled(upload) = conn.take_messages().remove(0) else {
        panic!("expected a spilled upload");
    };

    let mut item = OutboundItem::Head(MessageHead::from(ResponseHead::new(
        StatusCode::OK,
        Version::HTTP_11,
    )));
    conn.bridge.prepare_outbound(&mut item);
    let OutboundItem::Head(head) = item else {
        panic!("head passes through as a head");
    };
    assert_eq!(head.headers().get(STREAM_ID), Some("3"));

    let frames_out = RecordingSink::new();
    let mut writer = ChunkedWriter::new(FramingSink::new(&config(&temp_dir), frames_out.clone()));
    writer.enqueue(Payload::Item(OutboundItem::Head(head)));
    let source = FileChunkSource::open(upload.path(), NonZeroUsize::new(256 * KIB).expect("non-zero"))
        .expect("open spill");
    let mut body = writer.enqueue(Payload::chunks(source));
    writer.flush();

    assert_eq!(
        body.try_result().expect("done").expect("ok"),
        (MIB + 10) as u64
    );
    let data_len: usize = frames_out
        .items()
        .iter()
        .filter_map(|frame| match frame {
            SpdyFrame::Data(data) => Some(data.data.len()),
            _ => None,
        })
        .sum();
    assert_eq!(data_len, MIB + 10);
}

#[rstest]
fn interleaved_streams_complete_independently(
    temp_dir: TempDirGuard,
    progress: Arc<RecordingProgress>,
) {
    let mut conn = connection(&temp_dir, &progress);
    conn.feed(frames::post(1, "/a", 6)).expect("open 1");
    conn.feed(frames::post(3, "/b", 3)).expect("open 3");
    conn.feed(frames::data(1, &b"abc"[..], false)).expect("data 1");
    conn.feed(frames::data(3, &b"xyz"[..], true)).expect("data 3");
    conn.feed(frames::get(5, "/c")).expect("open 5");
    conn.feed(frames::data(1, &b"def"[..], true)).expect("data 1");

    let bodies: Vec<_> = conn
        .take_messages()
        .into_iter()
        .map(|message| match message {
            InboundMessage::Full(full) => (full.head.stream_id(), full.body.freeze()),
            InboundMessage::Spilled(_) => panic!("small bodies stay in memory"),
        })
        .collect();
    assert_eq!(
        bodies,
        [
            (Some(StreamId(3)), Bytes::from_static(b"xyz")),
            (Some(StreamId(5)), Bytes::new()),
            (Some(StreamId(1)), Bytes::from_static(b"abcdef")),
        ]
    );

    let order: Vec<_> = (0..3)
        .map(|_| conn.bridge.prepare_outbound(&mut ok_reply()))
        .collect();
    assert_eq!(order, [Some(StreamId(3)), Some(StreamId(5)), Some(StreamId(1))]);
    assert!(progress.events().is_empty());
}

#[rstest]
fn reset_during_spill_removes_partial_file(
    temp_dir: TempDirGuard,
    progress: Arc<RecordingProgress>,
) {
    let mut conn = connection(&temp_dir, &progress);
    conn.feed(frames::multipart_upload(1, "/upload", 2 * MIB as u64))
        .expect("open");
    conn.feed(frames::data(1, vec![0u8; MIB], false)).expect("data");
    assert_eq!(temp_dir.file_count(), 1);

    conn.feed(frames::reset(1, RstStatus::Cancel)).expect("reset");
    assert_eq!(temp_dir.file_count(), 0);
    assert_eq!(conn.bridge.decoder().active_streams(), 0);

    conn.feed(frames::data(1, vec![0u8; MIB], true))
        .expect("late data is ignored");
    assert!(conn.take_messages().is_empty());
}

#[rstest]
fn reset_of_answered_stream_keeps_later_replies_aligned(
    temp_dir: TempDirGuard,
    progress: Arc<RecordingProgress>,
) {
    let mut conn = connection(&temp_dir, &progress);
    conn.feed(frames::get(1, "/slow")).expect("open 1");
    conn.feed(frames::get(3, "/fast")).expect("open 3");
    conn.feed(frames::reset(1, RstStatus::Cancel)).expect("reset");

    assert_eq!(conn.bridge.prepare_outbound(&mut ok_reply()), Some(StreamId(3)));
    assert_eq!(conn.bridge.prepare_outbound(&mut ok_reply()), None);
}

#[rstest]
fn oversized_memory_body_is_rejected_without_poisoning_connection(
    temp_dir: TempDirGuard,
    progress: Arc<RecordingProgress>,
) {
    let mut conn = connection(&temp_dir, &progress);
    conn.feed(frames::post(1, "/big", (MIB + 1) as u64)).expect("open");
    let err = conn
        .feed(frames::data(1, vec![0u8; MIB + 1], true))
        .expect_err("too large");
    assert!(matches!(
        err,
        DecodeError::ContentTooLarge {
            stream_id: StreamId(1),
            limit: MIB,
            ..
        }
    ));

    conn.feed(frames::get(3, "/next")).expect("open 3");
    let messages = conn.take_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].head().stream_id(), Some(StreamId(3)));
}

#[rstest]
fn truncated_request_is_answered_on_its_stream(
    temp_dir: TempDirGuard,
    progress: Arc<RecordingProgress>,
) {
    let mut conn = connection(&temp_dir, &progress);
    let mut open = frames::request(7, "GET", "/", true);
    open.truncated = true;
    conn.feed(open.into()).expect("answered, not failed");

    assert!(conn.take_messages().is_empty());
    let [SpdyFrame::SynReply(reply)] = conn.out.replies.as_slice() else {
        panic!("expected one reply, got {:?}", conn.out.replies);
    };
    assert_eq!(reply.stream_id, StreamId(7));
    assert!(reply.last);
    assert_eq!(
        reply.headers.get(":status"),
        Some("431 Request Header Fields Too Large")
    );
    assert_eq!(conn.bridge.correlator().pending_len(), 0);
}

#[rstest]
fn close_sweeps_in_flight_spills(temp_dir: TempDirGuard, progress: Arc<RecordingProgress>) {
    let mut conn = connection(&temp_dir, &progress);
    conn.feed(frames::multipart_upload(1, "/a", 2 * MIB as u64))
        .expect("open 1");
    conn.feed(frames::multipart_upload(3, "/b", 2 * MIB as u64))
        .expect("open 3");
    conn.feed(frames::data(3, vec![1u8; KIB], false)).expect("data");
    assert_eq!(temp_dir.file_count(), 2);

    assert_eq!(conn.bridge.close(), 2);
    assert_eq!(temp_dir.file_count(), 0);
}
