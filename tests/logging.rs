//! Tests for the log records emitted on per-stream events.

use log::Level;
use rstest::rstest;
use spillframe::{
    codec::{DecodeOutput, SpdyHttpDecoder},
    config::BridgeConfig,
    message::HttpContent,
    writer::{ChunkedWriter, Payload},
};
use spillframe_testing::{
    LoggerHandle,
    RecordingSink,
    ScriptedChunkSource,
    TempDirGuard,
    frames,
    logger,
    temp_dir,
};

fn decoder(dir: &TempDirGuard) -> SpdyHttpDecoder {
    let config = BridgeConfig::builder()
        .temp_dir(dir.path())
        .max_content_length(32)
        .build()
        .expect("valid config");
    SpdyHttpDecoder::new(&config)
}

#[rstest]
fn truncated_request_logs_warning(mut logger: LoggerHandle, temp_dir: TempDirGuard) {
    let mut decoder = decoder(&temp_dir);
    let mut open = frames::request(9, "GET", "/", true);
    open.truncated = true;
    decoder
        .decode(open.into(), &mut DecodeOutput::new())
        .expect("answered");
    assert!(logger.contains(Level::Warn, "request header block truncated: stream_id=9"));
}

#[rstest]
fn spill_logs_start_and_finish(mut logger: LoggerHandle, temp_dir: TempDirGuard) {
    let mut decoder = decoder(&temp_dir);
    let mut out = DecodeOutput::new();
    decoder
        .decode(frames::multipart_upload(1, "/up", 40), &mut out)
        .expect("open");
    decoder
        .decode(frames::data(1, vec![0u8; 40], true), &mut out)
        .expect("data");

    let messages = logger.messages();
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("spilling request body to disk: stream_id=1"))
    );
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("spilled request body complete: stream_id=1, bytes=40"))
    );
}

#[rstest]
fn unknown_stream_data_is_logged_not_failed(mut logger: LoggerHandle, temp_dir: TempDirGuard) {
    let mut decoder = decoder(&temp_dir);
    decoder
        .decode(frames::data(77, &b"stray"[..], false), &mut DecodeOutput::new())
        .expect("ignored");
    assert!(logger.contains(Level::Debug, "discarding data for unknown stream: stream_id=77"));
}

#[rstest]
fn failing_chunk_source_is_reported(mut logger: LoggerHandle) {
    let source = ScriptedChunkSource::new();
    source.push_failure("backing store vanished");
    let mut writer = ChunkedWriter::new(RecordingSink::<HttpContent>::new());
    let mut handle = writer.enqueue(Payload::chunks(source));
    writer.flush();

    assert!(matches!(handle.try_result(), Some(Err(_))));
    assert!(logger.contains(Level::Warn, "chunk source failed"));
}
