//! Tests for the flow-controlled writer driven from the outside.
//!
//! They cover ordering under back-pressure, suspension and resumption of
//! lazy bodies, failure isolation, and closure of the connection.

use std::{io, time::Duration};

use bytes::Bytes;
use rstest::{fixture, rstest};
use spillframe::{
    message::HttpContent,
    writer::{ChunkedWriter, Payload, StreamChunkSource, WriteError, WriterDriver},
};
use spillframe_testing::{RecordingSink, ScriptedChunkSource};
use tokio_util::sync::CancellationToken;

#[fixture]
fn sink() -> RecordingSink<HttpContent> { RecordingSink::new() }

fn chunk(data: &'static [u8]) -> HttpContent { HttpContent::Chunk(Bytes::from_static(data)) }

fn last(data: &'static [u8]) -> HttpContent { HttpContent::last(Bytes::from_static(data)) }

#[rstest]
fn back_pressure_preserves_order(sink: RecordingSink<HttpContent>) {
    sink.set_budget(Some(1));
    let mut writer = ChunkedWriter::new(sink.clone());
    let mut first = writer.enqueue(Payload::Item(last(b"one")));
    let mut second = writer.enqueue(Payload::chunks(ScriptedChunkSource::finished([
        &b"tw"[..],
        &b"o"[..],
    ])));
    let mut third = writer.enqueue(Payload::Item(last(b"three")));

    writer.flush();
    assert_eq!(sink.take(), [last(b"one")]);
    assert!(second.try_result().is_none());

    for expected in [chunk(b"tw"), last(b"o"), last(b"three")] {
        sink.set_budget(Some(1));
        writer.writability_changed();
        assert_eq!(sink.take(), [expected]);
    }

    assert_eq!(first.try_result().expect("done").expect("ok"), 0);
    assert_eq!(second.try_result().expect("done").expect("ok"), 3);
    assert_eq!(third.try_result().expect("done").expect("ok"), 0);
}

#[rstest]
fn flush_on_unwritable_sink_is_a_no_op(sink: RecordingSink<HttpContent>) {
    sink.set_writable(false);
    let source = ScriptedChunkSource::finished([&b"x"[..]]);
    let mut writer = ChunkedWriter::new(sink.clone());
    writer.enqueue(Payload::chunks(source.clone()));
    writer.flush();
    assert!(sink.is_empty());
    assert_eq!(source.pulls(), 0);
}

#[rstest]
fn suspended_source_blocks_later_items_until_resumed(sink: RecordingSink<HttpContent>) {
    let source = ScriptedChunkSource::new();
    source.push(&b"head"[..]);
    let mut writer = ChunkedWriter::new(sink.clone());
    let mut transfer = writer.enqueue(Payload::chunks(source.clone()));
    let mut after = writer.enqueue(Payload::Item(last(b"after")));

    writer.flush();
    assert_eq!(sink.take(), [chunk(b"head")]);
    assert!(after.try_result().is_none());

    writer.resume_transfer();
    assert!(sink.is_empty());

    source.push(&b"tail"[..]);
    source.finish();
    writer.resume_transfer();
    assert_eq!(sink.take(), [last(b"tail"), last(b"after")]);
    assert_eq!(transfer.try_result().expect("done").expect("ok"), 8);
    assert_eq!(transfer.progress(), 8);
    assert!(after.try_result().expect("done").is_ok());
}

#[rstest]
fn source_failure_is_isolated(sink: RecordingSink<HttpContent>) {
    let failing = ScriptedChunkSource::new();
    failing.push(&b"partial"[..]);
    failing.push_failure("disk gone");
    let mut writer = ChunkedWriter::new(sink.clone());
    let mut broken = writer.enqueue(Payload::chunks(failing.clone()));
    let mut healthy = writer.enqueue(Payload::chunks(ScriptedChunkSource::finished([&b"ok"[..]])));
    writer.flush();

    let err = broken.try_result().expect("done").expect_err("failed");
    assert!(matches!(&err, WriteError::Source(e) if e.to_string() == "disk gone"));
    assert_eq!(broken.progress(), 7);
    assert!(failing.is_closed());
    assert_eq!(healthy.try_result().expect("done").expect("ok"), 2);
    assert_eq!(sink.take(), [chunk(b"partial"), last(b"ok")]);
}

#[rstest]
fn sink_failure_fails_the_item_and_closes_its_source(sink: RecordingSink<HttpContent>) {
    let source = ScriptedChunkSource::finished([&b"a"[..], &b"b"[..]]);
    sink.fail_next_write();
    let mut writer = ChunkedWriter::new(sink.clone());
    let mut handle = writer.enqueue(Payload::chunks(source.clone()));
    writer.flush();
    assert!(matches!(handle.try_result(), Some(Err(WriteError::Sink(_)))));
    assert!(source.is_closed());
    assert!(sink.is_empty());
}

#[rstest]
fn closed_connection_fails_queue_and_writes_nothing_more(sink: RecordingSink<HttpContent>) {
    let slow = ScriptedChunkSource::new();
    slow.push(&b"first"[..]);
    let mut writer = ChunkedWriter::new(sink.clone());
    let mut transfer = writer.enqueue(Payload::chunks(slow.clone()));
    let mut queued = writer.enqueue(Payload::Item(last(b"never")));
    writer.flush();
    assert_eq!(sink.take(), [chunk(b"first")]);

    sink.set_active(false);
    slow.push(&b"second"[..]);
    writer.resume_transfer();

    assert!(sink.is_empty());
    assert!(transfer.try_result().expect("done").expect_err("closed").is_closed());
    assert!(queued.try_result().expect("done").expect_err("closed").is_closed());
    assert!(slow.is_closed());
    assert_eq!(writer.pending_len(), 0);

    let mut late = writer.enqueue(Payload::Item(last(b"late")));
    writer.flush();
    assert!(late.try_result().expect("done").expect_err("closed").is_closed());
    assert!(sink.is_empty());
}

#[rstest]
fn finished_source_succeeds_even_after_closure(sink: RecordingSink<HttpContent>) {
    let drained = ScriptedChunkSource::new();
    drained.finish();
    let mut writer = ChunkedWriter::new(sink.clone());
    let mut handle = writer.enqueue(Payload::chunks(drained));
    sink.set_active(false);
    writer.connection_inactive();
    assert_eq!(handle.try_result().expect("done").expect("ok"), 0);
}

#[rstest]
#[tokio::test]
async fn driver_serialises_producers(sink: RecordingSink<HttpContent>) {
    let shutdown = CancellationToken::new();
    let (driver, handle) = WriterDriver::new(sink.clone(), 4, shutdown.clone());
    let task = tokio::spawn(driver.run());

    let mut producers = Vec::new();
    for name in [&b"a"[..], &b"b"[..]] {
        let handle = handle.clone();
        producers.push(tokio::spawn(async move {
            let mut handles = Vec::new();
            for _ in 0..3 {
                handles.push(
                    handle
                        .write_and_flush(Payload::Item(HttpContent::last(Bytes::from_static(name))))
                        .await
                        .expect("queued"),
                );
            }
            for done in handles {
                done.wait().await.expect("written");
            }
        }));
    }
    for producer in producers {
        producer.await.expect("producer");
    }
    drop(handle);
    task.await.expect("driver");

    let written = sink.take();
    assert_eq!(written.len(), 6);
    for name in [&b"a"[..], &b"b"[..]] {
        assert_eq!(written.iter().filter(|item| item.data() == name).count(), 3);
    }
}

#[rstest]
#[tokio::test]
async fn stream_source_resumes_itself(sink: RecordingSink<HttpContent>) {
    let shutdown = CancellationToken::new();
    let (driver, handle) = WriterDriver::new(sink.clone(), 4, shutdown.clone());
    let task = tokio::spawn(driver.run());

    let body = Box::pin(async_stream::stream! {
        for part in ["al", "pha", "bet"] {
            tokio::time::sleep(Duration::from_millis(5)).await;
            yield Ok::<_, io::Error>(Bytes::from_static(part.as_bytes()));
        }
    });
    let source = StreamChunkSource::new(body, handle.resume_handle());
    let done = handle
        .write_and_flush(Payload::chunks(source))
        .await
        .expect("queued");
    let written = tokio::time::timeout(Duration::from_secs(5), done.wait())
        .await
        .expect("transfer finished in time")
        .expect("written");
    assert_eq!(written, 8);

    shutdown.cancel();
    task.await.expect("driver");
    let body: Vec<u8> = sink
        .take()
        .iter()
        .flat_map(|item| item.data().to_vec())
        .collect();
    assert_eq!(body, b"alphabet");
}

#[rstest]
#[tokio::test]
async fn stream_error_fails_transfer(sink: RecordingSink<HttpContent>) {
    let shutdown = CancellationToken::new();
    let (driver, handle) = WriterDriver::new(sink.clone(), 4, shutdown.clone());
    let task = tokio::spawn(driver.run());

    let body = Box::pin(async_stream::stream! {
        yield Ok(Bytes::from_static(b"ok"));
        yield Err(io::Error::new(io::ErrorKind::UnexpectedEof, "producer died"));
    });
    let source = StreamChunkSource::new(body, handle.resume_handle());
    let done = handle
        .write_and_flush(Payload::chunks(source))
        .await
        .expect("queued");
    let err = done.wait().await.expect_err("stream failed");
    assert!(matches!(err, WriteError::Source(_)));

    shutdown.cancel();
    task.await.expect("driver");
    assert_eq!(sink.take(), [chunk(b"ok")]);
}
