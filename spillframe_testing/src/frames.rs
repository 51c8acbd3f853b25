//! Builders for the inbound frames most tests start from.
//!
//! Header blocks use SPDY/3 field names.

use bytes::Bytes;
use spillframe::frame::{
    DataFrame,
    HeadersFrame,
    RstStatus,
    RstStreamFrame,
    SpdyFrame,
    StreamId,
    SynReplyFrame,
    SynStreamFrame,
};

/// Open a request stream. `last` marks a request without a body.
#[must_use]
pub fn request(id: u32, method: &str, path: &str, last: bool) -> SynStreamFrame {
    let mut open = SynStreamFrame::new(StreamId(id), StreamId::NONE, 0);
    open.last = last;
    open.headers.add(":method", method);
    open.headers.add(":path", path);
    open.headers.add(":version", "HTTP/1.1");
    open.headers.add(":host", "example.com");
    open
}

/// A bodiless GET.
#[must_use]
pub fn get(id: u32, path: &str) -> SpdyFrame { request(id, "GET", path, true).into() }

/// A POST announcing a body of `declared` bytes.
#[must_use]
pub fn post(id: u32, path: &str, declared: u64) -> SpdyFrame {
    let mut open = request(id, "POST", path, false);
    open.headers.add("content-length", declared.to_string());
    open.into()
}

/// A multipart upload announcing a body of `declared` bytes.
#[must_use]
pub fn multipart_upload(id: u32, path: &str, declared: u64) -> SpdyFrame {
    let mut open = request(id, "POST", path, false);
    open.headers.add("content-type", "multipart/form-data; boundary=frontier");
    open.headers.add("content-length", declared.to_string());
    open.into()
}

/// A pushed response on server stream `id` associated with `to`.
#[must_use]
pub fn pushed(id: u32, to: u32, url: &str, last: bool) -> SpdyFrame {
    let mut open = SynStreamFrame::new(StreamId(id), StreamId(to), 3);
    open.unidirectional = true;
    open.last = last;
    open.headers.add(":status", "200 OK");
    open.headers.add(":version", "HTTP/1.1");
    open.headers.add(":path", url);
    open.into()
}

#[must_use]
pub fn reply(id: u32, status: &str, last: bool) -> SpdyFrame {
    let mut reply = SynReplyFrame::new(StreamId(id));
    reply.last = last;
    reply.headers.add(":status", status);
    reply.headers.add(":version", "HTTP/1.1");
    reply.into()
}

#[must_use]
pub fn data(id: u32, payload: impl Into<Bytes>, last: bool) -> SpdyFrame {
    let frame = DataFrame::new(StreamId(id), payload);
    if last { frame.into_last() } else { frame }.into()
}

/// Trailing headers closing stream `id`.
#[must_use]
pub fn trailers(id: u32, fields: &[(&str, &str)]) -> SpdyFrame {
    let mut frame = HeadersFrame::new(StreamId(id));
    frame.last = true;
    for (name, value) in fields {
        frame.headers.add(*name, *value);
    }
    frame.into()
}

#[must_use]
pub fn reset(id: u32, status: RstStatus) -> SpdyFrame { RstStreamFrame::new(StreamId(id), status).into() }
