//! Metric helpers for `spillframe`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. With the `metrics`
//! feature disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking translated frames.
pub const FRAMES_PROCESSED: &str = "spillframe_frames_processed_total";
/// Name of the counter tracking streams cancelled by `RST_STREAM`.
pub const STREAMS_RESET: &str = "spillframe_streams_reset_total";
/// Name of the counter tracking protocol violations answered per stream.
pub const PROTOCOL_VIOLATIONS: &str = "spillframe_protocol_violations_total";
/// Name of the counter tracking bodies written to disk.
pub const BODIES_SPILLED: &str = "spillframe_bodies_spilled_total";
/// Name of the counter tracking body bytes written to disk.
pub const BYTES_SPILLED: &str = "spillframe_bytes_spilled_total";
/// Name of the counter tracking writes failed because the sink closed.
pub const WRITES_ABORTED: &str = "spillframe_writes_aborted_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames decoded from the peer.
    Inbound,
    /// Frames encoded for the peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a translated frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a stream cancelled by the peer.
pub fn inc_streams_reset() {
    #[cfg(feature = "metrics")]
    counter!(STREAMS_RESET).increment(1);
}

/// Record a protocol violation answered with a reset or error reply.
pub fn inc_protocol_violations() {
    #[cfg(feature = "metrics")]
    counter!(PROTOCOL_VIOLATIONS).increment(1);
}

/// Record a body redirected to disk.
pub fn inc_spilled_bodies() {
    #[cfg(feature = "metrics")]
    counter!(BODIES_SPILLED).increment(1);
}

/// Record body bytes written to disk.
pub fn add_spilled_bytes(count: u64) {
    #[cfg(feature = "metrics")]
    counter!(BYTES_SPILLED).increment(count);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a queued write failed because the connection closed.
pub fn inc_writes_aborted() {
    #[cfg(feature = "metrics")]
    counter!(WRITES_ABORTED).increment(1);
}
