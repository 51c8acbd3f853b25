//! Translation between SPDY frames and HTTP messages.
//!
//! [`SpdyHttpDecoder`] rebuilds messages from the frames of multiplexed
//! streams, keeping per-stream state until each stream's last frame. Bodies
//! stay in memory up to a cap, or go straight to disk for large multipart
//! uploads. [`SpdyHttpEncoder`] performs the reverse mapping for outbound
//! heads, bodies and streamed content.
//!
//! Protocol violations never surface as errors: they are answered with an
//! error reply or a stream reset and only the offending stream is dropped.

mod decoder;
mod encoder;
pub mod error;
mod table;

pub use decoder::{DecodeOutput, SpdyHttpDecoder};
pub use encoder::SpdyHttpEncoder;
pub use error::{DecodeError, EncodeError};
