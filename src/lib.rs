#![doc(html_root_url = "https://docs.rs/spillframe/latest")]
//! Public API for the `spillframe` library.
//!
//! This crate translates between SPDY stream frames and HTTP messages. It
//! covers the server side of a connection: reassembling request bodies in
//! memory or on disk, correlating replies with the streams that asked for
//! them, and writing responses under flow control.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod correlation;
pub mod error;
pub mod frame;
pub mod headers;
pub mod message;
pub mod metrics;
pub mod spill;
pub mod writer;

pub use bridge::{FramingSink, SpdyHttpBridge};
pub use codec::{DecodeOutput, SpdyHttpDecoder, SpdyHttpEncoder};
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use correlation::{CorrelatableMessage, StreamIdCorrelator};
pub use error::{Result, SpillframeError};
pub use frame::{SpdyFrame, StreamId};
pub use headers::Headers;
pub use message::{FullMessage, HttpContent, InboundMessage, MessageHead, OutboundItem};
pub use spill::{BodySpill, MultipartSpiller, ProgressListener, SpillFile, TempStore};
pub use writer::{ChunkedWriter, OutboundSink, Payload, WriteError, WriteHandle, WriterDriver};
