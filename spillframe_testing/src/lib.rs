//! Shared fixtures for `spillframe` tests.
//!
//! ```rust
//! use spillframe_testing::{RecordingSink, ScriptedChunkSource, frames};
//!
//! let sink: RecordingSink<spillframe::message::HttpContent> = RecordingSink::new();
//! let source = ScriptedChunkSource::finished([&b"body"[..]]);
//! let open = frames::post(1, "/upload", 4);
//! # let _ = (sink, source, open);
//! ```

pub mod frames;
pub mod logging;
mod progress;
mod sink;
mod source;
mod temp;

pub use logging::{LoggerHandle, logger};
pub use progress::{ProgressEvent, RecordingProgress};
pub use sink::RecordingSink;
pub use source::ScriptedChunkSource;
pub use temp::{TempDirGuard, temp_dir};
