//! Bridge configuration.
//!
//! [`BridgeConfig`] is created through [`BridgeConfigBuilder`], which
//! validates limits before any connection uses them. The builder derives
//! `Deserialize` so hosts can embed it in their own configuration files.

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    frame::{SpdyVersion, UnsupportedVersion},
    spill::TempStore,
};

/// Default in-memory body cap: 1 MiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 1024 * 1024;
/// Default payload cap for encoded `DATA` frames.
pub const DEFAULT_MAX_DATA_FRAME_LEN: usize = 8 * 1024;
/// Largest payload a SPDY `DATA` frame can carry (24-bit length).
pub const MAX_DATA_FRAME_LEN: usize = 0x00ff_ffff;

/// Errors returned when building a [`BridgeConfig`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    UnsupportedVersion(#[from] UnsupportedVersion),
    /// A size limit was zero.
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
    /// The spill threshold would let in-memory bodies exceed the cap.
    #[error("memory threshold {threshold} exceeds max content length {limit}")]
    ThresholdAboveLimit { threshold: u64, limit: usize },
    /// The encoded frame cap does not fit the 24-bit length field.
    #[error("max data frame length {0} exceeds {MAX_DATA_FRAME_LEN}")]
    DataFrameTooLarge(usize),
    /// The temporary directory does not exist or is not a directory.
    #[error("temporary directory {} is not available", .0.display())]
    TempDirUnavailable(PathBuf),
}

/// Validated settings shared by every connection of a server.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    spdy_version: SpdyVersion,
    max_content_length: NonZeroUsize,
    memory_threshold: u64,
    max_data_frame_len: NonZeroUsize,
    scheme: Option<String>,
    temp_store: TempStore,
}

impl BridgeConfig {
    /// Start building a configuration from defaults.
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder { BridgeConfigBuilder::default() }

    #[must_use]
    pub const fn spdy_version(&self) -> SpdyVersion { self.spdy_version }

    /// Largest body kept in memory before the stream is rejected.
    #[must_use]
    pub const fn max_content_length(&self) -> NonZeroUsize { self.max_content_length }

    /// Declared multipart lengths above this value are spilled to disk.
    #[must_use]
    pub const fn memory_threshold(&self) -> u64 { self.memory_threshold }

    /// Largest payload placed in one encoded `DATA` frame.
    #[must_use]
    pub const fn max_data_frame_len(&self) -> NonZeroUsize { self.max_data_frame_len }

    /// Scheme stamped on decoded requests as `X-Scheme`, if any.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> { self.scheme.as_deref() }

    /// Store used for spill files.
    #[must_use]
    pub fn temp_store(&self) -> &TempStore { &self.temp_store }

    #[must_use]
    pub fn temp_dir(&self) -> &Path { self.temp_store.dir() }
}

/// Builder for [`BridgeConfig`].
///
/// # Examples
///
/// ```no_run
/// use spillframe::config::BridgeConfig;
///
/// let config = BridgeConfig::builder()
///     .spdy_version(3)
///     .max_content_length(2 * 1024 * 1024)
///     .memory_threshold(1024 * 1024)
///     .temp_dir("/var/tmp/uploads")
///     .build()?;
/// assert_eq!(config.memory_threshold(), 1024 * 1024);
/// # Ok::<(), spillframe::config::ConfigError>(())
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfigBuilder {
    spdy_version: u8,
    max_content_length: usize,
    memory_threshold: Option<u64>,
    temp_dir: Option<PathBuf>,
    max_data_frame_len: usize,
    scheme: Option<String>,
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self {
            spdy_version: 3,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            memory_threshold: None,
            temp_dir: None,
            max_data_frame_len: DEFAULT_MAX_DATA_FRAME_LEN,
            scheme: None,
        }
    }
}

impl BridgeConfigBuilder {
    /// SPDY revision spoken on the connection (2 or 3).
    #[must_use]
    pub fn spdy_version(mut self, version: u8) -> Self {
        self.spdy_version = version;
        self
    }

    /// Cap on bodies accumulated in memory.
    #[must_use]
    pub fn max_content_length(mut self, bytes: usize) -> Self {
        self.max_content_length = bytes;
        self
    }

    /// Spill threshold; defaults to the max content length.
    #[must_use]
    pub fn memory_threshold(mut self, bytes: u64) -> Self {
        self.memory_threshold = Some(bytes);
        self
    }

    /// Directory for spill files; defaults to the system temp directory.
    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Payload cap for encoded `DATA` frames.
    #[must_use]
    pub fn max_data_frame_len(mut self, bytes: usize) -> Self {
        self.max_data_frame_len = bytes;
        self
    }

    /// Stamp decoded requests with `X-Scheme: <scheme>`.
    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn build(self) -> Result<BridgeConfig, ConfigError> {
        let spdy_version = SpdyVersion::try_from(self.spdy_version)?;
        let max_content_length = NonZeroUsize::new(self.max_content_length).ok_or(
            ConfigError::ZeroLimit {
                field: "max_content_length",
            },
        )?;
        let max_data_frame_len = NonZeroUsize::new(self.max_data_frame_len).ok_or(
            ConfigError::ZeroLimit {
                field: "max_data_frame_len",
            },
        )?;
        if self.max_data_frame_len > MAX_DATA_FRAME_LEN {
            return Err(ConfigError::DataFrameTooLarge(self.max_data_frame_len));
        }

        let limit = self.max_content_length as u64;
        let memory_threshold = self.memory_threshold.unwrap_or(limit);
        if memory_threshold > limit {
            return Err(ConfigError::ThresholdAboveLimit {
                threshold: memory_threshold,
                limit: self.max_content_length,
            });
        }

        let temp_dir = self.temp_dir.unwrap_or_else(std::env::temp_dir);
        if !temp_dir.is_dir() {
            return Err(ConfigError::TempDirUnavailable(temp_dir));
        }

        Ok(BridgeConfig {
            spdy_version,
            max_content_length,
            memory_threshold,
            max_data_frame_len,
            scheme: self.scheme,
            temp_store: TempStore::new(temp_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{BridgeConfig, ConfigError};
    use crate::frame::{SpdyVersion, UnsupportedVersion};

    #[test]
    fn defaults_are_valid() {
        let config = BridgeConfig::builder().build().expect("default config");
        assert_eq!(config.spdy_version(), SpdyVersion::V3);
        assert_eq!(config.memory_threshold(), 1024 * 1024);
        assert_eq!(config.scheme(), None);
    }

    #[rstest]
    #[case::zero_content(BridgeConfig::builder().max_content_length(0), ConfigError::ZeroLimit { field: "max_content_length" })]
    #[case::zero_frame(BridgeConfig::builder().max_data_frame_len(0), ConfigError::ZeroLimit { field: "max_data_frame_len" })]
    #[case::huge_frame(BridgeConfig::builder().max_data_frame_len(1 << 24), ConfigError::DataFrameTooLarge(1 << 24))]
    #[case::version(BridgeConfig::builder().spdy_version(4), ConfigError::UnsupportedVersion(UnsupportedVersion(4)))]
    #[case::threshold(
        BridgeConfig::builder().max_content_length(10).memory_threshold(11),
        ConfigError::ThresholdAboveLimit { threshold: 11, limit: 10 }
    )]
    fn invalid_settings_are_rejected(
        #[case] builder: super::BridgeConfigBuilder,
        #[case] expected: ConfigError,
    ) {
        assert_eq!(builder.build().expect_err("config should be rejected"), expected);
    }

    #[test]
    fn missing_temp_dir_is_rejected() {
        let missing = std::env::temp_dir().join(format!("spillframe-missing-{}", uuid::Uuid::new_v4()));
        let err = BridgeConfig::builder()
            .temp_dir(&missing)
            .build()
            .expect_err("missing dir");
        assert_eq!(err, ConfigError::TempDirUnavailable(missing));
    }
}
