//! # MEF 3.0 Streaming Writer for Rust
//!
//! A pure Rust library for writing MEF 3.0 (Multiscale Electrophysiology
//! Format) time-series sessions. Sorted `(timestamp, sample)` streams go
//! in; per-channel, per-segment metadata, RED-compressed data, and index
//! files come out, together with session-level annotation records and an
//! optional channel manifest for third-party viewers.
//!
//! ```rust
//! use mef3::{AnnotationWriter, ChannelConfig, ChannelWriter, RecordBody};
//!
//! let dir = tempfile::tempdir()?;
//! let session = dir.path().join("demo");
//!
//! // stream one channel of samples
//! let config = ChannelConfig {
//!     channel_name: "ecog-01".to_string(),
//!     sampling_frequency: 1000.0,
//!     secs_per_block: 1.0,
//!     block_interval: 1_000_000,
//!     ..ChannelConfig::default()
//! };
//! let mut writer = ChannelWriter::create(&session, config)?;
//! let times: Vec<i64> = (0..2000).map(|i| 946_684_800_000_000 + i * 1000).collect();
//! let samples: Vec<i32> = (0..2000).map(|i| (i % 100) as i32 * 10).collect();
//! writer.write(&times, &samples, 1.0, 1000.0)?;
//! writer.close()?;
//!
//! // drop a note next to the data
//! let mut records = AnnotationWriter::create_or_append(&session, 0.0, "anon")?;
//! records.write_record(946_684_800_500_000, &RecordBody::Note("stim on".into()))?;
//! records.close()?;
//! # Ok::<(), mef3::MefError>(())
//! ```
//!
//! Timestamps are microseconds since the Unix epoch throughout. Input must
//! be pre-sorted in non-decreasing time order per channel; the writer never
//! reorders, and out-of-order packets surface as data discontinuities.
//!
//! Channels are single-writer: drive each [`ChannelWriter`] from one thread
//! at a time. Distinct channels can be written in parallel; the only
//! shared state is the session's recording time offset, which lives behind
//! a mutex (see [`globals`]).

pub mod codec;
pub mod error;
pub mod globals;
pub mod header;
pub mod manifest;
pub mod metadata;
pub mod reader;
pub mod records;
pub mod types;
pub mod utils;
pub mod writer;

// Re-export main types for convenience
pub use error::{MefError, Result};
pub use globals::{set_time_offset_mode, time_offset_mode};
pub use records::AnnotationWriter;
pub use types::{ChannelConfig, CursRecord, EpocRecord, RecordBody, SeizRecord, TimeOffsetMode};
pub use writer::ChannelWriter;

/// Gap between consecutive sample timestamps that forces a discontinuity,
/// in microseconds (0.1 s).
pub const DISCONTINUITY_TIME_THRESHOLD: i64 = 100_000;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
