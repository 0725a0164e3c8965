//! Streaming channel writer.
//!
//! One [`ChannelWriter`] owns one channel: its raw sample buffer, RED codec
//! scratch, and the metadata/data/index file trio of the current segment.
//! Samples accumulate until a timestamp discontinuity or the block interval
//! forces a flush; every flushed block lands in the data file with exactly
//! one index entry, and the metadata file plus all three universal headers
//! are rewritten in place so on-disk state always reflects the last block.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::codec::RedCodec;
use crate::error::{MefError, Result};
use crate::globals;
use crate::header::{
    MefFile, UniversalHeader, SEGMENT_DIRECTORY_TYPE, TIME_NO_ENTRY,
    TIME_SERIES_CHANNEL_DIRECTORY_TYPE, TIME_SERIES_DATA_FILE_TYPE,
    TIME_SERIES_INDICES_FILE_TYPE, TIME_SERIES_METADATA_FILE_TYPE,
};
use crate::manifest;
use crate::metadata::{
    SegmentMetadata, TimeSeriesIndex, LEVEL_1_ENCRYPTION, LEVEL_2_ENCRYPTION,
    METADATA_FILE_BYTES, METADATA_RECORDING_DURATION_NO_ENTRY, NO_ENCRYPTION,
    TIME_SERIES_INDEX_BYTES,
};
use crate::reader;
use crate::types::{ChannelConfig, TimeOffsetMode};
use crate::utils::{generate_uuid, process_passwords, segment_base_name, session_location};
use crate::DISCONTINUITY_TIME_THRESHOLD;

/// Streaming writer for one MEF 3.0 time-series channel.
///
/// # Write workflow
///
/// 1. Create the channel with [`create`](Self::create) (or extend an
///    existing session with [`append`](Self::append))
/// 2. Feed `(timestamp, sample)` runs to [`write`](Self::write), pre-sorted
///    in non-decreasing time order. The writer never reorders input, and
///    unordered packets surface as spurious discontinuities
/// 3. Optionally [`flush`](Self::flush) at quiet points
/// 4. [`close`](Self::close) to emit trailing samples and finalize headers
///
/// # Examples
///
/// ```rust
/// use mef3::{ChannelConfig, ChannelWriter};
///
/// let dir = tempfile::tempdir()?;
/// let config = ChannelConfig {
///     channel_name: "ecog-01".to_string(),
///     sampling_frequency: 1000.0,
///     secs_per_block: 1.0,
///     block_interval: 1_000_000,
///     ..ChannelConfig::default()
/// };
/// let mut writer = ChannelWriter::create(dir.path().join("demo"), config)?;
///
/// let times: Vec<i64> = (0..1000).map(|i| 946_684_800_000_000 + i * 1000).collect();
/// let samples: Vec<i32> = (0..1000).map(|i| (i % 200 - 100) * 50).collect();
/// writer.write(&times, &samples, 1.0, 1000.0)?;
/// writer.close()?;
/// # Ok::<(), mef3::MefError>(())
/// ```
pub struct ChannelWriter {
    metadata_file: MefFile,
    data_file: MefFile,
    index_file: MefFile,
    metadata: SegmentMetadata,

    codec: RedCodec,
    raw_buffer: Vec<i32>,

    // block state machine
    block_hdr_time: Option<i64>,
    block_boundary: i64,
    last_timestamp: i64,
    discontinuity_flag: bool,
    bit_shift: bool,
    block_len: u64,

    // per-segment cursors
    start_sample: i64,
    contiguous_blocks: i64,
    contiguous_samples: i64,
    contiguous_bytes: i64,

    // segment scheduling
    num_secs_per_segment: u64,
    next_segment_start_time: Option<i64>,
    segment_number: i32,
    channel_name: String,
    channel_path: PathBuf,

    gmt_offset_hours: f64,
    appending: bool,
}

impl ChannelWriter {
    /// Creates a new channel inside `session_dir` (suffix optional; the
    /// session directory `<name>.mefd` is derived from it) and opens its
    /// first segment.
    ///
    /// The session, channel, and segment directories are created as
    /// needed, all three segment files are written with fresh universal
    /// headers (new file UUIDs sharing one level UUID), and, unless a
    /// level 2 password marks the session as encrypted, the channel is
    /// registered in the session manifest.
    ///
    /// # Errors
    ///
    /// * [`MefError::PasswordPolicy`]: level 2 without level 1, or equal
    ///   passwords
    /// * [`MefError::Io`]: directory or file creation failed
    pub fn create<P: AsRef<Path>>(session_dir: P, config: ChannelConfig) -> Result<Self> {
        let pwd = process_passwords(
            config.level_1_password.as_deref(),
            config.level_2_password.as_deref(),
        )?;
        let encrypted = pwd.is_some();

        let (session_path, session_name) = session_location(session_dir.as_ref())?;
        let channel_path = session_path.join(format!(
            "{}.{}",
            config.channel_name, TIME_SERIES_CHANNEL_DIRECTORY_TYPE
        ));
        let segment_name = segment_base_name(&config.channel_name, 0);
        let segment_path =
            channel_path.join(format!("{}.{}", segment_name, SEGMENT_DIRECTORY_TYPE));
        fs::create_dir_all(&segment_path)?;

        let metadata = SegmentMetadata {
            section_2_encryption: if encrypted { LEVEL_1_ENCRYPTION } else { NO_ENCRYPTION },
            section_3_encryption: if encrypted { LEVEL_2_ENCRYPTION } else { NO_ENCRYPTION },
            channel_description: config.channel_description.clone(),
            session_description: config.session_description.clone(),
            recording_duration: METADATA_RECORDING_DURATION_NO_ENTRY,
            sampling_frequency: config.sampling_frequency,
            low_frequency_filter_setting: config.low_frequency_filter_setting,
            high_frequency_filter_setting: config.high_frequency_filter_setting,
            notch_filter_frequency_setting: config.notch_filter_frequency_setting,
            ac_line_frequency: config.ac_line_frequency,
            units_conversion_factor: config.units_conversion_factor,
            units_description: config.units_description.clone(),
            maximum_native_sample_value: f64::NAN,
            minimum_native_sample_value: f64::NAN,
            start_sample: 0,
            number_of_samples: 0,
            number_of_blocks: 0,
            maximum_block_bytes: 0,
            maximum_block_samples: 0,
            maximum_difference_bytes: 0,
            block_interval: config.block_interval,
            number_of_discontinuities: 0,
            maximum_contiguous_blocks: 0,
            maximum_contiguous_block_bytes: 0,
            maximum_contiguous_samples: 0,
            acquisition_channel_number: config.acquisition_channel_number,
            recording_time_offset: globals::recording_time_offset().unwrap_or(0),
            gmt_offset: (config.gmt_offset_hours * 3600.0) as i32,
            subject_name_1: config.subject_first_name.clone(),
            subject_name_2: config.subject_second_name.clone(),
            subject_id: config.subject_id.clone(),
            recording_location: config.recording_location.clone(),
        };

        let mut template = UniversalHeader::new(TIME_SERIES_METADATA_FILE_TYPE);
        template.segment_number = 0;
        template.session_name = session_name.clone();
        template.channel_name = config.channel_name.clone();
        template.anonymized_name = config.anonymized_name.clone();
        template.level_uuid = generate_uuid();
        if let Some(pwd) = &pwd {
            template.level_1_password_validation = pwd.level_1_validation;
            template.level_2_password_validation = pwd.level_2_validation;
        }
        let (metadata_file, data_file, index_file) =
            open_segment_trio(&segment_path, &segment_name, &template, &metadata)?;

        // 2x margin absorbs sample-rate drift and residual samples
        let max_samples = buffer_samples(config.secs_per_block, config.sampling_frequency);

        if !encrypted {
            manifest::register_channel(
                &session_path,
                &session_name,
                &config.channel_name,
                &config.anonymized_name,
            )?;
        }

        debug!(
            channel = %config.channel_name,
            session = %session_name,
            "initialized channel"
        );

        Ok(ChannelWriter {
            metadata_file,
            data_file,
            index_file,
            metadata,
            codec: RedCodec::new(max_samples),
            raw_buffer: Vec::with_capacity(max_samples),
            block_hdr_time: None,
            block_boundary: 0,
            last_timestamp: 0,
            discontinuity_flag: true, // first block is by definition discontinuous
            bit_shift: config.bit_shift,
            block_len: 0,
            start_sample: 0,
            contiguous_blocks: 0,
            contiguous_samples: 0,
            contiguous_bytes: 0,
            num_secs_per_segment: config.num_secs_per_segment,
            next_segment_start_time: None,
            segment_number: 0,
            channel_name: config.channel_name,
            channel_path,
            gmt_offset_hours: config.gmt_offset_hours,
            appending: false,
        })
    }

    /// Opens segment `new_segment_number` of an existing channel, seeding
    /// it from segment `new_segment_number - 1`'s metadata: channel
    /// parameters, subject identity, and time offsets carry forward, and
    /// the new segment's start sample continues where the last ended.
    ///
    /// # Errors
    ///
    /// * [`MefError::InvalidSegmentNumber`]: `new_segment_number <= 0`
    /// * [`MefError::PasswordPolicy`]: invalid password pair
    /// * [`MefError::Io`] / [`MefError::InvalidFormat`]: prior segment
    ///   missing or malformed
    #[allow(clippy::too_many_arguments)]
    pub fn append<P: AsRef<Path>>(
        session_dir: P,
        channel_name: &str,
        new_segment_number: i32,
        level_1_password: Option<&str>,
        level_2_password: Option<&str>,
        num_secs_per_segment: u64,
        bit_shift: bool,
    ) -> Result<Self> {
        if new_segment_number <= 0 {
            return Err(MefError::InvalidSegmentNumber(new_segment_number));
        }
        let pwd = process_passwords(level_1_password, level_2_password)?;
        let encrypted = pwd.is_some();

        let (session_path, _session_name) = session_location(session_dir.as_ref())?;
        let channel_path = session_path.join(format!(
            "{}.{}",
            channel_name, TIME_SERIES_CHANNEL_DIRECTORY_TYPE
        ));
        let prev_name = segment_base_name(channel_name, new_segment_number - 1);
        let prev_metadata_path = channel_path
            .join(format!("{}.{}", prev_name, SEGMENT_DIRECTORY_TYPE))
            .join(format!("{}.{}", prev_name, TIME_SERIES_METADATA_FILE_TYPE));
        let (prev_header, prev_metadata) = reader::read_segment_metadata(&prev_metadata_path)?;

        // the session already owns its offsets; adopt them
        globals::install_offsets(prev_metadata.recording_time_offset, prev_metadata.gmt_offset);

        let mut metadata = prev_metadata;
        metadata.reset_for_new_segment();
        metadata.section_2_encryption = if encrypted { LEVEL_1_ENCRYPTION } else { NO_ENCRYPTION };
        metadata.section_3_encryption = if encrypted { LEVEL_2_ENCRYPTION } else { NO_ENCRYPTION };

        let segment_name = segment_base_name(channel_name, new_segment_number);
        let segment_path =
            channel_path.join(format!("{}.{}", segment_name, SEGMENT_DIRECTORY_TYPE));
        fs::create_dir_all(&segment_path)?;

        let mut template = UniversalHeader::new(TIME_SERIES_METADATA_FILE_TYPE);
        template.segment_number = new_segment_number;
        template.session_name = prev_header.session_name.clone();
        template.channel_name = prev_header.channel_name.clone();
        template.anonymized_name = prev_header.anonymized_name.clone();
        template.level_uuid = generate_uuid();
        if let Some(pwd) = &pwd {
            template.level_1_password_validation = pwd.level_1_validation;
            template.level_2_password_validation = pwd.level_2_validation;
        }
        let (metadata_file, data_file, index_file) =
            open_segment_trio(&segment_path, &segment_name, &template, &metadata)?;

        let max_samples = buffer_samples(
            metadata.block_interval as f64 / 1e6,
            metadata.sampling_frequency,
        );

        debug!(
            channel = channel_name,
            segment = new_segment_number,
            start_sample = metadata.start_sample,
            "appending new segment"
        );

        Ok(ChannelWriter {
            metadata_file,
            data_file,
            index_file,
            metadata,
            codec: RedCodec::new(max_samples),
            raw_buffer: Vec::with_capacity(max_samples),
            block_hdr_time: None,
            block_boundary: 0,
            last_timestamp: 0,
            discontinuity_flag: true, // first block is by definition discontinuous
            bit_shift,
            block_len: 0,
            start_sample: 0,
            contiguous_blocks: 0,
            contiguous_samples: 0,
            contiguous_bytes: 0,
            num_secs_per_segment,
            next_segment_start_time: None,
            segment_number: new_segment_number,
            channel_name: channel_name.to_string(),
            channel_path,
            gmt_offset_hours: f64::from(globals::gmt_offset_seconds()) / 3600.0,
            appending: true,
        })
    }

    /// Ingests a run of `(timestamp, sample)` pairs.
    ///
    /// Timestamps are microseconds since the Unix epoch and must arrive in
    /// non-decreasing order across calls; the writer does not sort. A gap
    /// of [`DISCONTINUITY_TIME_THRESHOLD`](crate::DISCONTINUITY_TIME_THRESHOLD)
    /// or more between consecutive samples forces the buffered block out
    /// and marks the next block discontinuous; otherwise blocks flush on a
    /// phase-locked schedule every `block_interval` microseconds.
    ///
    /// `sampling_frequency` is restored into metadata on every call, since the
    /// true rate is sometimes only known once data arrives.
    ///
    /// Calling with empty slices is a no-op.
    pub fn write(
        &mut self,
        packet_times: &[i64],
        samples: &[i32],
        secs_per_block: f64,
        sampling_frequency: f64,
    ) -> Result<()> {
        if packet_times.len() != samples.len() {
            return Err(MefError::InvalidFormat(format!(
                "{} packet times but {} samples",
                packet_times.len(),
                samples.len()
            )));
        }
        if packet_times.is_empty() {
            return Ok(());
        }

        self.metadata.sampling_frequency = sampling_frequency;
        self.block_len = (secs_per_block * sampling_frequency).ceil() as u64;
        let block_interval = self.metadata.block_interval;

        for (&t, &s) in packet_times.iter().zip(samples) {
            // block_hdr_time is the actual time written into the block
            // header; block_boundary only schedules which samples fall in
            // which block and never reaches the file
            if self.block_hdr_time.is_none() {
                self.block_hdr_time = Some(t);
                self.block_boundary = t;
            }

            let discontinuity_gap = (t - self.last_timestamp).abs() >= DISCONTINUITY_TIME_THRESHOLD;
            if discontinuity_gap || t - self.block_boundary >= block_interval {
                // data might not exist yet if this is the first sample
                if !self.raw_buffer.is_empty() {
                    self.emit_block()?;
                }
                if discontinuity_gap {
                    self.discontinuity_flag = true;
                    self.block_boundary = t;
                } else {
                    self.discontinuity_flag = false;
                    self.block_boundary += block_interval;
                }
                self.block_hdr_time = Some(t);
            }

            self.raw_buffer.push(s);
            self.last_timestamp = t;
        }
        Ok(())
    }

    /// Force-emits any buffered samples as a block. The next block is
    /// marked discontinuous and the block anchor resets, so a following
    /// [`write`](Self::write) starts a fresh block at its first sample.
    /// Calling again with nothing buffered is a no-op.
    pub fn flush(&mut self) -> Result<()> {
        // nothing has ever been written to this channel
        if self.block_len == 0 {
            return Ok(());
        }
        if !self.raw_buffer.is_empty() {
            self.emit_block()?;
        }
        self.discontinuity_flag = true;
        self.block_hdr_time = None;
        self.block_boundary = 0;
        Ok(())
    }

    /// Emits trailing buffered samples, finalizes metadata and all three
    /// universal headers, and closes the segment files.
    pub fn close(mut self) -> Result<()> {
        if !self.raw_buffer.is_empty() {
            self.emit_block()?;
        }
        self.update_metadata()?;
        debug!(
            channel = %self.channel_name,
            segment = self.segment_number,
            samples = self.metadata.number_of_samples,
            blocks = self.metadata.number_of_blocks,
            "closed channel"
        );
        Ok(())
    }

    /// Current segment number (starts at 0, advances on rollover).
    pub fn segment_number(&self) -> i32 {
        self.segment_number
    }

    /// The in-memory metadata image for the current segment.
    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    /// Compresses the buffered samples into one RED block and writes it,
    /// its index entry, and the refreshed metadata/headers.
    fn emit_block(&mut self) -> Result<()> {
        let n = self.raw_buffer.len();
        if n == 0 {
            return Ok(());
        }
        let Some(hdr_time) = self.block_hdr_time else {
            return Ok(());
        };

        // the first block written anywhere in a fresh session fixes the
        // session-wide recording time offset
        if !self.appending && globals::time_offset_mode() == TimeOffsetMode::Apply {
            globals::ensure_recording_time_offset(
                hdr_time,
                (self.gmt_offset_hours * 3600.0) as i32,
            );
        }

        if self.bit_shift {
            // shift 2 bits for 18-bit resolution, rounding half away from zero
            for s in self.raw_buffer.iter_mut() {
                *s = if *s >= 0 {
                    (*s as f64 / 4.0 + 0.5) as i32
                } else {
                    (*s as f64 / 4.0 - 0.5) as i32
                };
            }
        }

        let start_time = globals::apply_recording_time_offset(hdr_time);
        let discontinuity = self.discontinuity_flag;
        self.codec.encode(&self.raw_buffer, start_time, discontinuity)?;
        let block = self.codec.block_header.clone();

        if self.num_secs_per_segment > 0 {
            self.check_for_new_segment(block.start_time)?;
        }

        let data_offset = self.data_file.append_offset;
        self.data_file.append_body(self.codec.compressed_block())?;

        // first block of a fresh channel: pin start times and schedule the
        // first segment boundary
        if self.metadata_file.header.start_time == TIME_NO_ENTRY {
            self.metadata_file.header.start_time = block.start_time;
            self.data_file.header.start_time = block.start_time;
            self.index_file.header.start_time = block.start_time;
            if self.num_secs_per_segment > 0 && self.next_segment_start_time.is_none() {
                let span = self.num_secs_per_segment as i64 * 1_000_000;
                self.next_segment_start_time = Some(match globals::time_offset_mode() {
                    // offset times decrease, so boundaries walk backwards
                    TimeOffsetMode::Apply => block.start_time - span,
                    TimeOffsetMode::Ignore => block.start_time + span,
                });
            }
        }

        let (min_sample, max_sample) = RedCodec::find_extrema(&self.raw_buffer);
        self.metadata.absorb_block(&block, min_sample, max_sample);
        if let Some(offset) = globals::recording_time_offset() {
            self.metadata.recording_time_offset = offset;
        }

        // end time extrapolates one sample period per sample written, then
        // is offset-adjusted for the unencrypted header copies
        let duration_us = ((n as f64 / self.metadata.sampling_frequency) * 1e6 + 0.5) as i64;
        let end_time = globals::apply_recording_time_offset(hdr_time + duration_us);
        self.metadata_file.header.end_time = end_time;
        self.data_file.header.end_time = end_time;
        self.index_file.header.end_time = end_time;
        self.metadata.recording_duration =
            (end_time - self.metadata_file.header.start_time).abs();

        self.data_file.header.number_of_entries += 1;
        self.index_file.header.number_of_entries += 1;
        // for data files this tracks the largest sample count in any block
        if n as i64 > self.data_file.header.maximum_entry_size {
            self.data_file.header.maximum_entry_size = n as i64;
        }

        let index_entry = TimeSeriesIndex {
            file_offset: data_offset as i64,
            start_time: block.start_time,
            start_sample: self.start_sample,
            number_of_samples: block.number_of_samples,
            block_bytes: block.block_bytes,
            maximum_sample_value: max_sample,
            minimum_sample_value: min_sample,
            flags: block.flags,
        };
        self.index_file.append_body(&index_entry.encode())?;

        // contiguous-run accumulators restart at every discontinuity
        if discontinuity {
            self.contiguous_blocks = 1;
            self.contiguous_samples = n as i64;
            self.contiguous_bytes = block.block_bytes as i64;
        } else {
            self.contiguous_blocks += 1;
            self.contiguous_samples += n as i64;
            self.contiguous_bytes += block.block_bytes as i64;
        }
        self.metadata.update_contiguous_maxima(
            self.contiguous_blocks,
            self.contiguous_samples,
            self.contiguous_bytes,
        );

        self.start_sample += n as i64;
        self.raw_buffer.clear();

        trace!(
            samples = n,
            block_bytes = block.block_bytes,
            discontinuity,
            "emitted RED block"
        );

        // keeps on-disk state consistent for readers of live sessions
        self.update_metadata()
    }

    /// Rolls the channel into a new segment when the block about to be
    /// written has crossed the per-segment time budget.
    fn check_for_new_segment(&mut self, start_time: i64) -> Result<()> {
        // still writing the first block of the first segment
        let Some(next) = self.next_segment_start_time else {
            return Ok(());
        };
        let crossed = match globals::time_offset_mode() {
            TimeOffsetMode::Apply => start_time <= next,
            TimeOffsetMode::Ignore => start_time >= next,
        };
        if !crossed {
            return Ok(());
        }

        // finalize the old trio before abandoning it
        self.update_metadata()?;

        self.segment_number += 1;
        let segment_name = segment_base_name(&self.channel_name, self.segment_number);
        let segment_path = self
            .channel_path
            .join(format!("{}.{}", segment_name, SEGMENT_DIRECTORY_TYPE));
        fs::create_dir_all(&segment_path)?;

        // a segment trio shares one level UUID; each segment gets its own
        let mut template = self.metadata_file.header.clone();
        template.segment_number = self.segment_number;
        template.level_uuid = generate_uuid();
        template.start_time = start_time;
        template.end_time = start_time; // overwritten by the next block

        self.metadata.reset_for_new_segment();

        let (metadata_file, data_file, index_file) =
            open_segment_trio(&segment_path, &segment_name, &template, &self.metadata)?;
        // replacing the streams drops (closes) the finalized old files
        self.metadata_file = metadata_file;
        self.data_file = data_file;
        self.index_file = index_file;

        let span = self.num_secs_per_segment as i64 * 1_000_000;
        self.next_segment_start_time = Some(match globals::time_offset_mode() {
            TimeOffsetMode::Apply => next - span,
            TimeOffsetMode::Ignore => next + span,
        });
        self.contiguous_blocks = 0;
        self.contiguous_samples = 0;
        self.contiguous_bytes = 0;
        self.start_sample = 0;

        debug!(
            channel = %self.channel_name,
            segment = self.segment_number,
            start_sample = self.metadata.start_sample,
            "rolled over to new segment"
        );
        Ok(())
    }

    /// Rewrites the metadata file body and refreshes all three universal
    /// headers in place, leaving the data and index cursors at their
    /// append positions.
    fn update_metadata(&mut self) -> Result<()> {
        let body = self.metadata.encode();
        self.metadata_file.rewrite_body(&body)?;
        self.metadata_file.rewrite_header()?;
        self.data_file.rewrite_header()?;
        self.index_file.rewrite_header()?;
        Ok(())
    }
}

/// Raw buffer capacity: two times the nominal samples per block.
fn buffer_samples(secs_per_block: f64, sampling_frequency: f64) -> usize {
    let samples = (secs_per_block * sampling_frequency * 2.0).ceil();
    if samples >= 1.0 {
        samples as usize
    } else {
        1
    }
}

/// Creates a segment's metadata/data/index files from a shared header
/// template, giving each its own file UUID and writing the initial
/// metadata body so the trio is complete on disk from the start.
fn open_segment_trio(
    segment_path: &Path,
    segment_name: &str,
    template: &UniversalHeader,
    metadata: &SegmentMetadata,
) -> Result<(MefFile, MefFile, MefFile)> {
    let mut metadata_header = template.clone();
    metadata_header.file_type = TIME_SERIES_METADATA_FILE_TYPE.to_string();
    metadata_header.file_uuid = generate_uuid();
    metadata_header.provenance_uuid = metadata_header.file_uuid;
    metadata_header.number_of_entries = 1;
    metadata_header.maximum_entry_size = METADATA_FILE_BYTES as i64;
    let metadata_path =
        segment_path.join(format!("{}.{}", segment_name, TIME_SERIES_METADATA_FILE_TYPE));
    let mut metadata_file = MefFile::create(&metadata_path, metadata_header)?;
    metadata_file.rewrite_body(&metadata.encode())?;
    metadata_file.rewrite_header()?;

    let mut data_header = template.clone();
    data_header.file_type = TIME_SERIES_DATA_FILE_TYPE.to_string();
    data_header.file_uuid = generate_uuid();
    data_header.provenance_uuid = data_header.file_uuid;
    data_header.number_of_entries = 0;
    data_header.maximum_entry_size = 0;
    let data_path =
        segment_path.join(format!("{}.{}", segment_name, TIME_SERIES_DATA_FILE_TYPE));
    let data_file = MefFile::create(&data_path, data_header)?;

    let mut index_header = template.clone();
    index_header.file_type = TIME_SERIES_INDICES_FILE_TYPE.to_string();
    index_header.file_uuid = generate_uuid();
    index_header.provenance_uuid = index_header.file_uuid;
    index_header.number_of_entries = 0;
    index_header.maximum_entry_size = TIME_SERIES_INDEX_BYTES as i64;
    let index_path =
        segment_path.join(format!("{}.{}", segment_name, TIME_SERIES_INDICES_FILE_TYPE));
    let index_file = MefFile::create(&index_path, index_header)?;

    Ok((metadata_file, data_file, index_file))
}
