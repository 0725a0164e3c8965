//! Segment metadata (three fixed sections behind the universal header) and
//! the fixed-width time-series index entry.

use crate::codec::RedBlockHeader;
use crate::error::{MefError, Result};
use crate::header::UNIVERSAL_HEADER_BYTES;
use crate::utils::{
    get_string_field, put_string_field, read_f64_le, read_i32_le, read_i64_le, read_u32_le,
};

pub const METADATA_SECTION_1_BYTES: usize = 512;
pub const TIME_SERIES_METADATA_SECTION_2_BYTES: usize = 2560;
pub const METADATA_SECTION_3_BYTES: usize = 1024;
pub const METADATA_BYTES: usize =
    METADATA_SECTION_1_BYTES + TIME_SERIES_METADATA_SECTION_2_BYTES + METADATA_SECTION_3_BYTES;
pub const METADATA_FILE_BYTES: usize = UNIVERSAL_HEADER_BYTES + METADATA_BYTES;

pub const METADATA_RECORDING_DURATION_NO_ENTRY: i64 = -1;

pub const NO_ENCRYPTION: i8 = 0;
pub const LEVEL_1_ENCRYPTION: i8 = 1;
pub const LEVEL_2_ENCRYPTION: i8 = 2;

const SECTION_2_BASE: usize = METADATA_SECTION_1_BYTES;
const SECTION_3_BASE: usize = METADATA_SECTION_1_BYTES + TIME_SERIES_METADATA_SECTION_2_BYTES;

/// In-memory image of a segment's metadata file body.
///
/// Aggregate fields are updated as every RED block is emitted and the whole
/// image is rewritten to disk by `update_metadata`, so the file always
/// reflects the cumulative state after the most recent block.
#[derive(Debug, Clone)]
pub struct SegmentMetadata {
    // section 1: encryption flags
    pub section_2_encryption: i8,
    pub section_3_encryption: i8,

    // section 2: channel parameters and aggregates
    pub channel_description: String,
    pub session_description: String,
    pub recording_duration: i64,
    pub sampling_frequency: f64,
    pub low_frequency_filter_setting: f64,
    pub high_frequency_filter_setting: f64,
    pub notch_filter_frequency_setting: f64,
    pub ac_line_frequency: f64,
    pub units_conversion_factor: f64,
    pub units_description: String,
    pub maximum_native_sample_value: f64,
    pub minimum_native_sample_value: f64,
    pub start_sample: i64,
    pub number_of_samples: i64,
    pub number_of_blocks: i64,
    pub maximum_block_bytes: i64,
    pub maximum_block_samples: u32,
    pub maximum_difference_bytes: u32,
    pub block_interval: i64,
    pub number_of_discontinuities: i64,
    pub maximum_contiguous_blocks: i64,
    pub maximum_contiguous_block_bytes: i64,
    pub maximum_contiguous_samples: i64,
    pub acquisition_channel_number: i32,

    // section 3: subject identity and time anonymization
    pub recording_time_offset: i64,
    pub gmt_offset: i32,
    pub subject_name_1: String,
    pub subject_name_2: String,
    pub subject_id: String,
    pub recording_location: String,
}

impl SegmentMetadata {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; METADATA_BYTES];

        // section 1
        buf[0] = self.section_2_encryption as u8;
        buf[1] = self.section_3_encryption as u8;

        // section 2
        let s2 = &mut buf[SECTION_2_BASE..SECTION_3_BASE];
        put_string_field(&mut s2[0..1024], &self.channel_description);
        put_string_field(&mut s2[1024..2048], &self.session_description);
        s2[2048..2056].copy_from_slice(&self.recording_duration.to_le_bytes());
        s2[2056..2064].copy_from_slice(&self.sampling_frequency.to_le_bytes());
        s2[2064..2072].copy_from_slice(&self.low_frequency_filter_setting.to_le_bytes());
        s2[2072..2080].copy_from_slice(&self.high_frequency_filter_setting.to_le_bytes());
        s2[2080..2088].copy_from_slice(&self.notch_filter_frequency_setting.to_le_bytes());
        s2[2088..2096].copy_from_slice(&self.ac_line_frequency.to_le_bytes());
        s2[2096..2104].copy_from_slice(&self.units_conversion_factor.to_le_bytes());
        put_string_field(&mut s2[2104..2232], &self.units_description);
        s2[2232..2240].copy_from_slice(&self.maximum_native_sample_value.to_le_bytes());
        s2[2240..2248].copy_from_slice(&self.minimum_native_sample_value.to_le_bytes());
        s2[2248..2256].copy_from_slice(&self.start_sample.to_le_bytes());
        s2[2256..2264].copy_from_slice(&self.number_of_samples.to_le_bytes());
        s2[2264..2272].copy_from_slice(&self.number_of_blocks.to_le_bytes());
        s2[2272..2280].copy_from_slice(&self.maximum_block_bytes.to_le_bytes());
        s2[2280..2284].copy_from_slice(&self.maximum_block_samples.to_le_bytes());
        s2[2284..2288].copy_from_slice(&self.maximum_difference_bytes.to_le_bytes());
        s2[2288..2296].copy_from_slice(&self.block_interval.to_le_bytes());
        s2[2296..2304].copy_from_slice(&self.number_of_discontinuities.to_le_bytes());
        s2[2304..2312].copy_from_slice(&self.maximum_contiguous_blocks.to_le_bytes());
        s2[2312..2320].copy_from_slice(&self.maximum_contiguous_block_bytes.to_le_bytes());
        s2[2320..2328].copy_from_slice(&self.maximum_contiguous_samples.to_le_bytes());
        s2[2328..2332].copy_from_slice(&self.acquisition_channel_number.to_le_bytes());

        // section 3
        let s3 = &mut buf[SECTION_3_BASE..];
        s3[0..8].copy_from_slice(&self.recording_time_offset.to_le_bytes());
        s3[8..12].copy_from_slice(&self.gmt_offset.to_le_bytes());
        put_string_field(&mut s3[16..144], &self.subject_name_1);
        put_string_field(&mut s3[144..272], &self.subject_name_2);
        put_string_field(&mut s3[272..400], &self.subject_id);
        put_string_field(&mut s3[400..912], &self.recording_location);

        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < METADATA_BYTES {
            return Err(MefError::InvalidFormat(format!(
                "metadata body needs {} bytes, got {}",
                METADATA_BYTES,
                buf.len()
            )));
        }
        let s2 = &buf[SECTION_2_BASE..SECTION_3_BASE];
        let s3 = &buf[SECTION_3_BASE..];
        Ok(SegmentMetadata {
            section_2_encryption: buf[0] as i8,
            section_3_encryption: buf[1] as i8,
            channel_description: get_string_field(&s2[0..1024]),
            session_description: get_string_field(&s2[1024..2048]),
            recording_duration: read_i64_le(s2, 2048),
            sampling_frequency: read_f64_le(s2, 2056),
            low_frequency_filter_setting: read_f64_le(s2, 2064),
            high_frequency_filter_setting: read_f64_le(s2, 2072),
            notch_filter_frequency_setting: read_f64_le(s2, 2080),
            ac_line_frequency: read_f64_le(s2, 2088),
            units_conversion_factor: read_f64_le(s2, 2096),
            units_description: get_string_field(&s2[2104..2232]),
            maximum_native_sample_value: read_f64_le(s2, 2232),
            minimum_native_sample_value: read_f64_le(s2, 2240),
            start_sample: read_i64_le(s2, 2248),
            number_of_samples: read_i64_le(s2, 2256),
            number_of_blocks: read_i64_le(s2, 2264),
            maximum_block_bytes: read_i64_le(s2, 2272),
            maximum_block_samples: read_u32_le(s2, 2280),
            maximum_difference_bytes: read_u32_le(s2, 2284),
            block_interval: read_i64_le(s2, 2288),
            number_of_discontinuities: read_i64_le(s2, 2296),
            maximum_contiguous_blocks: read_i64_le(s2, 2304),
            maximum_contiguous_block_bytes: read_i64_le(s2, 2312),
            maximum_contiguous_samples: read_i64_le(s2, 2320),
            acquisition_channel_number: read_i32_le(s2, 2328),
            recording_time_offset: read_i64_le(s3, 0),
            gmt_offset: read_i32_le(s3, 8),
            subject_name_1: get_string_field(&s3[16..144]),
            subject_name_2: get_string_field(&s3[144..272]),
            subject_id: get_string_field(&s3[272..400]),
            recording_location: get_string_field(&s3[400..912]),
        })
    }

    /// Folds one emitted block into the aggregate fields.
    ///
    /// Native extrema scale through the units conversion factor; a negative
    /// factor swaps which raw extremum feeds which native bound. NaN means
    /// no value seen yet; the range only widens afterwards.
    pub fn absorb_block(&mut self, header: &RedBlockHeader, min_sample: i32, max_sample: i32) {
        let (toward_max, toward_min) = if self.units_conversion_factor >= 0.0 {
            (max_sample, min_sample)
        } else {
            (min_sample, max_sample)
        };
        let native_max = toward_max as f64 * self.units_conversion_factor;
        let native_min = toward_min as f64 * self.units_conversion_factor;
        if self.maximum_native_sample_value.is_nan() || native_max > self.maximum_native_sample_value
        {
            self.maximum_native_sample_value = native_max;
        }
        if self.minimum_native_sample_value.is_nan() || native_min < self.minimum_native_sample_value
        {
            self.minimum_native_sample_value = native_min;
        }

        if header.block_bytes as i64 > self.maximum_block_bytes {
            self.maximum_block_bytes = header.block_bytes as i64;
        }
        if header.number_of_samples > self.maximum_block_samples {
            self.maximum_block_samples = header.number_of_samples;
        }
        if header.difference_bytes > self.maximum_difference_bytes {
            self.maximum_difference_bytes = header.difference_bytes;
        }
        self.number_of_samples += header.number_of_samples as i64;
        self.number_of_blocks += 1;
        if header.discontinuity() {
            self.number_of_discontinuities += 1;
        }
    }

    /// Pushes the current contiguous-run accumulators into the maxima.
    pub fn update_contiguous_maxima(&mut self, blocks: i64, samples: i64, bytes: i64) {
        if blocks > self.maximum_contiguous_blocks {
            self.maximum_contiguous_blocks = blocks;
        }
        if samples > self.maximum_contiguous_samples {
            self.maximum_contiguous_samples = samples;
        }
        if bytes > self.maximum_contiguous_block_bytes {
            self.maximum_contiguous_block_bytes = bytes;
        }
    }

    /// Rolls the aggregates over for a fresh segment: the start sample
    /// advances by the samples just written, everything else returns to its
    /// no-entry state. Channel parameters and subject identity carry over.
    pub fn reset_for_new_segment(&mut self) {
        self.start_sample += self.number_of_samples;
        self.recording_duration = METADATA_RECORDING_DURATION_NO_ENTRY;
        self.maximum_native_sample_value = f64::NAN;
        self.minimum_native_sample_value = f64::NAN;
        self.number_of_samples = 0;
        self.number_of_blocks = 0;
        self.maximum_block_bytes = 0;
        self.maximum_block_samples = 0;
        self.maximum_difference_bytes = 0;
        self.number_of_discontinuities = 0;
        self.maximum_contiguous_blocks = 0;
        self.maximum_contiguous_block_bytes = 0;
        self.maximum_contiguous_samples = 0;
    }
}

pub const TIME_SERIES_INDEX_BYTES: usize = 56;
pub const RED_BLOCK_PROTECTED_REGION_BYTES: usize = 4;
pub const RED_BLOCK_DISCRETIONARY_REGION_BYTES: usize = 7;

/// One fixed-width index entry; exactly one per RED block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesIndex {
    pub file_offset: i64,
    pub start_time: i64,
    pub start_sample: i64,
    pub number_of_samples: u32,
    pub block_bytes: u32,
    pub maximum_sample_value: i32,
    pub minimum_sample_value: i32,
    pub flags: u8,
}

impl TimeSeriesIndex {
    pub fn encode(&self) -> [u8; TIME_SERIES_INDEX_BYTES] {
        let mut buf = [0u8; TIME_SERIES_INDEX_BYTES];
        buf[0..8].copy_from_slice(&self.file_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.start_time.to_le_bytes());
        buf[16..24].copy_from_slice(&self.start_sample.to_le_bytes());
        buf[24..28].copy_from_slice(&self.number_of_samples.to_le_bytes());
        buf[28..32].copy_from_slice(&self.block_bytes.to_le_bytes());
        buf[32..36].copy_from_slice(&self.maximum_sample_value.to_le_bytes());
        buf[36..40].copy_from_slice(&self.minimum_sample_value.to_le_bytes());
        // 40..44 reserved, zero
        buf[44] = self.flags;
        // 45..56: protected + discretionary regions, zero
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < TIME_SERIES_INDEX_BYTES {
            return Err(MefError::InvalidFormat(format!(
                "index entry needs {} bytes, got {}",
                TIME_SERIES_INDEX_BYTES,
                buf.len()
            )));
        }
        Ok(TimeSeriesIndex {
            file_offset: read_i64_le(buf, 0),
            start_time: read_i64_le(buf, 8),
            start_sample: read_i64_le(buf, 16),
            number_of_samples: read_u32_le(buf, 24),
            block_bytes: read_u32_le(buf, 28),
            maximum_sample_value: read_i32_le(buf, 32),
            minimum_sample_value: read_i32_le(buf, 36),
            flags: buf[44],
        })
    }
}
