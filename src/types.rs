//! Channel configuration and annotation record types.

use crate::utils::put_string_field;

/// Whether unencrypted header timestamps are anonymized with the session's
/// recording time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeOffsetMode {
    /// Timestamps are written as given (the default).
    #[default]
    Ignore,
    /// Timestamps in unencrypted header fields are offset so the recording
    /// date is hidden while the time of day survives.
    Apply,
}

/// Immutable configuration of one time-series channel.
///
/// All temporal quantities are in microseconds, sampling frequency in Hz.
/// The filter settings, AC line frequency, and subject fields are stored in
/// segment metadata verbatim and never interpreted by the writer.
///
/// # Examples
///
/// ```rust
/// use mef3::ChannelConfig;
///
/// let config = ChannelConfig {
///     channel_name: "ecog-01".to_string(),
///     sampling_frequency: 1000.0,
///     secs_per_block: 1.0,
///     block_interval: 1_000_000,
///     ..ChannelConfig::default()
/// };
/// assert_eq!(config.num_secs_per_segment, 0); // unlimited segments
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel base name; also names the channel directory.
    pub channel_name: String,
    /// Acquisition hardware channel number.
    pub acquisition_channel_number: i32,
    /// Nominal seconds of data per RED block; sizes the raw buffer at
    /// twice this many samples to absorb rate drift and forced flushes.
    pub secs_per_block: f64,
    /// Wall-clock scheduling period of block flushes, in microseconds.
    pub block_interval: i64,
    /// Nominal sampling frequency in Hz; may be corrected per write call.
    pub sampling_frequency: f64,
    /// Divide samples by 4 (rounding half away from zero) before
    /// compression; a convention for 18-bit acquisition hardware.
    pub bit_shift: bool,
    pub low_frequency_filter_setting: f64,
    pub high_frequency_filter_setting: f64,
    /// Negative means no notch filter.
    pub notch_filter_frequency_setting: f64,
    pub ac_line_frequency: f64,
    /// Scales raw extrema into native units; a negative factor swaps the
    /// roles of minimum and maximum.
    pub units_conversion_factor: f64,
    pub units_description: String,
    pub channel_description: String,
    pub session_description: String,
    pub anonymized_name: String,
    pub subject_first_name: String,
    pub subject_second_name: String,
    pub subject_id: String,
    pub recording_location: String,
    /// Level 1 ("technical") password. Required when a level 2 password is
    /// given, and must differ from it.
    pub level_1_password: Option<String>,
    /// Level 2 ("subject") password; its presence marks metadata sections
    /// 2 and 3 as encrypted and suppresses manifest registration.
    pub level_2_password: Option<String>,
    /// Seconds of wall clock per segment; 0 means a single unbounded
    /// segment.
    pub num_secs_per_segment: u64,
    /// Hours east of GMT; only used to derive the recording time offset
    /// when anonymization is active.
    pub gmt_offset_hours: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            channel_name: String::new(),
            acquisition_channel_number: 0,
            secs_per_block: 1.0,
            block_interval: 1_000_000,
            sampling_frequency: 0.0,
            bit_shift: false,
            low_frequency_filter_setting: 0.0,
            high_frequency_filter_setting: 0.0,
            notch_filter_frequency_setting: -1.0,
            ac_line_frequency: 0.0,
            units_conversion_factor: 1.0,
            units_description: "microvolts".to_string(),
            channel_description: String::new(),
            session_description: String::new(),
            anonymized_name: String::new(),
            subject_first_name: String::new(),
            subject_second_name: String::new(),
            subject_id: String::new(),
            recording_location: String::new(),
            level_1_password: None,
            level_2_password: None,
            num_secs_per_segment: 0,
            gmt_offset_hours: 0.0,
        }
    }
}

pub const MEFREC_SEIZ_BYTES: u32 = 160;
pub const MEFREC_CURS_BYTES: u32 = 160;
pub const MEFREC_EPOC_BYTES: u32 = 192;

/// Seizure marker record body (fixed 160 bytes on disk).
#[derive(Debug, Clone, Default)]
pub struct SeizRecord {
    pub earliest_onset: i64,
    pub latest_offset: i64,
    pub duration: i64,
    pub number_of_channels: i32,
    pub onset_code: i32,
    /// Free-text marker annotation, truncated to 127 bytes on disk.
    pub annotation: String,
}

/// Cursor record body (fixed 160 bytes on disk).
#[derive(Debug, Clone, Default)]
pub struct CursRecord {
    pub id_number: i64,
    pub trace_timestamp: i64,
    pub latency: i64,
    pub value: f64,
    pub name: String,
}

/// Epoch record body (fixed 192 bytes on disk).
#[derive(Debug, Clone, Default)]
pub struct EpocRecord {
    pub id_number: i64,
    pub timestamp: i64,
    pub end_timestamp: i64,
    pub duration: i64,
    pub epoch_type: String,
    pub text: String,
}

/// One annotation record body. The set of kinds is closed: anything the
/// writer accepts is, by construction, a known record type.
///
/// Embedded strings are written zero-padded to their full field width, so a
/// record's bytes are fully determined by its inputs.
#[derive(Debug, Clone)]
pub enum RecordBody {
    /// Free-text note, stored NUL-terminated.
    Note(String),
    Seiz(SeizRecord),
    Curs(CursRecord),
    Epoc(EpocRecord),
}

impl RecordBody {
    /// Four-character record type string as it appears on disk.
    pub fn type_string(&self) -> &'static str {
        match self {
            RecordBody::Note(_) => "Note",
            RecordBody::Seiz(_) => "Seiz",
            RecordBody::Curs(_) => "Curs",
            RecordBody::Epoc(_) => "Epoc",
        }
    }

    /// Unpadded body size in bytes.
    pub fn body_bytes(&self) -> u32 {
        match self {
            RecordBody::Note(text) => text.as_bytes().len() as u32 + 1,
            RecordBody::Seiz(_) => MEFREC_SEIZ_BYTES,
            RecordBody::Curs(_) => MEFREC_CURS_BYTES,
            RecordBody::Epoc(_) => MEFREC_EPOC_BYTES,
        }
    }

    /// Serializes the body into `out` (exactly [`body_bytes`](Self::body_bytes) bytes).
    pub(crate) fn write_into(&self, out: &mut Vec<u8>) {
        match self {
            RecordBody::Note(text) => {
                out.extend_from_slice(text.as_bytes());
                out.push(0);
            }
            RecordBody::Seiz(seiz) => {
                out.extend_from_slice(&seiz.earliest_onset.to_le_bytes());
                out.extend_from_slice(&seiz.latest_offset.to_le_bytes());
                out.extend_from_slice(&seiz.duration.to_le_bytes());
                out.extend_from_slice(&seiz.number_of_channels.to_le_bytes());
                out.extend_from_slice(&seiz.onset_code.to_le_bytes());
                let mut annotation = [0u8; 128];
                put_string_field(&mut annotation, &seiz.annotation);
                out.extend_from_slice(&annotation);
            }
            RecordBody::Curs(curs) => {
                out.extend_from_slice(&curs.id_number.to_le_bytes());
                out.extend_from_slice(&curs.trace_timestamp.to_le_bytes());
                out.extend_from_slice(&curs.latency.to_le_bytes());
                out.extend_from_slice(&curs.value.to_le_bytes());
                let mut name = [0u8; 128];
                put_string_field(&mut name, &curs.name);
                out.extend_from_slice(&name);
            }
            RecordBody::Epoc(epoc) => {
                out.extend_from_slice(&epoc.id_number.to_le_bytes());
                out.extend_from_slice(&epoc.timestamp.to_le_bytes());
                out.extend_from_slice(&epoc.end_timestamp.to_le_bytes());
                out.extend_from_slice(&epoc.duration.to_le_bytes());
                let mut epoch_type = [0u8; 32];
                put_string_field(&mut epoch_type, &epoc.epoch_type);
                out.extend_from_slice(&epoch_type);
                let mut text = [0u8; 128];
                put_string_field(&mut text, &epoc.text);
                out.extend_from_slice(&text);
            }
        }
    }
}
