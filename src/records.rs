//! Session-level annotation records.
//!
//! Two append-only files per session: `<session>.rdat` holds
//! `(header, body, pad)` tuples, `<session>.ridx` holds one fixed-width
//! index entry per record. Bodies are padded to 16-byte multiples so the
//! record stream could be encrypted block-wise without re-layout.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::globals;
use crate::header::{
    MefFile, UniversalHeader, CRC_BYTES, RECORD_DATA_FILE_TYPE, RECORD_INDICES_FILE_TYPE,
    SEGMENT_NUMBER_SESSION_LEVEL, TIME_NO_ENTRY,
};
use crate::types::{RecordBody, TimeOffsetMode};
use crate::utils::{crc_calculate, crc_update, generate_uuid, put_string_field, session_location};

pub const RECORD_HEADER_BYTES: usize = 24;
pub const RECORD_INDEX_BYTES: usize = 24;
pub const RECORD_VERSION_MAJOR: u8 = 1;
pub const RECORD_VERSION_MINOR: u8 = 0;

/// Encryption happens in 16-byte blocks; bodies are padded up to that.
const RECORD_BODY_ALIGNMENT: u32 = 16;
const PAD_BYTE: u8 = b'~';

/// Append-only writer for a session's record data and record index files.
///
/// # Examples
///
/// ```rust
/// use mef3::{AnnotationWriter, RecordBody};
///
/// let dir = tempfile::tempdir()?;
/// let session = dir.path().join("demo");
/// let mut records = AnnotationWriter::create_or_append(&session, -6.0, "anon")?;
/// records.write_record(946_684_800_000_000, &RecordBody::Note("eyes closed".into()))?;
/// records.close()?;
///
/// // reopening appends to the same files
/// let mut records = AnnotationWriter::create_or_append(&session, -6.0, "anon")?;
/// records.write_record(946_684_801_000_000, &RecordBody::Note("eyes open".into()))?;
/// records.close()?;
/// # Ok::<(), mef3::MefError>(())
/// ```
pub struct AnnotationWriter {
    rdat: MefFile,
    ridx: MefFile,
    gmt_offset_hours: f64,
}

impl AnnotationWriter {
    /// Opens the session's record files, creating headers-only files on
    /// first use or seeking to end-of-file when they already exist.
    pub fn create_or_append<P: AsRef<Path>>(
        session_dir: P,
        gmt_offset_hours: f64,
        anonymized_name: &str,
    ) -> Result<Self> {
        let (session_path, session_name) = session_location(session_dir.as_ref())?;
        fs::create_dir_all(&session_path)?;
        let rdat_path = session_path.join(format!("{}.{}", session_name, RECORD_DATA_FILE_TYPE));
        let ridx_path =
            session_path.join(format!("{}.{}", session_name, RECORD_INDICES_FILE_TYPE));

        let (rdat, ridx) = if rdat_path.exists() {
            (
                MefFile::open_existing(&rdat_path)?,
                MefFile::open_existing(&ridx_path)?,
            )
        } else {
            let mut template = UniversalHeader::new(RECORD_DATA_FILE_TYPE);
            template.segment_number = SEGMENT_NUMBER_SESSION_LEVEL;
            template.session_name = session_name.clone();
            template.anonymized_name = anonymized_name.to_string();
            template.level_uuid = generate_uuid();

            let mut rdat_header = template.clone();
            rdat_header.file_uuid = generate_uuid();
            rdat_header.provenance_uuid = rdat_header.file_uuid;
            let mut ridx_header = template;
            ridx_header.file_type = RECORD_INDICES_FILE_TYPE.to_string();
            ridx_header.file_uuid = generate_uuid();
            ridx_header.provenance_uuid = ridx_header.file_uuid;
            ridx_header.maximum_entry_size = RECORD_INDEX_BYTES as i64;
            (
                MefFile::create(&rdat_path, rdat_header)?,
                MefFile::create(&ridx_path, ridx_header)?,
            )
        };

        Ok(AnnotationWriter {
            rdat,
            ridx,
            gmt_offset_hours,
        })
    }

    /// Appends one record and its index entry, then refreshes both
    /// universal headers in place.
    ///
    /// `timestamp` is microseconds since the Unix epoch; when anonymization
    /// is active the stored copies are offset (and the session offset is
    /// derived from this timestamp if no block has generated one yet).
    pub fn write_record(&mut self, timestamp: i64, body: &RecordBody) -> Result<()> {
        if globals::time_offset_mode() == TimeOffsetMode::Apply {
            globals::ensure_recording_time_offset(
                timestamp,
                (self.gmt_offset_hours * 3600.0) as i32,
            );
        }
        let time = globals::apply_recording_time_offset(timestamp);

        let body_len = body.body_bytes();
        let pad = (RECORD_BODY_ALIGNMENT - body_len % RECORD_BODY_ALIGNMENT) % RECORD_BODY_ALIGNMENT;
        let padded_len = body_len + pad;

        // record header; CRC stamped once the body bytes are known
        let mut header = [0u8; RECORD_HEADER_BYTES];
        put_string_field(&mut header[4..9], body.type_string());
        header[9] = RECORD_VERSION_MAJOR;
        header[10] = RECORD_VERSION_MINOR;
        header[11] = 0; // encryption
        header[12..16].copy_from_slice(&padded_len.to_le_bytes());
        header[16..24].copy_from_slice(&time.to_le_bytes());

        let mut body_buf = Vec::with_capacity(padded_len as usize);
        body.write_into(&mut body_buf);
        body_buf.resize(padded_len as usize, PAD_BYTE);

        let mut record_crc = crc_calculate(&header[CRC_BYTES..]);
        record_crc = crc_update(&body_buf, record_crc);
        header[0..4].copy_from_slice(&record_crc.to_le_bytes());

        // matching index entry points at the record's first header byte
        let mut index = [0u8; RECORD_INDEX_BYTES];
        put_string_field(&mut index[0..5], body.type_string());
        index[5] = RECORD_VERSION_MAJOR;
        index[6] = RECORD_VERSION_MINOR;
        index[7] = 0;
        index[8..16].copy_from_slice(&(self.rdat.append_offset as i64).to_le_bytes());
        index[16..24].copy_from_slice(&time.to_le_bytes());

        self.rdat.append_body(&header)?;
        self.rdat.append_body(&body_buf)?;
        self.ridx.append_body(&index)?;

        let entry_size = RECORD_HEADER_BYTES as i64 + padded_len as i64;
        for file in [&mut self.rdat, &mut self.ridx] {
            let uh = &mut file.header;
            if uh.start_time == TIME_NO_ENTRY {
                uh.start_time = time;
            }
            uh.end_time = time;
            uh.number_of_entries += 1;
            if entry_size > uh.maximum_entry_size {
                uh.maximum_entry_size = entry_size;
            }
        }
        self.rdat.rewrite_header()?;
        self.ridx.rewrite_header()?;

        debug!(
            kind = body.type_string(),
            bytes = padded_len,
            "wrote annotation record"
        );
        Ok(())
    }

    /// Closes both files. Record bodies and headers are already on disk;
    /// this only releases the handles.
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}
