//! The universal header carried by every MEF 3.0 file, plus the file stream
//! wrapper that keeps an open handle, its in-memory header, and the append
//! cursor mutually consistent.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{MefError, Result};
use crate::utils::{
    crc_calculate, crc_update, get_string_field, put_string_field, read_i32_le, read_i64_le,
    read_u32_le, CRC_START_VALUE,
};

pub const UNIVERSAL_HEADER_BYTES: usize = 1024;
/// Bytes occupied by a CRC field; header CRCs cover everything after it.
pub const CRC_BYTES: usize = 4;

pub const MEF_VERSION_MAJOR: u8 = 3;
pub const MEF_VERSION_MINOR: u8 = 0;
pub const LITTLE_ENDIAN_BYTE_ORDER_CODE: u8 = 1;

pub const MEF_BASE_FILE_NAME_BYTES: usize = 256;
pub const UUID_BYTES: usize = 16;
pub const TYPE_BYTES: usize = 5;

/// Sentinel for start/end times that have not been observed yet.
pub const TIME_NO_ENTRY: i64 = i64::MIN;
pub const MAXIMUM_ENTRY_SIZE_NO_ENTRY: i64 = 0;
pub const SEGMENT_NUMBER_NO_ENTRY: i32 = -1;
pub const SEGMENT_NUMBER_CHANNEL_LEVEL: i32 = -2;
pub const SEGMENT_NUMBER_SESSION_LEVEL: i32 = -3;

// file and directory type suffixes
pub const TIME_SERIES_METADATA_FILE_TYPE: &str = "tmet";
pub const TIME_SERIES_DATA_FILE_TYPE: &str = "tdat";
pub const TIME_SERIES_INDICES_FILE_TYPE: &str = "tidx";
pub const RECORD_DATA_FILE_TYPE: &str = "rdat";
pub const RECORD_INDICES_FILE_TYPE: &str = "ridx";
pub const SESSION_DIRECTORY_TYPE: &str = "mefd";
pub const TIME_SERIES_CHANNEL_DIRECTORY_TYPE: &str = "timd";
pub const SEGMENT_DIRECTORY_TYPE: &str = "segd";

/// Fixed-size preamble attached to every on-disk file.
///
/// `header_crc` covers the encoded bytes after the CRC field itself and is
/// recomputed every time the header is rewritten; `body_crc` is maintained
/// incrementally as payload bytes are appended.
#[derive(Debug, Clone)]
pub struct UniversalHeader {
    pub header_crc: u32,
    pub body_crc: u32,
    pub file_type: String,
    pub mef_version_major: u8,
    pub mef_version_minor: u8,
    pub byte_order_code: u8,
    pub start_time: i64,
    pub end_time: i64,
    pub number_of_entries: i64,
    pub maximum_entry_size: i64,
    pub segment_number: i32,
    pub channel_name: String,
    pub session_name: String,
    pub anonymized_name: String,
    pub level_uuid: [u8; UUID_BYTES],
    pub file_uuid: [u8; UUID_BYTES],
    pub provenance_uuid: [u8; UUID_BYTES],
    pub level_1_password_validation: [u8; UUID_BYTES],
    pub level_2_password_validation: [u8; UUID_BYTES],
}

impl UniversalHeader {
    pub fn new(file_type: &str) -> Self {
        UniversalHeader {
            header_crc: CRC_START_VALUE,
            body_crc: CRC_START_VALUE,
            file_type: file_type.to_string(),
            mef_version_major: MEF_VERSION_MAJOR,
            mef_version_minor: MEF_VERSION_MINOR,
            byte_order_code: LITTLE_ENDIAN_BYTE_ORDER_CODE,
            start_time: TIME_NO_ENTRY,
            end_time: TIME_NO_ENTRY,
            number_of_entries: 0,
            maximum_entry_size: MAXIMUM_ENTRY_SIZE_NO_ENTRY,
            segment_number: SEGMENT_NUMBER_NO_ENTRY,
            channel_name: String::new(),
            session_name: String::new(),
            anonymized_name: String::new(),
            level_uuid: [0; UUID_BYTES],
            file_uuid: [0; UUID_BYTES],
            provenance_uuid: [0; UUID_BYTES],
            level_1_password_validation: [0; UUID_BYTES],
            level_2_password_validation: [0; UUID_BYTES],
        }
    }

    /// Packs the header into its 1024-byte little-endian layout. The
    /// `header_crc` field is written as currently stored; use
    /// [`encode_with_crc`](Self::encode_with_crc) to refresh it.
    pub fn encode(&self) -> [u8; UNIVERSAL_HEADER_BYTES] {
        let mut buf = [0u8; UNIVERSAL_HEADER_BYTES];
        buf[0..4].copy_from_slice(&self.header_crc.to_le_bytes());
        buf[4..8].copy_from_slice(&self.body_crc.to_le_bytes());
        put_string_field(&mut buf[8..13], &self.file_type);
        buf[13] = self.mef_version_major;
        buf[14] = self.mef_version_minor;
        buf[15] = self.byte_order_code;
        buf[16..24].copy_from_slice(&self.start_time.to_le_bytes());
        buf[24..32].copy_from_slice(&self.end_time.to_le_bytes());
        buf[32..40].copy_from_slice(&self.number_of_entries.to_le_bytes());
        buf[40..48].copy_from_slice(&self.maximum_entry_size.to_le_bytes());
        buf[48..52].copy_from_slice(&self.segment_number.to_le_bytes());
        put_string_field(&mut buf[52..308], &self.channel_name);
        put_string_field(&mut buf[308..564], &self.session_name);
        put_string_field(&mut buf[564..820], &self.anonymized_name);
        buf[820..836].copy_from_slice(&self.level_uuid);
        buf[836..852].copy_from_slice(&self.file_uuid);
        buf[852..868].copy_from_slice(&self.provenance_uuid);
        buf[868..884].copy_from_slice(&self.level_1_password_validation);
        buf[884..900].copy_from_slice(&self.level_2_password_validation);
        // 900..1024: protected + discretionary regions stay zero
        buf
    }

    /// Packs the header and stamps a freshly computed header CRC into it
    /// (and into `self`). The CRC must always be computed last, after every
    /// other field is final.
    pub fn encode_with_crc(&mut self) -> [u8; UNIVERSAL_HEADER_BYTES] {
        let mut buf = self.encode();
        self.header_crc = crc_calculate(&buf[CRC_BYTES..]);
        buf[0..4].copy_from_slice(&self.header_crc.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < UNIVERSAL_HEADER_BYTES {
            return Err(MefError::InvalidFormat(format!(
                "universal header needs {} bytes, got {}",
                UNIVERSAL_HEADER_BYTES,
                buf.len()
            )));
        }
        let mut level_uuid = [0u8; UUID_BYTES];
        level_uuid.copy_from_slice(&buf[820..836]);
        let mut file_uuid = [0u8; UUID_BYTES];
        file_uuid.copy_from_slice(&buf[836..852]);
        let mut provenance_uuid = [0u8; UUID_BYTES];
        provenance_uuid.copy_from_slice(&buf[852..868]);
        let mut level_1_password_validation = [0u8; UUID_BYTES];
        level_1_password_validation.copy_from_slice(&buf[868..884]);
        let mut level_2_password_validation = [0u8; UUID_BYTES];
        level_2_password_validation.copy_from_slice(&buf[884..900]);
        Ok(UniversalHeader {
            header_crc: read_u32_le(buf, 0),
            body_crc: read_u32_le(buf, 4),
            file_type: get_string_field(&buf[8..13]),
            mef_version_major: buf[13],
            mef_version_minor: buf[14],
            byte_order_code: buf[15],
            start_time: read_i64_le(buf, 16),
            end_time: read_i64_le(buf, 24),
            number_of_entries: read_i64_le(buf, 32),
            maximum_entry_size: read_i64_le(buf, 40),
            segment_number: read_i32_le(buf, 48),
            channel_name: get_string_field(&buf[52..308]),
            session_name: get_string_field(&buf[308..564]),
            anonymized_name: get_string_field(&buf[564..820]),
            level_uuid,
            file_uuid,
            provenance_uuid,
            level_1_password_validation,
            level_2_password_validation,
        })
    }
}

/// An open MEF file: handle, in-memory universal header, and append cursor.
///
/// The file cursor is parked at the append position between operations;
/// header rewrites seek to zero and restore it. Dropping the stream closes
/// the handle (bodies are written through immediately, so the only state a
/// dropped-but-not-finalized file can lose is a stale header).
#[derive(Debug)]
pub(crate) struct MefFile {
    file: File,
    pub header: UniversalHeader,
    pub append_offset: u64,
}

impl MefFile {
    /// Creates (or truncates) the file and writes the universal header.
    pub fn create(path: &Path, mut header: UniversalHeader) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        header.body_crc = CRC_START_VALUE;
        let buf = header.encode_with_crc();
        file.write_all(&buf)?;
        Ok(MefFile {
            file,
            header,
            append_offset: UNIVERSAL_HEADER_BYTES as u64,
        })
    }

    /// Opens an existing file, parses its universal header, and parks the
    /// append cursor at end-of-file so new entries continue the stream.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut buf = [0u8; UNIVERSAL_HEADER_BYTES];
        file.read_exact(&mut buf)?;
        let header = UniversalHeader::decode(&buf)?;
        let append_offset = file.seek(SeekFrom::End(0))?;
        Ok(MefFile {
            file,
            header,
            append_offset,
        })
    }

    /// Appends body bytes at the cursor and folds them into the body CRC.
    pub fn append_body(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.append_offset))?;
        self.file.write_all(bytes)?;
        self.header.body_crc = crc_update(bytes, self.header.body_crc);
        self.append_offset += bytes.len() as u64;
        Ok(())
    }

    /// Overwrites the whole body in place (metadata files). The body CRC is
    /// recomputed from scratch over the new contents.
    pub fn rewrite_body(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(UNIVERSAL_HEADER_BYTES as u64))?;
        self.file.write_all(bytes)?;
        self.header.body_crc = crc_calculate(bytes);
        self.append_offset = (UNIVERSAL_HEADER_BYTES + bytes.len()) as u64;
        Ok(())
    }

    /// Recomputes the header CRC, rewrites the universal header at offset
    /// zero, and restores the cursor to the append position.
    pub fn rewrite_header(&mut self) -> Result<()> {
        let buf = self.header.encode_with_crc();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        self.file.seek(SeekFrom::Start(self.append_offset))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> UniversalHeader {
        let mut uh = UniversalHeader::new(TIME_SERIES_DATA_FILE_TYPE);
        uh.start_time = -64_800_000_000;
        uh.end_time = -64_799_000_000;
        uh.number_of_entries = 12;
        uh.maximum_entry_size = 1000;
        uh.segment_number = 3;
        uh.channel_name = "ecog-01".to_string();
        uh.session_name = "session".to_string();
        uh.anonymized_name = "anon".to_string();
        uh.level_uuid = [7; UUID_BYTES];
        uh.file_uuid = [9; UUID_BYTES];
        uh.body_crc = 0xdead_beef;
        uh
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut uh = sample_header();
        let buf = uh.encode_with_crc();
        let parsed = UniversalHeader::decode(&buf).unwrap();
        assert_eq!(parsed.header_crc, uh.header_crc);
        assert_eq!(parsed.body_crc, 0xdead_beef);
        assert_eq!(parsed.file_type, TIME_SERIES_DATA_FILE_TYPE);
        assert_eq!(parsed.mef_version_major, MEF_VERSION_MAJOR);
        assert_eq!(parsed.byte_order_code, LITTLE_ENDIAN_BYTE_ORDER_CODE);
        assert_eq!(parsed.start_time, uh.start_time);
        assert_eq!(parsed.number_of_entries, 12);
        assert_eq!(parsed.segment_number, 3);
        assert_eq!(parsed.channel_name, "ecog-01");
        assert_eq!(parsed.session_name, "session");
        assert_eq!(parsed.level_uuid, [7; UUID_BYTES]);
        assert_eq!(parsed.file_uuid, [9; UUID_BYTES]);
    }

    #[test]
    fn test_header_crc_covers_bytes_after_crc_field() {
        let mut uh = sample_header();
        let buf = uh.encode_with_crc();
        assert_eq!(uh.header_crc, crc_calculate(&buf[CRC_BYTES..]));
        // any later field change must change the stamped CRC
        uh.number_of_entries += 1;
        let buf2 = uh.encode_with_crc();
        assert_ne!(
            read_u32_le(&buf, 0),
            read_u32_le(&buf2, 0),
            "header CRC did not track field changes"
        );
    }

    #[test]
    fn test_decode_short_buffer_rejected() {
        assert!(UniversalHeader::decode(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_file_stream_append_and_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.tdat");
        let mut f = MefFile::create(&path, sample_header()).unwrap();
        f.append_body(b"hello ").unwrap();
        f.append_body(b"world").unwrap();
        f.header.number_of_entries = 2;
        f.rewrite_header().unwrap();
        drop(f);

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents.len(), UNIVERSAL_HEADER_BYTES + 11);
        assert_eq!(&contents[UNIVERSAL_HEADER_BYTES..], b"hello world");
        let uh = UniversalHeader::decode(&contents).unwrap();
        assert_eq!(uh.number_of_entries, 2);
        assert_eq!(uh.body_crc, crc_calculate(b"hello world"));
        assert_eq!(
            uh.header_crc,
            crc_calculate(&contents[CRC_BYTES..UNIVERSAL_HEADER_BYTES])
        );

        // reopening continues the append stream
        let mut f = MefFile::open_existing(&path).unwrap();
        assert_eq!(f.append_offset, (UNIVERSAL_HEADER_BYTES + 11) as u64);
        f.append_body(b"!").unwrap();
        assert_eq!(f.header.body_crc, crc_calculate(b"hello world!"));
    }
}
