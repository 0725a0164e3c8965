//! Minimal read-back support.
//!
//! The writer needs to read exactly one thing: a prior segment's metadata,
//! so a session can be extended with new segments. Tools and tests also
//! use the universal-header, index, and CRC helpers here. This is not a
//! general MEF reader; decoding whole sessions is out of scope.

use std::fs;
use std::path::Path;

use crate::error::{MefError, Result};
use crate::header::{UniversalHeader, CRC_BYTES, UNIVERSAL_HEADER_BYTES};
use crate::metadata::{
    SegmentMetadata, TimeSeriesIndex, METADATA_FILE_BYTES, TIME_SERIES_INDEX_BYTES,
};
use crate::utils::crc_calculate;

/// Reads and parses the universal header of any MEF file.
pub fn read_universal_header<P: AsRef<Path>>(path: P) -> Result<UniversalHeader> {
    let contents = fs::read(path.as_ref())?;
    UniversalHeader::decode(&contents)
}

/// Reads a segment metadata file: universal header plus the three sections.
pub fn read_segment_metadata<P: AsRef<Path>>(
    path: P,
) -> Result<(UniversalHeader, SegmentMetadata)> {
    let contents = fs::read(path.as_ref())?;
    if contents.len() < METADATA_FILE_BYTES {
        return Err(MefError::InvalidFormat(format!(
            "metadata file {} holds {} bytes, expected {}",
            path.as_ref().display(),
            contents.len(),
            METADATA_FILE_BYTES
        )));
    }
    let header = UniversalHeader::decode(&contents)?;
    let metadata = SegmentMetadata::decode(&contents[UNIVERSAL_HEADER_BYTES..])?;
    Ok((header, metadata))
}

/// Reads every index entry of a segment index file, in file order.
pub fn read_index_entries<P: AsRef<Path>>(
    path: P,
) -> Result<(UniversalHeader, Vec<TimeSeriesIndex>)> {
    let contents = fs::read(path.as_ref())?;
    let header = UniversalHeader::decode(&contents)?;
    let body = &contents[UNIVERSAL_HEADER_BYTES..];
    if body.len() % TIME_SERIES_INDEX_BYTES != 0 {
        return Err(MefError::InvalidFormat(format!(
            "index body of {} is not a whole number of entries",
            path.as_ref().display()
        )));
    }
    let entries = body
        .chunks_exact(TIME_SERIES_INDEX_BYTES)
        .map(TimeSeriesIndex::decode)
        .collect::<Result<Vec<_>>>()?;
    Ok((header, entries))
}

/// Recomputes both CRCs of a file and checks them against its header.
/// Returns `(header_crc_ok, body_crc_ok)`.
pub fn verify_file_crcs<P: AsRef<Path>>(path: P) -> Result<(bool, bool)> {
    let contents = fs::read(path.as_ref())?;
    let header = UniversalHeader::decode(&contents)?;
    let header_ok =
        header.header_crc == crc_calculate(&contents[CRC_BYTES..UNIVERSAL_HEADER_BYTES]);
    let body_ok = header.body_crc == crc_calculate(&contents[UNIVERSAL_HEADER_BYTES..]);
    Ok((header_ok, body_ok))
}
