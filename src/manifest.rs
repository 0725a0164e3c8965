//! Session channel manifest.
//!
//! Some third-party viewers discover channels through a session-level
//! manifest instead of scanning directories. The manifest is a universal
//! header followed by fixed-width entries, one per channel directory.
//! Registration is idempotent: re-registering a channel leaves the file
//! byte-identical.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::error::Result;
use crate::header::{
    MefFile, UniversalHeader, MEF_BASE_FILE_NAME_BYTES, SEGMENT_NUMBER_SESSION_LEVEL,
    SESSION_DIRECTORY_TYPE, TIME_SERIES_CHANNEL_DIRECTORY_TYPE, UNIVERSAL_HEADER_BYTES,
};
use crate::utils::{generate_uuid, put_string_field};

pub const MANIFEST_ENTRY_BYTES: usize = MEF_BASE_FILE_NAME_BYTES;

/// Registers `channel_name`'s directory in the session manifest, creating
/// the manifest if needed. Callers using encryption skip this entirely.
pub fn register_channel(
    session_path: &Path,
    session_name: &str,
    channel_name: &str,
    anonymized_name: &str,
) -> Result<()> {
    let manifest_path =
        session_path.join(format!("{}.{}", session_name, SESSION_DIRECTORY_TYPE));

    let mut entry = [0u8; MANIFEST_ENTRY_BYTES];
    put_string_field(
        &mut entry,
        &format!("{}.{}", channel_name, TIME_SERIES_CHANNEL_DIRECTORY_TYPE),
    );

    if manifest_path.exists() {
        // scan for a byte-exact match before touching anything
        let contents = fs::read(&manifest_path)?;
        for existing in contents[UNIVERSAL_HEADER_BYTES.min(contents.len())..]
            .chunks_exact(MANIFEST_ENTRY_BYTES)
        {
            if existing == entry {
                trace!(channel = channel_name, "channel already in manifest");
                return Ok(());
            }
        }
        let mut file = MefFile::open_existing(&manifest_path)?;
        file.append_body(&entry)?;
        file.header.number_of_entries += 1;
        file.rewrite_header()?;
        debug!(channel = channel_name, "appended channel to session manifest");
    } else {
        let mut header = UniversalHeader::new(SESSION_DIRECTORY_TYPE);
        header.segment_number = SEGMENT_NUMBER_SESSION_LEVEL;
        header.session_name = session_name.to_string();
        header.anonymized_name = anonymized_name.to_string();
        header.level_uuid = generate_uuid();
        header.file_uuid = generate_uuid();
        header.provenance_uuid = header.file_uuid;
        header.maximum_entry_size = MANIFEST_ENTRY_BYTES as i64;
        let mut file = MefFile::create(&manifest_path, header)?;
        file.append_body(&entry)?;
        file.header.number_of_entries = 1;
        file.rewrite_header()?;
        debug!(channel = channel_name, "created session manifest");
    }
    Ok(())
}
