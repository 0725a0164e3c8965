use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{MefError, Result};
use crate::header::SESSION_DIRECTORY_TYPE;

/// CRC value of the empty byte sequence; seeds every incremental body CRC.
pub const CRC_START_VALUE: u32 = 0;

/// 在之前的CRC值基础上继续累积
pub fn crc_update(data: &[u8], previous: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(previous);
    hasher.update(data);
    hasher.finalize()
}

/// 一次性计算整段数据的CRC
pub fn crc_calculate(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Generates 16 random bytes for a file or level UUID.
pub fn generate_uuid() -> [u8; 16] {
    *uuid::Uuid::new_v4().as_bytes()
}

/// Writes `s` into a fixed-width field, NUL-padded, always NUL-terminated.
///
/// Oversized strings are truncated at the byte level so the terminator is
/// never lost. Every byte of the field is written, which keeps records
/// byte-deterministic for a given input.
pub fn put_string_field(field: &mut [u8], s: &str) {
    field.fill(0);
    if field.is_empty() {
        return;
    }
    let bytes = s.as_bytes();
    let n = bytes.len().min(field.len() - 1);
    field[..n].copy_from_slice(&bytes[..n]);
}

/// 读取NUL填充的定宽字符串字段
pub fn get_string_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Segment base name: `<channel>-NNNNNN`, six digit zero-padded.
pub fn segment_base_name(channel_name: &str, segment_number: i32) -> String {
    format!("{}-{:06}", channel_name, segment_number)
}

/// Derives the session name and the suffixed session directory path from a
/// caller-supplied directory. The last extension (if any) is stripped, so
/// `data/run1` and `data/run1.mefd` both resolve to the session `run1`
/// living at `data/run1.mefd`.
pub fn session_location(session_dir: &Path) -> Result<(PathBuf, String)> {
    let name = session_dir
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            MefError::InvalidFormat(format!(
                "cannot derive a session name from {}",
                session_dir.display()
            ))
        })?
        .to_string();
    let parent = session_dir.parent().unwrap_or_else(|| Path::new(""));
    let path = parent.join(format!("{}.{}", name, SESSION_DIRECTORY_TYPE));
    Ok((path, name))
}

// little-endian field readers for fixed-offset layouts
pub(crate) fn read_u32_le(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub(crate) fn read_i32_le(buf: &[u8], off: usize) -> i32 {
    read_u32_le(buf, off) as i32
}

pub(crate) fn read_u64_le(buf: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(bytes)
}

pub(crate) fn read_i64_le(buf: &[u8], off: usize) -> i64 {
    read_u64_le(buf, off) as i64
}

pub(crate) fn read_f64_le(buf: &[u8], off: usize) -> f64 {
    f64::from_bits(read_u64_le(buf, off))
}

/// Validated password pair with the derived 16-byte header validation fields.
#[derive(Debug, Clone)]
pub struct PasswordData {
    pub level_1_validation: [u8; 16],
    pub level_2_validation: [u8; 16],
}

/// Validates the level 1/2 password policy and derives validation fields.
///
/// Encryption is considered in use only when a level 2 password exists; a
/// level 2 password requires a level 1 password, and the two must differ.
/// A lone level 1 password carries no encryption and yields `None`.
pub fn process_passwords(
    level_1: Option<&str>,
    level_2: Option<&str>,
) -> Result<Option<PasswordData>> {
    match (level_1, level_2) {
        (_, None) => Ok(None),
        (None, Some(_)) => Err(MefError::PasswordPolicy(
            "a level 2 password requires a level 1 password".to_string(),
        )),
        (Some(l1), Some(l2)) => {
            if l1 == l2 {
                return Err(MefError::PasswordPolicy(
                    "level 1 and level 2 passwords must differ".to_string(),
                ));
            }
            Ok(Some(PasswordData {
                level_1_validation: derive_validation_field(l1),
                level_2_validation: derive_validation_field(l2),
            }))
        }
    }
}

/// 密码校验字段：SHA-256摘要的前16字节
fn derive_validation_field(password: &str) -> [u8; 16] {
    let digest = Sha256::digest(password.as_bytes());
    let mut field = [0u8; 16];
    field.copy_from_slice(&digest[..16]);
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_incremental_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let (a, b) = data.split_at(17);
        let mut crc = CRC_START_VALUE;
        crc = crc_update(a, crc);
        crc = crc_update(b, crc);
        assert_eq!(crc, crc_calculate(data));
    }

    #[test]
    fn test_string_field_round_trip() {
        let mut field = [0xffu8; 16];
        put_string_field(&mut field, "chan-01");
        assert_eq!(get_string_field(&field), "chan-01");
        assert_eq!(field[7], 0);
        assert_eq!(field[15], 0);
    }

    #[test]
    fn test_string_field_truncates_and_terminates() {
        let mut field = [0u8; 5];
        put_string_field(&mut field, "abcdefgh");
        assert_eq!(&field, b"abcd\0");
    }

    #[test]
    fn test_segment_base_name() {
        assert_eq!(segment_base_name("ecog", 0), "ecog-000000");
        assert_eq!(segment_base_name("ecog", 17), "ecog-000017");
    }

    #[test]
    fn test_session_location_strips_suffix() {
        let (path, name) = session_location(Path::new("data/run1.mefd")).unwrap();
        assert_eq!(name, "run1");
        assert_eq!(path, Path::new("data/run1.mefd"));

        let (path, name) = session_location(Path::new("data/run1")).unwrap();
        assert_eq!(name, "run1");
        assert_eq!(path, Path::new("data/run1.mefd"));
    }

    #[test]
    fn test_password_policy() {
        assert!(process_passwords(None, None).unwrap().is_none());
        assert!(process_passwords(Some("tech"), None).unwrap().is_none());
        assert!(process_passwords(None, Some("subject")).is_err());
        assert!(process_passwords(Some("same"), Some("same")).is_err());
        let pwd = process_passwords(Some("tech"), Some("subject"))
            .unwrap()
            .unwrap();
        assert_ne!(pwd.level_1_validation, pwd.level_2_validation);
    }
}
