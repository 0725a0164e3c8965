use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MefError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Password policy violated: {0}")]
    PasswordPolicy(String),

    #[error("Invalid segment number: {0}")]
    InvalidSegmentNumber(i32),

    #[error("Corrupt data: {0}")]
    CorruptData(String),
}

pub type Result<T> = std::result::Result<T, MefError>;
