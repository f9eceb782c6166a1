// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types surfaced by this crate.

use thiserror::Error;

/// Errors that can occur while reading a JFR recording.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The input does not begin with the JFR magic bytes.
    #[error("input is not a JFR recording (bad magic)")]
    NotJfr,

    /// The chunk declares a major/minor version this reader doesn't support.
    #[error("unsupported JFR version {0}.{1}")]
    UnsupportedVersion(u16, u16),

    /// A structural element of the file failed to decode.
    #[error("malformed JFR data: {0}")]
    InvalidFormat(String),

    /// A read ran past the end of the mapped image or the current chunk limit.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// An I/O error occurred opening or mapping the file.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(e: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match e {
            nom::Err::Incomplete(_) => Self::UnexpectedEof,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Self::InvalidFormat(format!("{:?}", e.code))
            }
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
