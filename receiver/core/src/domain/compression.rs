// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Payload compression selection
//!
//! Agents announce how their upload is compressed with a short tag. The set
//! of algorithms is closed: unknown tags are rejected, never defaulted.

use std::fmt;
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zlib,
    Zstd,
}

impl Compression {
    /// Map a tag to an algorithm (ASCII case-insensitive)
    pub fn from_tag(tag: &str) -> Result<Self, CompressionError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "zlib" => Ok(Compression::Zlib),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(CompressionError::Unsupported(tag.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zlib => "zlib",
            Compression::Zstd => "zstd",
        }
    }

    /// Decompress `payload`, refusing output larger than `max_bytes`.
    ///
    /// Nothing partial is returned: either the full payload or an error.
    pub fn decompress(&self, payload: &[u8], max_bytes: u64) -> Result<Vec<u8>, CompressionError> {
        let output = match self {
            Compression::None => payload.to_vec(),
            Compression::Gzip => read_bounded(flate2::read::GzDecoder::new(payload), max_bytes)?,
            Compression::Zlib => read_bounded(flate2::read::ZlibDecoder::new(payload), max_bytes)?,
            Compression::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(payload)
                    .map_err(|e| CompressionError::Corrupt(e.to_string()))?;
                read_bounded(decoder, max_bytes)?
            }
        };

        if output.len() as u64 > max_bytes {
            return Err(CompressionError::TooLarge(max_bytes));
        }
        Ok(output)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn read_bounded(reader: impl Read, max_bytes: u64) -> Result<Vec<u8>, CompressionError> {
    let mut output = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut output)
        .map_err(|e| CompressionError::Corrupt(e.to_string()))?;
    Ok(output)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompressionError {
    #[error("unsupported compression '{0}'")]
    Unsupported(String),

    #[error("corrupt payload: {0}")]
    Corrupt(String),

    #[error("decompressed payload exceeds {0} bytes")]
    TooLarge(u64),
}
