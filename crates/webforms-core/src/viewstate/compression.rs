//! View state compression
//!
//! Codecs are tried in the configured preference order and a result is kept
//! only when it is strictly smaller than the raw payload. Small trees usually
//! end up stored raw.

use std::io::{self, Read, Write};

use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression as DeflateLevel};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Compression Kind
// ----------------------------------------------------------------------------

/// Codec identifier stored in the first byte of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionKind {
    /// Payload stored as-is
    Raw = 0,
    /// Raw deflate stream (flate2)
    Deflate = 1,
    /// Zstandard frame
    Zstd = 2,
}

impl CompressionKind {
    /// Parse the header byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionKind::Raw),
            1 => Some(CompressionKind::Deflate),
            2 => Some(CompressionKind::Zstd),
            _ => None,
        }
    }

    /// Header byte for this codec
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Strongest available codecs first
    pub fn default_preference() -> Vec<CompressionKind> {
        if CompressionKind::Zstd.is_available() {
            vec![CompressionKind::Zstd, CompressionKind::Deflate]
        } else {
            vec![CompressionKind::Deflate]
        }
    }

    /// Whether this build can encode and decode the codec
    pub fn is_available(self) -> bool {
        match self {
            CompressionKind::Raw | CompressionKind::Deflate => true,
            CompressionKind::Zstd => cfg!(feature = "zstd"),
        }
    }

    /// Append the compressed form of `data` to `out`
    pub fn compress_into(self, data: &[u8], out: &mut Vec<u8>, level: i32) -> io::Result<()> {
        match self {
            CompressionKind::Raw => {
                out.extend_from_slice(data);
                Ok(())
            }
            CompressionKind::Deflate => {
                let mut encoder = DeflateEncoder::new(out, DeflateLevel::default());
                encoder.write_all(data)?;
                encoder.finish()?;
                Ok(())
            }
            CompressionKind::Zstd => zstd_compress(data, out, level),
        }
    }

    /// Append the decompressed form of `data` to `out`, reading at most one
    /// byte more than `expected_length` so a lying header cannot force a
    /// large allocation
    pub fn decompress_into(
        self,
        data: &[u8],
        out: &mut Vec<u8>,
        expected_length: usize,
    ) -> io::Result<()> {
        let limit = expected_length as u64 + 1;
        match self {
            CompressionKind::Raw => {
                out.extend_from_slice(data);
                Ok(())
            }
            CompressionKind::Deflate => {
                DeflateDecoder::new(data).take(limit).read_to_end(out)?;
                Ok(())
            }
            CompressionKind::Zstd => zstd_decompress(data, out, limit),
        }
    }
}

#[cfg(feature = "zstd")]
fn zstd_compress(data: &[u8], out: &mut Vec<u8>, level: i32) -> io::Result<()> {
    zstd::stream::copy_encode(data, out, level)
}

#[cfg(not(feature = "zstd"))]
fn zstd_compress(_data: &[u8], _out: &mut Vec<u8>, _level: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "zstd support is not compiled in",
    ))
}

#[cfg(feature = "zstd")]
fn zstd_decompress(data: &[u8], out: &mut Vec<u8>, limit: u64) -> io::Result<()> {
    let decoder = zstd::stream::read::Decoder::new(data)?;
    decoder.take(limit).read_to_end(out)?;
    Ok(())
}

#[cfg(not(feature = "zstd"))]
fn zstd_decompress(_data: &[u8], _out: &mut Vec<u8>, _limit: u64) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "zstd support is not compiled in",
    ))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(kind: CompressionKind, data: &[u8]) -> Vec<u8> {
        let mut compressed = Vec::new();
        kind.compress_into(data, &mut compressed, 3).unwrap();
        let mut decompressed = Vec::new();
        kind.decompress_into(&compressed, &mut decompressed, data.len())
            .unwrap();
        decompressed
    }

    #[test]
    fn test_header_byte_roundtrip() {
        for kind in [
            CompressionKind::Raw,
            CompressionKind::Deflate,
            CompressionKind::Zstd,
        ] {
            assert_eq!(CompressionKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(CompressionKind::from_u8(9), None);
    }

    #[test]
    fn test_deflate_roundtrip() {
        let data = "WebForms view state ".repeat(40).into_bytes();
        assert_eq!(roundtrip(CompressionKind::Deflate, &data), data);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_roundtrip() {
        let data = "WebForms view state ".repeat(40).into_bytes();
        assert_eq!(roundtrip(CompressionKind::Zstd, &data), data);
    }

    #[test]
    fn test_repetitive_data_shrinks() {
        let data = vec![b'A'; 1000];
        let mut compressed = Vec::new();
        CompressionKind::Deflate
            .compress_into(&data, &mut compressed, 0)
            .unwrap();
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_decompression_is_bounded_by_expected_length() {
        let data = vec![0u8; 4096];
        let mut compressed = Vec::new();
        CompressionKind::Deflate
            .compress_into(&data, &mut compressed, 0)
            .unwrap();

        let mut out = Vec::new();
        CompressionKind::Deflate
            .decompress_into(&compressed, &mut out, 10)
            .unwrap();
        assert_eq!(out.len(), 11);
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        let mut out = Vec::new();
        let result =
            CompressionKind::Deflate.decompress_into(&[0xFF, 0xFF, 0xFF, 0xFF], &mut out, 10);
        assert!(result.is_err());
    }
}
