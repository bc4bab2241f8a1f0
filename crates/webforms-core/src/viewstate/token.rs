//! Token framing
//!
//! A decoded token is `[compression:1][raw length:2][control count:2][hash:32][payload]`
//! with big-endian integers. The hash covers the payload only.

use core::convert::TryInto;

use crate::errors::ViewStateError;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Header length: compression + length + control count
pub const HEADER_LENGTH: usize = 1 + 2 + 2;

/// Length of the SHA-256 / HMAC-SHA256 digest
pub const HASH_LENGTH: usize = 32;

/// Offset of the payload within a decoded token
pub const PAYLOAD_OFFSET: usize = HEADER_LENGTH + HASH_LENGTH;

// ----------------------------------------------------------------------------
// Token Header
// ----------------------------------------------------------------------------

/// Fixed-size header at the start of every decoded token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHeader {
    /// Raw compression byte; validated by the manager after the hash check
    pub compression: u8,
    /// Uncompressed payload length
    pub raw_length: u16,
    /// Number of controls that contributed a record
    pub control_count: u16,
}

impl TokenHeader {
    /// Serialize into the first [`HEADER_LENGTH`] bytes of `out`
    pub fn write_to(&self, out: &mut [u8]) {
        out[0] = self.compression;
        out[1..3].copy_from_slice(&self.raw_length.to_be_bytes());
        out[3..5].copy_from_slice(&self.control_count.to_be_bytes());
    }

    /// Parse from the start of a decoded token
    pub fn parse(bytes: &[u8]) -> Result<Self, ViewStateError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(ViewStateError::TooShort {
                actual: bytes.len(),
                minimum: HEADER_LENGTH,
            });
        }

        let raw_length: [u8; 2] = bytes[1..3]
            .try_into()
            .map_err(|_| ViewStateError::TooShort {
                actual: bytes.len(),
                minimum: HEADER_LENGTH,
            })?;
        let control_count: [u8; 2] = bytes[3..5]
            .try_into()
            .map_err(|_| ViewStateError::TooShort {
                actual: bytes.len(),
                minimum: HEADER_LENGTH,
            })?;

        Ok(Self {
            compression: bytes[0],
            raw_length: u16::from_be_bytes(raw_length),
            control_count: u16::from_be_bytes(control_count),
        })
    }
}
