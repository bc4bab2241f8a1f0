//! Token integrity
//!
//! Without key material the digest is a plain SHA-256, which catches
//! corruption and casual edits. With a key it is HMAC-SHA256, which also
//! prevents forging a token for a modified payload.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::viewstate::token::HASH_LENGTH;
use crate::{Result, WebFormsError};

type HmacSha256 = Hmac<Sha256>;

/// Digest used to protect view state payloads
#[derive(Clone)]
pub enum StateHasher {
    /// Unkeyed SHA-256
    Sha256,
    /// HMAC-SHA256 with pre-initialized key state
    Keyed(HmacSha256),
}

impl StateHasher {
    /// Build the hasher for optional key material
    pub fn new(key: Option<&str>) -> Result<Self> {
        match key {
            None => Ok(StateHasher::Sha256),
            Some(key) => {
                let mac = HmacSha256::new_from_slice(key.as_bytes())
                    .map_err(|e| WebFormsError::config_error(format!("invalid hash key: {}", e)))?;
                Ok(StateHasher::Keyed(mac))
            }
        }
    }

    /// Whether a key is in use
    pub fn is_keyed(&self) -> bool {
        matches!(self, StateHasher::Keyed(_))
    }

    /// Compute the digest of `data`
    pub fn compute(&self, data: &[u8]) -> [u8; HASH_LENGTH] {
        let mut out = [0u8; HASH_LENGTH];
        match self {
            StateHasher::Sha256 => out.copy_from_slice(&Sha256::digest(data)),
            StateHasher::Keyed(mac) => {
                let mut mac = mac.clone();
                mac.update(data);
                out.copy_from_slice(&mac.finalize().into_bytes());
            }
        }
        out
    }

    /// Compare the digest of `data` with `expected` in constant time
    pub fn verify(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute(data);
        computed.as_slice().ct_eq(expected).into()
    }
}

impl core::fmt::Debug for StateHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StateHasher::Sha256 => f.write_str("StateHasher::Sha256"),
            StateHasher::Keyed(_) => f.write_str("StateHasher::Keyed(..)"),
        }
    }
}
