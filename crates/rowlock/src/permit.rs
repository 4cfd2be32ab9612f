//! Lock permits
//!
//! A permit is the opaque token proving ownership of a row lock: 8 bytes
//! of big-endian acquisition timestamp (epoch millis) followed by 16
//! random bytes. Ownership is proven only by presenting the exact permit
//! bytes used to acquire the lock; the embedded timestamp drives lease
//! expiry checks by other contenders.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

use vellum_core::error::{Error, Result};

/// Encoded permit length: 8-byte timestamp + 16-byte nonce.
pub const PERMIT_LEN: usize = 24;

/// An opaque lock-ownership token with an embedded acquisition timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    timestamp_millis: u64,
    nonce: [u8; 16],
}

impl Permit {
    /// Generate a fresh permit stamped with the given acquisition time
    pub fn generate(timestamp_millis: u64) -> Self {
        Self {
            timestamp_millis,
            nonce: Uuid::new_v4().into_bytes(),
        }
    }

    /// The embedded acquisition timestamp (epoch millis)
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp_millis
    }

    /// Encode to the stored byte form
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PERMIT_LEN);
        bytes
            .write_u64::<BigEndian>(self.timestamp_millis)
            .expect("writing to a Vec cannot fail");
        bytes.extend_from_slice(&self.nonce);
        bytes
    }

    /// Decode from the stored byte form
    ///
    /// # Errors
    /// Returns an error when the input is not a well-formed permit.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PERMIT_LEN {
            return Err(Error::Serialization(format!(
                "permit must be {PERMIT_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut cursor = &bytes[..8];
        let timestamp_millis = cursor
            .read_u64::<BigEndian>()
            .map_err(|e| Error::Serialization(format!("malformed permit timestamp: {e}")))?;
        let mut nonce = [0u8; 16];
        nonce.copy_from_slice(&bytes[8..]);
        Ok(Self {
            timestamp_millis,
            nonce,
        })
    }
}
