//! Cell-level encodings
//!
//! Every stored field value is prefixed with a one-byte marker
//! distinguishing "value present" from "deleted". The tombstone marker is
//! what lets point-in-time reads reconstruct "deleted at version N"
//! rather than "never set"; decoding must check the marker before
//! deserializing. Version numbers are stored big-endian.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use vellum_core::error::{Error, Result};

/// Marker byte: the cell holds a value
pub const VALUE_EXISTS: u8 = 0x01;
/// Marker byte: the field was deleted at this version
pub const VALUE_DELETED: u8 = 0x00;

/// Prefix serialized value bytes with the exists marker
pub fn encode_existing(value_bytes: &[u8]) -> Vec<u8> {
    let mut cell = Vec::with_capacity(value_bytes.len() + 1);
    cell.push(VALUE_EXISTS);
    cell.extend_from_slice(value_bytes);
    cell
}

/// The tombstone cell written for a field delete
pub fn tombstone() -> Vec<u8> {
    vec![VALUE_DELETED]
}

/// Whether a cell holds the tombstone marker
pub fn is_tombstone(cell: &[u8]) -> bool {
    cell.first() == Some(&VALUE_DELETED)
}

/// Decode a marked cell: `Some(value bytes)` or `None` for a tombstone
///
/// # Errors
/// Returns an error on an empty cell or an unknown marker byte.
pub fn decode_marked(cell: &[u8]) -> Result<Option<&[u8]>> {
    match cell.first() {
        Some(&VALUE_EXISTS) => Ok(Some(&cell[1..])),
        Some(&VALUE_DELETED) => Ok(None),
        Some(marker) => Err(Error::Serialization(format!(
            "unknown field value marker 0x{marker:02x}"
        ))),
        None => Err(Error::Serialization("empty field value cell".into())),
    }
}

/// Encode a version number to its stored byte form
pub fn encode_version(version: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8);
    bytes
        .write_u64::<BigEndian>(version)
        .expect("writing to a Vec cannot fail");
    bytes
}

/// Decode a stored version number
///
/// # Errors
/// Returns an error when the cell is not a well-formed version.
pub fn decode_version(mut bytes: &[u8]) -> Result<u64> {
    if bytes.len() != 8 {
        return Err(Error::Serialization(format!(
            "version cell must be 8 bytes, got {}",
            bytes.len()
        )));
    }
    bytes
        .read_u64::<BigEndian>()
        .map_err(|e| Error::Serialization(format!("malformed version cell: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marked_value_roundtrip() {
        let cell = encode_existing(b"payload");
        assert!(!is_tombstone(&cell));
        assert_eq!(decode_marked(&cell).unwrap(), Some(b"payload".as_slice()));
    }

    #[test]
    fn test_tombstone_decodes_to_none() {
        let cell = tombstone();
        assert!(is_tombstone(&cell));
        assert_eq!(decode_marked(&cell).unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_marked(&[]).is_err());
        assert!(decode_marked(&[0x7f, 1, 2]).is_err());
    }

    #[test]
    fn test_version_roundtrip() {
        for v in [0u64, 1, 255, u64::MAX] {
            assert_eq!(decode_version(&encode_version(v)).unwrap(), v);
        }
        assert!(decode_version(&[1, 2, 3]).is_err());
    }
}
