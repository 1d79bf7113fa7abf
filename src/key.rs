//! Key encoding (spec §4.B).
//!
//! Fixed-width integer keys are big-endian so lexicographic tree order
//! matches numeric order. Non-unique secondary keys are encoded as
//! `secondary ‖ primary ‖ u16_be(len(secondary))` so that a prefix scan
//! over `secondary` groups every primary sharing that secondary key
//! together, while still letting us split the suffix back into
//! `(primary, secondary)` without an external schema.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CResult, Error};
use crate::Revision;

/// Encodes a revision as an 8-byte big-endian key.
pub fn encode_revision(rev: Revision) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.write_u64::<BigEndian>(rev).expect("writing to a Vec cannot fail");
    buf
}

/// Decodes an 8-byte big-endian revision key.
pub fn decode_revision(mut bytes: &[u8]) -> CResult<Revision> {
    bytes
        .read_u64::<BigEndian>()
        .map_err(|e| Error::Encoding(format!("bad revision key: {e}")))
}

/// Encodes a non-unique secondary key as `secondary ‖ primary ‖ u16_be(len(secondary))`.
///
/// The length suffix is required because both `secondary` and `primary`
/// are variable-length byte strings and the tree has no schema to tell
/// the two apart on the way back out.
pub fn encode_non_unique(primary: &[u8], secondary: &[u8]) -> CResult<Vec<u8>> {
    if secondary.len() > u16::MAX as usize {
        return Err(Error::Encoding("secondary key longer than 65535 bytes".into()));
    }
    let mut buf = Vec::with_capacity(secondary.len() + primary.len() + 2);
    buf.extend_from_slice(secondary);
    buf.extend_from_slice(primary);
    buf.write_u16::<BigEndian>(secondary.len() as u16).expect("writing to a Vec cannot fail");
    Ok(buf)
}

/// Splits an encoded non-unique key back into `(primary, secondary)`.
pub fn decode_non_unique(encoded: &[u8]) -> CResult<(Vec<u8>, Vec<u8>)> {
    if encoded.len() < 2 {
        return Err(Error::Encoding("non-unique key too short to contain a length suffix".into()));
    }
    let (body, mut len_suffix) = encoded.split_at(encoded.len() - 2);
    let secondary_len = len_suffix
        .read_u16::<BigEndian>()
        .map_err(|e| Error::Encoding(format!("bad non-unique key length suffix: {e}")))?
        as usize;
    if secondary_len > body.len() {
        return Err(Error::Encoding("non-unique key length suffix exceeds key body".into()));
    }
    let (secondary, primary) = body.split_at(secondary_len);
    Ok((primary.to_vec(), secondary.to_vec()))
}

/// The prefix to scan a non-unique index by a given secondary key: the
/// bare `secondary` bytes, since every encoded key for that secondary
/// starts with them.
pub fn non_unique_prefix(secondary: &[u8]) -> Vec<u8> {
    secondary.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_round_trips_and_orders_numerically() {
        let a = encode_revision(1);
        let b = encode_revision(2);
        let big = encode_revision(1 << 40);
        assert!(a < b);
        assert!(b < big);
        assert_eq!(decode_revision(&a).unwrap(), 1);
        assert_eq!(decode_revision(&big).unwrap(), 1 << 40);
    }

    #[test]
    fn non_unique_round_trips_for_arbitrary_byte_strings() {
        let cases: &[(&[u8], &[u8])] = &[
            (b"", b""),
            (b"primary", b""),
            (b"", b"secondary"),
            (b"p", b"s"),
            (&[0xff, 0x00, 0x01], &[0x00, 0xff]),
        ];
        for (primary, secondary) in cases {
            let encoded = encode_non_unique(primary, secondary).unwrap();
            let (p, s) = decode_non_unique(&encoded).unwrap();
            assert_eq!(&p, primary);
            assert_eq!(&s, secondary);
        }
    }

    #[test]
    fn non_unique_prefix_scan_groups_by_secondary() {
        let a = encode_non_unique(b"alice", b"odd").unwrap();
        let b = encode_non_unique(b"bob", b"odd").unwrap();
        let c = encode_non_unique(b"carol", b"even").unwrap();
        let prefix = non_unique_prefix(b"odd");
        assert!(a.starts_with(&prefix));
        assert!(b.starts_with(&prefix));
        assert!(!c.starts_with(&prefix));
    }
}
