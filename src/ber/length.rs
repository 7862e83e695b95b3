//! BER length octet encoding and decoding (X.690 §8.1.3).

use crate::error::{DecodeErrorKind, Error, Result};

/// Encode a length value into its definite-form BER length octets.
///
/// Returns a stack-allocated array (max 5 octets: one long-form length byte
/// plus up to 4 bytes of length value, sufficient for any `usize` SNMP will
/// ever carry) and the count of valid octets, with the valid octets at the
/// END of the array for reverse-buffer compatibility.
pub(crate) fn encode_length(len: usize) -> ([u8; 5], usize) {
    if len < 0x80 {
        let mut arr = [0u8; 5];
        arr[4] = len as u8;
        return (arr, 1);
    }

    let bytes = (len as u64).to_be_bytes();
    let mut start = 0;
    while start < 7 && bytes[start] == 0 {
        start += 1;
    }
    let value_len = 8 - start;

    let mut arr = [0u8; 5];
    arr[5 - value_len - 1] = 0x80 | value_len as u8;
    arr[5 - value_len..].copy_from_slice(&bytes[start..]);
    (arr, value_len + 1)
}

/// Decode a BER length field starting at `input[0]`.
///
/// Returns the decoded length and the number of octets consumed from the
/// start of `input` (i.e. the length of the length field itself).
pub(crate) fn decode_length(input: &[u8]) -> Result<(usize, usize)> {
    let first = *input
        .first()
        .ok_or_else(|| Error::decode(0, DecodeErrorKind::TruncatedData))?;

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7f) as usize;
    if num_octets == 0 {
        return Err(Error::decode(0, DecodeErrorKind::IndefiniteLength));
    }
    if num_octets > 8 {
        return Err(Error::decode(0, DecodeErrorKind::LengthTooLong { octets: num_octets }));
    }
    if input.len() < 1 + num_octets {
        return Err(Error::decode(0, DecodeErrorKind::TruncatedData));
    }

    let mut value: u64 = 0;
    for &b in &input[1..1 + num_octets] {
        value = (value << 8) | b as u64;
    }
    if value > usize::MAX as u64 {
        return Err(Error::decode(0, DecodeErrorKind::InvalidLength));
    }
    Ok((value as usize, 1 + num_octets))
}
