//! BER decoding.
//!
//! `Decoder` is a cursor over a byte slice. Reading a constructed type
//! (SEQUENCE, PDU, ...) returns a new `Decoder` scoped to just that type's
//! content, so callers can walk into nested structures without manual
//! bounds bookkeeping.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};

/// Cursor-based BER decoder over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over the full slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// True if there is no more data to read.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Remaining unread bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Byte offset (within the buffer this decoder was created over) of the
    /// given subslice, for diagnostics in decode errors.
    pub fn offset_of(&self, content: &[u8]) -> usize {
        (content.as_ptr() as usize).saturating_sub(self.data.as_ptr() as usize)
    }

    /// Read one TLV: tag byte, BER length, and content slice. Advances the
    /// cursor past the content.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        if self.is_empty() {
            return Err(Error::decode(self.pos, DecodeErrorKind::TruncatedData));
        }
        let tag_byte = self.data[self.pos];
        let rest = &self.data[self.pos + 1..];
        let (len, len_octets) = decode_length(rest)
            .map_err(|_| Error::decode(self.pos, DecodeErrorKind::InvalidLength))?;
        let content_start = self.pos + 1 + len_octets;
        let content_end = content_start
            .checked_add(len)
            .ok_or_else(|| Error::decode(self.pos, DecodeErrorKind::TlvOverflow))?;
        if content_end > self.data.len() {
            return Err(Error::decode(self.pos, DecodeErrorKind::TlvOverflow));
        }
        let content = &self.data[content_start..content_end];
        self.pos = content_end;
        Ok((tag_byte, content))
    }

    /// Read a SEQUENCE and return a sub-decoder scoped to its content.
    pub fn read_sequence(&mut self) -> Result<Decoder<'a>> {
        let (tag_byte, content) = self.read_tlv()?;
        if tag_byte != tag::universal::SEQUENCE {
            return Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::SEQUENCE,
                    actual: tag_byte,
                },
            ));
        }
        Ok(Decoder::new(content))
    }

    /// Read a constructed value with an arbitrary expected tag (e.g. a PDU
    /// tag such as `GET_REQUEST`), returning a sub-decoder over its content.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder<'a>> {
        let (tag_byte, content) = self.read_tlv()?;
        if tag_byte != expected_tag {
            return Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::UnexpectedTag {
                    expected: expected_tag,
                    actual: tag_byte,
                },
            ));
        }
        Ok(Decoder::new(content))
    }

    /// Peek the next TLV's tag byte without consuming it.
    pub fn peek_tag(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::decode(self.pos, DecodeErrorKind::TruncatedData))
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<crate::oid::Oid> {
        let (tag_byte, content) = self.read_tlv()?;
        if tag_byte != tag::universal::OBJECT_IDENTIFIER {
            return Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::OBJECT_IDENTIFIER,
                    actual: tag_byte,
                },
            ));
        }
        crate::oid::from_ber_content(content)
    }

    /// Read an INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let (tag_byte, content) = self.read_tlv()?;
        if tag_byte != tag::universal::INTEGER {
            return Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::INTEGER,
                    actual: tag_byte,
                },
            ));
        }
        self.decode_integer(content)
    }

    /// Read an OCTET STRING, returning its raw content bytes.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8]> {
        let (tag_byte, content) = self.read_tlv()?;
        match tag_byte {
            tag::universal::OCTET_STRING => Ok(content),
            tag::universal::OCTET_STRING_CONSTRUCTED => {
                Err(Error::decode(self.offset_of(content), DecodeErrorKind::ConstructedOctetString))
            }
            other => Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::OCTET_STRING,
                    actual: other,
                },
            )),
        }
    }

    /// Decode two's-complement BER content bytes as a signed 32-bit integer.
    pub fn decode_integer(&self, content: &[u8]) -> Result<i32> {
        if content.is_empty() {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::ZeroLengthInteger));
        }
        if content.len() > 5 {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::IntegerOverflow));
        }
        let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
        for &b in content {
            value = (value << 8) | b as i64;
        }
        if value > i32::MAX as i64 || value < i32::MIN as i64 {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::IntegerOverflow));
        }
        Ok(value as i32)
    }

    /// Decode BER content bytes as an unsigned 32-bit integer (Counter32,
    /// Gauge32, TimeTicks).
    pub fn decode_unsigned32(&self, content: &[u8]) -> Result<u32> {
        if content.is_empty() {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::ZeroLengthInteger));
        }
        if content.len() > 5 {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::IntegerOverflow));
        }
        let mut value: u64 = 0;
        for &b in content {
            value = (value << 8) | b as u64;
        }
        if value > u32::MAX as u64 {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::IntegerOverflow));
        }
        Ok(value as u32)
    }

    /// Decode BER content bytes as an unsigned 64-bit integer (Counter64).
    pub fn decode_integer64(&self, content: &[u8]) -> Result<u64> {
        if content.is_empty() {
            return Err(Error::decode(self.offset_of(content), DecodeErrorKind::ZeroLengthInteger));
        }
        if content.len() > 8 {
            return Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::Integer64TooLong { length: content.len() },
            ));
        }
        let mut value: u128 = 0;
        for &b in content {
            value = (value << 8) | b as u128;
        }
        if value > u64::MAX as u128 {
            return Err(Error::decode(
                self.offset_of(content),
                DecodeErrorKind::Integer64TooLong { length: content.len() },
            ));
        }
        Ok(value as u64)
    }

    /// Validate that an exception TLV's content (noSuchObject,
    /// noSuchInstance, endOfMibView) is empty.
    pub fn expect_empty_exception(&self, content: &[u8]) -> Result<()> {
        if content.is_empty() {
            Ok(())
        } else {
            Err(Error::decode(self.offset_of(content), DecodeErrorKind::InvalidNull))
        }
    }
}
