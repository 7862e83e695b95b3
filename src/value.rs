//! SNMP variable values (SMIv2 base types plus protocol exceptions).

use bytes::Bytes;

use crate::ber::tag;
use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// The value carried by a variable binding.
///
/// Covers every SMIv2 base type used on the wire plus the three
/// GETNEXT/GETBULK protocol exceptions (`noSuchObject`, `noSuchInstance`,
/// `endOfMibView`), which are encoded as context-specific NULLs.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER
    Integer(i32),
    /// OCTET STRING
    OctetString(Bytes),
    /// NULL
    Null,
    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),
    /// IpAddress (4 octets, application tag 0x40)
    IpAddress([u8; 4]),
    /// Counter32 (application tag 0x41)
    Counter32(u32),
    /// Gauge32 / Unsigned32 (application tag 0x42)
    Gauge32(u32),
    /// TimeTicks (application tag 0x43)
    TimeTicks(u32),
    /// Opaque (application tag 0x44)
    Opaque(Bytes),
    /// Counter64 (application tag 0x46, RFC 2578)
    Counter64(u64),
    /// noSuchObject exception (context tag 0x80)
    NoSuchObject,
    /// noSuchInstance exception (context tag 0x81)
    NoSuchInstance,
    /// endOfMibView exception (context tag 0x82)
    EndOfMibView,
}

impl Value {
    /// True for the three GETNEXT/GETBULK protocol exceptions.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode this value's TLV into `buf`.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(b) => buf.push_octet_string(b),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(octets) => buf.push_ip_address(*octets),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(b) => buf.push_tagged_bytes(tag::application::OPAQUE, b),
            Value::Counter64(v) => buf.push_integer64(*v),
            Value::NoSuchObject => buf.push_exception(tag::context::NO_SUCH_OBJECT),
            Value::NoSuchInstance => buf.push_exception(tag::context::NO_SUCH_INSTANCE),
            Value::EndOfMibView => buf.push_exception(tag::context::END_OF_MIB_VIEW),
        }
    }

    /// Decode a single value's TLV from `decoder`.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let (tag_byte, content) = decoder.read_tlv()?;
        match tag_byte {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.decode_integer(content)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(Bytes::copy_from_slice(content))),
            tag::universal::NULL => {
                if !content.is_empty() {
                    return Err(Error::decode(decoder.offset_of(content), DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(crate::oid::from_ber_content(content)?))
            }
            tag::application::IP_ADDRESS => {
                if content.len() != 4 {
                    return Err(Error::decode(
                        decoder.offset_of(content),
                        DecodeErrorKind::InvalidIpAddressLength { length: content.len() },
                    ));
                }
                let mut octets = [0u8; 4];
                octets.copy_from_slice(content);
                Ok(Value::IpAddress(octets))
            }
            tag::application::COUNTER32 => Ok(Value::Counter32(decoder.decode_unsigned32(content)?)),
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.decode_unsigned32(content)?)),
            tag::application::TIMETICKS => Ok(Value::TimeTicks(decoder.decode_unsigned32(content)?)),
            tag::application::OPAQUE => Ok(Value::Opaque(Bytes::copy_from_slice(content))),
            tag::application::COUNTER64 => Ok(Value::Counter64(decoder.decode_integer64(content)?)),
            tag::context::NO_SUCH_OBJECT => {
                decoder.expect_empty_exception(content)?;
                Ok(Value::NoSuchObject)
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.expect_empty_exception(content)?;
                Ok(Value::NoSuchInstance)
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.expect_empty_exception(content)?;
                Ok(Value::EndOfMibView)
            }
            other => Err(Error::decode(
                decoder.offset_of(content),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::INTEGER,
                    actual: other,
                },
            )),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(b) => write!(f, "{}", crate::util::HexBytes(b)),
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Value::IpAddress(o) => write!(f, "{}.{}.{}.{}", o[0], o[1], o[2], o[3]),
            Value::Counter32(v) => write!(f, "Counter32: {v}"),
            Value::Gauge32(v) => write!(f, "Gauge32: {v}"),
            Value::TimeTicks(v) => write!(f, "Timeticks: {v}"),
            Value::Opaque(b) => write!(f, "Opaque: {}", crate::util::HexBytes(b)),
            Value::Counter64(v) => write!(f, "Counter64: {v}"),
            Value::NoSuchObject => write!(f, "No Such Object available"),
            Value::NoSuchInstance => write!(f, "No Such Instance currently exists"),
            Value::EndOfMibView => write!(f, "End of MIB View"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::Decoder;

    fn roundtrip(v: Value) -> Value {
        let mut buf = EncodeBuf::new();
        v.encode(&mut buf);
        let bytes = buf.finish();
        let mut decoder = Decoder::new(&bytes);
        Value::decode(&mut decoder).unwrap()
    }

    #[test]
    fn integer_roundtrip() {
        assert_eq!(roundtrip(Value::Integer(-42)), Value::Integer(-42));
        assert_eq!(roundtrip(Value::Integer(0)), Value::Integer(0));
    }

    #[test]
    fn octet_string_roundtrip() {
        let v = Value::OctetString(Bytes::from_static(b"hello"));
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn counter64_roundtrip() {
        assert_eq!(
            roundtrip(Value::Counter64(u64::MAX)),
            Value::Counter64(u64::MAX)
        );
    }

    #[test]
    fn oid_value_roundtrip() {
        let v = Value::ObjectIdentifier(crate::oid![1, 3, 6, 1, 4, 1, 99]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn exceptions_roundtrip() {
        assert_eq!(roundtrip(Value::NoSuchObject), Value::NoSuchObject);
        assert_eq!(roundtrip(Value::NoSuchInstance), Value::NoSuchInstance);
        assert_eq!(roundtrip(Value::EndOfMibView), Value::EndOfMibView);
    }

    #[test]
    fn is_exception_only_for_exceptions() {
        assert!(Value::EndOfMibView.is_exception());
        assert!(!Value::Integer(1).is_exception());
    }
}
