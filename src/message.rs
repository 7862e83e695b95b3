//! SNMP message envelope (RFC 1157 §4, RFC 1901, RFC 3412 §6).

use std::ops::Range;

use bytes::Bytes;

use crate::ber::tag;
use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::v3::usm::{UsmSecurityParams, SECURITY_MODEL_USM};
use crate::version::Version;

/// SNMPv3 security level (RFC 3414 §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    fn flags_byte(self, reportable: bool) -> u8 {
        let level_bits = match self {
            SecurityLevel::NoAuthNoPriv => 0b000,
            SecurityLevel::AuthNoPriv => 0b001,
            SecurityLevel::AuthPriv => 0b011,
        };
        level_bits | if reportable { 0b100 } else { 0 }
    }

    fn from_flags_byte(b: u8) -> Result<(Self, bool)> {
        let reportable = b & 0b100 != 0;
        let level = match b & 0b011 {
            0b000 => SecurityLevel::NoAuthNoPriv,
            0b001 => SecurityLevel::AuthNoPriv,
            0b011 => SecurityLevel::AuthPriv,
            _ => return Err(Error::decode(0, DecodeErrorKind::InvalidMsgFlags)),
        };
        Ok((level, reportable))
    }

    pub fn requires_auth(self) -> bool {
        !matches!(self, SecurityLevel::NoAuthNoPriv)
    }

    pub fn requires_priv(self) -> bool {
        matches!(self, SecurityLevel::AuthPriv)
    }
}

/// The scoped PDU carried by a v3 message: plaintext when the security
/// level doesn't require privacy, otherwise an opaque ciphertext blob
/// produced/consumed by [`crate::v3::privacy`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScopedPdu {
    Plaintext {
        context_engine_id: Bytes,
        context_name: Bytes,
        pdu: Pdu,
    },
    Encrypted(Bytes),
}

impl ScopedPdu {
    fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            ScopedPdu::Plaintext { context_engine_id, context_name, pdu } => {
                buf.push_sequence(|buf| {
                    pdu.encode(buf);
                    buf.push_octet_string(context_name);
                    buf.push_octet_string(context_engine_id);
                });
            }
            ScopedPdu::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
        }
    }

    /// Decode a scoped PDU, enforcing that its wire shape matches
    /// `security_level`: `authPriv` must carry an encrypted blob, anything
    /// else must carry a plaintext SEQUENCE. The tag alone (OCTET STRING vs.
    /// SEQUENCE) is what distinguishes the two branches on the wire, but it
    /// must never be trusted on its own — an agent claiming `authPriv` while
    /// handing back a tag-sniffed-plaintext SEQUENCE would let a response
    /// bypass decryption/privacy enforcement entirely.
    fn decode(decoder: &mut Decoder, security_level: SecurityLevel) -> Result<Self> {
        let requires_priv = security_level.requires_priv();
        match decoder.peek_tag()? {
            tag::universal::OCTET_STRING => {
                if !requires_priv {
                    return Err(Error::decode(0, DecodeErrorKind::UnexpectedEncryption));
                }
                let ciphertext = decoder.read_octet_string()?;
                Ok(ScopedPdu::Encrypted(Bytes::copy_from_slice(ciphertext)))
            }
            _ => {
                if requires_priv {
                    return Err(Error::decode(0, DecodeErrorKind::ExpectedEncryption));
                }
                let mut seq = decoder.read_sequence()?;
                let context_engine_id = Bytes::copy_from_slice(seq.read_octet_string()?);
                let context_name = Bytes::copy_from_slice(seq.read_octet_string()?);
                let pdu = Pdu::decode(&mut seq)?;
                Ok(ScopedPdu::Plaintext { context_engine_id, context_name, pdu })
            }
        }
    }

    /// Encode just the plaintext scoped-PDU SEQUENCE, for encryption by the
    /// privacy layer. Panics if called on an already-encrypted value.
    pub fn encode_plaintext_bytes(&self) -> Bytes {
        let ScopedPdu::Plaintext { .. } = self else {
            panic!("encode_plaintext_bytes called on an already-encrypted ScopedPdu");
        };
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }
}

/// v1/v2c (community-based) or v3 (USM) message contents.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageData {
    Community { community: Bytes, pdu: Pdu },
    V3 {
        msg_id: i32,
        msg_max_size: i32,
        security_level: SecurityLevel,
        reportable: bool,
        security_params: UsmSecurityParams,
        scoped_pdu: ScopedPdu,
    },
}

/// The result of encoding a message: the wire bytes, plus (for v3
/// authenticated messages) the byte range occupied by the
/// `msgAuthenticationParameters` placeholder that the caller must
/// overwrite with the real HMAC digest.
pub struct EncodedMessage {
    pub bytes: Bytes,
    pub auth_params_range: Option<Range<usize>>,
}

/// A full SNMP message.
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpMessage {
    pub version: Version,
    pub data: MessageData,
}

impl SnmpMessage {
    pub fn community(version: Version, community: Bytes, pdu: Pdu) -> Self {
        Self { version, data: MessageData::Community { community, pdu } }
    }

    /// Access the PDU, when it is available in plaintext (v1/v2c always;
    /// v3 only before/after the privacy layer has decrypted/encrypted it).
    pub fn pdu(&self) -> Option<&Pdu> {
        match &self.data {
            MessageData::Community { pdu, .. } => Some(pdu),
            MessageData::V3 { scoped_pdu: ScopedPdu::Plaintext { pdu, .. }, .. } => Some(pdu),
            MessageData::V3 { scoped_pdu: ScopedPdu::Encrypted(_), .. } => None,
        }
    }

    /// Encode the full message. For v3 messages with a non-empty
    /// `auth_parameters` length in `security_params`, the bytes at that
    /// position are written as-is (typically a zero placeholder of length
    /// [`crate::v3::auth::AUTH_PARAMS_PLACEHOLDER_LEN`]) and
    /// `auth_params_range` identifies where to patch in the real digest.
    pub fn encode(&self) -> EncodedMessage {
        let mut buf = EncodeBuf::new();

        // Populated only for V3 messages with a non-empty auth_parameters
        // field; (mark taken right before the msgSecurityParameters OCTET
        // STRING was written, its content length, mark taken right before
        // auth_parameters within that nested content).
        let mut sp_tracking: Option<(usize, usize, usize)> = None;

        buf.push_sequence(|buf| match &self.data {
            MessageData::Community { community, pdu } => {
                pdu.encode(buf);
                buf.push_octet_string(community);
                buf.push_integer(self.version.as_i32());
            }
            MessageData::V3 {
                msg_id,
                msg_max_size,
                security_level,
                reportable,
                security_params,
                scoped_pdu,
            } => {
                scoped_pdu.encode(buf);

                let mut inner = EncodeBuf::new();
                let mark_before_auth = security_params.encode_tracking_auth(&mut inner);
                let inner_bytes = inner.finish_vec();

                let mark_before_sp = buf.mark();
                buf.push_octet_string(&inner_bytes);

                if !security_params.auth_parameters.is_empty() {
                    sp_tracking = Some((mark_before_sp, inner_bytes.len(), mark_before_auth));
                }

                buf.push_sequence(|buf| {
                    buf.push_integer(SECURITY_MODEL_USM);
                    buf.push_octet_string(&[security_level.flags_byte(*reportable)]);
                    buf.push_integer(*msg_max_size);
                    buf.push_integer(*msg_id);
                });

                buf.push_integer(self.version.as_i32());
            }
        });

        let bytes = buf.finish();
        let total = bytes.len();

        let auth_params_range = sp_tracking.map(|(mark_before_sp, inner_len, mark_before_auth)| {
            let auth_len = match &self.data {
                MessageData::V3 { security_params, .. } => security_params.auth_parameters.len(),
                MessageData::Community { .. } => 0,
            };
            let sp_content_start = total - mark_before_sp - inner_len;
            let local_auth_start = inner_len - mark_before_auth - auth_len;
            let local_auth_end = inner_len - mark_before_auth;
            (sp_content_start + local_auth_start)..(sp_content_start + local_auth_end)
        });

        EncodedMessage { bytes, auth_params_range }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let mut seq = decoder.read_sequence()?;
        let version_raw = seq.read_integer()?;
        let version = Version::from_i32(version_raw)
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::UnknownVersion(version_raw)))?;

        match version {
            Version::V1 | Version::V2c => {
                let community = Bytes::copy_from_slice(seq.read_octet_string()?);
                let pdu = Pdu::decode(&mut seq)?;
                Ok(SnmpMessage { version, data: MessageData::Community { community, pdu } })
            }
            Version::V3 => {
                let mut global = seq.read_sequence()?;
                let msg_id = global.read_integer()?;
                let msg_max_size = global.read_integer()?;
                let flags = global.read_octet_string()?;
                let flags_byte = *flags.first().unwrap_or(&0);
                let (security_level, reportable) = SecurityLevel::from_flags_byte(flags_byte)?;
                let _security_model = global.read_integer()?;

                let security_params_bytes = seq.read_octet_string()?;
                let security_params = UsmSecurityParams::decode(security_params_bytes)?;

                let scoped_pdu = ScopedPdu::decode(&mut seq, security_level)?;

                Ok(SnmpMessage {
                    version,
                    data: MessageData::V3 {
                        msg_id,
                        msg_max_size,
                        security_level,
                        reportable,
                        security_params,
                        scoped_pdu,
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::PduType;
    use crate::varbind::VarBind;

    #[test]
    fn v2c_community_roundtrip() {
        let pdu = Pdu::request(PduType::GetRequest, 1, vec![VarBind::null(oid![1, 3, 6, 1, 2, 1, 1, 1, 0])]);
        let msg = SnmpMessage::community(Version::V2c, Bytes::from_static(b"public"), pdu.clone());
        let encoded = msg.encode();
        assert!(encoded.auth_params_range.is_none());
        let decoded = SnmpMessage::decode(&encoded.bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.pdu(), Some(&pdu));
    }

    #[test]
    fn v3_no_auth_no_priv_roundtrip() {
        let pdu = Pdu::request(PduType::GetRequest, 5, vec![VarBind::null(oid![1, 3, 6, 1, 2, 1, 1, 1, 0])]);
        let msg = SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id: 42,
                msg_max_size: 65507,
                security_level: SecurityLevel::NoAuthNoPriv,
                reportable: true,
                security_params: UsmSecurityParams {
                    user_name: Bytes::from_static(b"user1"),
                    ..UsmSecurityParams::discovery()
                },
                scoped_pdu: ScopedPdu::Plaintext {
                    context_engine_id: Bytes::new(),
                    context_name: Bytes::new(),
                    pdu,
                },
            },
        };
        let encoded = msg.encode();
        assert!(encoded.auth_params_range.is_none());
        let decoded = SnmpMessage::decode(&encoded.bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn v3_auth_params_range_points_at_placeholder() {
        let pdu = Pdu::request(PduType::GetRequest, 5, vec![VarBind::null(oid![1, 3, 6, 1, 2, 1, 1, 1, 0])]);
        let placeholder = Bytes::from_static(&[0u8; 12]);
        let msg = SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id: 42,
                msg_max_size: 65507,
                security_level: SecurityLevel::AuthNoPriv,
                reportable: true,
                security_params: UsmSecurityParams {
                    user_name: Bytes::from_static(b"user1"),
                    auth_parameters: placeholder.clone(),
                    ..UsmSecurityParams::discovery()
                },
                scoped_pdu: ScopedPdu::Plaintext {
                    context_engine_id: Bytes::new(),
                    context_name: Bytes::new(),
                    pdu,
                },
            },
        };
        let encoded = msg.encode();
        let range = encoded.auth_params_range.expect("range present");
        assert_eq!(&encoded.bytes[range], &placeholder[..]);
    }

    #[test]
    fn auth_priv_message_with_plaintext_scoped_pdu_is_rejected() {
        let pdu = Pdu::request(PduType::GetRequest, 5, vec![VarBind::null(oid![1, 3, 6, 1, 2, 1, 1, 1, 0])]);
        let msg = SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id: 42,
                msg_max_size: 65507,
                // Claims authPriv, but the scoped PDU is a plaintext SEQUENCE,
                // as if an agent (or attacker) skipped encryption.
                security_level: SecurityLevel::AuthPriv,
                reportable: true,
                security_params: UsmSecurityParams {
                    user_name: Bytes::from_static(b"user1"),
                    ..UsmSecurityParams::discovery()
                },
                scoped_pdu: ScopedPdu::Plaintext {
                    context_engine_id: Bytes::new(),
                    context_name: Bytes::new(),
                    pdu,
                },
            },
        };
        let encoded = msg.encode();
        let err = SnmpMessage::decode(&encoded.bytes).unwrap_err();
        assert!(matches!(err, Error::Decode { kind: DecodeErrorKind::ExpectedEncryption, .. }));
    }

    #[test]
    fn no_auth_message_with_encrypted_scoped_pdu_is_rejected() {
        let msg = SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id: 42,
                msg_max_size: 65507,
                // Claims noAuthNoPriv, but the scoped PDU is an opaque
                // ciphertext blob that no plaintext-only peer should produce.
                security_level: SecurityLevel::NoAuthNoPriv,
                reportable: true,
                security_params: UsmSecurityParams {
                    user_name: Bytes::from_static(b"user1"),
                    ..UsmSecurityParams::discovery()
                },
                scoped_pdu: ScopedPdu::Encrypted(Bytes::from_static(b"not really encrypted")),
            },
        };
        let encoded = msg.encode();
        let err = SnmpMessage::decode(&encoded.bytes).unwrap_err();
        assert!(matches!(err, Error::Decode { kind: DecodeErrorKind::UnexpectedEncryption, .. }));
    }
}
