//! USM security parameters (RFC 3414 §2.4).

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;

/// `usmSecurityParameters`, carried inside `msgSecurityParameters` as the
/// content of an OCTET STRING.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsmSecurityParams {
    pub authoritative_engine_id: Bytes,
    pub authoritative_engine_boots: i32,
    pub authoritative_engine_time: i32,
    pub user_name: Bytes,
    pub auth_parameters: Bytes,
    pub priv_parameters: Bytes,
}

impl UsmSecurityParams {
    /// Security parameters for an initial discovery request: empty engine
    /// ID, zeroed boots/time, empty user and auth/priv parameters.
    pub fn discovery() -> Self {
        Self::default()
    }

    /// Encode as the SEQUENCE content of `usmSecurityParameters`.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        self.encode_tracking_auth(buf);
    }

    /// Like [`Self::encode`], but also returns the mark captured
    /// immediately before `auth_parameters` was written, so a caller can
    /// recover its forward byte range once the buffer is finished (see
    /// [`crate::ber::EncodeBuf::mark`]).
    pub(crate) fn encode_tracking_auth(&self, buf: &mut EncodeBuf) -> usize {
        let mut mark_before_auth = 0;
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_parameters);
            mark_before_auth = buf.mark();
            buf.push_octet_string(&self.auth_parameters);
            buf.push_octet_string(&self.user_name);
            buf.push_integer(self.authoritative_engine_time);
            buf.push_integer(self.authoritative_engine_boots);
            buf.push_octet_string(&self.authoritative_engine_id);
        });
        mark_before_auth
    }

    /// Decode from raw `usmSecurityParameters` bytes (the content of the
    /// enclosing `msgSecurityParameters` OCTET STRING).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let mut seq = decoder.read_sequence()?;
        let authoritative_engine_id = Bytes::copy_from_slice(seq.read_octet_string()?);
        let authoritative_engine_boots = seq.read_integer()?;
        let authoritative_engine_time = seq.read_integer()?;
        let user_name = Bytes::copy_from_slice(seq.read_octet_string()?);
        let auth_parameters = Bytes::copy_from_slice(seq.read_octet_string()?);
        let priv_parameters = Bytes::copy_from_slice(seq.read_octet_string()?);
        Ok(Self {
            authoritative_engine_id,
            authoritative_engine_boots,
            authoritative_engine_time,
            user_name,
            auth_parameters,
            priv_parameters,
        })
    }

    /// Byte length of the inner SEQUENCE content, including its own TLV
    /// header (i.e. the full size this contributes as an OCTET STRING's
    /// content).
    pub fn encoded_len(&self) -> usize {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.len()
    }
}

/// Security model identifier for USM (RFC 3411 §5).
pub const SECURITY_MODEL_USM: i32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_discovery_params() {
        let params = UsmSecurityParams::discovery();
        let mut buf = EncodeBuf::new();
        params.encode(&mut buf);
        let bytes = buf.finish();
        let decoded = UsmSecurityParams::decode(&bytes).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn roundtrip_populated_params() {
        let params = UsmSecurityParams {
            authoritative_engine_id: Bytes::from_static(b"\x80\x00\x1f\x88\x80"),
            authoritative_engine_boots: 3,
            authoritative_engine_time: 12345,
            user_name: Bytes::from_static(b"admin"),
            auth_parameters: Bytes::from_static(&[0u8; 12]),
            priv_parameters: Bytes::from_static(&[0u8; 8]),
        };
        let mut buf = EncodeBuf::new();
        params.encode(&mut buf);
        let bytes = buf.finish();
        let decoded = UsmSecurityParams::decode(&bytes).unwrap();
        assert_eq!(decoded, params);
    }
}
