//! SNMP PDU types (RFC 1157, RFC 1905, RFC 3416).

use crate::ber::tag;
use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::varbind::{decode_varbind_list, encode_varbind_list, VarBind};

/// The PDU operation type, carried as the outermost context-specific tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    GetBulkRequest,
    /// REPORT PDU (RFC 3412), used for SNMPv3 engine discovery and error
    /// reporting (unknownEngineID, notInTimeWindow, etc).
    Report,
}

impl PduType {
    const fn wire_tag(self) -> u8 {
        match self {
            PduType::GetRequest => tag::pdu::GET_REQUEST,
            PduType::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            PduType::Response => tag::pdu::RESPONSE,
            PduType::SetRequest => tag::pdu::SET_REQUEST,
            PduType::GetBulkRequest => tag::pdu::GET_BULK_REQUEST,
            PduType::Report => tag::pdu::REPORT,
        }
    }

    fn from_wire_tag(tag_byte: u8) -> Result<Self> {
        match tag_byte {
            tag::pdu::GET_REQUEST => Ok(PduType::GetRequest),
            tag::pdu::GET_NEXT_REQUEST => Ok(PduType::GetNextRequest),
            tag::pdu::RESPONSE => Ok(PduType::Response),
            tag::pdu::SET_REQUEST => Ok(PduType::SetRequest),
            tag::pdu::GET_BULK_REQUEST => Ok(PduType::GetBulkRequest),
            tag::pdu::REPORT => Ok(PduType::Report),
            other => Err(Error::decode(0, DecodeErrorKind::UnknownPduType(other))),
        }
    }

    /// True for GETBULK, whose third/fourth fields are non-repeaters and
    /// max-repetitions rather than error-status and error-index.
    pub fn is_bulk(self) -> bool {
        matches!(self, PduType::GetBulkRequest)
    }
}

/// The error-status/error-index pair, or for GETBULK requests the
/// non-repeaters/max-repetitions pair that occupies the same wire position
/// (RFC 3416 §4.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorInfo {
    Standard {
        error_status: ErrorStatus,
        error_index: i32,
    },
    Bulk {
        non_repeaters: i32,
        max_repetitions: i32,
    },
}

impl ErrorInfo {
    pub fn success() -> Self {
        ErrorInfo::Standard {
            error_status: ErrorStatus::NoError,
            error_index: 0,
        }
    }

    pub fn bulk(non_repeaters: i32, max_repetitions: i32) -> Self {
        ErrorInfo::Bulk {
            non_repeaters,
            max_repetitions,
        }
    }

    fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            ErrorInfo::Standard { error_status, error_index } => {
                buf.push_integer(*error_index);
                buf.push_integer(error_status.as_i32());
            }
            ErrorInfo::Bulk { non_repeaters, max_repetitions } => {
                buf.push_integer(*max_repetitions);
                buf.push_integer(*non_repeaters);
            }
        }
    }
}

/// An SNMP PDU: request id, error/bulk parameters, and the variable-binding
/// list.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_info: ErrorInfo,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn new(pdu_type: PduType, request_id: i32, error_info: ErrorInfo, varbinds: Vec<VarBind>) -> Self {
        Self { pdu_type, request_id, error_info, varbinds }
    }

    /// Build a GET/GETNEXT/SET-shaped request PDU with NoError/0 error info.
    pub fn request(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::new(pdu_type, request_id, ErrorInfo::success(), varbinds)
    }

    /// Build a GETBULK request PDU.
    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, varbinds: Vec<VarBind>) -> Self {
        Self::new(
            PduType::GetBulkRequest,
            request_id,
            ErrorInfo::bulk(non_repeaters, max_repetitions),
            varbinds,
        )
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.wire_tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            self.error_info.encode(buf);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let (tag_byte, content) = decoder.read_tlv()?;
        let pdu_type = PduType::from_wire_tag(tag_byte)?;
        let mut body = Decoder::new(content);

        let request_id = body.read_integer()?;
        let second = body.read_integer()?;
        let third = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;

        let error_info = if pdu_type.is_bulk() {
            ErrorInfo::Bulk { non_repeaters: second, max_repetitions: third }
        } else {
            ErrorInfo::Standard { error_status: ErrorStatus::from_i32(second), error_index: third }
        };

        Ok(Pdu { pdu_type, request_id, error_info, varbinds })
    }
}
