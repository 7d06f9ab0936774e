//! ISO 8073 connection-oriented transport (COTP) packets and parameters.

use super::message::S7Message;
use super::types::{CotpProtocolClass, CotpTpduSize};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::envelope::{DispatchTable, Envelope, Key, Pattern, VariantEntry};
use crate::field::{
    messages_length_in_bits, read_enum, read_implicit, read_length_array, read_optional, read_sized,
    write_enum, write_implicit, write_messages,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpData {
    /// End of transmission: last data unit of this message.
    pub eot: bool,
    pub tpdu_ref: u8,
}

/// Shared by connection request, connection response and disconnect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpConnection {
    pub destination_reference: u16,
    pub source_reference: u16,
    pub protocol_class: CotpProtocolClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpDisconnectResponse {
    pub destination_reference: u16,
    pub source_reference: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpTpduError {
    pub destination_reference: u16,
    pub reject_cause: u8,
}

/// The TPDU-code specific part of a COTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CotpTpdu {
    Data(CotpData),
    ConnectionRequest(CotpConnection),
    ConnectionResponse(CotpConnection),
    DisconnectRequest(CotpConnection),
    DisconnectResponse(CotpDisconnectResponse),
    TpduError(CotpTpduError),
}

fn decode_data(rb: &mut ReadBuffer<'_>, _: ()) -> Result<CotpTpdu, CodecError> {
    let eot = rb.read_bit("eot")?;
    let tpdu_ref = rb.read_uint("tpduRef", 7)? as u8;
    Ok(CotpTpdu::Data(CotpData { eot, tpdu_ref }))
}

fn read_connection(rb: &mut ReadBuffer<'_>) -> Result<CotpConnection, CodecError> {
    let destination_reference = rb.read_u16("destinationReference")?;
    let source_reference = rb.read_u16("sourceReference")?;
    let protocol_class = read_enum(rb, "protocolClass", 8)?;
    Ok(CotpConnection { destination_reference, source_reference, protocol_class })
}

fn decode_connection_request(rb: &mut ReadBuffer<'_>, _: ()) -> Result<CotpTpdu, CodecError> {
    read_connection(rb).map(CotpTpdu::ConnectionRequest)
}

fn decode_connection_response(rb: &mut ReadBuffer<'_>, _: ()) -> Result<CotpTpdu, CodecError> {
    read_connection(rb).map(CotpTpdu::ConnectionResponse)
}

fn decode_disconnect_request(rb: &mut ReadBuffer<'_>, _: ()) -> Result<CotpTpdu, CodecError> {
    read_connection(rb).map(CotpTpdu::DisconnectRequest)
}

fn decode_disconnect_response(rb: &mut ReadBuffer<'_>, _: ()) -> Result<CotpTpdu, CodecError> {
    let destination_reference = rb.read_u16("destinationReference")?;
    let source_reference = rb.read_u16("sourceReference")?;
    Ok(CotpTpdu::DisconnectResponse(CotpDisconnectResponse { destination_reference, source_reference }))
}

fn decode_tpdu_error(rb: &mut ReadBuffer<'_>, _: ()) -> Result<CotpTpdu, CodecError> {
    let destination_reference = rb.read_u16("destinationReference")?;
    let reject_cause = rb.read_u8("rejectCause")?;
    Ok(CotpTpdu::TpduError(CotpTpduError { destination_reference, reject_cause }))
}

static TPDU_TABLE: DispatchTable<CotpTpdu, ()> = DispatchTable {
    envelope: "COTPPacket",
    entries: &[
        VariantEntry { name: "COTPPacketData", pattern: &[Pattern::Is(0xF0)], decode: decode_data },
        VariantEntry {
            name: "COTPPacketConnectionRequest",
            pattern: &[Pattern::Is(0xE0)],
            decode: decode_connection_request,
        },
        VariantEntry {
            name: "COTPPacketConnectionResponse",
            pattern: &[Pattern::Is(0xD0)],
            decode: decode_connection_response,
        },
        VariantEntry {
            name: "COTPPacketDisconnectRequest",
            pattern: &[Pattern::Is(0x80)],
            decode: decode_disconnect_request,
        },
        VariantEntry {
            name: "COTPPacketDisconnectResponse",
            pattern: &[Pattern::Is(0xC0)],
            decode: decode_disconnect_response,
        },
        VariantEntry { name: "COTPPacketTpduError", pattern: &[Pattern::Is(0x70)], decode: decode_tpdu_error },
    ],
};

impl CotpTpdu {
    pub fn tpdu_code(&self) -> u8 {
        match self {
            CotpTpdu::Data(_) => 0xF0,
            CotpTpdu::ConnectionRequest(_) => 0xE0,
            CotpTpdu::ConnectionResponse(_) => 0xD0,
            CotpTpdu::DisconnectRequest(_) => 0x80,
            CotpTpdu::DisconnectResponse(_) => 0xC0,
            CotpTpdu::TpduError(_) => 0x70,
        }
    }
}

impl Envelope for CotpTpdu {
    type Context = ();

    fn table() -> &'static DispatchTable<Self, ()> {
        &TPDU_TABLE
    }

    fn discriminator(&self) -> Key {
        Key::one(u64::from(self.tpdu_code()))
    }

    fn variant_name(&self) -> &'static str {
        match self {
            CotpTpdu::Data(_) => "COTPPacketData",
            CotpTpdu::ConnectionRequest(_) => "COTPPacketConnectionRequest",
            CotpTpdu::ConnectionResponse(_) => "COTPPacketConnectionResponse",
            CotpTpdu::DisconnectRequest(_) => "COTPPacketDisconnectRequest",
            CotpTpdu::DisconnectResponse(_) => "COTPPacketDisconnectResponse",
            CotpTpdu::TpduError(_) => "COTPPacketTpduError",
        }
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            CotpTpdu::Data(d) => {
                wb.write_bit("eot", d.eot)?;
                wb.write_uint("tpduRef", 7, u64::from(d.tpdu_ref))
            }
            CotpTpdu::ConnectionRequest(c) | CotpTpdu::ConnectionResponse(c) | CotpTpdu::DisconnectRequest(c) => {
                wb.write_u16("destinationReference", c.destination_reference)?;
                wb.write_u16("sourceReference", c.source_reference)?;
                write_enum(wb, "protocolClass", 8, c.protocol_class)
            }
            CotpTpdu::DisconnectResponse(d) => {
                wb.write_u16("destinationReference", d.destination_reference)?;
                wb.write_u16("sourceReference", d.source_reference)
            }
            CotpTpdu::TpduError(e) => {
                wb.write_u16("destinationReference", e.destination_reference)?;
                wb.write_u8("rejectCause", e.reject_cause)
            }
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            CotpTpdu::Data(_) => 8,
            CotpTpdu::ConnectionRequest(_) | CotpTpdu::ConnectionResponse(_) | CotpTpdu::DisconnectRequest(_) => 40,
            CotpTpdu::DisconnectResponse(_) => 32,
            CotpTpdu::TpduError(_) => 24,
        }
    }
}

/// A COTP packet: header, variable parameters and an optional S7 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CotpPacket {
    pub tpdu: CotpTpdu,
    pub parameters: Vec<CotpParameter>,
    pub payload: Option<S7Message>,
}

impl CotpPacket {
    /// Bytes counted by `headerLength`: everything after it up to the payload.
    fn header_length(&self) -> usize {
        (8 + self.tpdu.fields_length_in_bits() + messages_length_in_bits(&self.parameters)) / 8
    }
}

impl Message for CotpPacket {
    /// Total packet length in bytes, taken from the enclosing TPKT.
    type Args = u16;

    fn parse(rb: &mut ReadBuffer<'_>, cotp_len: u16) -> Result<Self, CodecError> {
        rb.in_context("COTPPacket", |rb| {
            let start = rb.position();
            let header_length = read_implicit(rb, "headerLength", 8)? as usize;
            let tpdu_code = rb.read_u8("tpduCode")?;
            let tpdu = CotpTpdu::decode_variant(rb, Key::one(u64::from(tpdu_code)), ())?;
            let consumed = (rb.position() - start) / 8;
            let Some(parameters_len) = (header_length + 1).checked_sub(consumed) else {
                let reason = format!("header length {} is shorter than the fixed header", header_length);
                return Err(rb.error_at("headerLength", start, ErrorKind::MalformedArrayBounds(reason)));
            };
            let parameters = read_length_array(rb, "parameters", parameters_len, |rb, _| CotpParameter::parse(rb, ()))?;
            let consumed = (rb.position() - start) / 8;
            let payload = read_optional(rb, consumed < usize::from(cotp_len), |rb| {
                read_sized(rb, "payload", usize::from(cotp_len) - consumed, |rb| S7Message::parse(rb, ()))
            })?;
            Ok(Self { tpdu, parameters, payload })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("COTPPacket", |wb| {
            write_implicit(wb, "headerLength", 8, self.header_length())?;
            wb.write_u8("tpduCode", self.tpdu.tpdu_code())?;
            self.tpdu.serialize_variant(wb)?;
            write_messages(wb, "parameters", &self.parameters)?;
            if let Some(payload) = &self.payload {
                payload.serialize(wb)?;
            }
            Ok(())
        })
    }

    fn length_in_bits(&self) -> usize {
        8 + self.header_length() * 8 + self.payload.as_ref().map_or(0, Message::length_in_bits)
    }
}

/// A COTP variable-part parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CotpParameter {
    TpduSize(CotpTpduSize),
    CallingTsap(u16),
    CalledTsap(u16),
    Checksum(u8),
    DisconnectAdditionalInformation(Vec<u8>),
}

fn decode_tpdu_size(rb: &mut ReadBuffer<'_>, _: usize) -> Result<CotpParameter, CodecError> {
    read_enum(rb, "tpduSize", 8).map(CotpParameter::TpduSize)
}

fn decode_calling_tsap(rb: &mut ReadBuffer<'_>, _: usize) -> Result<CotpParameter, CodecError> {
    rb.read_u16("tsapId").map(CotpParameter::CallingTsap)
}

fn decode_called_tsap(rb: &mut ReadBuffer<'_>, _: usize) -> Result<CotpParameter, CodecError> {
    rb.read_u16("tsapId").map(CotpParameter::CalledTsap)
}

fn decode_checksum(rb: &mut ReadBuffer<'_>, _: usize) -> Result<CotpParameter, CodecError> {
    rb.read_u8("crc").map(CotpParameter::Checksum)
}

fn decode_disconnect_information(rb: &mut ReadBuffer<'_>, length: usize) -> Result<CotpParameter, CodecError> {
    rb.read_bytes("data", length).map(CotpParameter::DisconnectAdditionalInformation)
}

static PARAMETER_TABLE: DispatchTable<CotpParameter, usize> = DispatchTable {
    envelope: "COTPParameter",
    entries: &[
        VariantEntry { name: "COTPParameterTpduSize", pattern: &[Pattern::Is(0xC0)], decode: decode_tpdu_size },
        VariantEntry { name: "COTPParameterCallingTsap", pattern: &[Pattern::Is(0xC1)], decode: decode_calling_tsap },
        VariantEntry { name: "COTPParameterCalledTsap", pattern: &[Pattern::Is(0xC2)], decode: decode_called_tsap },
        VariantEntry { name: "COTPParameterChecksum", pattern: &[Pattern::Is(0xC3)], decode: decode_checksum },
        VariantEntry {
            name: "COTPParameterDisconnectAdditionalInformation",
            pattern: &[Pattern::Is(0xE0)],
            decode: decode_disconnect_information,
        },
    ],
};

impl CotpParameter {
    pub fn parameter_type(&self) -> u8 {
        match self {
            CotpParameter::TpduSize(_) => 0xC0,
            CotpParameter::CallingTsap(_) => 0xC1,
            CotpParameter::CalledTsap(_) => 0xC2,
            CotpParameter::Checksum(_) => 0xC3,
            CotpParameter::DisconnectAdditionalInformation(_) => 0xE0,
        }
    }
}

impl Envelope for CotpParameter {
    /// Value of `parameterLength`.
    type Context = usize;

    fn table() -> &'static DispatchTable<Self, usize> {
        &PARAMETER_TABLE
    }

    fn discriminator(&self) -> Key {
        Key::one(u64::from(self.parameter_type()))
    }

    fn variant_name(&self) -> &'static str {
        match self {
            CotpParameter::TpduSize(_) => "COTPParameterTpduSize",
            CotpParameter::CallingTsap(_) => "COTPParameterCallingTsap",
            CotpParameter::CalledTsap(_) => "COTPParameterCalledTsap",
            CotpParameter::Checksum(_) => "COTPParameterChecksum",
            CotpParameter::DisconnectAdditionalInformation(_) => "COTPParameterDisconnectAdditionalInformation",
        }
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            CotpParameter::TpduSize(size) => write_enum(wb, "tpduSize", 8, *size),
            CotpParameter::CallingTsap(id) | CotpParameter::CalledTsap(id) => wb.write_u16("tsapId", *id),
            CotpParameter::Checksum(crc) => wb.write_u8("crc", *crc),
            CotpParameter::DisconnectAdditionalInformation(data) => wb.write_bytes("data", data),
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            CotpParameter::TpduSize(_) | CotpParameter::Checksum(_) => 8,
            CotpParameter::CallingTsap(_) | CotpParameter::CalledTsap(_) => 16,
            CotpParameter::DisconnectAdditionalInformation(data) => data.len() * 8,
        }
    }
}

impl Message for CotpParameter {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("COTPParameter", |rb| {
            let parameter_type = rb.read_u8("parameterType")?;
            let length = read_implicit(rb, "parameterLength", 8)? as usize;
            read_sized(rb, "parameterLength", length, |rb| {
                Self::decode_variant(rb, Key::one(u64::from(parameter_type)), length)
            })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("COTPParameter", |wb| {
            wb.write_u8("parameterType", self.parameter_type())?;
            write_implicit(wb, "parameterLength", 8, self.fields_length_in_bits() / 8)?;
            self.serialize_variant(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        16 + self.fields_length_in_bits()
    }
}
