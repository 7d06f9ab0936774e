//! S7 message header and its message-type variants.

use super::parameter::S7Parameter;
use super::payload::{PayloadArgs, S7Payload};
use super::{MESSAGE_TYPE_ACK, MESSAGE_TYPE_ACK_DATA, MESSAGE_TYPE_JOB, MESSAGE_TYPE_USER_DATA};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::envelope::{DispatchTable, Envelope, Key, Pattern, VariantEntry};
use crate::field::{
    read_const, read_implicit, read_optional, read_reserved, read_sized, write_const, write_implicit, write_reserved,
};

const PROTOCOL_ID: u64 = 0x32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct S7Error {
    pub error_class: u8,
    pub error_code: u8,
}

/// Message-type specific header part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7MessageKind {
    Request,
    Response(S7Error),
    ResponseData(S7Error),
    UserData,
}

fn read_error(rb: &mut ReadBuffer<'_>) -> Result<S7Error, CodecError> {
    let error_class = rb.read_u8("errorClass")?;
    let error_code = rb.read_u8("errorCode")?;
    Ok(S7Error { error_class, error_code })
}

fn decode_request(_: &mut ReadBuffer<'_>, _: ()) -> Result<S7MessageKind, CodecError> {
    Ok(S7MessageKind::Request)
}

fn decode_response(rb: &mut ReadBuffer<'_>, _: ()) -> Result<S7MessageKind, CodecError> {
    read_error(rb).map(S7MessageKind::Response)
}

fn decode_response_data(rb: &mut ReadBuffer<'_>, _: ()) -> Result<S7MessageKind, CodecError> {
    read_error(rb).map(S7MessageKind::ResponseData)
}

fn decode_user_data(_: &mut ReadBuffer<'_>, _: ()) -> Result<S7MessageKind, CodecError> {
    Ok(S7MessageKind::UserData)
}

static MESSAGE_TABLE: DispatchTable<S7MessageKind, ()> = DispatchTable {
    envelope: "S7Message",
    entries: &[
        VariantEntry { name: "S7MessageRequest", pattern: &[Pattern::Is(0x01)], decode: decode_request },
        VariantEntry { name: "S7MessageResponse", pattern: &[Pattern::Is(0x02)], decode: decode_response },
        VariantEntry { name: "S7MessageResponseData", pattern: &[Pattern::Is(0x03)], decode: decode_response_data },
        VariantEntry { name: "S7MessageUserData", pattern: &[Pattern::Is(0x07)], decode: decode_user_data },
    ],
};

impl S7MessageKind {
    pub fn message_type(&self) -> u8 {
        match self {
            S7MessageKind::Request => MESSAGE_TYPE_JOB,
            S7MessageKind::Response(_) => MESSAGE_TYPE_ACK,
            S7MessageKind::ResponseData(_) => MESSAGE_TYPE_ACK_DATA,
            S7MessageKind::UserData => MESSAGE_TYPE_USER_DATA,
        }
    }
}

impl Envelope for S7MessageKind {
    type Context = ();

    fn table() -> &'static DispatchTable<Self, ()> {
        &MESSAGE_TABLE
    }

    fn discriminator(&self) -> Key {
        Key::one(u64::from(self.message_type()))
    }

    fn variant_name(&self) -> &'static str {
        match self {
            S7MessageKind::Request => "S7MessageRequest",
            S7MessageKind::Response(_) => "S7MessageResponse",
            S7MessageKind::ResponseData(_) => "S7MessageResponseData",
            S7MessageKind::UserData => "S7MessageUserData",
        }
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            S7MessageKind::Response(e) | S7MessageKind::ResponseData(e) => {
                wb.write_u8("errorClass", e.error_class)?;
                wb.write_u8("errorCode", e.error_code)
            }
            S7MessageKind::Request | S7MessageKind::UserData => Ok(()),
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            S7MessageKind::Response(_) | S7MessageKind::ResponseData(_) => 16,
            S7MessageKind::Request | S7MessageKind::UserData => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Message {
    pub tpdu_reference: u16,
    pub kind: S7MessageKind,
    pub parameter: Option<S7Parameter>,
    pub payload: Option<S7Payload>,
}

impl S7Message {
    fn parameter_length(&self) -> usize {
        self.parameter.as_ref().map_or(0, Message::length_in_bytes)
    }

    fn payload_length(&self) -> usize {
        self.payload.as_ref().map_or(0, Message::length_in_bytes)
    }

    /// Check that parameter and payload agree with each other and with the
    /// message type, so that what gets written parses back to the same value.
    fn check_consistency(&self, wb: &WriteBuffer) -> Result<(), CodecError> {
        let message_type = self.kind.message_type();
        if let Some(parameter) = &self.parameter {
            let key = Key::two(u64::from(parameter.parameter_type()), u64::from(message_type));
            let resolved = S7Parameter::table().lookup(&key).map(|entry| entry.name);
            if resolved != Some(parameter.variant_name()) {
                return Err(wb.error_at(
                    "parameter",
                    wb.position(),
                    ErrorKind::UnknownVariant { envelope: "S7Parameter", key },
                ));
            }
        }
        let Some(payload) = &self.payload else {
            return Ok(());
        };
        let Some(parameter) = &self.parameter else {
            let reason = "payload requires a parameter to describe it".to_string();
            return Err(wb.error_at("payload", wb.position(), ErrorKind::MalformedArrayBounds(reason)));
        };
        let key = Key::two(u64::from(parameter.parameter_type()), u64::from(message_type));
        if payload.discriminator() != key {
            return Err(wb.error_at("payload", wb.position(), ErrorKind::UnknownVariant { envelope: "S7Payload", key }));
        }
        if payload.item_count() != parameter.item_count() {
            let reason =
                format!("payload has {} items, parameter declares {}", payload.item_count(), parameter.item_count());
            return Err(wb.error_at("payload", wb.position(), ErrorKind::MalformedArrayBounds(reason)));
        }
        Ok(())
    }
}

impl Message for S7Message {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("S7Message", |rb| {
            read_const(rb, "protocolId", 8, PROTOCOL_ID)?;
            let message_type = rb.read_u8("messageType")?;
            read_reserved(rb, "reserved", 16, 0x0000)?;
            let tpdu_reference = rb.read_u16("tpduReference")?;
            let parameter_length = read_implicit(rb, "parameterLength", 16)? as usize;
            let payload_length = read_implicit(rb, "payloadLength", 16)? as usize;
            let kind = S7MessageKind::decode_variant(rb, Key::one(u64::from(message_type)), ())?;
            let parameter = read_optional(rb, parameter_length > 0, |rb| {
                read_sized(rb, "parameter", parameter_length, |rb| S7Parameter::parse(rb, message_type))
            })?;
            let args = PayloadArgs {
                message_type,
                parameter_type: parameter.as_ref().map(S7Parameter::parameter_type),
                item_count: parameter.as_ref().map_or(0, S7Parameter::item_count),
            };
            let payload = read_optional(rb, payload_length > 0, |rb| {
                read_sized(rb, "payload", payload_length, |rb| S7Payload::parse(rb, args))
            })?;
            Ok(Self { tpdu_reference, kind, parameter, payload })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7Message", |wb| {
            self.check_consistency(wb)?;
            write_const(wb, "protocolId", 8, PROTOCOL_ID)?;
            wb.write_u8("messageType", self.kind.message_type())?;
            write_reserved(wb, "reserved", 16, 0x0000)?;
            wb.write_u16("tpduReference", self.tpdu_reference)?;
            write_implicit(wb, "parameterLength", 16, self.parameter_length())?;
            write_implicit(wb, "payloadLength", 16, self.payload_length())?;
            self.kind.serialize_variant(wb)?;
            if let Some(parameter) = &self.parameter {
                parameter.serialize(wb)?;
            }
            if let Some(payload) = &self.payload {
                payload.serialize(wb)?;
            }
            Ok(())
        })
    }

    fn length_in_bits(&self) -> usize {
        80 + self.kind.fields_length_in_bits() + (self.parameter_length() + self.payload_length()) * 8
    }
}
