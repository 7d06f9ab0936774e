//! S7 payload block. Its shape depends on the parameter parsed before it.

use super::types::{DataTransportErrorCode, DataTransportSize};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::envelope::{DispatchTable, Envelope, Key, Pattern, VariantEntry};
use crate::field::{
    messages_length_in_bits, read_count_array, read_enum, read_implicit, read_messages, read_padding, write_array,
    write_enum, write_implicit, write_messages, write_padding, WireEnum,
};

/// What the payload needs from the enclosing message and its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadArgs {
    pub message_type: u8,
    /// `None` when the message carries no parameter.
    pub parameter_type: Option<u8>,
    pub item_count: usize,
}

/// One value of a read response or write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarPayloadDataItem {
    pub return_code: DataTransportErrorCode,
    pub transport_size: DataTransportSize,
    pub data: Vec<u8>,
}

/// Byte count for a wire `dataLength`, or `None` when the length could not be
/// written back unchanged: BIT items hold at most one bit, other bit-counted
/// sizes whole bytes.
fn data_bytes(transport_size: DataTransportSize, data_length: usize) -> Option<usize> {
    match transport_size {
        DataTransportSize::Bit => (data_length <= 1).then_some(data_length),
        size if size.size_in_bits() => (data_length % 8 == 0).then_some(data_length / 8),
        _ => Some(data_length),
    }
}

impl VarPayloadDataItem {
    /// Wire `dataLength`: bits for bit-sized transport sizes, bytes otherwise.
    fn data_length(&self) -> usize {
        match self.transport_size {
            DataTransportSize::Bit => self.data.len(),
            size if size.size_in_bits() => self.data.len() * 8,
            _ => self.data.len(),
        }
    }

    fn padded(&self, last: bool) -> bool {
        !last && self.data.len() % 2 == 1
    }

    pub fn parse(rb: &mut ReadBuffer<'_>, last: bool) -> Result<Self, CodecError> {
        rb.in_context("S7VarPayloadDataItem", |rb| {
            let return_code = read_enum(rb, "returnCode", 8)?;
            let transport_size: DataTransportSize = read_enum(rb, "transportSize", 8)?;
            let length_at = rb.position();
            let data_length = read_implicit(rb, "dataLength", 16)? as usize;
            let count = data_bytes(transport_size, data_length)
                .ok_or_else(|| {
                    rb.error_at(
                        "dataLength",
                        length_at,
                        ErrorKind::MalformedArrayBounds(format!(
                            "{} bits is not a whole {} item",
                            data_length,
                            transport_size.name()
                        )),
                    )
                })?;
            let data = rb.read_bytes("data", count)?;
            let item = Self { return_code, transport_size, data };
            if item.padded(last) {
                read_padding(rb, "padding", 1)?;
            }
            Ok(item)
        })
    }

    pub fn serialize(&self, wb: &mut WriteBuffer, last: bool) -> Result<(), CodecError> {
        wb.in_context("S7VarPayloadDataItem", |wb| {
            if self.transport_size == DataTransportSize::Bit && self.data.len() > 1 {
                return Err(wb.error_at(
                    "data",
                    wb.position(),
                    ErrorKind::MalformedArrayBounds(format!("BIT item carries {} bytes, expected one", self.data.len())),
                ));
            }
            write_enum(wb, "returnCode", 8, self.return_code)?;
            write_enum(wb, "transportSize", 8, self.transport_size)?;
            write_implicit(wb, "dataLength", 16, self.data_length())?;
            wb.write_bytes("data", &self.data)?;
            if self.padded(last) {
                write_padding(wb, "padding", 1)?;
            }
            Ok(())
        })
    }

    pub fn length_in_bits(&self, last: bool) -> usize {
        32 + self.data.len() * 8 + if self.padded(last) { 8 } else { 0 }
    }
}

fn read_data_items(rb: &mut ReadBuffer<'_>, count: usize) -> Result<Vec<VarPayloadDataItem>, CodecError> {
    read_count_array(rb, "items", count, |rb, position| VarPayloadDataItem::parse(rb, position.last))
}

fn write_data_items(wb: &mut WriteBuffer, items: &[VarPayloadDataItem]) -> Result<(), CodecError> {
    write_array(wb, "items", items, |wb, item, position| item.serialize(wb, position.last))
}

fn data_items_length_in_bits(items: &[VarPayloadDataItem]) -> usize {
    items.iter().enumerate().map(|(i, item)| item.length_in_bits(i + 1 == items.len())).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarPayloadStatusItem {
    pub return_code: DataTransportErrorCode,
}

impl Message for VarPayloadStatusItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("S7VarPayloadStatusItem", |rb| {
            Ok(Self { return_code: read_enum(rb, "returnCode", 8)? })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7VarPayloadStatusItem", |wb| write_enum(wb, "returnCode", 8, self.return_code))
    }

    fn length_in_bits(&self) -> usize {
        8
    }
}

/// User-data payload item, kept as raw data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadUserDataItem {
    pub return_code: DataTransportErrorCode,
    pub transport_size: DataTransportSize,
    pub data: Vec<u8>,
}

impl Message for PayloadUserDataItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("S7PayloadUserDataItem", |rb| {
            let return_code = read_enum(rb, "returnCode", 8)?;
            let transport_size = read_enum(rb, "transportSize", 8)?;
            let data_length = read_implicit(rb, "dataLength", 16)?;
            let data = rb.read_bytes("data", data_length as usize)?;
            Ok(Self { return_code, transport_size, data })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7PayloadUserDataItem", |wb| {
            write_enum(wb, "returnCode", 8, self.return_code)?;
            write_enum(wb, "transportSize", 8, self.transport_size)?;
            write_implicit(wb, "dataLength", 16, self.data.len())?;
            wb.write_bytes("data", &self.data)
        })
    }

    fn length_in_bits(&self) -> usize {
        32 + self.data.len() * 8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S7Payload {
    ReadVarResponse(Vec<VarPayloadDataItem>),
    WriteVarRequest(Vec<VarPayloadDataItem>),
    WriteVarResponse(Vec<VarPayloadStatusItem>),
    UserData(Vec<PayloadUserDataItem>),
}

fn decode_read_var_response(rb: &mut ReadBuffer<'_>, args: PayloadArgs) -> Result<S7Payload, CodecError> {
    read_data_items(rb, args.item_count).map(S7Payload::ReadVarResponse)
}

fn decode_write_var_request(rb: &mut ReadBuffer<'_>, args: PayloadArgs) -> Result<S7Payload, CodecError> {
    read_data_items(rb, args.item_count).map(S7Payload::WriteVarRequest)
}

fn decode_write_var_response(rb: &mut ReadBuffer<'_>, args: PayloadArgs) -> Result<S7Payload, CodecError> {
    read_messages(rb, "items", args.item_count, ()).map(S7Payload::WriteVarResponse)
}

fn decode_user_data(rb: &mut ReadBuffer<'_>, args: PayloadArgs) -> Result<S7Payload, CodecError> {
    read_messages(rb, "items", args.item_count, ()).map(S7Payload::UserData)
}

static PAYLOAD_TABLE: DispatchTable<S7Payload, PayloadArgs> = DispatchTable {
    envelope: "S7Payload",
    entries: &[
        VariantEntry {
            name: "S7PayloadReadVarResponse",
            pattern: &[Pattern::Is(0x04), Pattern::Is(0x03)],
            decode: decode_read_var_response,
        },
        VariantEntry {
            name: "S7PayloadWriteVarRequest",
            pattern: &[Pattern::Is(0x05), Pattern::Is(0x01)],
            decode: decode_write_var_request,
        },
        VariantEntry {
            name: "S7PayloadWriteVarResponse",
            pattern: &[Pattern::Is(0x05), Pattern::Is(0x03)],
            decode: decode_write_var_response,
        },
        VariantEntry {
            name: "S7PayloadUserData",
            pattern: &[Pattern::Is(0x00), Pattern::Is(0x07)],
            decode: decode_user_data,
        },
    ],
};

impl S7Payload {
    pub fn item_count(&self) -> usize {
        match self {
            S7Payload::ReadVarResponse(items) | S7Payload::WriteVarRequest(items) => items.len(),
            S7Payload::WriteVarResponse(items) => items.len(),
            S7Payload::UserData(items) => items.len(),
        }
    }
}

impl Envelope for S7Payload {
    type Context = PayloadArgs;

    fn table() -> &'static DispatchTable<Self, PayloadArgs> {
        &PAYLOAD_TABLE
    }

    /// `(parameterType, messageType)` of the parameter and message this payload belongs to.
    fn discriminator(&self) -> Key {
        match self {
            S7Payload::ReadVarResponse(_) => Key::two(0x04, 0x03),
            S7Payload::WriteVarRequest(_) => Key::two(0x05, 0x01),
            S7Payload::WriteVarResponse(_) => Key::two(0x05, 0x03),
            S7Payload::UserData(_) => Key::two(0x00, 0x07),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            S7Payload::ReadVarResponse(_) => "S7PayloadReadVarResponse",
            S7Payload::WriteVarRequest(_) => "S7PayloadWriteVarRequest",
            S7Payload::WriteVarResponse(_) => "S7PayloadWriteVarResponse",
            S7Payload::UserData(_) => "S7PayloadUserData",
        }
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            S7Payload::ReadVarResponse(items) | S7Payload::WriteVarRequest(items) => write_data_items(wb, items),
            S7Payload::WriteVarResponse(items) => write_messages(wb, "items", items),
            S7Payload::UserData(items) => write_messages(wb, "items", items),
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            S7Payload::ReadVarResponse(items) | S7Payload::WriteVarRequest(items) => data_items_length_in_bits(items),
            S7Payload::WriteVarResponse(items) => messages_length_in_bits(items),
            S7Payload::UserData(items) => messages_length_in_bits(items),
        }
    }
}

impl Message for S7Payload {
    type Args = PayloadArgs;

    fn parse(rb: &mut ReadBuffer<'_>, args: PayloadArgs) -> Result<Self, CodecError> {
        rb.in_context("S7Payload", |rb| {
            let key = match args.parameter_type {
                Some(parameter_type) => Key::two(u64::from(parameter_type), u64::from(args.message_type)),
                None => {
                    let key = Key::one(u64::from(args.message_type));
                    return Err(rb.error_at("", rb.position(), ErrorKind::UnknownVariant { envelope: "S7Payload", key }));
                }
            };
            Self::decode_variant(rb, key, args)
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7Payload", |wb| self.serialize_variant(wb))
    }

    fn length_in_bits(&self) -> usize {
        self.fields_length_in_bits()
    }
}
