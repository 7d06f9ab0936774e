//! S7 parameter block: setup, read/write var and user-data parameters.

use super::types::{MemoryArea, TransportSize};
use super::{MESSAGE_TYPE_ACK_DATA, MESSAGE_TYPE_JOB, MESSAGE_TYPE_USER_DATA};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::envelope::{DispatchTable, Envelope, Key, Pattern, VariantEntry};
use crate::field::{
    messages_length_in_bits, read_enum, read_implicit, read_messages, read_optional, read_reserved, read_sized,
    write_enum, write_implicit, write_messages, write_optional, write_reserved,
};

const PARAMETER_SETUP_COMMUNICATION: u8 = 0xF0;
const PARAMETER_READ_VAR: u8 = 0x04;
const PARAMETER_WRITE_VAR: u8 = 0x05;
const PARAMETER_USER_DATA: u8 = 0x00;
const ITEM_TYPE_ADDRESS: u8 = 0x12;
const ADDRESS_TYPE_ANY: u8 = 0x10;
const ITEM_TYPE_CPU_FUNCTIONS: u8 = 0x12;
const CPU_FUNCTION_RESPONSE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommunication {
    pub max_amq_caller: u16,
    pub max_amq_callee: u16,
    pub pdu_length: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S7Parameter {
    SetupCommunication(SetupCommunication),
    ReadVarRequest(Vec<VarRequestParameterItem>),
    ReadVarResponse { num_items: u8 },
    WriteVarRequest(Vec<VarRequestParameterItem>),
    WriteVarResponse { num_items: u8 },
    UserData(Vec<ParameterUserDataItem>),
}

fn decode_setup_communication(rb: &mut ReadBuffer<'_>, _: u8) -> Result<S7Parameter, CodecError> {
    read_reserved(rb, "reserved", 8, 0x00)?;
    let max_amq_caller = rb.read_u16("maxAmqCaller")?;
    let max_amq_callee = rb.read_u16("maxAmqCallee")?;
    let pdu_length = rb.read_u16("pduLength")?;
    Ok(S7Parameter::SetupCommunication(SetupCommunication { max_amq_caller, max_amq_callee, pdu_length }))
}

fn read_request_items(rb: &mut ReadBuffer<'_>) -> Result<Vec<VarRequestParameterItem>, CodecError> {
    let num_items = read_implicit(rb, "numItems", 8)?;
    read_messages(rb, "items", num_items as usize, ())
}

fn decode_read_var_request(rb: &mut ReadBuffer<'_>, _: u8) -> Result<S7Parameter, CodecError> {
    read_request_items(rb).map(S7Parameter::ReadVarRequest)
}

fn decode_read_var_response(rb: &mut ReadBuffer<'_>, _: u8) -> Result<S7Parameter, CodecError> {
    let num_items = rb.read_u8("numItems")?;
    Ok(S7Parameter::ReadVarResponse { num_items })
}

fn decode_write_var_request(rb: &mut ReadBuffer<'_>, _: u8) -> Result<S7Parameter, CodecError> {
    read_request_items(rb).map(S7Parameter::WriteVarRequest)
}

fn decode_write_var_response(rb: &mut ReadBuffer<'_>, _: u8) -> Result<S7Parameter, CodecError> {
    let num_items = rb.read_u8("numItems")?;
    Ok(S7Parameter::WriteVarResponse { num_items })
}

fn decode_user_data(rb: &mut ReadBuffer<'_>, _: u8) -> Result<S7Parameter, CodecError> {
    let num_items = read_implicit(rb, "numItems", 8)?;
    read_messages(rb, "items", num_items as usize, ()).map(S7Parameter::UserData)
}

static PARAMETER_TABLE: DispatchTable<S7Parameter, u8> = DispatchTable {
    envelope: "S7Parameter",
    entries: &[
        VariantEntry {
            name: "S7ParameterSetupCommunication",
            pattern: &[Pattern::Is(0xF0), Pattern::Any],
            decode: decode_setup_communication,
        },
        VariantEntry {
            name: "S7ParameterReadVarRequest",
            pattern: &[Pattern::Is(0x04), Pattern::Is(0x01)],
            decode: decode_read_var_request,
        },
        VariantEntry {
            name: "S7ParameterReadVarResponse",
            pattern: &[Pattern::Is(0x04), Pattern::Is(0x03)],
            decode: decode_read_var_response,
        },
        VariantEntry {
            name: "S7ParameterWriteVarRequest",
            pattern: &[Pattern::Is(0x05), Pattern::Is(0x01)],
            decode: decode_write_var_request,
        },
        VariantEntry {
            name: "S7ParameterWriteVarResponse",
            pattern: &[Pattern::Is(0x05), Pattern::Is(0x03)],
            decode: decode_write_var_response,
        },
        VariantEntry {
            name: "S7ParameterUserData",
            pattern: &[Pattern::Is(0x00), Pattern::Is(0x07)],
            decode: decode_user_data,
        },
    ],
};

impl S7Parameter {
    pub fn parameter_type(&self) -> u8 {
        match self {
            S7Parameter::SetupCommunication(_) => PARAMETER_SETUP_COMMUNICATION,
            S7Parameter::ReadVarRequest(_) | S7Parameter::ReadVarResponse { .. } => PARAMETER_READ_VAR,
            S7Parameter::WriteVarRequest(_) | S7Parameter::WriteVarResponse { .. } => PARAMETER_WRITE_VAR,
            S7Parameter::UserData(_) => PARAMETER_USER_DATA,
        }
    }

    /// Message type this parameter requires; `None` when any type will do.
    pub fn message_type(&self) -> Option<u8> {
        match self {
            S7Parameter::SetupCommunication(_) => None,
            S7Parameter::ReadVarRequest(_) | S7Parameter::WriteVarRequest(_) => Some(MESSAGE_TYPE_JOB),
            S7Parameter::ReadVarResponse { .. } | S7Parameter::WriteVarResponse { .. } => Some(MESSAGE_TYPE_ACK_DATA),
            S7Parameter::UserData(_) => Some(MESSAGE_TYPE_USER_DATA),
        }
    }

    /// Number of items the matching payload must carry.
    pub fn item_count(&self) -> usize {
        match self {
            S7Parameter::SetupCommunication(_) => 0,
            S7Parameter::ReadVarRequest(items) | S7Parameter::WriteVarRequest(items) => items.len(),
            S7Parameter::ReadVarResponse { num_items } | S7Parameter::WriteVarResponse { num_items } => {
                usize::from(*num_items)
            }
            S7Parameter::UserData(items) => items.len(),
        }
    }
}

impl Envelope for S7Parameter {
    /// Message type of the enclosing S7 message.
    type Context = u8;

    fn table() -> &'static DispatchTable<Self, u8> {
        &PARAMETER_TABLE
    }

    /// Setup communication is valid under any message type; its key reports JOB.
    fn discriminator(&self) -> Key {
        let message_type = self.message_type().unwrap_or(MESSAGE_TYPE_JOB);
        Key::two(u64::from(self.parameter_type()), u64::from(message_type))
    }

    fn variant_name(&self) -> &'static str {
        match self {
            S7Parameter::SetupCommunication(_) => "S7ParameterSetupCommunication",
            S7Parameter::ReadVarRequest(_) => "S7ParameterReadVarRequest",
            S7Parameter::ReadVarResponse { .. } => "S7ParameterReadVarResponse",
            S7Parameter::WriteVarRequest(_) => "S7ParameterWriteVarRequest",
            S7Parameter::WriteVarResponse { .. } => "S7ParameterWriteVarResponse",
            S7Parameter::UserData(_) => "S7ParameterUserData",
        }
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            S7Parameter::SetupCommunication(setup) => {
                write_reserved(wb, "reserved", 8, 0x00)?;
                wb.write_u16("maxAmqCaller", setup.max_amq_caller)?;
                wb.write_u16("maxAmqCallee", setup.max_amq_callee)?;
                wb.write_u16("pduLength", setup.pdu_length)
            }
            S7Parameter::ReadVarRequest(items) | S7Parameter::WriteVarRequest(items) => {
                write_implicit(wb, "numItems", 8, items.len())?;
                write_messages(wb, "items", items)
            }
            S7Parameter::ReadVarResponse { num_items } | S7Parameter::WriteVarResponse { num_items } => {
                wb.write_u8("numItems", *num_items)
            }
            S7Parameter::UserData(items) => {
                write_implicit(wb, "numItems", 8, items.len())?;
                write_messages(wb, "items", items)
            }
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            S7Parameter::SetupCommunication(_) => 56,
            S7Parameter::ReadVarRequest(items) | S7Parameter::WriteVarRequest(items) => {
                8 + messages_length_in_bits(items)
            }
            S7Parameter::ReadVarResponse { .. } | S7Parameter::WriteVarResponse { .. } => 8,
            S7Parameter::UserData(items) => 8 + messages_length_in_bits(items),
        }
    }
}

impl Message for S7Parameter {
    /// Message type of the enclosing S7 message.
    type Args = u8;

    fn parse(rb: &mut ReadBuffer<'_>, message_type: u8) -> Result<Self, CodecError> {
        rb.in_context("S7Parameter", |rb| {
            let parameter_type = rb.read_u8("parameterType")?;
            let key = Key::two(u64::from(parameter_type), u64::from(message_type));
            Self::decode_variant(rb, key, message_type)
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7Parameter", |wb| {
            wb.write_u8("parameterType", self.parameter_type())?;
            self.serialize_variant(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        8 + self.fields_length_in_bits()
    }
}

/// ANY-pointer address: area, data block, byte and bit offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S7AddressAny {
    pub transport_size: TransportSize,
    pub number_of_elements: u16,
    pub db_number: u16,
    pub area: MemoryArea,
    pub byte_address: u16,
    pub bit_address: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7Address {
    Any(S7AddressAny),
}

fn decode_address_any(rb: &mut ReadBuffer<'_>, _: ()) -> Result<S7Address, CodecError> {
    let transport_size = read_enum(rb, "transportSize", 8)?;
    let number_of_elements = rb.read_u16("numberOfElements")?;
    let db_number = rb.read_u16("dbNumber")?;
    let area = read_enum(rb, "area", 8)?;
    read_reserved(rb, "reserved", 5, 0x00)?;
    let byte_address = rb.read_u16("byteAddress")?;
    let bit_address = rb.read_uint("bitAddress", 3)? as u8;
    Ok(S7Address::Any(S7AddressAny { transport_size, number_of_elements, db_number, area, byte_address, bit_address }))
}

static ADDRESS_TABLE: DispatchTable<S7Address, ()> = DispatchTable {
    envelope: "S7Address",
    entries: &[VariantEntry { name: "S7AddressAny", pattern: &[Pattern::Is(0x10)], decode: decode_address_any }],
};

impl Envelope for S7Address {
    type Context = ();

    fn table() -> &'static DispatchTable<Self, ()> {
        &ADDRESS_TABLE
    }

    fn discriminator(&self) -> Key {
        match self {
            S7Address::Any(_) => Key::one(u64::from(ADDRESS_TYPE_ANY)),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            S7Address::Any(_) => "S7AddressAny",
        }
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            S7Address::Any(any) => {
                write_enum(wb, "transportSize", 8, any.transport_size)?;
                wb.write_u16("numberOfElements", any.number_of_elements)?;
                wb.write_u16("dbNumber", any.db_number)?;
                write_enum(wb, "area", 8, any.area)?;
                write_reserved(wb, "reserved", 5, 0x00)?;
                wb.write_u16("byteAddress", any.byte_address)?;
                wb.write_uint("bitAddress", 3, u64::from(any.bit_address))
            }
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            S7Address::Any(_) => 72,
        }
    }
}

impl Message for S7Address {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("S7Address", |rb| {
            let address_type = rb.read_u8("addressType")?;
            Self::decode_variant(rb, Key::one(u64::from(address_type)), ())
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7Address", |wb| {
            wb.write_uint("addressType", 8, self.discriminator().values()[0])?;
            self.serialize_variant(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        8 + self.fields_length_in_bits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRequestParameterItem {
    Address(S7Address),
}

fn decode_item_address(rb: &mut ReadBuffer<'_>, _: ()) -> Result<VarRequestParameterItem, CodecError> {
    let item_length = read_implicit(rb, "itemLength", 8)?;
    read_sized(rb, "itemLength", item_length as usize, |rb| S7Address::parse(rb, ()))
        .map(VarRequestParameterItem::Address)
}

static REQUEST_ITEM_TABLE: DispatchTable<VarRequestParameterItem, ()> = DispatchTable {
    envelope: "S7VarRequestParameterItem",
    entries: &[VariantEntry {
        name: "S7VarRequestParameterItemAddress",
        pattern: &[Pattern::Is(0x12)],
        decode: decode_item_address,
    }],
};

impl Envelope for VarRequestParameterItem {
    type Context = ();

    fn table() -> &'static DispatchTable<Self, ()> {
        &REQUEST_ITEM_TABLE
    }

    fn discriminator(&self) -> Key {
        Key::one(u64::from(ITEM_TYPE_ADDRESS))
    }

    fn variant_name(&self) -> &'static str {
        "S7VarRequestParameterItemAddress"
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            VarRequestParameterItem::Address(address) => {
                write_implicit(wb, "itemLength", 8, address.length_in_bytes())?;
                address.serialize(wb)
            }
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            VarRequestParameterItem::Address(address) => 8 + address.length_in_bits(),
        }
    }
}

impl Message for VarRequestParameterItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("S7VarRequestParameterItem", |rb| {
            let item_type = rb.read_u8("itemType")?;
            Self::decode_variant(rb, Key::one(u64::from(item_type)), ())
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7VarRequestParameterItem", |wb| {
            wb.write_u8("itemType", ITEM_TYPE_ADDRESS)?;
            self.serialize_variant(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        8 + self.fields_length_in_bits()
    }
}

/// CPU function call carried in a user-data parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuFunctions {
    pub method: u8,
    /// 4 bits; `8` marks a response, which carries the three trailing fields.
    pub cpu_function_type: u8,
    /// 4 bits.
    pub cpu_function_group: u8,
    pub cpu_subfunction: u8,
    pub sequence_number: u8,
    pub data_unit_reference_number: Option<u8>,
    pub last_data_unit: Option<u8>,
    pub error_code: Option<u16>,
}

impl CpuFunctions {
    /// The trailing fields travel together, and only on responses.
    fn check_response_fields(&self, wb: &WriteBuffer) -> Result<(), CodecError> {
        let present = [
            self.data_unit_reference_number.is_some(),
            self.last_data_unit.is_some(),
            self.error_code.is_some(),
        ];
        let response = self.cpu_function_type == CPU_FUNCTION_RESPONSE;
        if present.iter().all(|p| *p == response) {
            return Ok(());
        }
        Err(wb.error_at(
            "cpuFunctionType",
            wb.position(),
            ErrorKind::MalformedArrayBounds(format!(
                "function type {} needs the response fields {}",
                self.cpu_function_type,
                if response { "present" } else { "absent" }
            )),
        ))
    }

    fn length_in_bits(&self) -> usize {
        32 + self.data_unit_reference_number.map_or(0, |_| 8)
            + self.last_data_unit.map_or(0, |_| 8)
            + self.error_code.map_or(0, |_| 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterUserDataItem {
    CpuFunctions(CpuFunctions),
}

fn decode_cpu_functions(rb: &mut ReadBuffer<'_>, _: ()) -> Result<ParameterUserDataItem, CodecError> {
    let item_length = read_implicit(rb, "itemLength", 8)?;
    read_sized(rb, "itemLength", item_length as usize, |rb| {
        let method = rb.read_u8("method")?;
        let cpu_function_type = rb.read_uint("cpuFunctionType", 4)? as u8;
        let cpu_function_group = rb.read_uint("cpuFunctionGroup", 4)? as u8;
        let cpu_subfunction = rb.read_u8("cpuSubfunction")?;
        let sequence_number = rb.read_u8("sequenceNumber")?;
        let response = cpu_function_type == CPU_FUNCTION_RESPONSE;
        let data_unit_reference_number = read_optional(rb, response, |rb| rb.read_u8("dataUnitReferenceNumber"))?;
        let last_data_unit = read_optional(rb, response, |rb| rb.read_u8("lastDataUnit"))?;
        let error_code = read_optional(rb, response, |rb| rb.read_u16("errorCode"))?;
        Ok(ParameterUserDataItem::CpuFunctions(CpuFunctions {
            method,
            cpu_function_type,
            cpu_function_group,
            cpu_subfunction,
            sequence_number,
            data_unit_reference_number,
            last_data_unit,
            error_code,
        }))
    })
}

static USER_DATA_ITEM_TABLE: DispatchTable<ParameterUserDataItem, ()> = DispatchTable {
    envelope: "S7ParameterUserDataItem",
    entries: &[VariantEntry {
        name: "S7ParameterUserDataItemCPUFunctions",
        pattern: &[Pattern::Is(0x12)],
        decode: decode_cpu_functions,
    }],
};

impl Envelope for ParameterUserDataItem {
    type Context = ();

    fn table() -> &'static DispatchTable<Self, ()> {
        &USER_DATA_ITEM_TABLE
    }

    fn discriminator(&self) -> Key {
        Key::one(u64::from(ITEM_TYPE_CPU_FUNCTIONS))
    }

    fn variant_name(&self) -> &'static str {
        "S7ParameterUserDataItemCPUFunctions"
    }

    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        match self {
            ParameterUserDataItem::CpuFunctions(f) => {
                f.check_response_fields(wb)?;
                write_implicit(wb, "itemLength", 8, f.length_in_bits() / 8)?;
                wb.write_u8("method", f.method)?;
                wb.write_uint("cpuFunctionType", 4, u64::from(f.cpu_function_type))?;
                wb.write_uint("cpuFunctionGroup", 4, u64::from(f.cpu_function_group))?;
                wb.write_u8("cpuSubfunction", f.cpu_subfunction)?;
                wb.write_u8("sequenceNumber", f.sequence_number)?;
                write_optional(wb, f.data_unit_reference_number.as_ref(), |wb, v| {
                    wb.write_u8("dataUnitReferenceNumber", *v)
                })?;
                write_optional(wb, f.last_data_unit.as_ref(), |wb, v| wb.write_u8("lastDataUnit", *v))?;
                write_optional(wb, f.error_code.as_ref(), |wb, v| wb.write_u16("errorCode", *v))
            }
        }
    }

    fn fields_length_in_bits(&self) -> usize {
        match self {
            ParameterUserDataItem::CpuFunctions(f) => 8 + f.length_in_bits(),
        }
    }
}

impl Message for ParameterUserDataItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("S7ParameterUserDataItem", |rb| {
            let item_type = rb.read_u8("itemType")?;
            Self::decode_variant(rb, Key::one(u64::from(item_type)), ())
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("S7ParameterUserDataItem", |wb| {
            wb.write_u8("itemType", ITEM_TYPE_CPU_FUNCTIONS)?;
            self.serialize_variant(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        8 + self.fields_length_in_bits()
    }
}
