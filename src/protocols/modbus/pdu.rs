//! Modbus protocol data unit.
//!
//! The function byte is split into a 1-bit error flag and a 7-bit function
//! code. Together with the caller's direction flag they form the dispatch key
//! `(errorFlag, functionFlag, response)`.

use super::types::{
    DeviceInformationConformityLevel, DeviceInformationLevel, DeviceInformationMoreFollows, DeviceInformationObject,
    ModbusErrorCode, ReadFileRecordRequestItem, ReadFileRecordResponseItem, WriteFileRecordItem,
};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::envelope::{DispatchTable, Envelope, Key, Pattern, VariantEntry};
use crate::field::{
    messages_length_in_bits, read_const, read_count_array, read_enum, read_implicit, read_length_array,
    read_messages, write_array, write_const, write_enum, write_implicit, write_messages,
};

const MEI_TYPE: u64 = 0x0E;

/// Parse-time inputs for variant decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduContext {
    pub function_flag: u8,
    pub response: bool,
}

/// Bodies made only of 16-bit registers.
macro_rules! register_body {
    ($(#[$meta:meta])* $name:ident { $($field:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name {
            $(pub $field: u16),+
        }

        impl Message for $name {
            type Args = ();

            fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
                $(let $field = rb.read_u16($wire)?;)+
                Ok(Self { $($field),+ })
            }

            fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
                $(wb.write_u16($wire, self.$field)?;)+
                Ok(())
            }

            fn length_in_bits(&self) -> usize {
                [$($wire),+].len() * 16
            }
        }
    };
}

register_body! {
    /// Read request for coils, discrete inputs or registers; also the
    /// write-multiple responses.
    AddressQuantity { starting_address => "startingAddress", quantity => "quantity" }
}

register_body! {
    /// Write-single request and its echoed response.
    AddressValue { address => "address", value => "value" }
}

register_body! {
    MaskWrite { reference_address => "referenceAddress", and_mask => "andMask", or_mask => "orMask" }
}

register_body! {
    FifoPointer { fifo_pointer_address => "fifoPointerAddress" }
}

register_body! {
    Diagnostic { sub_function => "subFunction", data => "data" }
}

register_body! {
    ComEventCounter { status => "status", event_count => "eventCount" }
}

/// Variant without fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoData;

impl Message for NoData {
    type Args = ();

    fn parse(_: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        Ok(NoData)
    }

    fn serialize(&self, _: &mut WriteBuffer) -> Result<(), CodecError> {
        Ok(())
    }

    fn length_in_bits(&self) -> usize {
        0
    }
}

/// Byte-count prefixed raw values (coil/register read responses, server id).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteValues {
    pub value: Vec<u8>,
}

impl Message for ByteValues {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        let byte_count = read_implicit(rb, "byteCount", 8)?;
        let value = rb.read_bytes("value", byte_count as usize)?;
        Ok(Self { value })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        write_implicit(wb, "byteCount", 8, self.value.len())?;
        wb.write_bytes("value", &self.value)
    }

    fn length_in_bits(&self) -> usize {
        8 + self.value.len() * 8
    }
}

/// Write multiple coils / holding registers request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteMultiple {
    pub starting_address: u16,
    pub quantity: u16,
    pub value: Vec<u8>,
}

impl Message for WriteMultiple {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        let starting_address = rb.read_u16("startingAddress")?;
        let quantity = rb.read_u16("quantity")?;
        let ByteValues { value } = ByteValues::parse(rb, ())?;
        Ok(Self { starting_address, quantity, value })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.write_u16("startingAddress", self.starting_address)?;
        wb.write_u16("quantity", self.quantity)?;
        write_implicit(wb, "byteCount", 8, self.value.len())?;
        wb.write_bytes("value", &self.value)
    }

    fn length_in_bits(&self) -> usize {
        40 + self.value.len() * 8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadWriteMultipleRequest {
    pub read_starting_address: u16,
    pub read_quantity: u16,
    pub write_starting_address: u16,
    pub write_quantity: u16,
    pub value: Vec<u8>,
}

impl Message for ReadWriteMultipleRequest {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        let read_starting_address = rb.read_u16("readStartingAddress")?;
        let read_quantity = rb.read_u16("readQuantity")?;
        let write_starting_address = rb.read_u16("writeStartingAddress")?;
        let write_quantity = rb.read_u16("writeQuantity")?;
        let ByteValues { value } = ByteValues::parse(rb, ())?;
        Ok(Self { read_starting_address, read_quantity, write_starting_address, write_quantity, value })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.write_u16("readStartingAddress", self.read_starting_address)?;
        wb.write_u16("readQuantity", self.read_quantity)?;
        wb.write_u16("writeStartingAddress", self.write_starting_address)?;
        wb.write_u16("writeQuantity", self.write_quantity)?;
        write_implicit(wb, "byteCount", 8, self.value.len())?;
        wb.write_bytes("value", &self.value)
    }

    fn length_in_bits(&self) -> usize {
        72 + self.value.len() * 8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FifoQueue {
    pub fifo_value: Vec<u16>,
}

impl Message for FifoQueue {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        read_implicit(rb, "byteCount", 16)?;
        let fifo_count = read_implicit(rb, "fifoCount", 16)?;
        let fifo_value = read_count_array(rb, "fifoValue", fifo_count as usize, |rb, _| rb.read_u16("value"))?;
        Ok(Self { fifo_value })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        write_implicit(wb, "byteCount", 16, self.fifo_value.len() * 2 + 2)?;
        write_implicit(wb, "fifoCount", 16, self.fifo_value.len())?;
        write_array(wb, "fifoValue", &self.fifo_value, |wb, v, _| wb.write_u16("value", *v))
    }

    fn length_in_bits(&self) -> usize {
        32 + self.fifo_value.len() * 16
    }
}

/// Byte-count prefixed, length-bounded array of file record items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecords<T> {
    pub items: Vec<T>,
}

impl<T> Default for FileRecords<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Message<Args = ()>> Message for FileRecords<T> {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        let byte_count = read_implicit(rb, "byteCount", 8)?;
        let items = read_length_array(rb, "items", byte_count as usize, |rb, _| T::parse(rb, ()))?;
        Ok(Self { items })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        write_implicit(wb, "byteCount", 8, messages_length_in_bits(&self.items) / 8)?;
        write_messages(wb, "items", &self.items)
    }

    fn length_in_bits(&self) -> usize {
        8 + messages_length_in_bits(&self.items)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionStatus {
    pub value: u8,
}

impl Message for ExceptionStatus {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        Ok(Self { value: rb.read_u8("value")? })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.write_u8("value", self.value)
    }

    fn length_in_bits(&self) -> usize {
        8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComEventLog {
    pub status: u16,
    pub event_count: u16,
    pub message_count: u16,
    pub events: Vec<u8>,
}

impl Message for ComEventLog {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        let start = rb.position();
        let byte_count = read_implicit(rb, "byteCount", 8)?;
        let Some(event_bytes) = byte_count.checked_sub(6) else {
            return Err(rb.error_at(
                "byteCount",
                start,
                ErrorKind::MalformedArrayBounds(format!("byte count {} is below the 6 header bytes", byte_count)),
            ));
        };
        let status = rb.read_u16("status")?;
        let event_count = rb.read_u16("eventCount")?;
        let message_count = rb.read_u16("messageCount")?;
        let events = rb.read_bytes("events", event_bytes as usize)?;
        Ok(Self { status, event_count, message_count, events })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        write_implicit(wb, "byteCount", 8, self.events.len() + 6)?;
        wb.write_u16("status", self.status)?;
        wb.write_u16("eventCount", self.event_count)?;
        wb.write_u16("messageCount", self.message_count)?;
        wb.write_bytes("events", &self.events)
    }

    fn length_in_bits(&self) -> usize {
        56 + self.events.len() * 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentificationRequest {
    pub level: DeviceInformationLevel,
    pub object_id: u8,
}

impl Message for DeviceIdentificationRequest {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        read_const(rb, "meiType", 8, MEI_TYPE)?;
        let level = read_enum(rb, "level", 8)?;
        let object_id = rb.read_u8("objectId")?;
        Ok(Self { level, object_id })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        write_const(wb, "meiType", 8, MEI_TYPE)?;
        write_enum(wb, "level", 8, self.level)?;
        wb.write_u8("objectId", self.object_id)
    }

    fn length_in_bits(&self) -> usize {
        24
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentificationResponse {
    pub level: DeviceInformationLevel,
    pub individual_access: bool,
    pub conformity_level: DeviceInformationConformityLevel,
    pub more_follows: DeviceInformationMoreFollows,
    pub next_object_id: u8,
    pub objects: Vec<DeviceInformationObject>,
}

impl Message for DeviceIdentificationResponse {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        read_const(rb, "meiType", 8, MEI_TYPE)?;
        let level = read_enum(rb, "level", 8)?;
        let individual_access = rb.read_bit("individualAccess")?;
        let conformity_level = read_enum(rb, "conformityLevel", 7)?;
        let more_follows = read_enum(rb, "moreFollows", 8)?;
        let next_object_id = rb.read_u8("nextObjectId")?;
        let number_of_objects = read_implicit(rb, "numberOfObjects", 8)?;
        let objects = read_messages(rb, "objects", number_of_objects as usize, ())?;
        Ok(Self { level, individual_access, conformity_level, more_follows, next_object_id, objects })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        write_const(wb, "meiType", 8, MEI_TYPE)?;
        write_enum(wb, "level", 8, self.level)?;
        wb.write_bit("individualAccess", self.individual_access)?;
        write_enum(wb, "conformityLevel", 7, self.conformity_level)?;
        write_enum(wb, "moreFollows", 8, self.more_follows)?;
        wb.write_u8("nextObjectId", self.next_object_id)?;
        write_implicit(wb, "numberOfObjects", 8, self.objects.len())?;
        write_messages(wb, "objects", &self.objects)
    }

    fn length_in_bits(&self) -> usize {
        48 + messages_length_in_bits(&self.objects)
    }
}

/// Exception response: the function code that failed plus the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduError {
    pub function_code: u8,
    pub exception_code: ModbusErrorCode,
}

impl PduError {
    fn decode(rb: &mut ReadBuffer<'_>, ctx: PduContext) -> Result<ModbusPdu, CodecError> {
        let exception_code = read_enum(rb, "exceptionCode", 8)?;
        Ok(ModbusPdu::Error(PduError { function_code: ctx.function_flag, exception_code }))
    }
}

/// Declares the non-error variants once: the enum arms, their wire keys and
/// the dispatch table are all generated from the same list.
macro_rules! modbus_pdu {
    ($( $variant:ident($body:ty) = ($function:literal, $response:literal) ),+ $(,)?) => {
        /// A Modbus PDU. One arm per function code and direction.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum ModbusPdu {
            Error(PduError),
            $( $variant($body), )+
        }

        static PDU_TABLE: DispatchTable<ModbusPdu, PduContext> = DispatchTable {
            envelope: "ModbusPDU",
            entries: &[
                VariantEntry {
                    name: "ModbusPDUError",
                    pattern: &[Pattern::Is(1), Pattern::Any, Pattern::Any],
                    decode: PduError::decode,
                },
                $(
                    VariantEntry {
                        name: concat!("ModbusPDU", stringify!($variant)),
                        pattern: &[Pattern::Is(0), Pattern::Is($function), Pattern::Is($response)],
                        decode: |rb, _| <$body as Message>::parse(rb, ()).map(ModbusPdu::$variant),
                    },
                )+
            ],
        };

        impl ModbusPdu {
            /// Function code (7 bits) as written on the wire.
            pub fn function_code(&self) -> u8 {
                match self {
                    ModbusPdu::Error(e) => e.function_code,
                    $( ModbusPdu::$variant(_) => $function, )+
                }
            }

            /// Direction this variant belongs to. Error responses are always responses.
            pub fn is_response(&self) -> bool {
                match self {
                    ModbusPdu::Error(_) => true,
                    $( ModbusPdu::$variant(_) => $response == 1, )+
                }
            }
        }

        impl Envelope for ModbusPdu {
            type Context = PduContext;

            fn table() -> &'static DispatchTable<Self, PduContext> {
                &PDU_TABLE
            }

            fn discriminator(&self) -> Key {
                let error_flag = u64::from(matches!(self, ModbusPdu::Error(_)));
                Key::three(error_flag, u64::from(self.function_code()), u64::from(self.is_response()))
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    ModbusPdu::Error(_) => "ModbusPDUError",
                    $( ModbusPdu::$variant(_) => concat!("ModbusPDU", stringify!($variant)), )+
                }
            }

            fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
                match self {
                    ModbusPdu::Error(e) => write_enum(wb, "exceptionCode", 8, e.exception_code),
                    $( ModbusPdu::$variant(body) => body.serialize(wb), )+
                }
            }

            fn fields_length_in_bits(&self) -> usize {
                match self {
                    ModbusPdu::Error(_) => 8,
                    $( ModbusPdu::$variant(body) => body.length_in_bits(), )+
                }
            }
        }
    };
}

modbus_pdu! {
    ReadDiscreteInputsRequest(AddressQuantity) = (0x02, 0),
    ReadDiscreteInputsResponse(ByteValues) = (0x02, 1),
    ReadCoilsRequest(AddressQuantity) = (0x01, 0),
    ReadCoilsResponse(ByteValues) = (0x01, 1),
    WriteSingleCoilRequest(AddressValue) = (0x05, 0),
    WriteSingleCoilResponse(AddressValue) = (0x05, 1),
    WriteMultipleCoilsRequest(WriteMultiple) = (0x0F, 0),
    WriteMultipleCoilsResponse(AddressQuantity) = (0x0F, 1),
    ReadInputRegistersRequest(AddressQuantity) = (0x04, 0),
    ReadInputRegistersResponse(ByteValues) = (0x04, 1),
    ReadHoldingRegistersRequest(AddressQuantity) = (0x03, 0),
    ReadHoldingRegistersResponse(ByteValues) = (0x03, 1),
    WriteSingleRegisterRequest(AddressValue) = (0x06, 0),
    WriteSingleRegisterResponse(AddressValue) = (0x06, 1),
    WriteMultipleHoldingRegistersRequest(WriteMultiple) = (0x10, 0),
    WriteMultipleHoldingRegistersResponse(AddressQuantity) = (0x10, 1),
    ReadWriteMultipleHoldingRegistersRequest(ReadWriteMultipleRequest) = (0x17, 0),
    ReadWriteMultipleHoldingRegistersResponse(ByteValues) = (0x17, 1),
    MaskWriteHoldingRegisterRequest(MaskWrite) = (0x16, 0),
    MaskWriteHoldingRegisterResponse(MaskWrite) = (0x16, 1),
    ReadFifoQueueRequest(FifoPointer) = (0x18, 0),
    ReadFifoQueueResponse(FifoQueue) = (0x18, 1),
    ReadFileRecordRequest(FileRecords<ReadFileRecordRequestItem>) = (0x14, 0),
    ReadFileRecordResponse(FileRecords<ReadFileRecordResponseItem>) = (0x14, 1),
    WriteFileRecordRequest(FileRecords<WriteFileRecordItem>) = (0x15, 0),
    WriteFileRecordResponse(FileRecords<WriteFileRecordItem>) = (0x15, 1),
    ReadExceptionStatusRequest(NoData) = (0x07, 0),
    ReadExceptionStatusResponse(ExceptionStatus) = (0x07, 1),
    DiagnosticRequest(Diagnostic) = (0x08, 0),
    DiagnosticResponse(Diagnostic) = (0x08, 1),
    GetComEventCounterRequest(NoData) = (0x0B, 0),
    GetComEventCounterResponse(ComEventCounter) = (0x0B, 1),
    GetComEventLogRequest(NoData) = (0x0C, 0),
    GetComEventLogResponse(ComEventLog) = (0x0C, 1),
    ReportServerIdRequest(NoData) = (0x11, 0),
    ReportServerIdResponse(ByteValues) = (0x11, 1),
    ReadDeviceIdentificationRequest(DeviceIdentificationRequest) = (0x2B, 0),
    ReadDeviceIdentificationResponse(DeviceIdentificationResponse) = (0x2B, 1),
}

impl Message for ModbusPdu {
    /// `true` when parsing a response.
    type Args = bool;

    fn parse(rb: &mut ReadBuffer<'_>, response: bool) -> Result<Self, CodecError> {
        rb.in_context("ModbusPDU", |rb| {
            let error_flag = rb.read_bit("errorFlag")?;
            let function_flag = rb.read_uint("functionFlag", 7)? as u8;
            let key = Key::three(u64::from(error_flag), u64::from(function_flag), u64::from(response));
            Self::decode_variant(rb, key, PduContext { function_flag, response })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusPDU", |wb| {
            let key = self.discriminator();
            let values = key.values();
            wb.write_bit("errorFlag", values[0] == 1)?;
            wb.write_uint("functionFlag", 7, values[1])?;
            self.serialize_variant(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        8 + self.fields_length_in_bits()
    }
}
