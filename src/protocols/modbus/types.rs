//! Modbus enumerations and array element types.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::field::{read_implicit, write_implicit};
use crate::wire_enum;

wire_enum! {
    /// Exception code carried by an error response.
    pub enum ModbusErrorCode: "ModbusErrorCode" {
        IllegalFunction = 0x01 => "ILLEGAL_FUNCTION",
        IllegalDataAddress = 0x02 => "ILLEGAL_DATA_ADDRESS",
        IllegalDataValue = 0x03 => "ILLEGAL_DATA_VALUE",
        SlaveDeviceFailure = 0x04 => "SLAVE_DEVICE_FAILURE",
        Acknowledge = 0x05 => "ACKNOWLEDGE",
        SlaveDeviceBusy = 0x06 => "SLAVE_DEVICE_BUSY",
        NegativeAcknowledge = 0x07 => "NEGATIVE_ACKNOWLEDGE",
        MemoryParityError = 0x08 => "MEMORY_PARITY_ERROR",
        GatewayPathUnavailable = 0x0A => "GATEWAY_PATH_UNAVAILABLE",
        GatewayTargetDeviceFailedToRespond = 0x0B => "GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND",
    }
}

wire_enum! {
    pub enum DeviceInformationLevel: "ModbusDeviceInformationLevel" {
        Basic = 0x01 => "BASIC",
        Regular = 0x02 => "REGULAR",
        Extended = 0x03 => "EXTENDED",
        Individual = 0x04 => "INDIVIDUAL",
    }
}

wire_enum! {
    /// 7-bit field; shares its byte with the individual-access flag.
    pub enum DeviceInformationConformityLevel: "ModbusDeviceInformationConformityLevel" {
        BasicStreamOnly = 0x01 => "BASIC_STREAM_ONLY",
        RegularStreamOnly = 0x02 => "REGULAR_STREAM_ONLY",
        ExtendedStreamOnly = 0x03 => "EXTENDED_STREAM_ONLY",
    }
}

wire_enum! {
    pub enum DeviceInformationMoreFollows: "ModbusDeviceInformationMoreFollows" {
        NoMoreObjectsAvailable = 0x00 => "NO_MORE_OBJECTS_AVAILABLE",
        MoreObjectsAvailable = 0xFF => "MORE_OBJECTS_AVAILABLE",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFileRecordRequestItem {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    pub record_length: u16,
}

impl Message for ReadFileRecordRequestItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("ModbusPDUReadFileRecordRequestItem", |rb| {
            let reference_type = rb.read_u8("referenceType")?;
            let file_number = rb.read_u16("fileNumber")?;
            let record_number = rb.read_u16("recordNumber")?;
            let record_length = rb.read_u16("recordLength")?;
            Ok(Self { reference_type, file_number, record_number, record_length })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusPDUReadFileRecordRequestItem", |wb| {
            wb.write_u8("referenceType", self.reference_type)?;
            wb.write_u16("fileNumber", self.file_number)?;
            wb.write_u16("recordNumber", self.record_number)?;
            wb.write_u16("recordLength", self.record_length)
        })
    }

    fn length_in_bits(&self) -> usize {
        56
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFileRecordResponseItem {
    pub reference_type: u8,
    pub data: Vec<u8>,
}

impl Message for ReadFileRecordResponseItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("ModbusPDUReadFileRecordResponseItem", |rb| {
            let start = rb.position();
            let data_length = read_implicit(rb, "dataLength", 8)?;
            if data_length == 0 {
                return Err(rb.error_at(
                    "dataLength",
                    start,
                    ErrorKind::MalformedArrayBounds("data length must count the reference type byte".into()),
                ));
            }
            let reference_type = rb.read_u8("referenceType")?;
            let data = rb.read_bytes("data", data_length as usize - 1)?;
            Ok(Self { reference_type, data })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusPDUReadFileRecordResponseItem", |wb| {
            write_implicit(wb, "dataLength", 8, self.data.len() + 1)?;
            wb.write_u8("referenceType", self.reference_type)?;
            wb.write_bytes("data", &self.data)
        })
    }

    fn length_in_bits(&self) -> usize {
        16 + self.data.len() * 8
    }
}

/// Element of both the write-file-record request and its echoed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileRecordItem {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    /// Register contents; always an even number of bytes.
    pub record_data: Vec<u8>,
}

impl Message for WriteFileRecordItem {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("ModbusPDUWriteFileRecordItem", |rb| {
            let reference_type = rb.read_u8("referenceType")?;
            let file_number = rb.read_u16("fileNumber")?;
            let record_number = rb.read_u16("recordNumber")?;
            let record_length = read_implicit(rb, "recordLength", 16)?;
            let record_data = rb.read_bytes("recordData", record_length as usize * 2)?;
            Ok(Self { reference_type, file_number, record_number, record_data })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusPDUWriteFileRecordItem", |wb| {
            if self.record_data.len() % 2 != 0 {
                return Err(wb.error_at(
                    "recordData",
                    wb.position(),
                    ErrorKind::MalformedArrayBounds(format!(
                        "record data is {} bytes, not a whole number of registers",
                        self.record_data.len()
                    )),
                ));
            }
            wb.write_u8("referenceType", self.reference_type)?;
            wb.write_u16("fileNumber", self.file_number)?;
            wb.write_u16("recordNumber", self.record_number)?;
            write_implicit(wb, "recordLength", 16, self.record_data.len() / 2)?;
            wb.write_bytes("recordData", &self.record_data)
        })
    }

    fn length_in_bits(&self) -> usize {
        56 + self.record_data.len() * 8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInformationObject {
    pub object_id: u8,
    pub data: Vec<u8>,
}

impl Message for DeviceInformationObject {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("ModbusDeviceInformationObject", |rb| {
            let object_id = rb.read_u8("objectId")?;
            let object_length = read_implicit(rb, "objectLength", 8)?;
            let data = rb.read_bytes("data", object_length as usize)?;
            Ok(Self { object_id, data })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusDeviceInformationObject", |wb| {
            wb.write_u8("objectId", self.object_id)?;
            write_implicit(wb, "objectLength", 8, self.data.len())?;
            wb.write_bytes("data", &self.data)
        })
    }

    fn length_in_bits(&self) -> usize {
        16 + self.data.len() * 8
    }
}
