//! Modbus family (big endian): PDU envelope, TCP / RTU / ASCII ADUs and constants.

mod adu;
mod pdu;
mod types;

pub use adu::{
    ascii_lrc, rtu_crc, ModbusAsciiAdu, ModbusConstants, ModbusRtuAdu, ModbusTcpAdu, MODBUS_TCP_DEFAULT_PORT,
};
pub use pdu::{
    AddressQuantity, AddressValue, ByteValues, ComEventCounter, ComEventLog, DeviceIdentificationRequest,
    DeviceIdentificationResponse, Diagnostic, ExceptionStatus, FifoPointer, FifoQueue, FileRecords, MaskWrite,
    ModbusPdu, NoData, PduContext, PduError, ReadWriteMultipleRequest, WriteMultiple,
};
pub use types::{
    DeviceInformationConformityLevel, DeviceInformationLevel, DeviceInformationMoreFollows, DeviceInformationObject,
    ModbusErrorCode, ReadFileRecordRequestItem, ReadFileRecordResponseItem, WriteFileRecordItem,
};
