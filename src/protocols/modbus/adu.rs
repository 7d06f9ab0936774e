//! Modbus application data units: TCP, RTU and ASCII framings around a PDU.

use super::pdu::ModbusPdu;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::field::{
    read_checksum, read_const, read_implicit, read_sized, write_checksum, write_const, write_implicit,
};
use crate::frame::Framed;
use crc::{Crc, CRC_16_MODBUS};

pub const MODBUS_TCP_DEFAULT_PORT: u16 = 502;
const PROTOCOL_IDENTIFIER: u64 = 0x0000;
const MBAP_HEADER_BYTES: usize = 6;

const RTU_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16/MODBUS, as the value read big-endian from the wire (low byte first).
pub fn rtu_crc(bytes: &[u8]) -> u16 {
    RTU_CRC.checksum(bytes).swap_bytes()
}

/// Longitudinal redundancy check: two's complement of the byte sum.
pub fn ascii_lrc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)).wrapping_neg()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusTcpAdu {
    pub transaction_identifier: u16,
    pub unit_identifier: u8,
    pub pdu: ModbusPdu,
}

impl Message for ModbusTcpAdu {
    type Args = bool;

    fn parse(rb: &mut ReadBuffer<'_>, response: bool) -> Result<Self, CodecError> {
        rb.in_context("ModbusTcpADU", |rb| {
            let transaction_identifier = rb.read_u16("transactionIdentifier")?;
            read_const(rb, "protocolIdentifier", 16, PROTOCOL_IDENTIFIER)?;
            let length_at = rb.position();
            let length = read_implicit(rb, "length", 16)? as usize;
            if length == 0 {
                return Err(rb.error_at(
                    "length",
                    length_at,
                    ErrorKind::MalformedArrayBounds("length must cover the unit identifier".into()),
                ));
            }
            let unit_identifier = rb.read_u8("unitIdentifier")?;
            let pdu = read_sized(rb, "pdu", length - 1, |rb| ModbusPdu::parse(rb, response))?;
            Ok(Self { transaction_identifier, unit_identifier, pdu })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusTcpADU", |wb| {
            wb.write_u16("transactionIdentifier", self.transaction_identifier)?;
            write_const(wb, "protocolIdentifier", 16, PROTOCOL_IDENTIFIER)?;
            write_implicit(wb, "length", 16, self.pdu.length_in_bytes() + 1)?;
            wb.write_u8("unitIdentifier", self.unit_identifier)?;
            self.pdu.serialize(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        56 + self.pdu.length_in_bits()
    }
}

impl Framed for ModbusTcpAdu {
    const NAME: &'static str = "ModbusTcpADU";

    fn frame_length(bytes: &[u8]) -> Option<usize> {
        let header = bytes.get(..MBAP_HEADER_BYTES)?;
        Some(MBAP_HEADER_BYTES + usize::from(u16::from_be_bytes([header[4], header[5]])))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRtuAdu {
    pub address: u8,
    pub pdu: ModbusPdu,
}

impl Message for ModbusRtuAdu {
    type Args = bool;

    fn parse(rb: &mut ReadBuffer<'_>, response: bool) -> Result<Self, CodecError> {
        rb.in_context("ModbusRtuADU", |rb| {
            let start = rb.position();
            let address = rb.read_u8("address")?;
            let pdu = ModbusPdu::parse(rb, response)?;
            let computed = rb.bytes_since(start).map(rtu_crc).unwrap_or_default();
            read_checksum(rb, "crc", 16, u64::from(computed))?;
            Ok(Self { address, pdu })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusRtuADU", |wb| {
            let start = wb.position();
            wb.write_u8("address", self.address)?;
            self.pdu.serialize(wb)?;
            let crc = wb.bytes_since(start).map(rtu_crc).unwrap_or_default();
            write_checksum(wb, "crc", 16, u64::from(crc))
        })
    }

    fn length_in_bits(&self) -> usize {
        24 + self.pdu.length_in_bits()
    }
}

/// ASCII ADU in its binary form; the hex character framing belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusAsciiAdu {
    pub address: u8,
    pub pdu: ModbusPdu,
}

impl Message for ModbusAsciiAdu {
    type Args = bool;

    fn parse(rb: &mut ReadBuffer<'_>, response: bool) -> Result<Self, CodecError> {
        rb.in_context("ModbusAsciiADU", |rb| {
            let start = rb.position();
            let address = rb.read_u8("address")?;
            let pdu = ModbusPdu::parse(rb, response)?;
            let computed = rb.bytes_since(start).map(ascii_lrc).unwrap_or_default();
            read_checksum(rb, "lrc", 8, u64::from(computed))?;
            Ok(Self { address, pdu })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusAsciiADU", |wb| {
            let start = wb.position();
            wb.write_u8("address", self.address)?;
            self.pdu.serialize(wb)?;
            let lrc = wb.bytes_since(start).map(ascii_lrc).unwrap_or_default();
            write_checksum(wb, "lrc", 8, u64::from(lrc))
        })
    }

    fn length_in_bits(&self) -> usize {
        16 + self.pdu.length_in_bits()
    }
}

/// Holds only the constant default TCP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModbusConstants;

impl Message for ModbusConstants {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("ModbusConstants", |rb| {
            read_const(rb, "modbusTcpDefaultPort", 16, u64::from(MODBUS_TCP_DEFAULT_PORT))?;
            Ok(ModbusConstants)
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("ModbusConstants", |wb| {
            write_const(wb, "modbusTcpDefaultPort", 16, u64::from(MODBUS_TCP_DEFAULT_PORT))
        })
    }

    fn length_in_bits(&self) -> usize {
        16
    }
}
