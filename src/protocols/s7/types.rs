//! S7 and COTP enumerations.

use crate::wire_enum;

wire_enum! {
    pub enum CotpTpduSize: "COTPTpduSize" {
        Size128 = 0x07 => "SIZE_128",
        Size256 = 0x08 => "SIZE_256",
        Size512 = 0x09 => "SIZE_512",
        Size1024 = 0x0A => "SIZE_1024",
        Size2048 = 0x0B => "SIZE_2048",
        Size4096 = 0x0C => "SIZE_4096",
        Size8192 = 0x0D => "SIZE_8192",
    }
}

impl CotpTpduSize {
    pub fn size_in_bytes(self) -> usize {
        match self {
            CotpTpduSize::Size128 => 128,
            CotpTpduSize::Size256 => 256,
            CotpTpduSize::Size512 => 512,
            CotpTpduSize::Size1024 => 1024,
            CotpTpduSize::Size2048 => 2048,
            CotpTpduSize::Size4096 => 4096,
            CotpTpduSize::Size8192 => 8192,
        }
    }
}

wire_enum! {
    pub enum CotpProtocolClass: "COTPProtocolClass" {
        Class0 = 0x00 => "CLASS_0",
        Class1 = 0x10 => "CLASS_1",
        Class2 = 0x20 => "CLASS_2",
        Class3 = 0x30 => "CLASS_3",
        Class4 = 0x40 => "CLASS_4",
    }
}

wire_enum! {
    pub enum MemoryArea: "MemoryArea" {
        Counters = 0x1C => "COUNTERS",
        Timers = 0x1D => "TIMERS",
        DirectPeripheralAccess = 0x80 => "DIRECT_PERIPHERAL_ACCESS",
        Inputs = 0x81 => "INPUTS",
        Outputs = 0x82 => "OUTPUTS",
        FlagMemory = 0x83 => "FLAG_MEMORY",
        DataBlocks = 0x84 => "DATA_BLOCKS",
        InstanceDataBlocks = 0x85 => "INSTANCE_DATA_BLOCKS",
        LocalData = 0x86 => "LOCAL_DATA",
    }
}

wire_enum! {
    /// Transport size code of an address item. Several PLC data types share a
    /// code; each code maps to the first type that uses it.
    pub enum TransportSize: "TransportSize" {
        Lword = 0x00 => "LWORD",
        Bool = 0x01 => "BOOL",
        Byte = 0x02 => "BYTE",
        Char = 0x03 => "CHAR",
        Word = 0x04 => "WORD",
        Int = 0x05 => "INT",
        Dword = 0x06 => "DWORD",
        Dint = 0x07 => "DINT",
        Real = 0x08 => "REAL",
        Date = 0x09 => "DATE",
        Time = 0x0B => "TIME",
        DateAndTime = 0x0F => "DATE_AND_TIME",
        Wchar = 0x13 => "WCHAR",
        Lreal = 0x30 => "LREAL",
    }
}

wire_enum! {
    pub enum DataTransportSize: "DataTransportSize" {
        Null = 0x00 => "NULL",
        Bit = 0x03 => "BIT",
        ByteWordDword = 0x04 => "BYTE_WORD_DWORD",
        Integer = 0x05 => "INTEGER",
        Dinteger = 0x06 => "DINTEGER",
        Real = 0x07 => "REAL",
        OctetString = 0x09 => "OCTET_STRING",
    }
}

impl DataTransportSize {
    /// Whether the item's `dataLength` counts bits rather than bytes.
    pub fn size_in_bits(self) -> bool {
        matches!(self, DataTransportSize::Bit | DataTransportSize::ByteWordDword | DataTransportSize::Integer)
    }
}

wire_enum! {
    pub enum DataTransportErrorCode: "DataTransportErrorCode" {
        Reserved = 0x00 => "RESERVED",
        Ok = 0xFF => "OK",
        AccessDenied = 0x03 => "ACCESS_DENIED",
        InvalidAddress = 0x05 => "INVALID_ADDRESS",
        DataTypeNotSupported = 0x06 => "DATA_TYPE_NOT_SUPPORTED",
        NotFound = 0x0A => "NOT_FOUND",
    }
}
