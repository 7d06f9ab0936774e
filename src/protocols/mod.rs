//! Message families built on the codec runtime, plus a by-name registry of
//! their root types for fixtures and command-line tools.

pub mod modbus;
pub mod s7;

use crate::codec::{Codec, CodecError, Message};
use crate::dump::Node;

/// Result of a traced parse followed by re-serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub tree: Vec<Node>,
    pub consumed_bits: usize,
    pub reserialized: Vec<u8>,
}

/// A message type that can start a parse, addressed by its wire name.
pub struct RootType {
    pub name: &'static str,
    /// Meaning of each positional argument, for usage messages.
    pub args: &'static [&'static str],
    pub decode: fn(&Codec<'_>, &[u8], &[u64]) -> Result<Decoded, CodecError>,
}

fn round_trip<T: Message>(codec: &Codec<'_>, bytes: &[u8], args: T::Args) -> Result<Decoded, CodecError> {
    let traced = codec.parse_traced::<T>(bytes, args)?;
    let reserialized = codec.serialize(&traced.message)?;
    Ok(Decoded { tree: traced.tree, consumed_bits: traced.consumed_bits, reserialized })
}

fn flag(args: &[u64], index: usize) -> bool {
    args.get(index).is_some_and(|v| *v != 0)
}

pub static ROOT_TYPES: &[RootType] = &[
    RootType {
        name: "ModbusPDU",
        args: &["response"],
        decode: |codec, bytes, args| round_trip::<modbus::ModbusPdu>(codec, bytes, flag(args, 0)),
    },
    RootType {
        name: "ModbusTcpADU",
        args: &["response"],
        decode: |codec, bytes, args| round_trip::<modbus::ModbusTcpAdu>(codec, bytes, flag(args, 0)),
    },
    RootType {
        name: "ModbusRtuADU",
        args: &["response"],
        decode: |codec, bytes, args| round_trip::<modbus::ModbusRtuAdu>(codec, bytes, flag(args, 0)),
    },
    RootType {
        name: "ModbusAsciiADU",
        args: &["response"],
        decode: |codec, bytes, args| round_trip::<modbus::ModbusAsciiAdu>(codec, bytes, flag(args, 0)),
    },
    RootType {
        name: "ModbusConstants",
        args: &[],
        decode: |codec, bytes, _| round_trip::<modbus::ModbusConstants>(codec, bytes, ()),
    },
    RootType {
        name: "TPKTPacket",
        args: &[],
        decode: |codec, bytes, _| round_trip::<s7::TpktPacket>(codec, bytes, ()),
    },
    RootType {
        name: "COTPPacket",
        args: &["cotpLen"],
        decode: |codec, bytes, args| {
            let cotp_len = args.first().map_or(bytes.len() as u64, |v| *v);
            round_trip::<s7::CotpPacket>(codec, bytes, cotp_len.min(u64::from(u16::MAX)) as u16)
        },
    },
    RootType {
        name: "S7Message",
        args: &[],
        decode: |codec, bytes, _| round_trip::<s7::S7Message>(codec, bytes, ()),
    },
];

pub fn root_type(name: &str) -> Option<&'static RootType> {
    ROOT_TYPES.iter().find(|root| root.name == name)
}
