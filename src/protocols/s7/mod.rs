//! S7 over ISO-on-TCP (big endian): TPKT wraps COTP, which carries S7 messages.

mod cotp;
mod message;
mod parameter;
mod payload;
mod tpkt;
mod types;

pub use cotp::{CotpConnection, CotpData, CotpDisconnectResponse, CotpPacket, CotpParameter, CotpTpdu, CotpTpduError};
pub use message::{S7Error, S7Message, S7MessageKind};
pub use parameter::{
    CpuFunctions, ParameterUserDataItem, S7Address, S7AddressAny, S7Parameter, SetupCommunication,
    VarRequestParameterItem,
};
pub use payload::{PayloadArgs, PayloadUserDataItem, S7Payload, VarPayloadDataItem, VarPayloadStatusItem};
pub use tpkt::TpktPacket;
pub use types::{
    CotpProtocolClass, CotpTpduSize, DataTransportErrorCode, DataTransportSize, MemoryArea, TransportSize,
};

pub const MESSAGE_TYPE_JOB: u8 = 0x01;
pub const MESSAGE_TYPE_ACK: u8 = 0x02;
pub const MESSAGE_TYPE_ACK_DATA: u8 = 0x03;
pub const MESSAGE_TYPE_USER_DATA: u8 = 0x07;
