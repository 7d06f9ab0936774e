//! RFC 1006 TPKT framing.

use super::cotp::CotpPacket;
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::field::{read_const, read_implicit, read_reserved, read_sized, write_const, write_implicit, write_reserved};
use crate::frame::Framed;

const PROTOCOL_ID: u64 = 0x03;
const HEADER_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpktPacket {
    pub payload: CotpPacket,
}

impl Message for TpktPacket {
    type Args = ();

    fn parse(rb: &mut ReadBuffer<'_>, _: ()) -> Result<Self, CodecError> {
        rb.in_context("TPKTPacket", |rb| {
            read_const(rb, "protocolId", 8, PROTOCOL_ID)?;
            read_reserved(rb, "reserved", 8, 0x00)?;
            let len_at = rb.position();
            let len = read_implicit(rb, "len", 16)? as usize;
            let Some(cotp_len) = len.checked_sub(HEADER_BYTES) else {
                let reason = format!("packet length {} is shorter than the TPKT header", len);
                return Err(rb.error_at("len", len_at, ErrorKind::MalformedArrayBounds(reason)));
            };
            let payload = read_sized(rb, "payload", cotp_len, |rb| CotpPacket::parse(rb, cotp_len as u16))?;
            Ok(Self { payload })
        })
    }

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context("TPKTPacket", |wb| {
            write_const(wb, "protocolId", 8, PROTOCOL_ID)?;
            write_reserved(wb, "reserved", 8, 0x00)?;
            write_implicit(wb, "len", 16, self.payload.length_in_bytes() + HEADER_BYTES)?;
            self.payload.serialize(wb)
        })
    }

    fn length_in_bits(&self) -> usize {
        HEADER_BYTES * 8 + self.payload.length_in_bits()
    }
}

impl Framed for TpktPacket {
    const NAME: &'static str = "TPKTPacket";

    fn frame_length(bytes: &[u8]) -> Option<usize> {
        let header = bytes.get(..HEADER_BYTES)?;
        Some(usize::from(u16::from_be_bytes([header[2], header[3]])))
    }
}
