//! # fieldbus-codec: bit-level codec runtime for industrial field-bus protocols
//!
//! A runtime for schema-driven binary message families: a bit-addressable
//! read/write buffer, field codec primitives, and a discriminated envelope model
//! with closed dispatch tables. Message families (Modbus, S7/COTP/TPKT) are
//! expressed on top of it and round-trip byte-for-byte.
//!
//! ## Layers
//!
//! - **Buffer** ([`buffer`]): [`ReadBuffer`] / [`WriteBuffer`] with a bit cursor,
//!   MSB-first sub-byte access, a fixed byte order per instance, and a context
//!   stack used for error paths and trace output.
//! - **Fields** ([`field`]): const, reserved, implicit, optional, array
//!   (count / length / last-element-aware), padding, checksum and enum fields.
//! - **Envelopes** ([`envelope`]): discriminator keys, dispatch tables and the
//!   [`Envelope`] trait. Discriminators are derived from the active variant,
//!   never stored.
//! - **Messages** ([`codec`]): the [`Message`] trait and [`Codec`] entry points.
//!
//! ## Field kinds
//!
//! | Kind | Parse | Serialize |
//! |------|-------|-----------|
//! | simple | read and store | write stored value |
//! | const | mismatch is fatal | write the constant |
//! | reserved | mismatch is reported to the sink | write the expected value |
//! | implicit | read, use for bounds, discard | compute from siblings |
//! | optional | predicate over earlier fields | write when present |
//! | padding | skip while input remains | write zeros |
//!
//! ## Example
//!
//! ```
//! use fieldbus_codec::protocols::modbus::{AddressQuantity, ModbusPdu, ModbusTcpAdu};
//! use fieldbus_codec::Codec;
//!
//! let codec = Codec::default();
//! let adu = ModbusTcpAdu {
//!     transaction_identifier: 1,
//!     unit_identifier: 1,
//!     pdu: ModbusPdu::ReadHoldingRegistersRequest(AddressQuantity { starting_address: 0, quantity: 2 }),
//! };
//! let bytes = codec.serialize(&adu).unwrap();
//! assert_eq!(bytes, [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
//! let back: ModbusTcpAdu = codec.parse(&bytes, false).unwrap();
//! assert_eq!(back, adu);
//! ```

pub mod buffer;
pub mod codec;
pub mod diagnostics;
pub mod dump;
pub mod envelope;
pub mod field;
pub mod fixture;
pub mod frame;
pub mod protocols;
pub mod value;

pub use buffer::{ByteOrder, ReadBuffer, StringEncoding, WriteBuffer};
pub use codec::{Codec, CodecError, ErrorKind, Message, Traced};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, TracingSink};
pub use dump::Node;
pub use envelope::{DispatchTable, Envelope, Key, Pattern, VariantEntry};
pub use field::{ElementPosition, WireEnum};
pub use frame::{decode_frames, FrameDecodeResult, Framed};
pub use value::Value;
