//! Message trait, error taxonomy and the [`Codec`] entry point.

use crate::buffer::{ByteOrder, ReadBuffer, WriteBuffer};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::dump::Node;
use crate::envelope::Key;

/// What went wrong. Paired with a location in [`CodecError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("unexpected end of input: needed {needed} bits, {available} available")]
    UnexpectedEndOfInput { needed: usize, available: usize },
    #[error("constant mismatch: expected {expected:#x}, got {actual:#x}")]
    ConstantMismatch { expected: u64, actual: u64 },
    #[error("unknown {envelope} variant for key {key}")]
    UnknownVariant { envelope: &'static str, key: Key },
    #[error("value {value} does not fit in {bits} bits")]
    FieldOverflow { bits: usize, value: i128 },
    #[error("malformed array bounds: {0}")]
    MalformedArrayBounds(String),
    #[error("invalid {enum_name} value {value:#x}")]
    InvalidEnumValue { enum_name: &'static str, value: u64 },
    #[error("checksum mismatch: computed {computed:#x}, received {received:#x}")]
    ChecksumMismatch { computed: u64, received: u64 },
    #[error("invalid bit width {bits}")]
    InvalidBitWidth { bits: usize },
    #[error("malformed string: {reason}")]
    MalformedString { reason: String },
}

impl ErrorKind {
    /// Variant name, as written in fixture `error:` expectations.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedEndOfInput { .. } => "UnexpectedEndOfInput",
            ErrorKind::ConstantMismatch { .. } => "ConstantMismatch",
            ErrorKind::UnknownVariant { .. } => "UnknownVariant",
            ErrorKind::FieldOverflow { .. } => "FieldOverflow",
            ErrorKind::MalformedArrayBounds(_) => "MalformedArrayBounds",
            ErrorKind::InvalidEnumValue { .. } => "InvalidEnumValue",
            ErrorKind::ChecksumMismatch { .. } => "ChecksumMismatch",
            ErrorKind::InvalidBitWidth { .. } => "InvalidBitWidth",
            ErrorKind::MalformedString { .. } => "MalformedString",
        }
    }
}

/// Codec failure: the kind, the logical field path and the bit offset where it happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path} (bit {bit_offset}): {kind}")]
pub struct CodecError {
    pub kind: ErrorKind,
    pub path: String,
    pub bit_offset: usize,
}

impl CodecError {
    pub fn new(kind: ErrorKind, path: impl Into<String>, bit_offset: usize) -> Self {
        Self { kind, path: path.into(), bit_offset }
    }

    pub fn byte_offset(&self) -> usize {
        self.bit_offset / 8
    }
}

/// A structure that can be parsed from and serialized to a bit buffer.
///
/// `Args` carries parse-time inputs that are not on the wire (a direction flag,
/// an enclosing length). Serialization never needs them: every value a variant
/// depends on is either stored or derivable from the variant itself.
pub trait Message: Sized {
    type Args: Copy;

    fn parse(rb: &mut ReadBuffer<'_>, args: Self::Args) -> Result<Self, CodecError>;

    fn serialize(&self, wb: &mut WriteBuffer) -> Result<(), CodecError>;

    /// Exact encoded size. Used to fill implicit length fields before writing.
    fn length_in_bits(&self) -> usize;

    fn length_in_bytes(&self) -> usize {
        (self.length_in_bits() + 7) / 8
    }
}

/// A parsed message together with its field tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Traced<T> {
    pub message: T,
    pub tree: Vec<Node>,
    pub consumed_bits: usize,
}

/// Parse / serialize entry point: fixes the byte order and the diagnostic sink.
#[derive(Clone, Copy)]
pub struct Codec<'s> {
    byte_order: ByteOrder,
    sink: &'s dyn DiagnosticSink,
}

impl Default for Codec<'static> {
    fn default() -> Self {
        Self::new(ByteOrder::BigEndian)
    }
}

impl Codec<'static> {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self { byte_order, sink: &TracingSink }
    }
}

impl<'s> Codec<'s> {
    pub fn with_sink<'t>(self, sink: &'t dyn DiagnosticSink) -> Codec<'t> {
        Codec { byte_order: self.byte_order, sink }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn reader<'a>(&self, bytes: &'a [u8]) -> ReadBuffer<'a>
    where
        's: 'a,
    {
        ReadBuffer::new(bytes).with_byte_order(self.byte_order).with_sink(self.sink)
    }

    pub fn writer(&self, capacity: usize) -> WriteBuffer {
        WriteBuffer::with_capacity(capacity).with_byte_order(self.byte_order)
    }

    /// Parse one `T` from the start of `bytes`. Trailing bytes are left unread.
    pub fn parse<T: Message>(&self, bytes: &[u8], args: T::Args) -> Result<T, CodecError> {
        let mut rb = self.reader(bytes);
        T::parse(&mut rb, args)
    }

    /// Parse and also return the field tree and the number of bits consumed.
    pub fn parse_traced<T: Message>(&self, bytes: &[u8], args: T::Args) -> Result<Traced<T>, CodecError> {
        let mut rb = self.reader(bytes).with_trace();
        let message = T::parse(&mut rb, args)?;
        let consumed_bits = rb.position();
        Ok(Traced { message, tree: rb.take_trace(), consumed_bits })
    }

    pub fn serialize<T: Message>(&self, message: &T) -> Result<Vec<u8>, CodecError> {
        let mut wb = self.writer(message.length_in_bytes());
        message.serialize(&mut wb)?;
        let expected = message.length_in_bits();
        if wb.position() != expected {
            return Err(wb.error_at(
                "",
                wb.position(),
                ErrorKind::MalformedArrayBounds(format!(
                    "wrote {} bits, length_in_bits reports {}",
                    wb.position(),
                    expected
                )),
            ));
        }
        Ok(wb.into_bytes())
    }

    pub fn serialize_traced<T: Message>(&self, message: &T) -> Result<(Vec<u8>, Vec<Node>), CodecError> {
        let mut wb = self.writer(message.length_in_bytes()).with_trace();
        message.serialize(&mut wb)?;
        let tree = wb.take_trace();
        Ok((wb.into_bytes(), tree))
    }
}
