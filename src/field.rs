//! Field codec primitives shared by every message family.
//!
//! Each primitive comes as a read/write pair. Reads record into the trace tree
//! through the buffer; arrays and complex fields open a named context.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind, Message};
use crate::diagnostics::Diagnostic;
use crate::value::Value;

/// Where an element sits within its array.
///
/// `last` is only known for count-bounded arrays. Length-bounded arrays always
/// report `false`; their elements use [`ReadBuffer::has_more`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementPosition {
    pub index: usize,
    pub last: bool,
}

impl ElementPosition {
    pub fn of(index: usize, len: usize) -> Self {
        Self { index, last: index + 1 == len }
    }
}

/// Read a constant; any other value is fatal.
pub fn read_const(rb: &mut ReadBuffer<'_>, name: &str, bits: u8, expected: u64) -> Result<u64, CodecError> {
    let start = rb.position();
    let actual = rb.read_uint(name, bits)?;
    if actual != expected {
        return Err(rb.error_at(name, start, ErrorKind::ConstantMismatch { expected, actual }));
    }
    Ok(actual)
}

pub fn write_const(wb: &mut WriteBuffer, name: &str, bits: u8, value: u64) -> Result<(), CodecError> {
    wb.write_uint(name, bits, value)
}

/// Read a reserved field. A mismatch goes to the buffer's diagnostic sink and
/// parsing continues.
pub fn read_reserved(rb: &mut ReadBuffer<'_>, name: &str, bits: u8, expected: u64) -> Result<u64, CodecError> {
    let start = rb.position();
    let actual = rb.read_uint(name, bits)?;
    if actual != expected {
        rb.sink().report(Diagnostic::ReservedMismatch {
            path: rb.context_path(name),
            bit_offset: start,
            expected,
            actual,
        });
    }
    Ok(actual)
}

/// Serialization always emits the expected value, whatever was parsed.
pub fn write_reserved(wb: &mut WriteBuffer, name: &str, bits: u8, expected: u64) -> Result<(), CodecError> {
    wb.write_uint(name, bits, expected)
}

/// Read a field whose value is derived on write (a length or count).
pub fn read_implicit(rb: &mut ReadBuffer<'_>, name: &str, bits: u8) -> Result<u64, CodecError> {
    rb.read_uint(name, bits)
}

pub fn write_implicit(wb: &mut WriteBuffer, name: &str, bits: u8, value: usize) -> Result<(), CodecError> {
    let value = u64::try_from(value).map_err(|_| {
        wb.error_at(name, wb.position(), ErrorKind::FieldOverflow { bits: usize::from(bits), value: value as i128 })
    })?;
    wb.write_uint(name, bits, value)
}

pub fn read_optional<'a, T>(
    rb: &mut ReadBuffer<'a>,
    present: bool,
    f: impl FnOnce(&mut ReadBuffer<'a>) -> Result<T, CodecError>,
) -> Result<Option<T>, CodecError> {
    if present {
        f(rb).map(Some)
    } else {
        Ok(None)
    }
}

pub fn write_optional<T>(
    wb: &mut WriteBuffer,
    value: Option<&T>,
    f: impl FnOnce(&mut WriteBuffer, &T) -> Result<(), CodecError>,
) -> Result<(), CodecError> {
    match value {
        Some(v) => f(wb, v),
        None => Ok(()),
    }
}

/// Run `f` over a span of exactly `byte_len` bytes. Fewer bytes remaining is
/// [`ErrorKind::UnexpectedEndOfInput`]; `f` stopping short of or past the span
/// is [`ErrorKind::MalformedArrayBounds`].
pub fn read_sized<'a, T>(
    rb: &mut ReadBuffer<'a>,
    name: &str,
    byte_len: usize,
    f: impl FnOnce(&mut ReadBuffer<'a>) -> Result<T, CodecError>,
) -> Result<T, CodecError> {
    let bits = byte_len.saturating_mul(8);
    let start = rb.position();
    if !rb.has_more(bits) {
        let available = rb.remaining_bits();
        return Err(rb.error_at(name, start, ErrorKind::UnexpectedEndOfInput { needed: bits, available }));
    }
    let value = f(rb)?;
    let used = rb.position() - start;
    if used != bits {
        let reason = format!("used {} bits of a declared {}", used, bits);
        return Err(rb.error_at(name, start, ErrorKind::MalformedArrayBounds(reason)));
    }
    Ok(value)
}

/// Read exactly `count` elements.
pub fn read_count_array<'a, T>(
    rb: &mut ReadBuffer<'a>,
    name: &'static str,
    count: usize,
    mut f: impl FnMut(&mut ReadBuffer<'a>, ElementPosition) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    rb.in_context(name, |rb| {
        // a hostile count must not drive the allocation
        let mut items = Vec::with_capacity(count.min(rb.remaining_bits() / 8 + 1));
        for index in 0..count {
            items.push(f(rb, ElementPosition::of(index, count))?);
        }
        Ok(items)
    })
}

/// Read elements until exactly `byte_len` bytes have been consumed.
pub fn read_length_array<'a, T>(
    rb: &mut ReadBuffer<'a>,
    name: &'static str,
    byte_len: usize,
    mut f: impl FnMut(&mut ReadBuffer<'a>, ElementPosition) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    let bits = byte_len.saturating_mul(8);
    if !rb.has_more(bits) {
        let available = rb.remaining_bits();
        return Err(rb.error_at(name, rb.position(), ErrorKind::UnexpectedEndOfInput { needed: bits, available }));
    }
    let end = rb.position() + bits;
    rb.in_context(name, |rb| {
        let mut items = Vec::new();
        while rb.position() < end {
            let before = rb.position();
            let position = ElementPosition { index: items.len(), last: false };
            items.push(f(rb, position)?);
            if rb.position() == before {
                return Err(rb.error_at("", before, ErrorKind::MalformedArrayBounds("element consumed no input".into())));
            }
        }
        if rb.position() != end {
            let reason = format!("elements ended at bit {}, declared end is bit {}", rb.position(), end);
            return Err(rb.error_at("", end, ErrorKind::MalformedArrayBounds(reason)));
        }
        Ok(items)
    })
}

pub fn write_array<T>(
    wb: &mut WriteBuffer,
    name: &'static str,
    items: &[T],
    mut f: impl FnMut(&mut WriteBuffer, &T, ElementPosition) -> Result<(), CodecError>,
) -> Result<(), CodecError> {
    wb.in_context(name, |wb| {
        for (index, item) in items.iter().enumerate() {
            f(wb, item, ElementPosition::of(index, items.len()))?;
        }
        Ok(())
    })
}

/// Parse a count-bounded array of messages sharing the same args.
pub fn read_messages<'a, T: Message>(
    rb: &mut ReadBuffer<'a>,
    name: &'static str,
    count: usize,
    args: T::Args,
) -> Result<Vec<T>, CodecError> {
    read_count_array(rb, name, count, |rb, _| T::parse(rb, args))
}

pub fn write_messages<T: Message>(wb: &mut WriteBuffer, name: &'static str, items: &[T]) -> Result<(), CodecError> {
    write_array(wb, name, items, |wb, item, _| item.serialize(wb))
}

pub fn messages_length_in_bits<T: Message>(items: &[T]) -> usize {
    items.iter().map(Message::length_in_bits).sum()
}

/// Skip up to `bytes` bytes of padding, stopping early when input runs out.
/// Returns the number of bytes skipped.
pub fn read_padding(rb: &mut ReadBuffer<'_>, name: &str, bytes: usize) -> Result<usize, CodecError> {
    let mut skipped = 0;
    while skipped < bytes && rb.has_more(8) {
        rb.read_bits_raw(name, 8)?;
        skipped += 1;
    }
    rb.record(name, || Value::Padding(skipped));
    Ok(skipped)
}

pub fn write_padding(wb: &mut WriteBuffer, name: &str, bytes: usize) -> Result<(), CodecError> {
    for _ in 0..bytes {
        wb.write_bits_raw(name, 8, 0)?;
    }
    wb.record(name, || Value::Padding(bytes));
    Ok(())
}

/// Read a checksum field and compare it against `computed`.
pub fn read_checksum(rb: &mut ReadBuffer<'_>, name: &str, bits: u8, computed: u64) -> Result<u64, CodecError> {
    let start = rb.position();
    let received = rb.read_uint(name, bits)?;
    if received != computed {
        return Err(rb.error_at(name, start, ErrorKind::ChecksumMismatch { computed, received }));
    }
    Ok(received)
}

pub fn write_checksum(wb: &mut WriteBuffer, name: &str, bits: u8, value: u64) -> Result<(), CodecError> {
    wb.write_uint(name, bits, value)
}

/// Closed set of named wire values. Generated by [`wire_enum!`](crate::wire_enum).
pub trait WireEnum: Copy + Sized + 'static {
    const NAME: &'static str;

    fn from_wire(value: u64) -> Option<Self>;
    fn to_wire(self) -> u64;
    fn name(self) -> &'static str;
    fn from_name(name: &str) -> Option<Self>;
}

pub fn read_enum<E: WireEnum>(rb: &mut ReadBuffer<'_>, name: &str, bits: u8) -> Result<E, CodecError> {
    let start = rb.position();
    let raw = rb.read_bits_raw(name, bits)?;
    let value = E::from_wire(raw)
        .ok_or_else(|| rb.error_at(name, start, ErrorKind::InvalidEnumValue { enum_name: E::NAME, value: raw }))?;
    rb.record(name, || Value::Enum { name: value.name(), value: raw });
    Ok(value)
}

pub fn write_enum<E: WireEnum>(wb: &mut WriteBuffer, name: &str, bits: u8, value: E) -> Result<(), CodecError> {
    let raw = value.to_wire();
    wb.write_bits_raw(name, bits, raw)?;
    wb.record(name, || Value::Enum { name: value.name(), value: raw });
    Ok(())
}

/// Define a [`WireEnum`]: a Rust enum plus its wire mapping.
///
/// ```
/// fieldbus_codec::wire_enum! {
///     /// COTP protection class.
///     pub enum ProtocolClass: "COTPProtocolClass" {
///         Class0 = 0x00 => "CLASS_0",
///         Class1 = 0x10 => "CLASS_1",
///     }
/// }
/// use fieldbus_codec::WireEnum;
/// assert_eq!(ProtocolClass::from_wire(0x10), Some(ProtocolClass::Class1));
/// assert_eq!(ProtocolClass::Class0.name(), "CLASS_0");
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $ty:ident : $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $name:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $ty {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::field::WireEnum for $ty {
            const NAME: &'static str = $label;

            fn from_wire(value: u64) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            fn to_wire(self) -> u64 {
                match self {
                    $( Self::$variant => $value, )+
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}
