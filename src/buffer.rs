//! Bit-addressable read and write buffers.
//!
//! Sub-byte fields are packed MSB-first: the first bit read from a byte is its
//! most significant bit. The buffer's [`ByteOrder`] applies only to fields whose
//! width is a whole number of bytes; narrower fields are always MSB-first.
//!
//! Both buffers keep a stack of logical context names. Errors carry the joined
//! path (`TPKTPacket/payload/parameter/items`) and, when tracing is enabled, the
//! stack drives the shape of the recorded [`Node`] tree.

use crate::codec::{CodecError, ErrorKind};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::dump::{Node, TraceBuilder};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Byte order for multi-byte fields. Fixed per buffer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Character encoding for fixed-width string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ascii,
    Utf8,
    Utf16,
}

fn check_width(bits: u8) -> Result<usize, ErrorKind> {
    if bits == 0 || bits > 64 {
        Err(ErrorKind::InvalidBitWidth { bits: usize::from(bits) })
    } else {
        Ok(usize::from(bits))
    }
}

fn msb_bits(data: &[u8], pos: usize, bits: usize) -> u64 {
    let mut value = 0u64;
    for i in 0..bits {
        let p = pos + i;
        let bit = (data[p / 8] >> (7 - p % 8)) & 1;
        value = (value << 1) | u64::from(bit);
    }
    value
}

fn put_msb_bits(data: &mut [u8], pos: usize, bits: usize, value: u64) {
    for i in 0..bits {
        let p = pos + i;
        let mask = 1u8 << (7 - p % 8);
        if (value >> (bits - 1 - i)) & 1 == 1 {
            data[p / 8] |= mask;
        } else {
            data[p / 8] &= !mask;
        }
    }
}

fn join_path(contexts: &[&'static str], field: &str) -> String {
    let mut path = contexts.join("/");
    if !field.is_empty() {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(field);
    }
    path
}

/// Cursor over an immutable byte slice.
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    pos: usize,
    byte_order: ByteOrder,
    contexts: Vec<&'static str>,
    sink: &'a dyn DiagnosticSink,
    trace: Option<TraceBuilder>,
}

impl<'a> ReadBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            byte_order: ByteOrder::BigEndian,
            contexts: Vec::new(),
            sink: &TracingSink,
            trace: None,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Route reserved-field mismatches to `sink` instead of the tracing log.
    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    /// Record every field read into a tree retrievable with [`ReadBuffer::take_trace`].
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(TraceBuilder::default());
        self
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Cursor position in bits from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn total_bits(&self) -> usize {
        self.data.len() * 8
    }

    pub fn remaining_bits(&self) -> usize {
        self.total_bits().saturating_sub(self.pos)
    }

    /// True when at least `bits` more bits can be read.
    pub fn has_more(&self, bits: usize) -> bool {
        self.remaining_bits() >= bits
    }

    pub fn is_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// Look at the byte `offset` bytes past the (byte-aligned) cursor without consuming it.
    pub fn peek_byte(&self, offset: usize) -> Option<u8> {
        if !self.is_aligned() {
            return None;
        }
        self.data.get(self.pos / 8 + offset).copied()
    }

    /// Raw bytes between `start_bit` and the cursor. Both ends must be byte-aligned.
    pub fn bytes_since(&self, start_bit: usize) -> Option<&'a [u8]> {
        if start_bit % 8 != 0 || !self.is_aligned() || start_bit > self.pos {
            return None;
        }
        self.data.get(start_bit / 8..self.pos / 8)
    }

    pub fn sink(&self) -> &'a dyn DiagnosticSink {
        self.sink
    }

    pub fn push_context(&mut self, name: &'static str) {
        self.contexts.push(name);
        if let Some(trace) = self.trace.as_mut() {
            trace.open(name);
        }
    }

    pub fn pop_context(&mut self, name: &'static str) {
        let popped = self.contexts.pop();
        if popped != Some(name) {
            tracing::warn!(expected = name, popped = ?popped, "unbalanced read context");
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.close();
        }
    }

    /// Run `f` inside a named context. The context is popped on error too, so the
    /// trace tree stays balanced for partially decoded input.
    pub fn in_context<T>(
        &mut self,
        name: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        self.push_context(name);
        let result = f(self);
        self.pop_context(name);
        result
    }

    /// Slash-joined context path ending in `field`.
    pub fn context_path(&self, field: &str) -> String {
        join_path(&self.contexts, field)
    }

    pub fn error_at(&self, field: &str, bit_offset: usize, kind: ErrorKind) -> CodecError {
        CodecError::new(kind, self.context_path(field), bit_offset)
    }

    /// Add a leaf to the trace tree, if tracing.
    pub fn record(&mut self, name: &str, value: impl FnOnce() -> Value) {
        if let Some(trace) = self.trace.as_mut() {
            trace.leaf(name, value());
        }
    }

    pub fn take_trace(&mut self) -> Vec<Node> {
        self.trace.take().map(TraceBuilder::finish).unwrap_or_default()
    }

    fn ensure_available(&self, name: &str, bits: usize) -> Result<(), CodecError> {
        let available = self.remaining_bits();
        if bits > available {
            return Err(self.error_at(name, self.pos, ErrorKind::UnexpectedEndOfInput { needed: bits, available }));
        }
        Ok(())
    }

    /// Read an unsigned value of `bits` width without recording it in the trace.
    pub fn read_bits_raw(&mut self, name: &str, bits: u8) -> Result<u64, CodecError> {
        let width = check_width(bits).map_err(|kind| self.error_at(name, self.pos, kind))?;
        self.ensure_available(name, width)?;
        let value = if width % 8 == 0 {
            let len = width / 8;
            if self.is_aligned() {
                let start = self.pos / 8;
                let chunk = &self.data[start..start + len];
                match self.byte_order {
                    ByteOrder::BigEndian => BigEndian::read_uint(chunk, len),
                    ByteOrder::LittleEndian => LittleEndian::read_uint(chunk, len),
                }
            } else {
                let mut value = 0u64;
                for i in 0..len {
                    let byte = msb_bits(self.data, self.pos + i * 8, 8);
                    value = match self.byte_order {
                        ByteOrder::BigEndian => (value << 8) | byte,
                        ByteOrder::LittleEndian => value | (byte << (8 * i)),
                    };
                }
                value
            }
        } else {
            msb_bits(self.data, self.pos, width)
        };
        self.pos += width;
        Ok(value)
    }

    pub fn read_uint(&mut self, name: &str, bits: u8) -> Result<u64, CodecError> {
        let value = self.read_bits_raw(name, bits)?;
        self.record(name, || Value::UInt(value));
        Ok(value)
    }

    /// Two's complement signed read.
    pub fn read_int(&mut self, name: &str, bits: u8) -> Result<i64, CodecError> {
        let raw = self.read_bits_raw(name, bits)?;
        let shift = 64 - u32::from(bits);
        let value = ((raw << shift) as i64) >> shift;
        self.record(name, || Value::Int(value));
        Ok(value)
    }

    pub fn read_bit(&mut self, name: &str) -> Result<bool, CodecError> {
        let value = self.read_bits_raw(name, 1)? == 1;
        self.record(name, || Value::Bit(value));
        Ok(value)
    }

    pub fn read_u8(&mut self, name: &str) -> Result<u8, CodecError> {
        self.read_uint(name, 8).map(|v| v as u8)
    }

    pub fn read_u16(&mut self, name: &str) -> Result<u16, CodecError> {
        self.read_uint(name, 16).map(|v| v as u16)
    }

    pub fn read_u32(&mut self, name: &str) -> Result<u32, CodecError> {
        self.read_uint(name, 32).map(|v| v as u32)
    }

    pub fn read_u64(&mut self, name: &str) -> Result<u64, CodecError> {
        self.read_uint(name, 64)
    }

    pub fn read_i16(&mut self, name: &str) -> Result<i16, CodecError> {
        self.read_int(name, 16).map(|v| v as i16)
    }

    /// IEEE 754 single precision in the buffer's byte order.
    pub fn read_f32(&mut self, name: &str) -> Result<f32, CodecError> {
        let value = f32::from_bits(self.read_bits_raw(name, 32)? as u32);
        self.record(name, || Value::Float(f64::from(value)));
        Ok(value)
    }

    pub fn read_f64(&mut self, name: &str) -> Result<f64, CodecError> {
        let value = f64::from_bits(self.read_bits_raw(name, 64)?);
        self.record(name, || Value::Float(value));
        Ok(value)
    }

    fn take_bytes(&mut self, name: &str, count: usize) -> Result<Vec<u8>, CodecError> {
        self.ensure_available(name, count.saturating_mul(8))?;
        let bytes = if self.is_aligned() {
            let start = self.pos / 8;
            self.data[start..start + count].to_vec()
        } else {
            (0..count).map(|i| msb_bits(self.data, self.pos + i * 8, 8) as u8).collect()
        };
        self.pos += count * 8;
        Ok(bytes)
    }

    /// Read `count` raw bytes. Byte order does not apply.
    pub fn read_bytes(&mut self, name: &str, count: usize) -> Result<Vec<u8>, CodecError> {
        let bytes = self.take_bytes(name, count)?;
        self.record(name, || Value::Bytes(bytes.clone()));
        Ok(bytes)
    }

    /// Fixed-width string of `bits` (a multiple of 8). Trailing NULs are trimmed.
    pub fn read_string(&mut self, name: &str, bits: usize, encoding: StringEncoding) -> Result<String, CodecError> {
        let start = self.pos;
        let unit = if encoding == StringEncoding::Utf16 { 16 } else { 8 };
        if bits % unit != 0 {
            return Err(self.error_at(name, start, ErrorKind::InvalidBitWidth { bits }));
        }
        let bytes = self.take_bytes(name, bits / 8)?;
        let decoded = match encoding {
            StringEncoding::Ascii if bytes.is_ascii() => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            StringEncoding::Ascii => Err("non-ASCII byte".to_string()),
            StringEncoding::Utf8 => String::from_utf8(bytes).map_err(|e| e.to_string()),
            StringEncoding::Utf16 => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match self.byte_order {
                        ByteOrder::BigEndian => BigEndian::read_u16(pair),
                        ByteOrder::LittleEndian => LittleEndian::read_u16(pair),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|e| e.to_string())
            }
        };
        let text = decoded
            .map(|s: String| s.trim_end_matches('\0').to_string())
            .map_err(|reason| self.error_at(name, start, ErrorKind::MalformedString { reason }))?;
        self.record(name, || Value::Str(text.clone()));
        Ok(text)
    }
}

/// Growable output buffer with a bit cursor.
pub struct WriteBuffer {
    data: Vec<u8>,
    pos: usize,
    byte_order: ByteOrder,
    contexts: Vec<&'static str>,
    trace: Option<TraceBuilder>,
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            pos: 0,
            byte_order: ByteOrder::BigEndian,
            contexts: Vec::new(),
            trace: None,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_trace(mut self) -> Self {
        self.trace = Some(TraceBuilder::default());
        self
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// Bytes written so far. A partially written final byte is zero-filled.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Bytes between `start_bit` and the cursor. Both ends must be byte-aligned.
    pub fn bytes_since(&self, start_bit: usize) -> Option<&[u8]> {
        if start_bit % 8 != 0 || !self.is_aligned() || start_bit > self.pos {
            return None;
        }
        self.data.get(start_bit / 8..self.pos / 8)
    }

    pub fn push_context(&mut self, name: &'static str) {
        self.contexts.push(name);
        if let Some(trace) = self.trace.as_mut() {
            trace.open(name);
        }
    }

    pub fn pop_context(&mut self, name: &'static str) {
        let popped = self.contexts.pop();
        if popped != Some(name) {
            tracing::warn!(expected = name, popped = ?popped, "unbalanced write context");
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.close();
        }
    }

    pub fn in_context<T>(
        &mut self,
        name: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        self.push_context(name);
        let result = f(self);
        self.pop_context(name);
        result
    }

    pub fn context_path(&self, field: &str) -> String {
        join_path(&self.contexts, field)
    }

    pub fn error_at(&self, field: &str, bit_offset: usize, kind: ErrorKind) -> CodecError {
        CodecError::new(kind, self.context_path(field), bit_offset)
    }

    pub fn record(&mut self, name: &str, value: impl FnOnce() -> Value) {
        if let Some(trace) = self.trace.as_mut() {
            trace.leaf(name, value());
        }
    }

    pub fn take_trace(&mut self) -> Vec<Node> {
        self.trace.take().map(TraceBuilder::finish).unwrap_or_default()
    }

    fn grow_to(&mut self, end_bit: usize) {
        let needed = (end_bit + 7) / 8;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
    }

    /// Write `value` in `bits` without tracing. Values that do not fit fail with
    /// [`ErrorKind::FieldOverflow`].
    pub fn write_bits_raw(&mut self, name: &str, bits: u8, value: u64) -> Result<(), CodecError> {
        let width = check_width(bits).map_err(|kind| self.error_at(name, self.pos, kind))?;
        if width < 64 && value >> width != 0 {
            return Err(self.error_at(name, self.pos, ErrorKind::FieldOverflow { bits: width, value: i128::from(value) }));
        }
        self.grow_to(self.pos + width);
        if width % 8 == 0 {
            let len = width / 8;
            if self.is_aligned() {
                let start = self.pos / 8;
                let chunk = &mut self.data[start..start + len];
                match self.byte_order {
                    ByteOrder::BigEndian => BigEndian::write_uint(chunk, value, len),
                    ByteOrder::LittleEndian => LittleEndian::write_uint(chunk, value, len),
                }
            } else {
                for i in 0..len {
                    let byte = match self.byte_order {
                        ByteOrder::BigEndian => (value >> (8 * (len - 1 - i))) & 0xFF,
                        ByteOrder::LittleEndian => (value >> (8 * i)) & 0xFF,
                    };
                    put_msb_bits(&mut self.data, self.pos + i * 8, 8, byte);
                }
            }
        } else {
            put_msb_bits(&mut self.data, self.pos, width, value);
        }
        self.pos += width;
        Ok(())
    }

    pub fn write_uint(&mut self, name: &str, bits: u8, value: u64) -> Result<(), CodecError> {
        self.write_bits_raw(name, bits, value)?;
        self.record(name, || Value::UInt(value));
        Ok(())
    }

    /// Two's complement signed write; values outside the signed range of `bits` fail.
    pub fn write_int(&mut self, name: &str, bits: u8, value: i64) -> Result<(), CodecError> {
        let width = check_width(bits).map_err(|kind| self.error_at(name, self.pos, kind))?;
        let min = -(1i128 << (width - 1));
        let max = (1i128 << (width - 1)) - 1;
        let wide = i128::from(value);
        if wide < min || wide > max {
            return Err(self.error_at(name, self.pos, ErrorKind::FieldOverflow { bits: width, value: wide }));
        }
        let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        self.write_bits_raw(name, bits, (value as u64) & mask)?;
        self.record(name, || Value::Int(value));
        Ok(())
    }

    pub fn write_bit(&mut self, name: &str, value: bool) -> Result<(), CodecError> {
        self.write_bits_raw(name, 1, u64::from(value))?;
        self.record(name, || Value::Bit(value));
        Ok(())
    }

    pub fn write_u8(&mut self, name: &str, value: u8) -> Result<(), CodecError> {
        self.write_uint(name, 8, u64::from(value))
    }

    pub fn write_u16(&mut self, name: &str, value: u16) -> Result<(), CodecError> {
        self.write_uint(name, 16, u64::from(value))
    }

    pub fn write_u32(&mut self, name: &str, value: u32) -> Result<(), CodecError> {
        self.write_uint(name, 32, u64::from(value))
    }

    pub fn write_u64(&mut self, name: &str, value: u64) -> Result<(), CodecError> {
        self.write_uint(name, 64, value)
    }

    pub fn write_i16(&mut self, name: &str, value: i16) -> Result<(), CodecError> {
        self.write_int(name, 16, i64::from(value))
    }

    pub fn write_f32(&mut self, name: &str, value: f32) -> Result<(), CodecError> {
        self.write_bits_raw(name, 32, u64::from(value.to_bits()))?;
        self.record(name, || Value::Float(f64::from(value)));
        Ok(())
    }

    pub fn write_f64(&mut self, name: &str, value: f64) -> Result<(), CodecError> {
        self.write_bits_raw(name, 64, value.to_bits())?;
        self.record(name, || Value::Float(value));
        Ok(())
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.grow_to(self.pos + bytes.len() * 8);
        if self.is_aligned() {
            let start = self.pos / 8;
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
        } else {
            for (i, &b) in bytes.iter().enumerate() {
                put_msb_bits(&mut self.data, self.pos + i * 8, 8, u64::from(b));
            }
        }
        self.pos += bytes.len() * 8;
    }

    pub fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), CodecError> {
        self.put_bytes(bytes);
        self.record(name, || Value::Bytes(bytes.to_vec()));
        Ok(())
    }

    /// Fixed-width string of `bits`; shorter text is NUL-padded, longer text overflows.
    pub fn write_string(
        &mut self,
        name: &str,
        bits: usize,
        encoding: StringEncoding,
        text: &str,
    ) -> Result<(), CodecError> {
        let start = self.pos;
        let unit = if encoding == StringEncoding::Utf16 { 16 } else { 8 };
        if bits % unit != 0 {
            return Err(self.error_at(name, start, ErrorKind::InvalidBitWidth { bits }));
        }
        let mut encoded = match encoding {
            StringEncoding::Ascii if !text.is_ascii() => {
                return Err(self.error_at(name, start, ErrorKind::MalformedString { reason: "non-ASCII character".into() }))
            }
            StringEncoding::Ascii | StringEncoding::Utf8 => text.as_bytes().to_vec(),
            StringEncoding::Utf16 => {
                let mut out = Vec::with_capacity(text.len() * 2);
                for unit in text.encode_utf16() {
                    let mut pair = [0u8; 2];
                    match self.byte_order {
                        ByteOrder::BigEndian => BigEndian::write_u16(&mut pair, unit),
                        ByteOrder::LittleEndian => LittleEndian::write_u16(&mut pair, unit),
                    }
                    out.extend_from_slice(&pair);
                }
                out
            }
        };
        let width = bits / 8;
        if encoded.len() > width {
            return Err(self.error_at(
                name,
                start,
                ErrorKind::FieldOverflow { bits, value: encoded.len() as i128 * 8 },
            ));
        }
        encoded.resize(width, 0);
        self.put_bytes(&encoded);
        self.record(name, || Value::Str(text.to_string()));
        Ok(())
    }
}
