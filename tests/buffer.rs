//! Bit buffer tests: MSB-first sub-byte fields, byte order, overflow, strings,
//! truncation, context paths and trace recording.

use fieldbus_codec::dump::render;
use fieldbus_codec::field::{read_padding, read_reserved, write_padding, write_reserved};
use fieldbus_codec::{
    ByteOrder, CollectingSink, Diagnostic, ErrorKind, Node, ReadBuffer, StringEncoding, Value, WriteBuffer,
};

#[test]
fn test_sub_byte_fields_are_msb_first() {
    let data = [0b1010_0110];
    let mut rb = ReadBuffer::new(&data);
    assert!(rb.read_bit("a").expect("bit"));
    assert_eq!(rb.read_uint("b", 3).expect("b"), 0b010);
    assert_eq!(rb.read_uint("c", 4).expect("c"), 0b0110);
    assert_eq!(rb.remaining_bits(), 0);
}

#[test]
fn test_byte_order_applies_to_whole_bytes() {
    let data = [0x12, 0x34, 0x56, 0x78];
    let mut be = ReadBuffer::new(&data);
    assert_eq!(be.read_u16("x").expect("u16"), 0x1234);
    assert_eq!(be.read_uint("y", 16).expect("u16"), 0x5678);

    let mut le = ReadBuffer::new(&data).with_byte_order(ByteOrder::LittleEndian);
    assert_eq!(le.read_u32("x").expect("u32"), 0x7856_3412);
}

#[test]
fn test_unaligned_multi_byte_read() {
    let data = [0xA1, 0x23, 0x40];
    let mut be = ReadBuffer::new(&data);
    assert_eq!(be.read_uint("nibble", 4).expect("nibble"), 0xA);
    assert_eq!(be.read_u16("word").expect("word"), 0x1234);

    let mut le = ReadBuffer::new(&data).with_byte_order(ByteOrder::LittleEndian);
    le.read_uint("nibble", 4).expect("nibble");
    assert_eq!(le.read_u16("word").expect("word"), 0x3412);
}

#[test]
fn test_signed_reads_sign_extend() {
    let data = [0xFF, 0xFE, 0xF0];
    let mut rb = ReadBuffer::new(&data);
    assert_eq!(rb.read_i16("x").expect("i16"), -2);
    assert_eq!(rb.read_int("y", 4).expect("i4"), -1);
    assert_eq!(rb.read_int("z", 4).expect("i4"), 0);
}

#[test]
fn test_truncated_read_reports_needed_and_available() {
    let data = [0x01];
    let mut rb = ReadBuffer::new(&data);
    let err = rb.read_u16("length").expect_err("truncated");
    assert_eq!(err.kind, ErrorKind::UnexpectedEndOfInput { needed: 16, available: 8 });
    assert_eq!(err.path, "length");
    assert_eq!(err.bit_offset, 0);
    assert_eq!(rb.position(), 0);
}

#[test]
fn test_invalid_bit_width() {
    let data = [0u8; 16];
    let mut rb = ReadBuffer::new(&data);
    assert_eq!(rb.read_uint("x", 0).expect_err("zero").kind, ErrorKind::InvalidBitWidth { bits: 0 });
    assert_eq!(rb.read_uint("x", 65).expect_err("wide").kind, ErrorKind::InvalidBitWidth { bits: 65 });
}

#[test]
fn test_context_path_in_errors() {
    let mut rb = ReadBuffer::new(&[]);
    let err = rb
        .in_context("Outer", |rb| rb.in_context("Inner", |rb| rb.read_u8("field")))
        .expect_err("empty input");
    assert_eq!(err.path, "Outer/Inner/field");
    assert_eq!(err.to_string(), "Outer/Inner/field (bit 0): unexpected end of input: needed 8 bits, 0 available");
}

#[test]
fn test_write_packs_bits_and_bytes() {
    let mut wb = WriteBuffer::new();
    wb.write_bit("errorFlag", true).expect("bit");
    wb.write_uint("functionFlag", 7, 0x03).expect("7 bits");
    wb.write_u16("address", 0x0102).expect("u16");
    assert_eq!(wb.into_bytes(), vec![0x83, 0x01, 0x02]);
}

#[test]
fn test_little_endian_write() {
    let mut wb = WriteBuffer::new().with_byte_order(ByteOrder::LittleEndian);
    wb.write_u32("x", 0x0102_0304).expect("u32");
    wb.write_i16("y", -2).expect("i16");
    assert_eq!(wb.into_bytes(), vec![0x04, 0x03, 0x02, 0x01, 0xFE, 0xFF]);
}

#[test]
fn test_unaligned_write_round_trips() {
    let mut wb = WriteBuffer::new();
    wb.write_uint("head", 3, 0b101).expect("head");
    wb.write_u16("word", 0xBEEF).expect("word");
    wb.write_uint("tail", 5, 0b10011).expect("tail");
    let bytes = wb.into_bytes();
    assert_eq!(bytes.len(), 3);

    let mut rb = ReadBuffer::new(&bytes);
    assert_eq!(rb.read_uint("head", 3).expect("head"), 0b101);
    assert_eq!(rb.read_u16("word").expect("word"), 0xBEEF);
    assert_eq!(rb.read_uint("tail", 5).expect("tail"), 0b10011);
}

#[test]
fn test_floats_follow_byte_order() {
    let mut be = WriteBuffer::new();
    be.write_f32("real", 1.5).expect("f32");
    be.write_f64("lreal", -2.25).expect("f64");
    let bytes = be.into_bytes();
    assert_eq!(bytes, vec![0x3F, 0xC0, 0x00, 0x00, 0xC0, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let mut rb = ReadBuffer::new(&bytes).with_trace();
    assert_eq!(rb.read_f32("real").expect("f32"), 1.5);
    assert_eq!(rb.read_f64("lreal").expect("f64"), -2.25);
    assert_eq!(
        rb.take_trace(),
        vec![
            Node::Leaf { name: "real".into(), value: Value::Float(1.5) },
            Node::Leaf { name: "lreal".into(), value: Value::Float(-2.25) },
        ]
    );

    let mut le = WriteBuffer::new().with_byte_order(ByteOrder::LittleEndian);
    le.write_f32("real", 1.5).expect("f32");
    le.write_f64("lreal", -2.25).expect("f64");
    let bytes = le.into_bytes();
    assert_eq!(bytes, vec![0x00, 0x00, 0xC0, 0x3F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0xC0]);

    let mut rb = ReadBuffer::new(&bytes).with_byte_order(ByteOrder::LittleEndian);
    assert_eq!(rb.read_f32("real").expect("f32"), 1.5);
    assert_eq!(rb.read_f64("lreal").expect("f64"), -2.25);
}

#[test]
fn test_truncated_float() {
    let data = [0x3F, 0xC0, 0x00];
    let mut rb = ReadBuffer::new(&data);
    let err = rb.read_f32("real").expect_err("three bytes");
    assert_eq!(err.kind, ErrorKind::UnexpectedEndOfInput { needed: 32, available: 24 });
}

#[test]
fn test_trailing_padding_stops_at_end_of_input() {
    let data = [0x07];
    let mut rb = ReadBuffer::new(&data).with_trace();
    rb.read_u8("value").expect("value");
    assert_eq!(read_padding(&mut rb, "padding", 1).expect("nothing left"), 0);
    assert_eq!(rb.position(), 8);

    let data = [0x07, 0x00];
    let mut short = ReadBuffer::new(&data).with_trace();
    short.read_u8("value").expect("value");
    assert_eq!(read_padding(&mut short, "padding", 2).expect("one of two"), 1);
    assert_eq!(short.position(), 16);
    assert_eq!(short.remaining_bits(), 0);

    assert_eq!(rb.take_trace()[1], Node::Leaf { name: "padding".into(), value: Value::Padding(0) });
    assert_eq!(short.take_trace()[1], Node::Leaf { name: "padding".into(), value: Value::Padding(1) });

    let mut wb = WriteBuffer::new();
    write_padding(&mut wb, "padding", 2).expect("write");
    assert_eq!(wb.into_bytes(), vec![0x00, 0x00]);
}

#[test]
fn test_unsigned_overflow_fails() {
    let mut wb = WriteBuffer::new();
    let err = wb.write_uint("tpduRef", 7, 0x80).expect_err("overflow");
    assert_eq!(err.kind, ErrorKind::FieldOverflow { bits: 7, value: 0x80 });
    assert_eq!(wb.position(), 0);
}

#[test]
fn test_signed_overflow_fails() {
    let mut wb = WriteBuffer::new();
    wb.write_int("x", 4, -8).expect("min fits");
    wb.write_int("y", 4, 7).expect("max fits");
    assert_eq!(wb.data(), &[0x87]);
    let err = wb.write_int("z", 4, 8).expect_err("overflow");
    assert_eq!(err.kind, ErrorKind::FieldOverflow { bits: 4, value: 8 });
}

#[test]
fn test_ascii_string_is_nul_padded_and_trimmed() {
    let mut wb = WriteBuffer::new();
    wb.write_string("name", 32, StringEncoding::Ascii, "ab").expect("write");
    let bytes = wb.into_bytes();
    assert_eq!(bytes, b"ab\0\0".to_vec());

    let mut rb = ReadBuffer::new(&bytes);
    assert_eq!(rb.read_string("name", 32, StringEncoding::Ascii).expect("read"), "ab");
}

#[test]
fn test_string_too_long_overflows() {
    let mut wb = WriteBuffer::new();
    let err = wb.write_string("name", 16, StringEncoding::Utf8, "abc").expect_err("too long");
    assert!(matches!(err.kind, ErrorKind::FieldOverflow { bits: 16, .. }));
}

#[test]
fn test_utf16_follows_byte_order() {
    let mut be = WriteBuffer::new();
    be.write_string("s", 32, StringEncoding::Utf16, "A").expect("be");
    assert_eq!(be.into_bytes(), vec![0x00, 0x41, 0x00, 0x00]);

    let mut le = WriteBuffer::new().with_byte_order(ByteOrder::LittleEndian);
    le.write_string("s", 32, StringEncoding::Utf16, "A").expect("le");
    let bytes = le.into_bytes();
    assert_eq!(bytes, vec![0x41, 0x00, 0x00, 0x00]);

    let mut rb = ReadBuffer::new(&bytes).with_byte_order(ByteOrder::LittleEndian);
    assert_eq!(rb.read_string("s", 32, StringEncoding::Utf16).expect("read"), "A");
}

#[test]
fn test_malformed_string() {
    let data = [0xFF, 0x00];
    let mut rb = ReadBuffer::new(&data);
    let err = rb.read_string("s", 16, StringEncoding::Ascii).expect_err("non-ascii");
    assert!(matches!(err.kind, ErrorKind::MalformedString { .. }));
    assert_eq!(err.bit_offset, 0);
}

#[test]
fn test_peek_and_bytes_since() {
    let data = [0x01, 0x02, 0x03];
    let mut rb = ReadBuffer::new(&data);
    assert_eq!(rb.peek_byte(2), Some(0x03));
    assert_eq!(rb.peek_byte(3), None);
    rb.read_u16("x").expect("read");
    assert_eq!(rb.bytes_since(0), Some(&data[..2]));
    rb.read_bit("b").expect("bit");
    assert_eq!(rb.peek_byte(0), None);
    assert_eq!(rb.bytes_since(0), None);
}

#[test]
fn test_reserved_mismatch_goes_to_sink() {
    let sink = CollectingSink::new();
    let data = [0x00, 0x05];
    let mut rb = ReadBuffer::new(&data).with_sink(&sink);
    rb.in_context("Header", |rb| {
        read_reserved(rb, "spare", 8, 0x00)?;
        read_reserved(rb, "flags", 8, 0x00)
    })
    .expect("reserved never fails");
    assert_eq!(
        sink.events(),
        vec![Diagnostic::ReservedMismatch { path: "Header/flags".into(), bit_offset: 8, expected: 0, actual: 5 }]
    );

    let mut wb = WriteBuffer::new();
    write_reserved(&mut wb, "flags", 8, 0x00).expect("write");
    assert_eq!(wb.into_bytes(), vec![0x00]);
}

#[test]
fn test_trace_tree_and_render() {
    let data = [0x01, 0x80];
    let mut rb = ReadBuffer::new(&data).with_trace();
    rb.in_context("M", |rb| {
        rb.read_u8("a")?;
        rb.read_bit("b")
    })
    .expect("parse");
    let tree = rb.take_trace();
    assert_eq!(
        tree,
        vec![Node::Group {
            name: "M".into(),
            children: vec![
                Node::Leaf { name: "a".into(), value: Value::UInt(1) },
                Node::Leaf { name: "b".into(), value: Value::Bit(true) },
            ],
        }]
    );
    assert_eq!(render(&tree[0]), "M {\n  a: 0x1;\n  b: true;\n}\n");
    assert_eq!(tree[0].find("b").and_then(Node::value), Some(&Value::Bit(true)));
}

#[test]
fn test_trace_closes_groups_after_error() {
    let data = [0x01];
    let mut rb = ReadBuffer::new(&data).with_trace();
    rb.in_context("M", |rb| {
        rb.read_u8("a")?;
        rb.read_u8("b")
    })
    .expect_err("truncated");
    let tree = rb.take_trace();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].children().len(), 1);
}
