//! Benchmark: parse, serialize and frame-split Modbus TCP and S7 (TPKT) traffic
//! built in memory. One S7 read-var request and one Modbus read-holding-registers
//! request are repeated to form a byte stream of back-to-back frames.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fieldbus_codec::protocols::modbus::{AddressQuantity, ModbusPdu, ModbusTcpAdu};
use fieldbus_codec::protocols::s7::{
    CotpData, CotpPacket, CotpParameter, CotpTpdu, CotpTpduSize, MemoryArea, S7Address, S7AddressAny, S7Message,
    S7MessageKind, S7Parameter, TpktPacket, TransportSize, VarRequestParameterItem,
};
use fieldbus_codec::{decode_frames, Codec};

fn modbus_request(transaction: u16) -> ModbusTcpAdu {
    ModbusTcpAdu {
        transaction_identifier: transaction,
        unit_identifier: 1,
        pdu: ModbusPdu::ReadHoldingRegistersRequest(AddressQuantity { starting_address: 0x0010, quantity: 8 }),
    }
}

fn s7_read_request(items: usize) -> TpktPacket {
    let item = VarRequestParameterItem::Address(S7Address::Any(S7AddressAny {
        transport_size: TransportSize::Byte,
        number_of_elements: 4,
        db_number: 1,
        area: MemoryArea::DataBlocks,
        byte_address: 0,
        bit_address: 0,
    }));
    TpktPacket {
        payload: CotpPacket {
            tpdu: CotpTpdu::Data(CotpData { eot: true, tpdu_ref: 0 }),
            parameters: vec![CotpParameter::TpduSize(CotpTpduSize::Size1024)],
            payload: Some(S7Message {
                tpdu_reference: 1,
                kind: S7MessageKind::Request,
                parameter: Some(S7Parameter::ReadVarRequest(vec![item; items])),
                payload: None,
            }),
        },
    }
}

fn bench_roundtrip(c: &mut Criterion) {
    let codec = Codec::default();

    let modbus = codec.serialize(&modbus_request(1)).expect("serialize modbus");
    let s7 = codec.serialize(&s7_read_request(8)).expect("serialize s7");
    let modbus_stream: Vec<u8> = (0..256u16)
        .flat_map(|t| codec.serialize(&modbus_request(t)).expect("serialize modbus"))
        .collect();
    let s7_stream: Vec<u8> = std::iter::repeat(s7.clone()).take(256).flatten().collect();

    c.bench_function("parse_modbus_tcp", |b| {
        b.iter(|| codec.parse::<ModbusTcpAdu>(black_box(&modbus), false).expect("parse"))
    });

    c.bench_function("parse_s7_read_var_request", |b| {
        b.iter(|| codec.parse::<TpktPacket>(black_box(&s7), ()).expect("parse"))
    });

    c.bench_function("parse_serialize_s7_read_var_request", |b| {
        b.iter(|| {
            let packet = codec.parse::<TpktPacket>(black_box(&s7), ()).expect("parse");
            black_box(codec.serialize(&packet).expect("serialize"))
        })
    });

    c.bench_function("parse_traced_s7_read_var_request", |b| {
        b.iter(|| codec.parse_traced::<TpktPacket>(black_box(&s7), ()).expect("parse"))
    });

    c.bench_function("decode_frames_modbus_tcp_256", |b| {
        b.iter(|| {
            let result = decode_frames::<ModbusTcpAdu>(&codec, black_box(&modbus_stream), false);
            black_box(result.messages.len())
        })
    });

    c.bench_function("decode_frames_tpkt_256", |b| {
        b.iter(|| {
            let result = decode_frames::<TpktPacket>(&codec, black_box(&s7_stream), ());
            black_box(result.messages.len())
        })
    });
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
