//! S7 stack tests: TPKT / COTP nesting, S7 parameter and payload dispatch,
//! last-element padding, cross-object consistency and reserved tolerance.

use fieldbus_codec::protocols::s7::{
    CotpConnection, CotpData, CotpPacket, CotpParameter, CotpProtocolClass, CotpTpdu, CotpTpduSize, CpuFunctions,
    DataTransportErrorCode, DataTransportSize, MemoryArea, ParameterUserDataItem, PayloadUserDataItem, S7Address,
    S7AddressAny, S7Error, S7Message, S7MessageKind, S7Parameter, S7Payload, SetupCommunication, TpktPacket,
    TransportSize, VarPayloadDataItem, VarPayloadStatusItem, VarRequestParameterItem,
};
use fieldbus_codec::{decode_frames, Codec, CollectingSink, Diagnostic, ErrorKind, Key, Node, Value};

fn hex(s: &str) -> Vec<u8> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits).expect("valid hex")
}

const DATA_EMPTY: &str = "03 00 00 07 02 F0 80";
const CONNECTION_REQUEST: &str = "03 00 00 16 11 E0 00 00 00 01 00 C0 01 0A C1 02 01 00 C2 02 01 02";
const SETUP_COMMUNICATION: &str = "03 00 00 19 02 F0 80 32 01 00 00 00 00 00 08 00 00 F0 00 00 01 00 01 01 E0";
const READ_VAR_REQUEST: &str = "03 00 00 2B 02 F0 80 32 01 00 00 00 01 00 1A 00 00 04 02 \
                                12 0A 10 02 00 04 00 01 84 00 00 00 12 0A 10 02 00 02 00 01 84 00 00 10";
const WRITE_VAR_REQUEST: &str = "03 00 00 36 02 F0 80 32 01 00 00 00 02 00 1A 00 0B 05 02 \
                                 12 0A 10 02 00 01 00 01 84 00 00 00 12 0A 10 02 00 01 00 01 84 00 00 08 \
                                 00 04 00 08 11 00 00 04 00 08 22";

const READ_VAR_RESPONSE: &str = "32 03 00 00 00 01 00 02 00 0D 00 00 04 02 FF 04 00 18 01 02 03 00 FF 04 00 08 0A";
const WRITE_VAR_RESPONSE: &str = "32 03 00 00 00 02 00 02 00 02 00 00 05 02 FF 0A";
const READ_BIT_RESPONSE: &str = "32 03 00 00 00 01 00 02 00 05 00 00 04 01 FF 03 00 01 01";
const USER_DATA_REQUEST: &str = "32 07 00 00 00 03 00 08 00 08 00 01 12 04 11 44 01 00 FF 09 00 04 00 1C 00 00";
const USER_DATA_RESPONSE: &str = "32 07 00 00 00 04 00 0C 00 00 00 01 12 08 12 84 01 01 00 00 00 00";

fn any_address(number_of_elements: u16, byte_address: u16) -> VarRequestParameterItem {
    VarRequestParameterItem::Address(S7Address::Any(S7AddressAny {
        transport_size: TransportSize::Byte,
        number_of_elements,
        db_number: 1,
        area: MemoryArea::DataBlocks,
        byte_address,
        bit_address: 0,
    }))
}

fn data_item(data: &[u8]) -> VarPayloadDataItem {
    VarPayloadDataItem {
        return_code: DataTransportErrorCode::Reserved,
        transport_size: DataTransportSize::ByteWordDword,
        data: data.to_vec(),
    }
}

fn over_data_tpdu(message: S7Message) -> TpktPacket {
    TpktPacket {
        payload: CotpPacket {
            tpdu: CotpTpdu::Data(CotpData { eot: true, tpdu_ref: 0 }),
            parameters: Vec::new(),
            payload: Some(message),
        },
    }
}

fn child<'a>(node: &'a Node, name: &str) -> &'a Node {
    node.find(name).unwrap_or_else(|| panic!("missing {} under {}", name, node.name()))
}

#[test]
fn test_tpkt_cotp_data_round_trip() {
    let codec = Codec::default();
    let bytes = hex(DATA_EMPTY);
    let packet = codec.parse::<TpktPacket>(&bytes, ()).expect("parse");
    assert_eq!(packet.payload.tpdu, CotpTpdu::Data(CotpData { eot: true, tpdu_ref: 0 }));
    assert!(packet.payload.parameters.is_empty());
    assert!(packet.payload.payload.is_none());
    assert_eq!(codec.serialize(&packet).expect("serialize"), bytes);
}

#[test]
fn test_connection_request_parameters() {
    let codec = Codec::default();
    let bytes = hex(CONNECTION_REQUEST);
    let packet = codec.parse::<TpktPacket>(&bytes, ()).expect("parse");
    assert_eq!(
        packet.payload.tpdu,
        CotpTpdu::ConnectionRequest(CotpConnection {
            destination_reference: 0,
            source_reference: 1,
            protocol_class: CotpProtocolClass::Class0,
        })
    );
    assert_eq!(
        packet.payload.parameters,
        vec![
            CotpParameter::TpduSize(CotpTpduSize::Size1024),
            CotpParameter::CallingTsap(0x0100),
            CotpParameter::CalledTsap(0x0102),
        ]
    );
    assert_eq!(codec.serialize(&packet).expect("serialize"), bytes);
}

#[test]
fn test_setup_communication() {
    let codec = Codec::default();
    let bytes = hex(SETUP_COMMUNICATION);
    let packet = codec.parse::<TpktPacket>(&bytes, ()).expect("parse");
    let message = packet.payload.payload.as_ref().expect("s7 payload");
    assert_eq!(message.kind, S7MessageKind::Request);
    assert_eq!(
        message.parameter,
        Some(S7Parameter::SetupCommunication(SetupCommunication {
            max_amq_caller: 1,
            max_amq_callee: 1,
            pdu_length: 480,
        }))
    );
    assert_eq!(codec.serialize(&packet).expect("serialize"), bytes);
}

#[test]
fn test_read_var_request_counts_items() {
    let codec = Codec::default();
    let bytes = hex(READ_VAR_REQUEST);
    let traced = codec.parse_traced::<TpktPacket>(&bytes, ()).expect("parse");
    assert_eq!(traced.consumed_bits, bytes.len() * 8);

    let message = traced.message.payload.payload.as_ref().expect("s7 payload");
    assert_eq!(message.parameter, Some(S7Parameter::ReadVarRequest(vec![any_address(4, 0), any_address(2, 2)])));

    let request = child(&traced.tree[0], "COTPPacket/S7Message/S7Parameter/S7ParameterReadVarRequest");
    assert_eq!(child(request, "numItems").value(), Some(&Value::UInt(2)));
    assert_eq!(child(request, "items").children().len(), 2);

    // numItems is not stored; the serializer derives it from the item list
    let rebuilt = over_data_tpdu(S7Message {
        tpdu_reference: 1,
        kind: S7MessageKind::Request,
        parameter: Some(S7Parameter::ReadVarRequest(vec![any_address(4, 0), any_address(2, 2)])),
        payload: None,
    });
    assert_eq!(codec.serialize(&rebuilt).expect("serialize"), bytes);
}

#[test]
fn test_write_var_request_pads_only_non_last_items() {
    let codec = Codec::default();
    let bytes = hex(WRITE_VAR_REQUEST);
    let traced = codec.parse_traced::<TpktPacket>(&bytes, ()).expect("parse");
    let message = traced.message.payload.payload.as_ref().expect("s7 payload");
    assert_eq!(message.payload, Some(S7Payload::WriteVarRequest(vec![data_item(&[0x11]), data_item(&[0x22])])));

    let items = child(&traced.tree[0], "COTPPacket/S7Message/S7Payload/S7PayloadWriteVarRequest/items");
    let paddings: Vec<Option<&Value>> =
        items.children().iter().map(|item| item.find("padding").and_then(Node::value)).collect();
    assert_eq!(paddings, vec![Some(&Value::Padding(1)), None]);

    let rebuilt = over_data_tpdu(S7Message {
        tpdu_reference: 2,
        kind: S7MessageKind::Request,
        parameter: Some(S7Parameter::WriteVarRequest(vec![any_address(1, 0), any_address(1, 1)])),
        payload: Some(S7Payload::WriteVarRequest(vec![data_item(&[0x11]), data_item(&[0x22])])),
    });
    assert_eq!(codec.serialize(&rebuilt).expect("serialize"), bytes);
}

#[test]
fn test_ack_data_responses() {
    let codec = Codec::default();

    let bytes = hex(READ_VAR_RESPONSE);
    let message = codec.parse::<S7Message>(&bytes, ()).expect("read var response");
    assert_eq!(message.kind, S7MessageKind::ResponseData(S7Error { error_class: 0, error_code: 0 }));
    let ok = |data: &[u8]| VarPayloadDataItem {
        return_code: DataTransportErrorCode::Ok,
        transport_size: DataTransportSize::ByteWordDword,
        data: data.to_vec(),
    };
    assert_eq!(message.payload, Some(S7Payload::ReadVarResponse(vec![ok(&[1, 2, 3]), ok(&[0x0A])])));
    assert_eq!(codec.serialize(&message).expect("serialize"), bytes);

    let bytes = hex(WRITE_VAR_RESPONSE);
    let message = codec.parse::<S7Message>(&bytes, ()).expect("write var response");
    assert_eq!(
        message.payload,
        Some(S7Payload::WriteVarResponse(vec![
            VarPayloadStatusItem { return_code: DataTransportErrorCode::Ok },
            VarPayloadStatusItem { return_code: DataTransportErrorCode::NotFound },
        ]))
    );
    assert_eq!(codec.serialize(&message).expect("serialize"), bytes);
}

#[test]
fn test_bit_sized_data_length() {
    let codec = Codec::default();
    let bytes = hex(READ_BIT_RESPONSE);
    let message = codec.parse::<S7Message>(&bytes, ()).expect("parse");
    let Some(S7Payload::ReadVarResponse(items)) = &message.payload else {
        panic!("expected read var response payload");
    };
    assert_eq!(items[0].transport_size, DataTransportSize::Bit);
    assert_eq!(items[0].data, vec![0x01]);
    assert_eq!(codec.serialize(&message).expect("serialize"), bytes);

    let too_wide = S7Message {
        payload: Some(S7Payload::ReadVarResponse(vec![VarPayloadDataItem {
            return_code: DataTransportErrorCode::Ok,
            transport_size: DataTransportSize::Bit,
            data: vec![1, 0],
        }])),
        ..message
    };
    let err = codec.serialize(&too_wide).expect_err("bit item with two bytes");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
}

#[test]
fn test_user_data() {
    let codec = Codec::default();
    let bytes = hex(USER_DATA_REQUEST);
    let message = codec.parse::<S7Message>(&bytes, ()).expect("request");
    assert_eq!(message.kind, S7MessageKind::UserData);
    assert_eq!(
        message.parameter,
        Some(S7Parameter::UserData(vec![ParameterUserDataItem::CpuFunctions(CpuFunctions {
            method: 0x11,
            cpu_function_type: 4,
            cpu_function_group: 4,
            cpu_subfunction: 1,
            sequence_number: 0,
            data_unit_reference_number: None,
            last_data_unit: None,
            error_code: None,
        })]))
    );
    assert_eq!(
        message.payload,
        Some(S7Payload::UserData(vec![PayloadUserDataItem {
            return_code: DataTransportErrorCode::Ok,
            transport_size: DataTransportSize::OctetString,
            data: vec![0x00, 0x1C, 0x00, 0x00],
        }]))
    );
    assert_eq!(codec.serialize(&message).expect("serialize"), bytes);

    let bytes = hex(USER_DATA_RESPONSE);
    let message = codec.parse::<S7Message>(&bytes, ()).expect("response");
    let Some(S7Parameter::UserData(items)) = &message.parameter else {
        panic!("expected user data parameter");
    };
    let ParameterUserDataItem::CpuFunctions(function) = items[0];
    assert_eq!(function.cpu_function_type, 8);
    assert_eq!(function.data_unit_reference_number, Some(0));
    assert_eq!(function.last_data_unit, Some(0));
    assert_eq!(function.error_code, Some(0));
    assert_eq!(codec.serialize(&message).expect("serialize"), bytes);
}

#[test]
fn test_cpu_function_response_fields_follow_type() {
    let codec = Codec::default();
    let response = codec.parse::<S7Message>(&hex(USER_DATA_RESPONSE), ()).expect("response");
    let Some(S7Parameter::UserData(items)) = &response.parameter else {
        panic!("expected user data parameter");
    };
    let ParameterUserDataItem::CpuFunctions(function) = items[0];

    let with_function = |function: CpuFunctions| S7Message {
        parameter: Some(S7Parameter::UserData(vec![ParameterUserDataItem::CpuFunctions(function)])),
        ..response.clone()
    };

    let bare_response = with_function(CpuFunctions {
        data_unit_reference_number: None,
        last_data_unit: None,
        error_code: None,
        ..function
    });
    let err = codec.serialize(&bare_response).expect_err("response without its trailing fields");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
    assert!(err.path.ends_with("S7ParameterUserDataItemCPUFunctions/cpuFunctionType"), "{}", err.path);

    let partial = with_function(CpuFunctions { error_code: None, ..function });
    assert!(matches!(codec.serialize(&partial).expect_err("partial").kind, ErrorKind::MalformedArrayBounds(_)));

    let request_with_error_code = with_function(CpuFunctions {
        cpu_function_type: 4,
        data_unit_reference_number: None,
        last_data_unit: None,
        error_code: Some(0),
        ..function
    });
    let err = codec.serialize(&request_with_error_code).expect_err("request with response fields");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));

    let request = with_function(CpuFunctions {
        cpu_function_type: 4,
        data_unit_reference_number: None,
        last_data_unit: None,
        error_code: None,
        ..function
    });
    let bytes = codec.serialize(&request).expect("request serializes");
    assert_eq!(codec.parse::<S7Message>(&bytes, ()).expect("reparse"), request);
}

#[test]
fn test_disconnect_information_parameter() {
    let codec = Codec::default();
    let bytes = hex("03 00 00 0C 07 F0 80 E0 03 01 02 03");
    let packet = codec.parse::<TpktPacket>(&bytes, ()).expect("parse");
    assert_eq!(packet.payload.parameters, vec![CotpParameter::DisconnectAdditionalInformation(vec![1, 2, 3])]);
    assert_eq!(codec.serialize(&packet).expect("serialize"), bytes);
}

#[test]
fn test_cotp_parameter_must_fill_its_length() {
    let codec = Codec::default();
    let err = codec.parse::<TpktPacket>(&hex("03 00 00 0B 06 F0 80 C0 02 0A 00"), ()).expect_err("tpdu size is 1 byte");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
    assert_eq!(err.path, "TPKTPacket/COTPPacket/parameters/COTPParameter/parameterLength");
}

#[test]
fn test_cotp_header_length_shorter_than_header() {
    let codec = Codec::default();
    let err = codec.parse::<TpktPacket>(&hex("03 00 00 07 00 F0 80"), ()).expect_err("header length 0");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
    assert_eq!(err.path, "TPKTPacket/COTPPacket/headerLength");
}

#[test]
fn test_tpkt_length_below_header() {
    let codec = Codec::default();
    let err = codec.parse::<TpktPacket>(&hex("03 00 00 02"), ()).expect_err("len 2");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
    assert_eq!(err.path, "TPKTPacket/len");
}

#[test]
fn test_data_length_must_be_reproducible() {
    let codec = Codec::default();
    // 12 bits of BYTE_WORD_DWORD data
    let err = codec
        .parse::<S7Message>(&hex("32 03 00 00 00 01 00 02 00 06 00 00 04 01 FF 04 00 0C AA BB"), ())
        .expect_err("partial byte");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
    assert!(err.path.ends_with("S7VarPayloadDataItem/dataLength"), "{}", err.path);
    assert_eq!(err.bit_offset, 16 * 8);

    // 3 bits of BIT data
    let err = codec
        .parse::<S7Message>(&hex("32 03 00 00 00 01 00 02 00 05 00 00 04 01 FF 03 00 03 01"), ())
        .expect_err("wide bit item");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));

    let bytes = hex("32 03 00 00 00 01 00 02 00 06 00 00 04 01 FF 04 00 10 AA BB");
    let message = codec.parse::<S7Message>(&bytes, ()).expect("16 bits");
    assert_eq!(codec.serialize(&message).expect("serialize"), bytes);
}

#[test]
fn test_unknown_tpdu_code() {
    let codec = Codec::default();
    let err = codec.parse::<TpktPacket>(&hex("03 00 00 07 02 F1 80"), ()).expect_err("0xF1");
    assert_eq!(err.kind, ErrorKind::UnknownVariant { envelope: "COTPPacket", key: Key::one(0xF1) });
    assert_eq!(err.path, "TPKTPacket/COTPPacket");
}

#[test]
fn test_payload_without_parameter() {
    let codec = Codec::default();
    let err = codec.parse::<S7Message>(&hex("32 01 00 00 00 01 00 00 00 01 FF"), ()).expect_err("no parameter");
    assert_eq!(err.kind, ErrorKind::UnknownVariant { envelope: "S7Payload", key: Key::one(0x01) });
}

#[test]
fn test_parameter_must_fill_declared_length() {
    let codec = Codec::default();
    let err = codec
        .parse::<S7Message>(&hex("32 01 00 00 00 00 00 09 00 00 F0 00 00 01 00 01 01 E0 00"), ())
        .expect_err("parameter is 8 bytes, declared 9");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
    assert_eq!(err.path, "S7Message/parameter");
}

#[test]
fn test_serialize_checks_parameter_against_message_type() {
    let codec = Codec::default();
    let message = S7Message {
        tpdu_reference: 0,
        kind: S7MessageKind::Request,
        parameter: Some(S7Parameter::ReadVarResponse { num_items: 1 }),
        payload: None,
    };
    let err = codec.serialize(&message).expect_err("ack-data parameter in a job");
    assert_eq!(err.kind, ErrorKind::UnknownVariant { envelope: "S7Parameter", key: Key::two(0x04, 0x01) });
}

#[test]
fn test_serialize_checks_payload_against_parameter() {
    let codec = Codec::default();
    let base = S7Message {
        tpdu_reference: 0,
        kind: S7MessageKind::Request,
        parameter: Some(S7Parameter::WriteVarRequest(vec![any_address(1, 0), any_address(1, 1)])),
        payload: Some(S7Payload::WriteVarRequest(vec![data_item(&[1])])),
    };
    let err = codec.serialize(&base).expect_err("one item for two addresses");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));

    let mismatched = S7Message { payload: Some(S7Payload::WriteVarResponse(Vec::new())), ..base.clone() };
    let err = codec.serialize(&mismatched).expect_err("payload for another parameter");
    assert_eq!(err.kind, ErrorKind::UnknownVariant { envelope: "S7Payload", key: Key::two(0x05, 0x01) });

    let orphan = S7Message { parameter: None, ..base };
    let err = codec.serialize(&orphan).expect_err("payload without parameter");
    assert!(matches!(err.kind, ErrorKind::MalformedArrayBounds(_)));
}

#[test]
fn test_tpdu_ref_overflow() {
    let codec = Codec::default();
    let packet = TpktPacket {
        payload: CotpPacket {
            tpdu: CotpTpdu::Data(CotpData { eot: false, tpdu_ref: 0x80 }),
            parameters: Vec::new(),
            payload: None,
        },
    };
    let err = codec.serialize(&packet).expect_err("7-bit field");
    assert_eq!(err.kind, ErrorKind::FieldOverflow { bits: 7, value: 0x80 });
    assert_eq!(err.path, "TPKTPacket/COTPPacket/COTPPacketData/tpduRef");
}

#[test]
fn test_reserved_fields_are_tolerated_and_rewritten() {
    let sink = CollectingSink::new();
    let codec = Codec::default().with_sink(&sink);

    let mut bytes = hex(SETUP_COMMUNICATION);
    bytes[1] = 0x55;
    bytes[9] = 0x12;
    let packet = codec.parse::<TpktPacket>(&bytes, ()).expect("reserved mismatches are not fatal");
    assert_eq!(
        sink.events(),
        vec![
            Diagnostic::ReservedMismatch { path: "TPKTPacket/reserved".into(), bit_offset: 8, expected: 0, actual: 0x55 },
            Diagnostic::ReservedMismatch {
                path: "TPKTPacket/COTPPacket/S7Message/reserved".into(),
                bit_offset: 72,
                expected: 0,
                actual: 0x1200,
            },
        ]
    );
    assert_eq!(codec.serialize(&packet).expect("serialize"), hex(SETUP_COMMUNICATION));
}

#[test]
fn test_tpkt_frames() {
    let codec = Codec::default();
    let mut stream = hex(DATA_EMPTY);
    stream.extend(hex(READ_VAR_REQUEST));
    stream.extend(hex("03 00 00 07 02 F1 80"));
    stream.extend(hex("03 00"));

    let result = decode_frames::<TpktPacket>(&codec, &stream, ());
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.messages[1].byte_range, (7, 50));
    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.removed[0].byte_range, (50, 57));
    assert_eq!(result.trailing, 2);
}
