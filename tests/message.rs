//! Codec tests over the wire format: encode/decode fidelity, checksum
//! rejection, register parsing.

use harp_envsensor::registers::{
    EnableSensorEvents, Humidity, Pressure, PressureTempHumidity, Register, SensorData,
    SensorReading, Temperature, TemperatureOffset, WhoAmIReg,
};
use harp_envsensor::{
    checksum, HarpMessage, MessageError, MessageType, Payload, PayloadType, SensorEvents,
};

fn round_trip(msg: &HarpMessage) -> HarpMessage {
    let bytes = msg.to_bytes().expect("encode");
    HarpMessage::from_bytes(&bytes).expect("decode")
}

#[test]
fn write_pressure_round_trip() {
    let msg = HarpMessage::new(
        MessageType::Write,
        Pressure::ADDRESS,
        Pressure::payload(&101_325),
    );
    let back = round_trip(&msg);
    assert_eq!(back, msg);
    assert_eq!(Pressure::parse(&back).expect("parse"), 101_325);
}

#[test]
fn event_with_composite_payload() {
    let msg = HarpMessage::with_timestamp(
        MessageType::Event,
        SensorData::ADDRESS,
        42.5,
        Payload::Float(vec![1.0, 2.0, 3.0]),
    );
    let back = round_trip(&msg);
    let reading = SensorData::parse(&back).expect("parse");
    assert_eq!(
        reading,
        SensorReading {
            pressure: 1.0,
            temperature: 2.0,
            humidity: 3.0
        }
    );
    let seconds = back.timestamp.expect("timestamp");
    assert!((seconds - 42.5).abs() <= 32e-6);
}

#[test]
fn every_register_kind_round_trips() {
    let messages = [
        HarpMessage::new(MessageType::Read, WhoAmIReg::ADDRESS, WhoAmIReg::payload(&1405)),
        HarpMessage::new(
            MessageType::Event,
            Temperature::ADDRESS,
            Temperature::payload(&21.75),
        ),
        HarpMessage::new(MessageType::Event, Humidity::ADDRESS, Humidity::payload(&48.0)),
        HarpMessage::new(
            MessageType::Write,
            EnableSensorEvents::ADDRESS,
            EnableSensorEvents::payload(&SensorEvents::SENSOR_DISPATCH),
        ),
        HarpMessage::new(
            MessageType::Write,
            TemperatureOffset::ADDRESS,
            TemperatureOffset::payload(&-0.5),
        ),
        HarpMessage::new(
            MessageType::Read,
            PressureTempHumidity::ADDRESS,
            PressureTempHumidity::payload(&7.25),
        ),
    ];
    for msg in &messages {
        assert_eq!(&round_trip(msg), msg);
    }
}

#[test]
fn single_byte_corruption_is_rejected() {
    let msg = HarpMessage::with_timestamp(
        MessageType::Event,
        Temperature::ADDRESS,
        100.0,
        Temperature::payload(&23.5),
    );
    let bytes = msg.to_bytes().expect("encode");
    // Flip one bit in each byte except the length field; every mutation must
    // fail decoding, almost always on the checksum.
    for i in (0..bytes.len()).filter(|&i| i != 1) {
        let mut corrupted = bytes.clone();
        corrupted[i] ^= 0x20;
        assert!(
            HarpMessage::from_bytes(&corrupted).is_err(),
            "byte {i} corruption went unnoticed"
        );
    }
}

#[test]
fn checksum_mismatch_is_reported_as_such() {
    let msg = HarpMessage::new(MessageType::Event, Humidity::ADDRESS, Humidity::payload(&50.0));
    let mut bytes = msg.to_bytes().expect("encode");
    let last = bytes.len() - 1;
    bytes[last] = bytes[last].wrapping_add(1);
    match HarpMessage::from_bytes(&bytes) {
        Err(MessageError::ChecksumMismatch { .. }) => {}
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn truncated_frames_are_rejected() {
    let msg = HarpMessage::new(MessageType::Event, Pressure::ADDRESS, Pressure::payload(&1));
    let bytes = msg.to_bytes().expect("encode");
    for cut in 0..bytes.len() {
        assert!(
            HarpMessage::from_bytes(&bytes[..cut]).is_err(),
            "truncation at {cut} accepted"
        );
    }
}

#[test]
fn length_field_must_match_frame() {
    let msg = HarpMessage::new(MessageType::Event, Pressure::ADDRESS, Pressure::payload(&1));
    let mut bytes = msg.to_bytes().expect("encode");
    // Extra trailing byte beyond the declared length.
    bytes.push(0x00);
    match HarpMessage::from_bytes(&bytes) {
        Err(MessageError::LengthMismatch) => {}
        other => panic!("expected length mismatch, got {other:?}"),
    }
}

#[test]
fn wrong_payload_type_is_rejected_by_parser() {
    // A U32 frame addressed at the Float temperature register.
    let msg = HarpMessage::new(
        MessageType::Event,
        Temperature::ADDRESS,
        Payload::U32(vec![7]),
    );
    match Temperature::parse(&msg) {
        Err(MessageError::PayloadTypeMismatch { .. }) => {}
        other => panic!("expected payload type mismatch, got {other:?}"),
    }
}

#[test]
fn wrong_element_count_is_rejected_by_parser() {
    let msg = HarpMessage::new(
        MessageType::Event,
        SensorData::ADDRESS,
        Payload::Float(vec![1.0, 2.0]),
    );
    match SensorData::parse(&msg) {
        Err(MessageError::InvalidPayloadLength {
            expected: 3,
            actual: 2,
        }) => {}
        other => panic!("expected payload length error, got {other:?}"),
    }
}

#[test]
fn wrong_address_is_rejected_by_parser() {
    let msg = HarpMessage::new(MessageType::Event, Humidity::ADDRESS, Payload::Float(vec![1.0]));
    match Temperature::parse(&msg) {
        Err(MessageError::AddressMismatch { .. }) => {}
        other => panic!("expected address mismatch, got {other:?}"),
    }
}

#[test]
fn unknown_flag_bits_survive_decoding() {
    let msg = HarpMessage::new(
        MessageType::Event,
        EnableSensorEvents::ADDRESS,
        Payload::U8(vec![0xA1]),
    );
    let flags = EnableSensorEvents::parse(&round_trip(&msg)).expect("parse");
    assert_eq!(flags.bits(), 0xA1);
    assert!(flags.contains(SensorEvents::SENSOR_DISPATCH));
}

#[test]
fn checksum_is_additive_mod_256() {
    assert_eq!(checksum(&[]), 0);
    assert_eq!(checksum(&[0xFF, 0x01]), 0x00);
    assert_eq!(checksum(&[0x02, 0x05, 0x24, 0xFF, 0x01, 0x01]), 0x2C);
}

#[test]
fn garbage_never_decodes_silently() {
    for len in 0..32 {
        let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
        // Whatever the outcome, it must be a clean Result, and a successful
        // decode must re-encode to the same bytes (modulo timestamp
        // normalization, which these frames do not carry).
        if let Ok(msg) = HarpMessage::from_bytes(&bytes) {
            if msg.timestamp.is_none() {
                assert_eq!(msg.to_bytes().expect("re-encode"), bytes);
            }
        }
    }
}
