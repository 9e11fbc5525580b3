//! Harp register message codec: frame layout, timestamp, checksum.
//!
//! Frame layout (little-endian, wire-compatible with the hardware):
//!
//! ```text
//! [0] message type  (Read=0x01, Write=0x02, Event=0x03; bit 0x08 set on error replies)
//! [1] length        (bytes after this byte, checksum included)
//! [2] address
//! [3] port          (0xFF = the device itself)
//! [4] payload type  (element tag, bit 0x10 = timestamp present)
//!     timestamp     (u32 seconds + u16 fractional in 32 µs units, iff bit 0x10)
//!     payload       (element_count * element_size bytes)
//! [n] checksum      (sum of all preceding bytes, mod 256)
//! ```

use crate::payload::{Payload, PayloadType, TIMESTAMP_FLAG};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Port value addressing the device itself rather than a peripheral.
pub const DEVICE_PORT: u8 = 0xFF;

/// Resolution of the fractional timestamp field, in seconds.
const TIMESTAMP_STEP: f64 = 32e-6;

/// Error-reply bit in the message type byte.
const ERROR_FLAG: u8 = 0x08;

/// Command class of a register message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Read = 0x01,
    Write = 0x02,
    Event = 0x03,
}

impl MessageType {
    fn from_wire(byte: u8) -> Result<(MessageType, bool), MessageError> {
        let is_error = byte & ERROR_FLAG != 0;
        let kind = match byte & !ERROR_FLAG {
            0x01 => MessageType::Read,
            0x02 => MessageType::Write,
            0x03 => MessageType::Event,
            _ => return Err(MessageError::UnknownMessageType(byte)),
        };
        Ok((kind, is_error))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("frame truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("frame length field disagrees with payload extent")]
    LengthMismatch,
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),
    #[error("unknown payload type tag {0:#04x}")]
    UnknownPayloadType(u8),
    #[error("invalid payload length: register holds {expected} elements, got {actual}")]
    InvalidPayloadLength { expected: usize, actual: usize },
    #[error("payload too long for a single frame: {0} bytes")]
    PayloadTooLong(usize),
    #[error("payload type mismatch: expected {expected:?}, got {actual:?}")]
    PayloadTypeMismatch {
        expected: PayloadType,
        actual: PayloadType,
    },
    #[error("address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: u8, actual: u8 },
    #[error("message carries no timestamp")]
    MissingTimestamp,
}

/// A value paired with the device-reported time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamped<T> {
    pub value: T,
    pub seconds: f64,
}

/// A single register message, immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct HarpMessage {
    pub message_type: MessageType,
    pub is_error: bool,
    pub address: u8,
    pub port: u8,
    /// Device time in seconds, when the frame carries one.
    pub timestamp: Option<f64>,
    pub payload: Payload,
}

impl HarpMessage {
    /// Command or event message without a timestamp.
    pub fn new(message_type: MessageType, address: u8, payload: Payload) -> HarpMessage {
        HarpMessage {
            message_type,
            is_error: false,
            address,
            port: DEVICE_PORT,
            timestamp: None,
            payload,
        }
    }

    /// Message carrying an explicit device timestamp, in seconds.
    pub fn with_timestamp(
        message_type: MessageType,
        address: u8,
        seconds: f64,
        payload: Payload,
    ) -> HarpMessage {
        HarpMessage {
            timestamp: Some(seconds),
            ..HarpMessage::new(message_type, address, payload)
        }
    }

    /// Read request for a register: empty payload of the register's element type.
    pub fn read(address: u8, kind: PayloadType) -> HarpMessage {
        HarpMessage::new(MessageType::Read, address, Payload::empty(kind))
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload.payload_type()
    }

    /// Serialize the message, appending the checksum.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        let kind = self.payload.payload_type();
        let payload_len = self.payload.len() * kind.element_size();
        let timestamp_len = if self.timestamp.is_some() { 6 } else { 0 };
        // address + port + payload type + timestamp + payload + checksum
        let length = 3 + timestamp_len + payload_len + 1;
        if length > u8::MAX as usize {
            return Err(MessageError::PayloadTooLong(payload_len));
        }

        let mut out = Vec::with_capacity(2 + length);
        let mut type_byte = self.message_type as u8;
        if self.is_error {
            type_byte |= ERROR_FLAG;
        }
        out.push(type_byte);
        out.push(length as u8);
        out.push(self.address);
        out.push(self.port);
        let mut tag = kind.tag();
        if self.timestamp.is_some() {
            tag |= TIMESTAMP_FLAG;
        }
        out.push(tag);
        if let Some(seconds) = self.timestamp {
            write_timestamp(&mut out, seconds);
        }
        write_payload(&mut out, &self.payload);
        out.push(checksum(&out));
        Ok(out)
    }

    /// Decode one complete frame. The slice must hold exactly one message.
    pub fn from_bytes(bytes: &[u8]) -> Result<HarpMessage, MessageError> {
        if bytes.len() < 2 {
            return Err(MessageError::Truncated {
                expected: 2,
                actual: bytes.len(),
            });
        }
        let total = 2 + bytes[1] as usize;
        if bytes.len() < total {
            return Err(MessageError::Truncated {
                expected: total,
                actual: bytes.len(),
            });
        }
        if bytes.len() != total || total < 6 {
            return Err(MessageError::LengthMismatch);
        }

        let expected = checksum(&bytes[..total - 1]);
        let actual = bytes[total - 1];
        if expected != actual {
            return Err(MessageError::ChecksumMismatch { expected, actual });
        }

        let (message_type, is_error) = MessageType::from_wire(bytes[0])?;
        let address = bytes[2];
        let port = bytes[3];
        let (kind, timestamped) = PayloadType::from_tag(bytes[4])?;

        let mut cursor = Cursor::new(&bytes[5..total - 1]);
        let timestamp = if timestamped {
            Some(read_timestamp(&mut cursor)?)
        } else {
            None
        };
        let remaining = (total - 1 - 5) - cursor.position() as usize;
        if remaining % kind.element_size() != 0 {
            return Err(MessageError::LengthMismatch);
        }
        let count = remaining / kind.element_size();
        let payload = read_payload(&mut cursor, kind, count)?;

        Ok(HarpMessage {
            message_type,
            is_error,
            address,
            port,
            timestamp,
            payload,
        })
    }
}

/// Additive checksum over the frame bytes, mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

fn write_timestamp(out: &mut Vec<u8>, seconds: f64) {
    let seconds = seconds.max(0.0);
    let whole = seconds as u32;
    let fractional = ((seconds - whole as f64) / TIMESTAMP_STEP).round() as u16;
    // Vec<u8> writes cannot fail.
    let _ = out.write_u32::<LittleEndian>(whole);
    let _ = out.write_u16::<LittleEndian>(fractional);
}

fn read_timestamp(cursor: &mut Cursor<&[u8]>) -> Result<f64, MessageError> {
    let whole = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| MessageError::LengthMismatch)?;
    let fractional = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| MessageError::LengthMismatch)?;
    Ok(whole as f64 + fractional as f64 * TIMESTAMP_STEP)
}

fn write_payload(out: &mut Vec<u8>, payload: &Payload) {
    match payload {
        Payload::U8(v) => out.extend_from_slice(v),
        Payload::U16(v) => {
            for x in v {
                let _ = out.write_u16::<LittleEndian>(*x);
            }
        }
        Payload::U32(v) => {
            for x in v {
                let _ = out.write_u32::<LittleEndian>(*x);
            }
        }
        Payload::U64(v) => {
            for x in v {
                let _ = out.write_u64::<LittleEndian>(*x);
            }
        }
        Payload::S8(v) => {
            for x in v {
                let _ = out.write_i8(*x);
            }
        }
        Payload::S16(v) => {
            for x in v {
                let _ = out.write_i16::<LittleEndian>(*x);
            }
        }
        Payload::S32(v) => {
            for x in v {
                let _ = out.write_i32::<LittleEndian>(*x);
            }
        }
        Payload::S64(v) => {
            for x in v {
                let _ = out.write_i64::<LittleEndian>(*x);
            }
        }
        Payload::Float(v) => {
            for x in v {
                let _ = out.write_f32::<LittleEndian>(*x);
            }
        }
    }
}

fn read_payload(
    cursor: &mut Cursor<&[u8]>,
    kind: PayloadType,
    count: usize,
) -> Result<Payload, MessageError> {
    // The extent was validated by the caller; a short read here means the
    // length field lied about the timestamp region.
    let short = |_| MessageError::LengthMismatch;
    Ok(match kind {
        PayloadType::U8 => {
            let mut v = vec![0u8; count];
            std::io::Read::read_exact(cursor, &mut v).map_err(short)?;
            Payload::U8(v)
        }
        PayloadType::U16 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_u16::<LittleEndian>().map_err(short)?);
            }
            Payload::U16(v)
        }
        PayloadType::U32 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_u32::<LittleEndian>().map_err(short)?);
            }
            Payload::U32(v)
        }
        PayloadType::U64 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_u64::<LittleEndian>().map_err(short)?);
            }
            Payload::U64(v)
        }
        PayloadType::S8 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i8().map_err(short)?);
            }
            Payload::S8(v)
        }
        PayloadType::S16 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i16::<LittleEndian>().map_err(short)?);
            }
            Payload::S16(v)
        }
        PayloadType::S32 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i32::<LittleEndian>().map_err(short)?);
            }
            Payload::S32(v)
        }
        PayloadType::S64 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i64::<LittleEndian>().map_err(short)?);
            }
            Payload::S64(v)
        }
        PayloadType::Float => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_f32::<LittleEndian>().map_err(short)?);
            }
            Payload::Float(v)
        }
    })
}
