//! Payload element types and decoded payload values.

use crate::message::MessageError;

/// Element type of a register payload, as carried in the frame's type tag.
///
/// On the wire, bits 0-3 of the tag give the element size in bytes, bit 7
/// marks signed integers and bit 6 floats. Bit 4 (`0x10`) is not part of the
/// element type: it flags the presence of a timestamp and is handled by the
/// frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    Float,
}

/// Timestamp-present bit in the payload type tag.
pub const TIMESTAMP_FLAG: u8 = 0x10;

impl PayloadType {
    /// Wire tag for this element type, without the timestamp bit.
    pub const fn tag(self) -> u8 {
        match self {
            PayloadType::U8 => 0x01,
            PayloadType::U16 => 0x02,
            PayloadType::U32 => 0x04,
            PayloadType::U64 => 0x08,
            PayloadType::S8 => 0x81,
            PayloadType::S16 => 0x82,
            PayloadType::S32 => 0x84,
            PayloadType::S64 => 0x88,
            PayloadType::Float => 0x44,
        }
    }

    /// Parse a wire tag into (element type, timestamp present).
    pub fn from_tag(tag: u8) -> Result<(PayloadType, bool), MessageError> {
        let timestamped = tag & TIMESTAMP_FLAG != 0;
        let kind = match tag & !TIMESTAMP_FLAG {
            0x01 => PayloadType::U8,
            0x02 => PayloadType::U16,
            0x04 => PayloadType::U32,
            0x08 => PayloadType::U64,
            0x81 => PayloadType::S8,
            0x82 => PayloadType::S16,
            0x84 => PayloadType::S32,
            0x88 => PayloadType::S64,
            0x44 => PayloadType::Float,
            _ => return Err(MessageError::UnknownPayloadType(tag)),
        };
        Ok((kind, timestamped))
    }

    /// Size of one element in bytes.
    pub const fn element_size(self) -> usize {
        match self {
            PayloadType::U8 | PayloadType::S8 => 1,
            PayloadType::U16 | PayloadType::S16 => 2,
            PayloadType::U32 | PayloadType::S32 | PayloadType::Float => 4,
            PayloadType::U64 | PayloadType::S64 => 8,
        }
    }
}

/// A decoded payload: the element vector for one register message.
///
/// A read request carries an empty vector of the register's element type; all
/// register replies carry at least one element.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    S8(Vec<i8>),
    S16(Vec<i16>),
    S32(Vec<i32>),
    S64(Vec<i64>),
    Float(Vec<f32>),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::U8(_) => PayloadType::U8,
            Payload::U16(_) => PayloadType::U16,
            Payload::U32(_) => PayloadType::U32,
            Payload::U64(_) => PayloadType::U64,
            Payload::S8(_) => PayloadType::S8,
            Payload::S16(_) => PayloadType::S16,
            Payload::S32(_) => PayloadType::S32,
            Payload::S64(_) => PayloadType::S64,
            Payload::Float(_) => PayloadType::Float,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Payload::U8(v) => v.len(),
            Payload::U16(v) => v.len(),
            Payload::U32(v) => v.len(),
            Payload::U64(v) => v.len(),
            Payload::S8(v) => v.len(),
            Payload::S16(v) => v.len(),
            Payload::S32(v) => v.len(),
            Payload::S64(v) => v.len(),
            Payload::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty payload of the given element type, as used by read requests.
    pub fn empty(kind: PayloadType) -> Payload {
        match kind {
            PayloadType::U8 => Payload::U8(Vec::new()),
            PayloadType::U16 => Payload::U16(Vec::new()),
            PayloadType::U32 => Payload::U32(Vec::new()),
            PayloadType::U64 => Payload::U64(Vec::new()),
            PayloadType::S8 => Payload::S8(Vec::new()),
            PayloadType::S16 => Payload::S16(Vec::new()),
            PayloadType::S32 => Payload::S32(Vec::new()),
            PayloadType::S64 => Payload::S64(Vec::new()),
            PayloadType::Float => Payload::Float(Vec::new()),
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Payload::U8(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Payload::U16(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Payload::U32(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Payload::Float(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            Payload::Float(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for kind in [
            PayloadType::U8,
            PayloadType::U16,
            PayloadType::U32,
            PayloadType::U64,
            PayloadType::S8,
            PayloadType::S16,
            PayloadType::S32,
            PayloadType::S64,
            PayloadType::Float,
        ] {
            assert_eq!(PayloadType::from_tag(kind.tag()).expect("tag"), (kind, false));
            assert_eq!(
                PayloadType::from_tag(kind.tag() | TIMESTAMP_FLAG).expect("tag"),
                (kind, true)
            );
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(PayloadType::from_tag(0x00).is_err());
        assert!(PayloadType::from_tag(0x03).is_err());
        // Bare timestamp tag without an element type is not a register payload.
        assert!(PayloadType::from_tag(0x10).is_err());
    }

    #[test]
    fn element_sizes() {
        assert_eq!(PayloadType::U8.element_size(), 1);
        assert_eq!(PayloadType::S16.element_size(), 2);
        assert_eq!(PayloadType::Float.element_size(), 4);
        assert_eq!(PayloadType::U64.element_size(), 8);
    }
}
