//! Register catalog and typed register definitions for the environment sensor.
//!
//! Each register fixes its address, element type and element count at the type
//! level, so a caller can never request a mismatched interpretation. The
//! catalog is the runtime table used to route inbound messages to the right
//! decoder.

use crate::message::{HarpMessage, MessageError};
use crate::payload::{Payload, PayloadType};

/// Identity reported by the environment-sensor device class.
pub const WHO_AM_I: u16 = 1405;

/// Static description of one device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub address: u8,
    pub payload_type: PayloadType,
    pub length: usize,
    pub name: &'static str,
}

/// Layout of the aggregate register at address 35.
///
/// Two incompatible layouts exist across firmware revisions: the current
/// firmware publishes three floats (pressure, temperature, humidity), an older
/// binding a single float. A catalog exposes exactly one of them; there is no
/// silent dual support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateLayout {
    /// Float x3 composite, decomposed into named fields. Current firmware.
    #[default]
    Composite,
    /// Legacy Float x1 aggregate.
    Scalar,
}

/// Immutable register table for one device, keyed by unique address.
#[derive(Debug, Clone)]
pub struct RegisterCatalog {
    descriptors: Vec<RegisterDescriptor>,
    layout: AggregateLayout,
}

impl RegisterCatalog {
    /// Build the catalog for the given address-35 layout. Built once; no
    /// mutation afterwards.
    pub fn new(layout: AggregateLayout) -> RegisterCatalog {
        let aggregate = match layout {
            AggregateLayout::Composite => SensorData::DESCRIPTOR,
            AggregateLayout::Scalar => PressureTempHumidity::DESCRIPTOR,
        };
        let descriptors = vec![
            WhoAmIReg::DESCRIPTOR,
            OperationCtrl::DESCRIPTOR,
            Pressure::DESCRIPTOR,
            Temperature::DESCRIPTOR,
            Humidity::DESCRIPTOR,
            aggregate,
            EnableSensorEvents::DESCRIPTOR,
            TemperatureOffset::DESCRIPTOR,
        ];
        RegisterCatalog {
            descriptors,
            layout,
        }
    }

    pub fn lookup(&self, address: u8) -> Option<&RegisterDescriptor> {
        self.descriptors.iter().find(|d| d.address == address)
    }

    pub fn layout(&self) -> AggregateLayout {
        self.layout
    }
}

/// A device register with a fixed address, payload shape and value type.
pub trait Register {
    const ADDRESS: u8;
    const PAYLOAD_TYPE: PayloadType;
    const LENGTH: usize;
    const NAME: &'static str;
    type Value;

    const DESCRIPTOR: RegisterDescriptor = RegisterDescriptor {
        address: Self::ADDRESS,
        payload_type: Self::PAYLOAD_TYPE,
        length: Self::LENGTH,
        name: Self::NAME,
    };

    /// Extract the typed value from a register message.
    fn parse(message: &HarpMessage) -> Result<Self::Value, MessageError>;

    /// Payload for a write to this register.
    fn payload(value: &Self::Value) -> Payload;
}

/// Shared header validation for register parsers.
fn check_message<R: Register>(message: &HarpMessage) -> Result<(), MessageError> {
    if message.address != R::ADDRESS {
        return Err(MessageError::AddressMismatch {
            expected: R::ADDRESS,
            actual: message.address,
        });
    }
    if message.payload_type() != R::PAYLOAD_TYPE {
        return Err(MessageError::PayloadTypeMismatch {
            expected: R::PAYLOAD_TYPE,
            actual: message.payload_type(),
        });
    }
    if message.payload.len() != R::LENGTH {
        return Err(MessageError::InvalidPayloadLength {
            expected: R::LENGTH,
            actual: message.payload.len(),
        });
    }
    Ok(())
}

/// Core identity register.
pub struct WhoAmIReg;

impl Register for WhoAmIReg {
    const ADDRESS: u8 = 0;
    const PAYLOAD_TYPE: PayloadType = PayloadType::U16;
    const LENGTH: usize = 1;
    const NAME: &'static str = "WhoAmI";
    type Value = u16;

    fn parse(message: &HarpMessage) -> Result<u16, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_u16().unwrap_or_default())
    }

    fn payload(value: &u16) -> Payload {
        Payload::U16(vec![*value])
    }
}

/// Core operation control register (device mode and reply options).
pub struct OperationCtrl;

impl Register for OperationCtrl {
    const ADDRESS: u8 = 10;
    const PAYLOAD_TYPE: PayloadType = PayloadType::U8;
    const LENGTH: usize = 1;
    const NAME: &'static str = "OperationCtrl";
    type Value = u8;

    fn parse(message: &HarpMessage) -> Result<u8, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_u8().unwrap_or_default())
    }

    fn payload(value: &u8) -> Payload {
        Payload::U8(vec![*value])
    }
}

/// Operating mode written to [`OperationCtrl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Standby = 0,
    Active = 1,
    Speed = 3,
}

/// Pressure, in Pa.
pub struct Pressure;

impl Register for Pressure {
    const ADDRESS: u8 = 32;
    const PAYLOAD_TYPE: PayloadType = PayloadType::U32;
    const LENGTH: usize = 1;
    const NAME: &'static str = "Pressure";
    type Value = u32;

    fn parse(message: &HarpMessage) -> Result<u32, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_u32().unwrap_or_default())
    }

    fn payload(value: &u32) -> Payload {
        Payload::U32(vec![*value])
    }
}

/// Temperature, in degrees C.
pub struct Temperature;

impl Register for Temperature {
    const ADDRESS: u8 = 33;
    const PAYLOAD_TYPE: PayloadType = PayloadType::Float;
    const LENGTH: usize = 1;
    const NAME: &'static str = "Temperature";
    type Value = f32;

    fn parse(message: &HarpMessage) -> Result<f32, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_f32().unwrap_or_default())
    }

    fn payload(value: &f32) -> Payload {
        Payload::Float(vec![*value])
    }
}

/// Relative humidity, in %RH.
pub struct Humidity;

impl Register for Humidity {
    const ADDRESS: u8 = 34;
    const PAYLOAD_TYPE: PayloadType = PayloadType::Float;
    const LENGTH: usize = 1;
    const NAME: &'static str = "Humidity";
    type Value = f32;

    fn parse(message: &HarpMessage) -> Result<f32, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_f32().unwrap_or_default())
    }

    fn payload(value: &f32) -> Payload {
        Payload::Float(vec![*value])
    }
}

/// One reading of all three sensors, as published by the composite register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub pressure: f32,
    pub temperature: f32,
    pub humidity: f32,
}

/// Aggregate register, Float x3 composite layout. Slot order is fixed by the
/// firmware: 0 = pressure, 1 = temperature, 2 = humidity.
pub struct SensorData;

impl Register for SensorData {
    const ADDRESS: u8 = 35;
    const PAYLOAD_TYPE: PayloadType = PayloadType::Float;
    const LENGTH: usize = 3;
    const NAME: &'static str = "SensorData";
    type Value = SensorReading;

    fn parse(message: &HarpMessage) -> Result<SensorReading, MessageError> {
        check_message::<Self>(message)?;
        let values = message.payload.as_f32_slice().unwrap_or_default();
        Ok(SensorReading {
            pressure: values[0],
            temperature: values[1],
            humidity: values[2],
        })
    }

    fn payload(value: &SensorReading) -> Payload {
        Payload::Float(vec![value.pressure, value.temperature, value.humidity])
    }
}

/// Aggregate register, legacy Float x1 layout.
pub struct PressureTempHumidity;

impl Register for PressureTempHumidity {
    const ADDRESS: u8 = 35;
    const PAYLOAD_TYPE: PayloadType = PayloadType::Float;
    const LENGTH: usize = 1;
    const NAME: &'static str = "PressureTempHumidity";
    type Value = f32;

    fn parse(message: &HarpMessage) -> Result<f32, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_f32().unwrap_or_default())
    }

    fn payload(value: &f32) -> Payload {
        Payload::Float(vec![*value])
    }
}

/// Event-enable flags. Decode is permissive: bits beyond the defined flags are
/// kept as-is so newer firmware bits are never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorEvents(u8);

impl SensorEvents {
    /// Dispatch the ~2 Hz sensor-data event.
    pub const SENSOR_DISPATCH: SensorEvents = SensorEvents(0x01);

    pub const fn from_bits(bits: u8) -> SensorEvents {
        SensorEvents(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: SensorEvents) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SensorEvents {
    type Output = SensorEvents;

    fn bitor(self, rhs: SensorEvents) -> SensorEvents {
        SensorEvents(self.0 | rhs.0)
    }
}

/// Event-enable register.
pub struct EnableSensorEvents;

impl Register for EnableSensorEvents {
    const ADDRESS: u8 = 36;
    const PAYLOAD_TYPE: PayloadType = PayloadType::U8;
    const LENGTH: usize = 1;
    const NAME: &'static str = "EnableSensorEvents";
    type Value = SensorEvents;

    fn parse(message: &HarpMessage) -> Result<SensorEvents, MessageError> {
        check_message::<Self>(message)?;
        Ok(SensorEvents::from_bits(
            message.payload.as_u8().unwrap_or_default(),
        ))
    }

    fn payload(value: &SensorEvents) -> Payload {
        Payload::U8(vec![value.bits()])
    }
}

/// Temperature calibration offset applied by the firmware, in degrees C.
pub struct TemperatureOffset;

impl Register for TemperatureOffset {
    const ADDRESS: u8 = 37;
    const PAYLOAD_TYPE: PayloadType = PayloadType::Float;
    const LENGTH: usize = 1;
    const NAME: &'static str = "TemperatureOffset";
    type Value = f32;

    fn parse(message: &HarpMessage) -> Result<f32, MessageError> {
        check_message::<Self>(message)?;
        Ok(message.payload.as_f32().unwrap_or_default())
    }

    fn payload(value: &f32) -> Payload {
        Payload::Float(vec![*value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_addresses_unique() {
        for layout in [AggregateLayout::Composite, AggregateLayout::Scalar] {
            let catalog = RegisterCatalog::new(layout);
            for address in [0u8, 10, 32, 33, 34, 35, 36, 37] {
                assert!(catalog.lookup(address).is_some(), "address {address}");
            }
            assert!(catalog.lookup(31).is_none());
        }
    }

    #[test]
    fn layout_selects_aggregate_descriptor() {
        let composite = RegisterCatalog::new(AggregateLayout::Composite);
        assert_eq!(composite.lookup(35).expect("35").length, 3);
        let scalar = RegisterCatalog::new(AggregateLayout::Scalar);
        assert_eq!(scalar.lookup(35).expect("35").length, 1);
    }

    #[test]
    fn flags_are_permissive() {
        let flags = SensorEvents::from_bits(0xFF);
        assert!(flags.contains(SensorEvents::SENSOR_DISPATCH));
        assert_eq!(flags.bits(), 0xFF);
    }
}
