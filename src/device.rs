//! Typed access to the environment-sensor registers.
//!
//! One generic read/write pair parameterized by [`Register`] replaces the
//! per-register accessor classes of the generated bindings; the named methods
//! below are thin wrappers over it.

use crate::channel::{Channel, ChannelConfig, ChannelError, EventStream};
use crate::message::{HarpMessage, MessageError, MessageType, Timestamped};
use crate::registers::{
    AggregateLayout, DeviceMode, EnableSensorEvents, Humidity, OperationCtrl, Pressure,
    PressureTempHumidity, Register, RegisterCatalog, SensorData, SensorEvents, SensorReading,
    Temperature, TemperatureOffset, WhoAmIReg, WHO_AM_I,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

/// A decoded inbound event, routed by register address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceEvent {
    Pressure(u32),
    Temperature(f32),
    Humidity(f32),
    /// Composite aggregate (current firmware layout).
    SensorData(SensorReading),
    /// Legacy scalar aggregate.
    Aggregate(f32),
    EnableSensorEvents(SensorEvents),
    TemperatureOffset(f32),
}

/// An environment-sensor device behind a command/response channel.
#[derive(Debug)]
pub struct Device {
    channel: Channel,
    catalog: RegisterCatalog,
}

impl Device {
    /// Open the channel over `io` and perform the identity handshake: the
    /// device must report WhoAmI = 1405 or the connection is rejected.
    pub async fn connect<T>(
        io: T,
        layout: AggregateLayout,
        config: ChannelConfig,
    ) -> Result<(Device, EventStream), ChannelError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (channel, events) = Channel::open(io, config);
        let device = Device {
            channel,
            catalog: RegisterCatalog::new(layout),
        };
        let identity = device.read::<WhoAmIReg>().await?;
        if identity != WHO_AM_I {
            return Err(ChannelError::UnexpectedDeviceIdentity {
                expected: WHO_AM_I,
                actual: identity,
            });
        }
        info!(identity, "environment sensor connected");
        Ok((device, events))
    }

    /// Read one register, returning its typed payload.
    pub async fn read<R: Register>(&self) -> Result<R::Value, ChannelError> {
        let reply = self
            .channel
            .command(HarpMessage::read(R::ADDRESS, R::PAYLOAD_TYPE))
            .await?;
        Ok(R::parse(&reply)?)
    }

    /// Read one register together with the device-reported timestamp.
    pub async fn read_timestamped<R: Register>(
        &self,
    ) -> Result<Timestamped<R::Value>, ChannelError> {
        let reply = self
            .channel
            .command(HarpMessage::read(R::ADDRESS, R::PAYLOAD_TYPE))
            .await?;
        let seconds = reply.timestamp.ok_or(MessageError::MissingTimestamp)?;
        Ok(Timestamped {
            value: R::parse(&reply)?,
            seconds,
        })
    }

    /// Write one register. Only the acknowledgement is surfaced; an error
    /// reply becomes [`ChannelError::ErrorReply`].
    pub async fn write<R: Register>(&self, value: &R::Value) -> Result<(), ChannelError> {
        let request = HarpMessage::new(MessageType::Write, R::ADDRESS, R::payload(value));
        self.channel.command(request).await?;
        Ok(())
    }

    /// Write one register with an explicit timestamp override for the device
    /// clock, in seconds.
    pub async fn write_timestamped<R: Register>(
        &self,
        seconds: f64,
        value: &R::Value,
    ) -> Result<(), ChannelError> {
        let request =
            HarpMessage::with_timestamp(MessageType::Write, R::ADDRESS, seconds, R::payload(value));
        self.channel.command(request).await?;
        Ok(())
    }

    pub async fn read_who_am_i(&self) -> Result<u16, ChannelError> {
        self.read::<WhoAmIReg>().await
    }

    pub async fn read_pressure(&self) -> Result<u32, ChannelError> {
        self.read::<Pressure>().await
    }

    pub async fn read_timestamped_pressure(&self) -> Result<Timestamped<u32>, ChannelError> {
        self.read_timestamped::<Pressure>().await
    }

    pub async fn read_temperature(&self) -> Result<f32, ChannelError> {
        self.read::<Temperature>().await
    }

    pub async fn read_timestamped_temperature(&self) -> Result<Timestamped<f32>, ChannelError> {
        self.read_timestamped::<Temperature>().await
    }

    pub async fn read_humidity(&self) -> Result<f32, ChannelError> {
        self.read::<Humidity>().await
    }

    pub async fn read_timestamped_humidity(&self) -> Result<Timestamped<f32>, ChannelError> {
        self.read_timestamped::<Humidity>().await
    }

    /// Read the composite aggregate register. Requires the catalog to use the
    /// [`AggregateLayout::Composite`] layout.
    pub async fn read_sensor_data(&self) -> Result<SensorReading, ChannelError> {
        self.require_layout(AggregateLayout::Composite)?;
        self.read::<SensorData>().await
    }

    pub async fn read_timestamped_sensor_data(
        &self,
    ) -> Result<Timestamped<SensorReading>, ChannelError> {
        self.require_layout(AggregateLayout::Composite)?;
        self.read_timestamped::<SensorData>().await
    }

    /// Read the legacy scalar aggregate register. Requires the
    /// [`AggregateLayout::Scalar`] layout.
    pub async fn read_aggregate(&self) -> Result<f32, ChannelError> {
        self.require_layout(AggregateLayout::Scalar)?;
        self.read::<PressureTempHumidity>().await
    }

    pub async fn read_enable_sensor_events(&self) -> Result<SensorEvents, ChannelError> {
        self.read::<EnableSensorEvents>().await
    }

    pub async fn write_enable_sensor_events(
        &self,
        value: SensorEvents,
    ) -> Result<(), ChannelError> {
        self.write::<EnableSensorEvents>(&value).await
    }

    pub async fn write_timestamped_enable_sensor_events(
        &self,
        seconds: f64,
        value: SensorEvents,
    ) -> Result<(), ChannelError> {
        self.write_timestamped::<EnableSensorEvents>(seconds, &value)
            .await
    }

    pub async fn read_temperature_offset(&self) -> Result<f32, ChannelError> {
        self.read::<TemperatureOffset>().await
    }

    pub async fn write_temperature_offset(&self, value: f32) -> Result<(), ChannelError> {
        self.write::<TemperatureOffset>(&value).await
    }

    /// Put the device in the given operating mode.
    pub async fn set_mode(&self, mode: DeviceMode) -> Result<(), ChannelError> {
        self.write::<OperationCtrl>(&(mode as u8)).await
    }

    pub fn layout(&self) -> AggregateLayout {
        self.catalog.layout()
    }

    pub fn catalog(&self) -> &RegisterCatalog {
        &self.catalog
    }

    /// Decode an inbound event (or unmatched reply) into its typed value,
    /// routed through the catalog. Returns the value and the device timestamp
    /// when the frame carries one.
    pub fn decode_event(
        &self,
        message: &HarpMessage,
    ) -> Result<(DeviceEvent, Option<f64>), ChannelError> {
        let descriptor = self
            .catalog
            .lookup(message.address)
            .ok_or(ChannelError::UnknownRegister(message.address))?;
        let event = match descriptor.address {
            Pressure::ADDRESS => DeviceEvent::Pressure(Pressure::parse(message)?),
            Temperature::ADDRESS => DeviceEvent::Temperature(Temperature::parse(message)?),
            Humidity::ADDRESS => DeviceEvent::Humidity(Humidity::parse(message)?),
            SensorData::ADDRESS => match self.catalog.layout() {
                AggregateLayout::Composite => DeviceEvent::SensorData(SensorData::parse(message)?),
                AggregateLayout::Scalar => {
                    DeviceEvent::Aggregate(PressureTempHumidity::parse(message)?)
                }
            },
            EnableSensorEvents::ADDRESS => {
                DeviceEvent::EnableSensorEvents(EnableSensorEvents::parse(message)?)
            }
            TemperatureOffset::ADDRESS => {
                DeviceEvent::TemperatureOffset(TemperatureOffset::parse(message)?)
            }
            address => return Err(ChannelError::UnknownRegister(address)),
        };
        Ok((event, message.timestamp))
    }

    fn require_layout(&self, layout: AggregateLayout) -> Result<(), ChannelError> {
        if self.catalog.layout() != layout {
            let wanted = match layout {
                AggregateLayout::Composite => "register 35 is configured as a scalar aggregate",
                AggregateLayout::Scalar => "register 35 is configured as a composite",
            };
            return Err(ChannelError::WrongLayout(wanted));
        }
        Ok(())
    }
}
