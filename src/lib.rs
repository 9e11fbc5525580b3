//! # harp-envsensor — Harp protocol client for the environment sensor
//!
//! A thin protocol library for the Harp-class environment-sensor device
//! (WhoAmI = 1405): binary register message codec, typed register accessors,
//! and an asynchronous command/response channel over any byte stream.
//!
//! ## Layers
//!
//! - [`payload`]: payload element types and decoded values
//! - [`message`]: frame codec (header, optional timestamp, checksum)
//! - [`registers`]: register catalog and typed register definitions
//! - [`channel`]: async command/response channel with reply matching,
//!   timeout, cancellation, and an event-observer path
//! - [`device`]: typed read/write accessors and the identity handshake
//! - [`serial`] (feature `serial`): serial-port transport with Harp line
//!   settings
//!
//! ## Usage
//!
//! ```no_run
//! use harp_envsensor::{AggregateLayout, ChannelConfig, Device};
//!
//! # async fn run() -> Result<(), harp_envsensor::ChannelError> {
//! # let io = tokio::io::duplex(64).0;
//! let (device, mut events) = Device::connect(
//!     io,
//!     AggregateLayout::Composite,
//!     ChannelConfig::default(),
//! )
//! .await?;
//!
//! let reading = device.read_timestamped_sensor_data().await?;
//! println!("{:?} at {:.3}s", reading.value, reading.seconds);
//!
//! while let Some(message) = events.recv().await {
//!     let (event, seconds) = device.decode_event(&message)?;
//!     println!("{event:?} at {seconds:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod device;
pub mod message;
pub mod payload;
pub mod registers;
#[cfg(feature = "serial")]
pub mod serial;

pub use channel::{Channel, ChannelConfig, ChannelError, EventStream};
pub use device::{Device, DeviceEvent};
pub use message::{checksum, HarpMessage, MessageError, MessageType, Timestamped, DEVICE_PORT};
pub use payload::{Payload, PayloadType, TIMESTAMP_FLAG};
pub use registers::{
    AggregateLayout, DeviceMode, Register, RegisterCatalog, RegisterDescriptor, SensorEvents,
    SensorReading, WHO_AM_I,
};
