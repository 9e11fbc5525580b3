//! Serial-port transport for Harp devices (enabled with the `serial` feature).
//!
//! Harp devices enumerate as CDC serial ports running at 1 Mbaud, 8N1. The
//! returned stream plugs straight into [`crate::Device::connect`].

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Line rate used by Harp devices.
pub const BAUD_RATE: u32 = 1_000_000;

/// Open the serial port at `path` with Harp line settings.
pub fn open(path: &str) -> tokio_serial::Result<SerialStream> {
    tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
}
