//! Poll an environment sensor over a serial port and print readings and events.
//!
//! Usage:
//!   sensor_dump /dev/ttyACM0
//!
//! Requires the `serial` feature:
//!   cargo run --features serial --bin sensor_dump -- /dev/ttyACM0

use anyhow::Context;
use harp_envsensor::{serial, AggregateLayout, ChannelConfig, Device, DeviceMode};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: sensor_dump <serial-port>")?;

    let port = serial::open(&path).with_context(|| format!("opening {path}"))?;
    let (device, mut events) = Device::connect(
        port,
        AggregateLayout::Composite,
        ChannelConfig::default(),
    )
    .await
    .context("connecting to environment sensor")?;

    device.set_mode(DeviceMode::Active).await?;

    let mut poll = tokio::time::interval(Duration::from_millis(1500));
    loop {
        tokio::select! {
            _ = poll.tick() => {
                let pressure = device.read_pressure().await?;
                let temperature = device.read_temperature().await?;
                let humidity = device.read_humidity().await?;
                println!("Pressure: {pressure} Pa, Temperature: {temperature:.2} C, Humidity: {humidity:.2} %RH");
            }
            message = events.recv() => {
                let Some(message) = message else { break };
                match device.decode_event(&message) {
                    Ok((event, Some(seconds))) => println!("[{seconds:10.3}] {event:?}"),
                    Ok((event, None)) => println!("[         ] {event:?}"),
                    Err(e) => eprintln!("undecodable event: {e}"),
                }
            }
        }
    }

    Ok(())
}
