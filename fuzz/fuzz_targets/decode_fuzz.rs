//! Frame decoder fuzz target: feed arbitrary bytes to HarpMessage::from_bytes.
//! The decoder must not panic, and anything it accepts must re-encode cleanly.
//! Frames without a timestamp must re-encode to the identical byte sequence;
//! timestamped ones may normalize a fractional field that exceeds one second.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if let Ok(message) = harp_envsensor::HarpMessage::from_bytes(data) {
        let bytes = message.to_bytes().expect("decoded message re-encodes");
        if message.timestamp.is_none() {
            assert_eq!(bytes, data);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
