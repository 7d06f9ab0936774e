//! Feed arbitrary bytes to every registered root type, in both directions.
//! Parsing must return Ok or Err, never panic; whatever parses must re-serialize.
//! Build with: cargo fuzz run parse_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let codec = fieldbus_codec::Codec::default();
    for root in fieldbus_codec::protocols::ROOT_TYPES {
        for response in [0u64, 1] {
            let _ = (root.decode)(&codec, data, &[response]);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parse_fuzz");
}
