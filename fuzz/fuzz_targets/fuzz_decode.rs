#![no_main]

use libfuzzer_sys::fuzz_target;
use relstream::wire::Packet;

/// The decoder must never panic on arbitrary network input; it should
/// return a `DecodeError` for anything malformed or corrupted.
fuzz_target!(|data: &[u8]| {
    let _ = Packet::decode(data);
});
