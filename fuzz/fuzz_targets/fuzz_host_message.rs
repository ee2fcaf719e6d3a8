#![no_main]

use bingo_link::protocol::{HostMessage, PlayerId};
use bingo_link::GameSession;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's own UTF-8 validation.
    let Ok(message) = serde_json::from_slice::<HostMessage>(data) else {
        return;
    };

    // A guest mirror applies anything the host sends without panicking,
    // including turn indexes past the end of the roster.
    let mut guest = GameSession::guest(PlayerId::new("fuzz"), "F");
    guest.apply_host_message(message.clone());
    guest.apply_host_message(message);
    let _ = guest.state().current_turn();
    let _ = guest.drain_events();
});
