#![no_main]

use bingo_link::protocol::{GridSize, GuestMessage, PlayerId};
use bingo_link::GameSession;
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = serde_json::from_slice::<GuestMessage>(data) else {
        return;
    };

    // Whatever a guest sends, the host table must not panic.
    let mut host = GameSession::host(
        PlayerId::new("bingo-pwa-42"),
        "Hank",
        GridSize::default(),
        Duration::from_millis(1500),
    );
    let guest = PlayerId::new("fuzz");
    host.handle_guest_message(&guest, GuestMessage::Join { name: "F".into() });
    host.handle_guest_message(&guest, message.clone());
    let _ = host.trigger_setup();
    host.handle_guest_message(&guest, message);
    let _ = host.drain_outgoing();
});
