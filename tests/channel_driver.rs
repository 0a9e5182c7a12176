// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Scenario: the client-facing channel + driver path (`create_channel` plus
// a registered `ChannelDriver`), not just the lower-level
// `send_off_channel`/`create_endpoint` primitives exercised elsewhere. A
// bug in `Transport::send`'s channel lookup, or in the callback
// `create_channel` installs to forward into `driver.on_message`, would go
// undetected without this.

use std::sync::{Arc, Mutex};

use rprocbus::channel::ChannelId;
use rprocbus::platform::{LoopbackPlatform, TransportConfig};
use rprocbus::{ChannelDriver, Transport};

struct EchoDriver {
    received: Mutex<Vec<(Vec<u8>, u32)>>,
}

impl ChannelDriver for EchoDriver {
    fn name(&self) -> &str {
        "echo"
    }

    fn probe(&self, _channel: ChannelId) -> rprocbus::Result<()> {
        Ok(())
    }

    fn remove(&self, _channel: ChannelId) {}

    fn on_message(&self, _channel: ChannelId, payload: &[u8], src: u32) {
        self.received.lock().unwrap().push((payload.to_vec(), src));
    }
}

#[test]
fn echo_channel_sends_through_transport_send_and_delivers_to_its_driver() {
    let config = TransportConfig { buf_num: 4, buf_size: 512, sim_base: 0, hc_channels: Vec::new() };
    let platform = LoopbackPlatform::new(config);
    let handle = platform.handle();
    let transport = Transport::attach(platform).unwrap();

    let driver = Arc::new(EchoDriver { received: Mutex::new(Vec::new()) });
    transport.register_driver(driver.clone()).unwrap();

    // Open channel "echo" with src = ANY, dst = 60, per the literal
    // scenario. The name-service endpoint is the only address bound below
    // the reserved range, so this channel's dynamically assigned local
    // address is deterministically 1024.
    let channel = transport.create_channel("echo", rprocbus::ANY, 60).unwrap();
    let channel_addr = 1024u32;
    assert!(channel_addr >= rprocbus::endpoint::RESERVED_RANGE);

    transport.send(channel, b"ping").expect("send through the channel's bound addresses");

    // The remote, at address 60, addresses a reply straight at this
    // channel's local endpoint; the loopback reflects it through the same
    // receive path every other inbound datagram takes.
    transport.send_off_channel(60, channel_addr, b"ping").unwrap();
    for id in handle.pump_send() {
        handle.deliver_recv(id);
    }

    let received = driver.received.lock().unwrap();
    assert_eq!(received.as_slice(), &[(b"ping".to_vec(), 60)]);
}
