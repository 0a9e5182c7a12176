// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Scenario: tearing down a transport destroys every channel and notifies
// each channel's driver exactly once, with no driver observing a channel
// id that the channel table no longer has a record of.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rprocbus::channel::ChannelId;
use rprocbus::platform::{LoopbackPlatform, TransportConfig};
use rprocbus::{ChannelDriver, Transport};

struct TrackingDriver {
    name: String,
    probes: AtomicUsize,
    removed: Mutex<Vec<ChannelId>>,
}

impl ChannelDriver for TrackingDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self, _channel: ChannelId) -> rprocbus::Result<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, channel: ChannelId) {
        self.removed.lock().unwrap().push(channel);
    }

    fn on_message(&self, _channel: ChannelId, _payload: &[u8], _src: u32) {}
}

#[test]
fn detach_removes_every_channel_exactly_once() {
    let config = TransportConfig { buf_num: 8, buf_size: 256, sim_base: 0, hc_channels: Vec::new() };
    let platform = LoopbackPlatform::new(config);
    let transport = Transport::attach(platform).unwrap();

    let alpha = Arc::new(TrackingDriver {
        name: "alpha".to_owned(),
        probes: AtomicUsize::new(0),
        removed: Mutex::new(Vec::new()),
    });
    let beta = Arc::new(TrackingDriver {
        name: "beta".to_owned(),
        probes: AtomicUsize::new(0),
        removed: Mutex::new(Vec::new()),
    });
    transport.register_driver(alpha.clone()).unwrap();
    transport.register_driver(beta.clone()).unwrap();

    let id_a = transport.create_channel("alpha", rprocbus::ANY, 100).unwrap();
    let id_b = transport.create_channel("beta", rprocbus::ANY, 101).unwrap();

    assert_eq!(alpha.probes.load(Ordering::SeqCst), 1);
    assert_eq!(beta.probes.load(Ordering::SeqCst), 1);

    transport.detach();

    assert_eq!(transport.channel_count(), 0);
    assert_eq!(alpha.removed.lock().unwrap().as_slice(), &[id_a]);
    assert_eq!(beta.removed.lock().unwrap().as_slice(), &[id_b]);
}

#[test]
fn destroying_a_channel_twice_only_notifies_its_driver_once() {
    let config = TransportConfig { buf_num: 8, buf_size: 256, sim_base: 0, hc_channels: Vec::new() };
    let platform = LoopbackPlatform::new(config);
    let transport = Transport::attach(platform).unwrap();

    let driver = Arc::new(TrackingDriver {
        name: "gamma".to_owned(),
        probes: AtomicUsize::new(0),
        removed: Mutex::new(Vec::new()),
    });
    transport.register_driver(driver.clone()).unwrap();

    let id = transport.create_channel("gamma", rprocbus::ANY, 200).unwrap();
    transport.destroy_channel(id);
    transport.destroy_channel(id);

    assert_eq!(driver.removed.lock().unwrap().len(), 1);
}
