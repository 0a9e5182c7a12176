// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Scenario: a second endpoint explicitly requesting an address already
// bound in the reserved range (< 1024) is rejected, while dynamic
// allocation never hands out an address below 1024 even once the
// reserved range is heavily populated.

use rprocbus::channel::ChannelId;
use rprocbus::platform::{LoopbackPlatform, TransportConfig};
use rprocbus::{Error, Transport, ANY};

fn attach() -> std::sync::Arc<Transport> {
    let config = TransportConfig::default();
    Transport::attach(LoopbackPlatform::new(config)).unwrap()
}

#[test]
fn explicit_reserved_address_collision_is_rejected() {
    let transport = attach();
    transport.create_endpoint(ChannelId(0), 53, Box::new(|_, _| {})).unwrap();

    let err = transport
        .create_endpoint(ChannelId(0), 53, Box::new(|_, _| {}))
        .unwrap_err();
    assert_eq!(err, Error::AddressInUse(53));
}

#[test]
fn dynamic_allocation_never_dips_into_the_reserved_range() {
    let transport = attach();
    for addr in 0..100 {
        transport.create_endpoint(ChannelId(0), addr, Box::new(|_, _| {})).unwrap();
    }

    let handle = transport.create_endpoint(ChannelId(0), ANY, Box::new(|_, _| {})).unwrap();
    assert!(handle.addr() >= 1024);
}
