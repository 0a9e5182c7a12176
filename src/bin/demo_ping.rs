// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Loopback ping demo: attaches an in-process transport with no real
// shared-memory device, binds a listener at a destination address, sends
// a payload to that address, then pumps the loopback so the same buffer
// comes back through the receive path. Grounded on the teacher's
// `src/bin/demo_send_recv.rs` two-role CLI shape.

use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;

use rprocbus::channel::ChannelId;
use rprocbus::platform::{LoopbackPlatform, TransportConfig};
use rprocbus::Transport;

/// Send one datagram through a loopback rprocbus transport and print
/// whatever comes back.
#[derive(Parser)]
#[command(name = "demo_ping", version, about)]
struct Args {
    /// Local source address the datagram is sent from.
    #[arg(long, default_value_t = 2000)]
    src: u32,

    /// Destination address; this demo also binds its listener here so the
    /// loopback delivers the datagram straight back to it.
    #[arg(long, default_value_t = 60)]
    dst: u32,

    /// Payload bytes to send, as UTF-8 text.
    #[arg(long, default_value = "ping")]
    payload: String,

    /// Number of buffer slots in the pool; must be even.
    #[arg(long, default_value_t = 4)]
    buffers: u32,

    /// Bytes per buffer slot.
    #[arg(long, default_value_t = 512)]
    buf_size: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = TransportConfig {
        buf_num: args.buffers,
        buf_size: args.buf_size,
        sim_base: 0,
        hc_channels: Vec::new(),
    };

    let platform = LoopbackPlatform::new(config);
    let handle = platform.handle();
    let transport = Transport::attach(platform).expect("attach failed");

    let (tx, rx) = mpsc::channel();
    transport
        .create_endpoint(
            ChannelId(0),
            args.dst,
            Box::new(move |payload, src| {
                let text = String::from_utf8_lossy(payload).into_owned();
                let _ = tx.send((text, src));
            }),
        )
        .expect("failed to bind listener endpoint");

    log::info!("sending {:?} from 0x{:08x} to 0x{:08x}", args.payload, args.src, args.dst);
    transport
        .send_off_channel(args.src, args.dst, args.payload.as_bytes())
        .expect("send failed");

    // No real remote exists here: reflect whatever the host just posted to
    // the send queue straight into the receive queue, standing in for a
    // remote peer that consumed and echoed it.
    for id in handle.pump_send() {
        handle.deliver_recv(id);
    }

    match rx.recv_timeout(Duration::from_millis(100)) {
        Ok((text, src)) => println!("received {text:?} from 0x{src:08x}"),
        Err(_) => println!("no reply observed"),
    }

    transport.detach();
}
