// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// rprocbus — a point-to-point, address-multiplexed messaging bus between a
// host processor and a remote processor sharing a region of memory.
//
// A `Transport` exchanges fixed-format datagrams with the remote processor
// through two ring-style buffer queues, using a doorbell (`kick`) for
// wakeups. Clients open named `Channel`s with a 32-bit source/destination
// address pair and receive messages through per-endpoint callbacks. A
// built-in name-service endpoint lets the remote side announce and revoke
// channels dynamically.

mod spin_lock;

pub mod error;
pub mod wire;
pub mod pool;
pub mod queue;
pub mod endpoint;
pub mod driver;
pub mod channel;
pub mod nameservice;
pub mod platform;
pub mod transport;

pub use error::{Error, Result};
pub use wire::{DatagramHeader, ANY};
pub use endpoint::{Endpoint, EndpointHandle};
pub use channel::{Channel, ChannelId};
pub use driver::ChannelDriver;
pub use platform::{LoopbackHandle, LoopbackPlatform, Platform, TransportConfig};
pub use transport::Transport;
