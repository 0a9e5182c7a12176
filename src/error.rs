// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Crate-wide error type. Recoverable conditions (`NoBuffer`, `AddressInUse`)
// carry no state mutation on return; receive-side anomalies never surface
// through this type at all (they are logged and dropped, see `transport`).

use thiserror::Error as ThisError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the transport, endpoint table, and channel layer.
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// `src` or `dst` was the `ANY` sentinel on a send path that requires both bound.
    #[error("invalid address: src=0x{src:08x} dst=0x{dst:08x}")]
    InvalidAddress { src: u32, dst: u32 },

    /// Payload plus header would not fit in a single buffer slot.
    #[error("payload too large: {len} bytes exceeds buffer capacity {capacity}")]
    TooLarge { len: usize, capacity: usize },

    /// No free send buffer and nothing left to reclaim from the send queue.
    #[error("no free send buffer available")]
    NoBuffer,

    /// An explicit endpoint address was already occupied.
    #[error("address 0x{0:08x} already in use")]
    AddressInUse(u32),

    /// Endpoint or channel allocation failed.
    #[error("out of memory allocating endpoint or channel")]
    OutOfMemory,

    /// The underlying queue refused to accept a buffer post.
    #[error("queue fault: {0}")]
    QueueFault(String),
}
