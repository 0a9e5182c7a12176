// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// The buffer pool: a contiguous `N x S` byte region split into a receive
// half (lower) and a send half (upper), plus one extra slot past `N`
// reserved for the name-service bring-up announcement so that handshake
// never eats into the `N/2` send budget user traffic is sized against.
// Port of the fixed-slot accounting in the teacher's `chunk_storage.rs`
// (spin-lock-guarded free list), adapted from a release/acquire free list
// to the "never-used slots first, then reclaim from the send queue's used
// list" policy spec.md §4.1 requires — the queue's used-ring is the
// authoritative free-list here (spec.md §9), so this module tracks only
// the "not yet handed out once" watermark.

use crate::error::{Error, Result};
use crate::wire::{DatagramHeader, HEADER_LEN};

/// Identifies one buffer slot by its offset-derived index into the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u32);

/// The shared buffer region: `N` fixed-size slots of `S` bytes each, split
/// into a lower receive half and an upper send half.
pub struct BufferPool {
    data: Vec<u8>,
    buf_size: usize,
    num_buffers: usize,
    half: usize,
    sim_base: u64,
    next_unused_send: usize,
}

impl BufferPool {
    /// Create a pool of `num_buffers` slots of `buf_size` bytes each.
    /// `sim_base` is the platform-programmed base used when computing the
    /// device-view address of a slot (see `spec.md` §9, "simulated base").
    pub fn new(num_buffers: u32, buf_size: u32, sim_base: u64) -> Result<Self> {
        let num_buffers = num_buffers as usize;
        let buf_size = buf_size as usize;
        if num_buffers == 0 || num_buffers % 2 != 0 {
            return Err(Error::QueueFault(format!(
                "buffer count must be even and nonzero, got {num_buffers}"
            )));
        }
        if buf_size < HEADER_LEN + 1 {
            return Err(Error::QueueFault(format!(
                "buffer size must be at least {} bytes, got {buf_size}",
                HEADER_LEN + 1
            )));
        }
        Ok(Self {
            data: vec![0u8; (num_buffers + 1) * buf_size],
            buf_size,
            num_buffers,
            half: num_buffers / 2,
            sim_base,
            next_unused_send: num_buffers / 2,
        })
    }

    /// The dedicated slot past the `N/2`+`N/2` user halves, reserved for
    /// the name-service bring-up announcement. Never handed out by
    /// [`BufferPool::acquire_unused_send`] and never reclaimed from a
    /// queue's used list; it exists outside the ordinary acquire/reclaim
    /// rotation entirely.
    pub fn ns_send_id(&self) -> BufferId {
        BufferId(self.num_buffers as u32)
    }

    pub fn num_buffers(&self) -> usize {
        self.num_buffers
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    /// Maximum payload bytes a single datagram may carry.
    pub fn max_payload(&self) -> usize {
        self.buf_size - HEADER_LEN
    }

    /// Buffer ids making up the receive half, in order.
    pub fn recv_ids(&self) -> impl Iterator<Item = BufferId> {
        (0..self.half as u32).map(BufferId)
    }

    /// Take the next never-used send-half slot, or `None` once all `N/2`
    /// send slots have been handed out at least once. The caller is
    /// expected to fall back to reclaiming a used buffer from the send
    /// queue when this returns `None`.
    pub fn acquire_unused_send(&mut self) -> Option<BufferId> {
        if self.next_unused_send < self.num_buffers {
            let id = BufferId(self.next_unused_send as u32);
            self.next_unused_send += 1;
            Some(id)
        } else {
            None
        }
    }

    fn offset(&self, id: BufferId) -> usize {
        id.0 as usize * self.buf_size
    }

    /// Device-view address of a slot, for programming queue descriptors.
    pub fn device_addr(&self, id: BufferId) -> u64 {
        self.sim_base + self.offset(id) as u64
    }

    /// Encode a header and payload into the given slot.
    pub fn write(&mut self, id: BufferId, header: DatagramHeader, payload: &[u8]) -> Result<()> {
        if HEADER_LEN + payload.len() > self.buf_size {
            return Err(Error::TooLarge { len: payload.len(), capacity: self.max_payload() });
        }
        let off = self.offset(id);
        let slot = &mut self.data[off..off + self.buf_size];
        slot[..HEADER_LEN].copy_from_slice(&header.to_bytes());
        slot[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
        Ok(())
    }

    /// Decode the header and payload currently stored in a slot.
    pub fn read(&self, id: BufferId) -> (DatagramHeader, &[u8]) {
        let off = self.offset(id);
        let slot = &self.data[off..off + self.buf_size];
        let header = DatagramHeader::from_bytes(&slot[..HEADER_LEN]).expect("slot holds a header");
        let len = header.len as usize;
        (header, &slot[HEADER_LEN..HEADER_LEN + len])
    }
}
