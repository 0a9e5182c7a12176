// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// The queue transport: two ring-style queues wrapping the buffer pool
// halves, each with a descriptor/used split and a doorbell. Generalizes
// the teacher's `proto::shm_ring::ShmRing<T, N>` lock-free SPSC ring
// (index cursors, compile-time `N`, `Copy` payload) to a runtime-sized
// ring of `BufferId`s, since `spec.md` §6 makes `N`/`S` attach-time
// configuration rather than compile-time constants.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::pool::BufferId;

/// Which half of the buffer pool a queue is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Host pre-posts buffers; the remote fills them and signals.
    Recv,
    /// Host places filled buffers; the remote drains and signals completion.
    Send,
}

/// A ring-style descriptor/used queue with an outbound doorbell.
///
/// `post`/`take_used`/`kick` are the host-facing API described in
/// `spec.md` §4.2 and §6. `drain_available`/`push_used` are the
/// remote-facing half, driven by whatever [`crate::platform::Platform`]
/// stands in for the remote processor.
pub trait Queue: Send {
    fn role(&self) -> Role;

    /// Post a buffer the host owns into the ring for the remote to consume.
    fn post(&mut self, id: BufferId) -> Result<()>;

    /// Take one buffer the remote has finished with, if any is available.
    fn take_used(&mut self) -> Option<BufferId>;

    /// Ring the outbound doorbell, telling the remote new descriptors exist.
    fn kick(&self);

    /// Register the callback fired when the remote returns a used buffer
    /// (the inbound "used" notification / interrupt).
    fn set_used_callback(&mut self, cb: Box<dyn FnMut(BufferId) + Send>);
}

/// A single-producer/single-consumer split ring: descriptors posted by the
/// host land in `available`; the simulated remote drains `available` and
/// pushes finished buffers into `used`, which the host drains via
/// `take_used`.
pub struct SplitRingQueue {
    role: Role,
    capacity: usize,
    available: VecDeque<BufferId>,
    used: VecDeque<BufferId>,
    on_used: Option<Box<dyn FnMut(BufferId) + Send>>,
    kick: Option<Box<dyn Fn() + Send + Sync>>,
}

impl SplitRingQueue {
    pub fn new(role: Role, capacity: usize) -> Self {
        Self {
            role,
            capacity,
            available: VecDeque::with_capacity(capacity),
            used: VecDeque::new(),
            on_used: None,
            kick: None,
        }
    }

    /// Wire up the outbound doorbell. Called once by the platform at attach.
    pub fn set_kick(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.kick = Some(Box::new(f));
    }

    /// Remote-facing: take everything the host has posted since the last
    /// drain, in submission order.
    pub fn drain_available(&mut self) -> Vec<BufferId> {
        self.available.drain(..).collect()
    }

    /// Remote-facing: the remote is done with `id`; make it visible to the
    /// host via `take_used` and fire the inbound notification.
    pub fn push_used(&mut self, id: BufferId) {
        self.used.push_back(id);
        if let Some(cb) = self.on_used.as_mut() {
            cb(id);
        }
    }

    pub fn is_empty_available(&self) -> bool {
        self.available.is_empty()
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }
}

impl Queue for SplitRingQueue {
    fn role(&self) -> Role {
        self.role
    }

    fn post(&mut self, id: BufferId) -> Result<()> {
        if self.available.len() >= self.capacity {
            return Err(Error::QueueFault(format!(
                "{:?} queue full at capacity {}",
                self.role, self.capacity
            )));
        }
        self.available.push_back(id);
        Ok(())
    }

    fn take_used(&mut self) -> Option<BufferId> {
        self.used.pop_front()
    }

    fn kick(&self) {
        if let Some(k) = &self.kick {
            k();
        }
    }

    fn set_used_callback(&mut self, cb: Box<dyn FnMut(BufferId) + Send>) {
        self.on_used = Some(cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_then_drain_preserves_order() {
        let mut q = SplitRingQueue::new(Role::Send, 4);
        q.post(BufferId(0)).unwrap();
        q.post(BufferId(1)).unwrap();
        assert_eq!(q.drain_available(), vec![BufferId(0), BufferId(1)]);
    }

    #[test]
    fn post_beyond_capacity_is_queue_fault() {
        let mut q = SplitRingQueue::new(Role::Send, 1);
        q.post(BufferId(0)).unwrap();
        assert!(matches!(q.post(BufferId(1)), Err(Error::QueueFault(_))));
    }

    #[test]
    fn push_used_then_take_used_fifo() {
        let mut q = SplitRingQueue::new(Role::Recv, 4);
        q.push_used(BufferId(2));
        q.push_used(BufferId(3));
        assert_eq!(q.take_used(), Some(BufferId(2)));
        assert_eq!(q.take_used(), Some(BufferId(3)));
        assert_eq!(q.take_used(), None);
    }

    #[test]
    fn used_callback_fires_on_push() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = Arc::clone(&seen);
        let mut q = SplitRingQueue::new(Role::Recv, 4);
        q.set_used_callback(Box::new(move |id| seen2.store(id.0, Ordering::SeqCst)));
        q.push_used(BufferId(7));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
