// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// The embedder-supplied backend surface: configuration plus the two
// queues. Generalizes the teacher's `platform/{posix,windows}.rs`
// `#[cfg(unix)]`/`#[cfg(windows)]` dispatch (one OS-selected backend
// behind a shared trait) to a runtime trait object, since here the
// "platform" is whatever shared-memory device the embedder attaches to,
// not one of two known OS families. `LoopbackPlatform` is the in-process
// stand-in used by tests and the demo binary, playing the role the
// teacher's own test doubles play for `PlatformShm`.

use std::sync::{Arc, Mutex};

use crate::pool::BufferId;
use crate::queue::{Queue, Role, SplitRingQueue};

/// A named channel to pre-populate at attach, bypassing the name-service
/// handshake. See `DESIGN.md`'s Open Question resolution: both the
/// dynamic (name-service-driven) and static forms are supported.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub dst: u32,
}

/// Attach-time configuration a platform reports, mirroring the `get(key,
/// ...)` surface described for the host-config interface: buffer count,
/// buffer size, the simulated device-view base address, and any channels
/// to create up front.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub buf_num: u32,
    pub buf_size: u32,
    pub sim_base: u64,
    pub hc_channels: Vec<ChannelSpec>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { buf_num: 4, buf_size: 512, sim_base: 0, hc_channels: Vec::new() }
    }
}

/// The backend a [`crate::transport::Transport`] attaches to: reports
/// configuration and hands over the two queues. A platform is consumed
/// once, at attach time — ownership of the queues passes to the
/// transport.
pub trait Platform {
    fn config(&self) -> TransportConfig;

    /// Take ownership of the receive queue. Panics if called more than once.
    fn take_recv_queue(&mut self) -> Box<dyn Queue>;

    /// Take ownership of the send queue. Panics if called more than once.
    fn take_send_queue(&mut self) -> Box<dyn Queue>;
}

/// A `Queue` that delegates to a shared, lock-guarded [`SplitRingQueue`],
/// so the platform that constructed the ring can keep driving its
/// remote-facing half after handing the host-facing half to the transport.
struct SharedQueue(Arc<Mutex<SplitRingQueue>>);

impl Queue for SharedQueue {
    fn role(&self) -> Role {
        self.0.lock().unwrap().role()
    }

    fn post(&mut self, id: BufferId) -> crate::error::Result<()> {
        self.0.lock().unwrap().post(id)
    }

    fn take_used(&mut self) -> Option<BufferId> {
        self.0.lock().unwrap().take_used()
    }

    fn kick(&self) {
        self.0.lock().unwrap().kick()
    }

    fn set_used_callback(&mut self, cb: Box<dyn FnMut(BufferId) + Send>) {
        self.0.lock().unwrap().set_used_callback(cb)
    }
}

/// An in-process loopback platform: the "remote" is simulated by routing
/// everything the host posts to the send queue straight back as a used
/// buffer on the same queue, reusing the buffer id and therefore its
/// contents — since host and "remote" share one address space here, the
/// posted datagram is still readable at that buffer's offset. This proves
/// the queue/endpoint/channel plumbing end to end without any real
/// shared-memory device.
pub struct LoopbackPlatform {
    config: TransportConfig,
    recv: Arc<Mutex<SplitRingQueue>>,
    send: Arc<Mutex<SplitRingQueue>>,
    recv_taken: bool,
    send_taken: bool,
}

impl LoopbackPlatform {
    pub fn new(config: TransportConfig) -> Self {
        // Each ring's capacity mirrors the pool half it backs rather than
        // the full `N`, so a capacity violation is actually reachable
        // instead of silently tolerating twice the real half-pool size.
        // The send ring gets one extra slot of headroom for the
        // name-service bring-up buffer, which lives outside the `N/2`
        // user-send budget (see `BufferPool::ns_send_id`).
        let half = config.buf_num as usize / 2;
        Self {
            config,
            recv: Arc::new(Mutex::new(SplitRingQueue::new(Role::Recv, half))),
            send: Arc::new(Mutex::new(SplitRingQueue::new(Role::Send, half + 1))),
            recv_taken: false,
            send_taken: false,
        }
    }

    /// A cheaply clonable handle onto this loopback's two rings, usable
    /// after the platform itself has been moved into [`Platform::attach`].
    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle { recv: Arc::clone(&self.recv), send: Arc::clone(&self.send) }
    }
}

/// Drives a [`LoopbackPlatform`]'s rings from outside, standing in for the
/// remote's interrupt/doorbell after the platform itself has been
/// consumed by [`Transport::attach`](crate::transport::Transport::attach).
#[derive(Clone)]
pub struct LoopbackHandle {
    recv: Arc<Mutex<SplitRingQueue>>,
    send: Arc<Mutex<SplitRingQueue>>,
}

impl LoopbackHandle {
    /// Take every buffer the host posted to the send queue and reflect it
    /// back as used, as if a remote peer consumed it and immediately
    /// acknowledged completion. Returns the ids reflected.
    pub fn pump_send(&self) -> Vec<BufferId> {
        let mut send = self.send.lock().unwrap();
        let ids = send.drain_available();
        for id in &ids {
            send.push_used(*id);
        }
        ids
    }

    /// Deliver a buffer as a used (filled) receive buffer, simulating an
    /// inbound message from the remote landing in that slot.
    pub fn deliver_recv(&self, id: BufferId) {
        self.recv.lock().unwrap().push_used(id);
    }
}

impl Platform for LoopbackPlatform {
    fn config(&self) -> TransportConfig {
        self.config.clone()
    }

    fn take_recv_queue(&mut self) -> Box<dyn Queue> {
        assert!(!self.recv_taken, "recv queue already taken");
        self.recv_taken = true;
        Box::new(SharedQueue(Arc::clone(&self.recv)))
    }

    fn take_send_queue(&mut self) -> Box<dyn Queue> {
        assert!(!self.send_taken, "send queue already taken");
        self.send_taken = true;
        Box::new(SharedQueue(Arc::clone(&self.send)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_recv_then_send_succeeds_once_each() {
        let mut platform = LoopbackPlatform::new(TransportConfig::default());
        let _recv = platform.take_recv_queue();
        let _send = platform.take_send_queue();
    }

    #[test]
    #[should_panic(expected = "recv queue already taken")]
    fn taking_recv_queue_twice_panics() {
        let mut platform = LoopbackPlatform::new(TransportConfig::default());
        let _a = platform.take_recv_queue();
        let _b = platform.take_recv_queue();
    }

    #[test]
    fn config_reports_buffer_defaults() {
        let platform = LoopbackPlatform::new(TransportConfig::default());
        let cfg = platform.config();
        assert_eq!(cfg.buf_num, 4);
        assert_eq!(cfg.buf_size, 512);
    }

    #[test]
    fn pump_send_reflects_posted_buffers_as_used() {
        let mut platform = LoopbackPlatform::new(TransportConfig::default());
        let handle = platform.handle();
        let mut send_queue = platform.take_send_queue();
        send_queue.post(BufferId(2)).unwrap();

        let reflected = handle.pump_send();
        assert_eq!(reflected, vec![BufferId(2)]);
        assert_eq!(send_queue.take_used(), Some(BufferId(2)));
    }
}
