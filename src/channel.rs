// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Named logical channels bound to (src, dst) address pairs. Grounded on the
// teacher's `channel.rs` (`Route`/`Channel` connect/disconnect lifecycle)
// for the lifecycle shape, and on `proto/service_registry.rs`'s name
// storage (`copy_str`/`name_str` truncate-and-NUL-terminate discipline,
// reused verbatim here) for the fixed 32-byte name field.

use std::sync::Mutex;

use crate::endpoint::EndpointHandle;
use crate::wire::ANY;

/// Maximum channel name length on the wire, including the NUL terminator.
pub const MAX_NAME_LEN: usize = 32;

/// A unique, monotonically assigned channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub u32);

/// Truncate `name` to fit [`MAX_NAME_LEN`] bytes including a NUL terminator.
pub fn copy_name(name: &str) -> [u8; MAX_NAME_LEN] {
    let mut buf = [0u8; MAX_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Read a NUL-terminated (or NUL-padded) name back out as `&str`.
/// Invalid UTF-8 decodes to an empty string rather than panicking, since
/// the remote is not trusted to send a well-formed name (`spec.md` §4.7).
pub fn name_str(buf: &[u8; MAX_NAME_LEN]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

/// A named, client-visible logical connection owning one primary endpoint.
pub struct Channel {
    id: ChannelId,
    name: [u8; MAX_NAME_LEN],
    src: u32,
    dst: u32,
    endpoint: Option<EndpointHandle>,
}

impl Channel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        name_str(&self.name)
    }

    pub fn src(&self) -> u32 {
        self.src
    }

    pub fn dst(&self) -> u32 {
        self.dst
    }

    pub fn endpoint(&self) -> Option<EndpointHandle> {
        self.endpoint
    }

    /// Record the address actually assigned to the primary endpoint, which
    /// may differ from the `src` requested at creation if it was `ANY`.
    fn bind(&mut self, endpoint: EndpointHandle) {
        self.src = endpoint.addr();
        self.endpoint = Some(endpoint);
    }
}

/// The set of channels a transport currently owns, plus the monotonic
/// counter used to assign [`ChannelId`]s.
pub struct ChannelTable {
    channels: Mutex<Vec<Channel>>,
    next_id: Mutex<u32>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self { channels: Mutex::new(Vec::new()), next_id: Mutex::new(0) }
    }

    /// Create a channel record with no endpoint bound yet.
    pub fn create(&self, name: &str, src: u32, dst: u32) -> ChannelId {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = ChannelId(*next);
            *next += 1;
            id
        };
        self.channels.lock().unwrap().push(Channel {
            id,
            name: copy_name(name),
            src,
            dst,
            endpoint: None,
        });
        id
    }

    /// Record the endpoint bound to a channel's primary address.
    pub fn bind_endpoint(&self, id: ChannelId, endpoint: EndpointHandle) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(ch) = channels.iter_mut().find(|c| c.id == id) {
            ch.bind(endpoint);
        }
    }

    /// Remove and return a channel record by id.
    pub fn remove(&self, id: ChannelId) -> Option<Channel> {
        let mut channels = self.channels.lock().unwrap();
        let idx = channels.iter().position(|c| c.id == id)?;
        Some(channels.remove(idx))
    }

    /// Find the live channel with the given name and `dst` address — used by
    /// the name-service endpoint to resolve a DESTROY announcement.
    pub fn find_by_name_dst(&self, name: &str, dst: u32) -> Option<ChannelId> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name() == name && c.dst == dst)
            .map(|c| c.id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<ChannelId> {
        self.channels.lock().unwrap().iter().find(|c| c.name() == name).map(|c| c.id)
    }

    /// Every live channel id, for teardown iteration.
    pub fn ids(&self) -> Vec<ChannelId> {
        self.channels.lock().unwrap().iter().map(|c| c.id).collect()
    }

    pub fn snapshot(&self, id: ChannelId) -> Option<(String, u32, u32)> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .map(|c| (c.name().to_owned(), c.src, c.dst))
    }

    pub fn len(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `dst` is bound (not the `ANY` sentinel).
pub fn is_bound(addr: u32) -> bool {
    addr != ANY
}
