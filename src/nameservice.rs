// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// The name-service wire message and CREATE/DESTROY dispatch. Grounded on
// the teacher's `proto/service_registry.rs` `ServiceEntry` truncate/NUL
// discipline (`copy_name`/`name_str` from `channel.rs`, reused here),
// adapted from a PID-keyed service table to the announce/revoke protocol
// `spec.md` §4.7 describes.

use crate::channel::{copy_name, name_str, MAX_NAME_LEN};

/// The well-known address the name-service endpoint is bound to. Fixed to
/// the lowest reserved address; see `DESIGN.md` for the Open Question
/// resolution.
pub const NS_ADDR: u32 = 0;

/// Bit 0 of `flags`: unset means CREATE, set means DESTROY.
pub const FLAG_DESTROY: u32 = 0x1;

/// Wire size of a name-service message: `name[32] + addr(u32) + flags(u32)`.
pub const NS_MSG_LEN: usize = MAX_NAME_LEN + 4 + 4;

/// A `{ name[32], addr, flags }` name-service announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsMessage {
    name: [u8; MAX_NAME_LEN],
    pub addr: u32,
    pub flags: u32,
}

impl NsMessage {
    pub fn create(name: &str, addr: u32) -> Self {
        Self { name: copy_name(name), addr, flags: 0 }
    }

    pub fn destroy(name: &str, addr: u32) -> Self {
        Self { name: copy_name(name), addr, flags: FLAG_DESTROY }
    }

    pub fn name_str(&self) -> &str {
        name_str(&self.name)
    }

    pub fn is_destroy(&self) -> bool {
        self.flags & FLAG_DESTROY != 0
    }

    pub fn encode(&self) -> [u8; NS_MSG_LEN] {
        let mut out = [0u8; NS_MSG_LEN];
        out[..MAX_NAME_LEN].copy_from_slice(&self.name);
        out[MAX_NAME_LEN..MAX_NAME_LEN + 4].copy_from_slice(&self.addr.to_le_bytes());
        out[MAX_NAME_LEN + 4..].copy_from_slice(&self.flags.to_le_bytes());
        out
    }

    /// Decode a name-service message. Returns `None` on a length mismatch,
    /// which `spec.md` §4.7 says must be "logged and ignored" by the caller.
    /// Any over-length or mis-terminated name the remote sends is truncated
    /// and NUL-terminated by [`copy_name`] before use — the remote is not
    /// trusted to terminate it correctly.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != NS_MSG_LEN {
            return None;
        }
        let mut name = [0u8; MAX_NAME_LEN];
        name.copy_from_slice(&buf[..MAX_NAME_LEN]);
        let name = copy_name(name_str(&name));
        let addr = u32::from_le_bytes(buf[MAX_NAME_LEN..MAX_NAME_LEN + 4].try_into().unwrap());
        let flags = u32::from_le_bytes(buf[MAX_NAME_LEN + 4..].try_into().unwrap());
        Some(Self { name, addr, flags })
    }
}

/// The handshake beacon the host sends the remote's name service at
/// bring-up so the remote knows it can start publishing its channels.
pub fn up_announcement() -> [u8; NS_MSG_LEN] {
    NsMessage { name: [0u8; MAX_NAME_LEN], addr: 0, flags: 0 }.encode()
}

/// Parse an incoming name-service payload and dispatch to `create` or
/// `destroy`. Anomalies (length mismatch) are logged and dropped, never
/// propagated, matching `spec.md` §7's receive-side error policy.
pub fn handle_message(payload: &[u8], mut create: impl FnMut(&str, u32), mut destroy: impl FnMut(&str, u32)) {
    match NsMessage::decode(payload) {
        None => {
            log::warn!(
                "name service message length mismatch: got {} bytes, want {}",
                payload.len(),
                NS_MSG_LEN
            );
        }
        Some(msg) => {
            if msg.is_destroy() {
                destroy(msg.name_str(), msg.addr);
            } else {
                create(msg.name_str(), msg.addr);
            }
        }
    }
}
