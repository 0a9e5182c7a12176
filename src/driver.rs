// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 rprocbus contributors
//
// Client driver registration. Models the `{ id_table, probe, remove,
// callback }` capability record from `spec.md` §6/§9 as a trait object
// matched against channel names by exact equality, grounded on the
// teacher's `proto/service_registry.rs` (a guarded, name-keyed table with
// register/unregister/find/list).

use std::sync::{Arc, Mutex};

use crate::channel::ChannelId;
use crate::error::Result;

/// A client driver bound to channels whose name equals [`ChannelDriver::name`].
///
/// `probe`/`remove` are the lifecycle hooks of `spec.md` §4.4: `probe` runs
/// once a matching channel's primary endpoint has been created (with
/// [`ChannelDriver::on_message`] already installed as its callback), and
/// `remove` runs at teardown after that endpoint has been destroyed.
pub trait ChannelDriver: Send + Sync {
    /// The exact channel name this driver matches (the `id_table`).
    fn name(&self) -> &str;

    /// Called once a channel of this name has been created and its primary
    /// endpoint bound. Returning an error aborts the bind but does not roll
    /// back the channel itself — it stays unbound, matching `spec.md`'s
    /// silence on probe-failure recovery beyond reporting the error.
    fn probe(&self, channel: ChannelId) -> Result<()>;

    /// Called at teardown, after the channel's endpoint has been destroyed.
    fn remove(&self, channel: ChannelId);

    /// The channel's receive callback.
    fn on_message(&self, channel: ChannelId, payload: &[u8], src: u32);
}

/// Registry of client drivers, matched against channels by exact name.
pub struct DriverRegistry {
    drivers: Mutex<Vec<Arc<dyn ChannelDriver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self { drivers: Mutex::new(Vec::new()) }
    }

    pub fn register(&self, driver: Arc<dyn ChannelDriver>) -> Result<()> {
        self.drivers.lock().unwrap().push(driver);
        Ok(())
    }

    /// Unregister every driver with this name. A no-op if none match.
    pub fn unregister(&self, name: &str) {
        self.drivers.lock().unwrap().retain(|d| d.name() != name);
    }

    /// Find the first registered driver matching `name`, if any.
    pub fn find(&self, name: &str) -> Option<Arc<dyn ChannelDriver>> {
        self.drivers.lock().unwrap().iter().find(|d| d.name() == name).cloned()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
