//! Grace-period tracker for foreign devices.
//!
//! A device is *foreign* while it is connected to the network without being
//! bound to any active code.  The first time it is seen it receives a grace
//! counter; every later tick it is still seen unbound, the counter goes down
//! by one.  When the counter hits zero the device is reported for blocking and
//! forgotten, so a device that somehow stays online starts a fresh grace
//! period on the following tick.
//!
//! ```text
//! tick:     1    2    3    4    5    6      7
//! grace:    5    4    3    2    1    0→out  5
//!                                    │
//!                              reported once
//! ```
//!
//! A device that disappears from the connected list is dropped immediately;
//! when it comes back it starts again from [`GRACE`].

use std::collections::{HashMap, HashSet};

use super::code::DeviceId;

/// Ticks a foreign device is tolerated after it is first observed.
pub const GRACE: u32 = 5;

/// Remaining grace ticks for every tracked foreign device.
#[derive(Debug, Clone)]
pub struct ForeignTracker {
    grace: u32,
    remaining: HashMap<DeviceId, u32>,
}

impl Default for ForeignTracker {
    fn default() -> Self {
        Self::new(GRACE)
    }
}

impl ForeignTracker {
    /// Creates an empty tracker that grants `grace` ticks to new devices.
    pub fn new(grace: u32) -> Self {
        Self {
            grace,
            remaining: HashMap::new(),
        }
    }

    /// Grace ticks granted to newly observed devices.
    pub fn grace(&self) -> u32 {
        self.grace
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Remaining grace for `device`, if it is tracked.
    pub fn remaining(&self, device: &DeviceId) -> Option<u32> {
        self.remaining.get(device).copied()
    }

    /// Snapshot of the table, sorted by device id.
    pub fn entries(&self) -> Vec<(DeviceId, u32)> {
        let mut entries: Vec<_> = self
            .remaining
            .iter()
            .map(|(device, &grace)| (device.clone(), grace))
            .collect();
        entries.sort();
        entries
    }

    /// Stops tracking `device`.
    pub fn forget(&mut self, device: &DeviceId) {
        self.remaining.remove(device);
    }

    /// Stops tracking every device in `bound`.
    pub fn forget_bound(&mut self, bound: &HashSet<DeviceId>) {
        self.remaining.retain(|device, _| !bound.contains(device));
    }

    /// Advances every countdown by one tick against the current set of unbound
    /// connected devices and returns the devices whose grace ran out.
    ///
    /// `unbound` must already exclude every bound device.
    pub fn observe(&mut self, unbound: &HashSet<DeviceId>) -> Vec<DeviceId> {
        // Disconnected devices lose their history.
        self.remaining.retain(|device, _| unbound.contains(device));

        // Newcomers start counting on their next tick.  A device reported
        // below is not a newcomer, so it stays out until the next call.
        let newcomers: Vec<DeviceId> = unbound
            .iter()
            .filter(|device| !self.remaining.contains_key(*device))
            .cloned()
            .collect();

        let mut expired = Vec::new();
        self.remaining.retain(|device, grace| {
            if *grace == 0 {
                return false;
            }
            *grace -= 1;
            if *grace == 0 {
                expired.push(device.clone());
                return false;
            }
            true
        });

        for device in newcomers {
            self.remaining.insert(device, self.grace);
        }

        expired.sort();
        expired
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
