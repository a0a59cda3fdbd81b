//! Access-code domain entity.
//!
//! A [`Code`] is one access credential.  Any number of devices may share it,
//! and it lives for a fixed number of ticks counted down by the
//! [`CodeManager`](super::code_manager::CodeManager).

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of an access code (e.g. `"K7Q2M9XA0BZ"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeId(String);

/// Identifier of a network device, normally its hardware (MAC) address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(CodeId);
string_id!(DeviceId);

/// One access code, the devices bound to it, and its remaining lifetime.
///
/// Two `Code` values are equal when their ids are equal; the bound devices and
/// remaining ticks do not take part in the comparison.
#[derive(Debug, Clone)]
pub struct Code {
    id: CodeId,
    bound_devices: HashSet<DeviceId>,
    ttl_remaining: u32,
}

impl Code {
    /// Creates a code with no bound devices and `ttl` ticks to live.
    pub fn new(id: CodeId, ttl: u32) -> Self {
        Self {
            id,
            bound_devices: HashSet::new(),
            ttl_remaining: ttl,
        }
    }

    pub fn id(&self) -> &CodeId {
        &self.id
    }

    pub fn bound_devices(&self) -> &HashSet<DeviceId> {
        &self.bound_devices
    }

    pub fn ttl_remaining(&self) -> u32 {
        self.ttl_remaining
    }

    /// Number of devices currently using this code.
    pub fn user_count(&self) -> usize {
        self.bound_devices.len()
    }

    /// `true` once the lifetime has run out.
    pub fn is_expired(&self) -> bool {
        self.ttl_remaining == 0
    }

    /// Binds `device` to this code.  Adding a device twice is a no-op.
    pub fn add_device(&mut self, device: DeviceId) {
        if self.bound_devices.insert(device.clone()) {
            tracing::debug!("device {device} added to code {}", self.id);
        }
    }

    /// Unbinds `device` from this code.  Unknown devices are ignored.
    pub fn remove_device(&mut self, device: &DeviceId) {
        if self.bound_devices.remove(device) {
            tracing::debug!("device {device} removed from code {}", self.id);
        }
    }

    /// Advances the code by one tick.  The counter stops at zero.
    pub fn decrement(&mut self) {
        self.ttl_remaining = self.ttl_remaining.saturating_sub(1);
        tracing::trace!("code {} ttl {}", self.id, self.ttl_remaining);
    }

    /// Consumes the code and hands back its devices.
    pub fn into_devices(self) -> HashSet<DeviceId> {
        self.bound_devices
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Code {}

impl Hash for Code {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
