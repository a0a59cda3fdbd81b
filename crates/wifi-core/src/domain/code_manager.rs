//! CodeManager: the access-code TTL and eviction state machine.
//!
//! The manager owns every active [`Code`], the bookkeeping that says which
//! device uses which code, and the [`ForeignTracker`].  All of it lives in a
//! single [`ManagerState`] behind one `std::sync::Mutex`, so a `tick` can
//! never observe a half-applied `bind`.
//!
//! # Tick lifecycle (for beginners)
//!
//! ```text
//! age codes ──► drop expired ──► notify expiry ──► protect bound devices
//!                                                         │
//!                              snapshot unknown? ── yes ──┴──► NoSnapshot
//!                                      │ no
//!                                      ▼
//!                    count down foreign devices ──► Block(list)
//! ```
//!
//! The expiry callback is invoked after the lock has been released, with
//! exactly the codes that expired during that tick.
//!
//! # Sharing
//!
//! Every operation takes `&self`, so the usual setup is one
//! `Arc<CodeManager>` shared by the tick driver and the registration workers.
//! None of the operations suspend; the lock is held only for in-memory work.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::code::{Code, CodeId, DeviceId};
use super::foreign::{ForeignTracker, GRACE};

/// Receives the ids of codes that expired during a tick.
pub type ExpiryCallback = Box<dyn Fn(&[CodeId]) + Send + Sync>;

/// The router's view of connected devices for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSnapshot {
    /// The devices currently on the network.
    Known(HashSet<DeviceId>),
    /// The device list could not be fetched this cycle.
    Unknown,
}

impl From<Option<HashSet<DeviceId>>> for DeviceSnapshot {
    fn from(devices: Option<HashSet<DeviceId>>) -> Self {
        devices.map_or(DeviceSnapshot::Unknown, DeviceSnapshot::Known)
    }
}

/// Result of a [`CodeManager::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Foreign tracking was skipped because the snapshot was unknown.
    NoSnapshot,
    /// Devices whose grace period ran out this tick.  Often empty.
    Block(Vec<DeviceId>),
}

impl TickOutcome {
    /// Devices to block, empty when no snapshot was available.
    pub fn devices_to_block(&self) -> &[DeviceId] {
        match self {
            TickOutcome::NoSnapshot => &[],
            TickOutcome::Block(devices) => devices,
        }
    }
}

/// Status of one code as reported by [`CodeManager::query`].
///
/// A code that is not active reports zero users and `ttl_remaining: None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeInfo {
    pub user_count: usize,
    pub ttl_remaining: Option<u32>,
}

impl CodeInfo {
    /// The pair returned for unknown or expired codes.
    pub const ABSENT: CodeInfo = CodeInfo {
        user_count: 0,
        ttl_remaining: None,
    };

    pub fn is_absent(&self) -> bool {
        self.ttl_remaining.is_none()
    }
}

/// One row of [`CodeManager::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSummary {
    pub id: CodeId,
    pub user_count: usize,
    pub ttl_remaining: u32,
}

/// Everything guarded by the manager lock.
#[derive(Debug, Default)]
struct ManagerState {
    active_codes: HashMap<CodeId, Code>,
    bound_devices: HashSet<DeviceId>,
    device_to_code: HashMap<DeviceId, CodeId>,
    foreign: ForeignTracker,
}

impl ManagerState {
    /// Drops every binding held by `code`.
    fn release(&mut self, code: Code) {
        let id = code.id().clone();
        for device in code.into_devices() {
            self.bound_devices.remove(&device);
            if self.device_to_code.get(&device) == Some(&id) {
                self.device_to_code.remove(&device);
            }
        }
    }
}

/// Owns all access codes, device bindings, and foreign-device grace timers.
pub struct CodeManager {
    state: Mutex<ManagerState>,
    on_expired: Option<ExpiryCallback>,
}

impl fmt::Debug for CodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeManager")
            .field("state", &self.state)
            .field("on_expired", &self.on_expired.is_some())
            .finish()
    }
}

impl Default for CodeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeManager {
    /// Creates a manager with the default grace period and no expiry callback.
    pub fn new() -> Self {
        Self::build(GRACE, None)
    }

    /// Creates a manager that reports expired codes to `on_expired`.
    pub fn with_callback<F>(on_expired: F) -> Self
    where
        F: Fn(&[CodeId]) + Send + Sync + 'static,
    {
        Self::build(GRACE, Some(Box::new(on_expired)))
    }

    /// Creates a manager with a custom foreign-device grace period.
    pub fn with_grace(grace: u32, on_expired: Option<ExpiryCallback>) -> Self {
        Self::build(grace, on_expired)
    }

    fn build(grace: u32, on_expired: Option<ExpiryCallback>) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                foreign: ForeignTracker::new(grace),
                ..ManagerState::default()
            }),
            on_expired,
        }
    }

    // Every operation leaves the state consistent before it could panic, so a
    // poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `device` to `code`, creating the code with `duration` ticks if it
    /// is not active yet.
    ///
    /// A device bound elsewhere moves to `code`.  Rebinding never extends the
    /// lifetime of an existing code.
    pub fn bind(&self, code: CodeId, device: DeviceId, duration: u32) {
        let mut state = self.lock();
        let state = &mut *state;

        if let Some(old) = state.device_to_code.get(&device) {
            if *old != code {
                if let Some(old_code) = state.active_codes.get_mut(old) {
                    old_code.remove_device(&device);
                }
            }
        }

        match state.active_codes.get_mut(&code) {
            Some(existing) => existing.add_device(device.clone()),
            None => {
                let mut created = Code::new(code.clone(), duration);
                created.add_device(device.clone());
                info!("code {code} activated for {duration} ticks");
                state.active_codes.insert(code.clone(), created);
            }
        }

        state.foreign.forget(&device);
        state.bound_devices.insert(device.clone());
        state.device_to_code.insert(device, code);
    }

    /// Advances every code and foreign-device timer by one interval.
    ///
    /// Returns the devices that must be blocked now, or
    /// [`TickOutcome::NoSnapshot`] when `connected` is
    /// [`DeviceSnapshot::Unknown`].  Code aging happens either way.
    pub fn tick(&self, connected: DeviceSnapshot) -> TickOutcome {
        let (expired, outcome) = {
            let mut state = self.lock();
            let state = &mut *state;

            for code in state.active_codes.values_mut() {
                code.decrement();
            }
            let mut expired: Vec<CodeId> = state
                .active_codes
                .values()
                .filter(|code| code.is_expired())
                .map(|code| code.id().clone())
                .collect();
            expired.sort();
            for id in &expired {
                if let Some(code) = state.active_codes.remove(id) {
                    state.release(code);
                }
            }
            debug!(
                "codes: {} bound devices: {}",
                state.active_codes.len(),
                state.bound_devices.len()
            );

            state.foreign.forget_bound(&state.bound_devices);

            let outcome = match connected {
                DeviceSnapshot::Unknown => {
                    debug!("no connected-device snapshot this tick");
                    TickOutcome::NoSnapshot
                }
                DeviceSnapshot::Known(mut devices) => {
                    devices.retain(|device| !state.bound_devices.contains(device));
                    TickOutcome::Block(state.foreign.observe(&devices))
                }
            };
            debug!("foreign devices tracked: {}", state.foreign.len());

            (expired, outcome)
        };

        if !expired.is_empty() {
            info!("{} code(s) expired", expired.len());
            if let Some(on_expired) = &self.on_expired {
                on_expired(&expired);
            }
        }

        outcome
    }

    /// Removes `code` and all its bindings.  Unknown codes are ignored.
    pub fn delete(&self, code: &CodeId) {
        let mut state = self.lock();
        if let Some(removed) = state.active_codes.remove(code) {
            info!("code {code} deleted with {} device(s)", removed.user_count());
            state.release(removed);
        }
    }

    /// Returns the user count and remaining ticks of `code`.
    pub fn query(&self, code: &CodeId) -> CodeInfo {
        self.lock()
            .active_codes
            .get(code)
            .map_or(CodeInfo::ABSENT, |c| CodeInfo {
                user_count: c.user_count(),
                ttl_remaining: Some(c.ttl_remaining()),
            })
    }

    /// All active codes, sorted by id.
    pub fn snapshot(&self) -> Vec<CodeSummary> {
        let state = self.lock();
        let mut rows: Vec<CodeSummary> = state
            .active_codes
            .values()
            .map(|c| CodeSummary {
                id: c.id().clone(),
                user_count: c.user_count(),
                ttl_remaining: c.ttl_remaining(),
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    /// The code `device` is currently bound to.
    pub fn code_for_device(&self, device: &DeviceId) -> Option<CodeId> {
        self.lock().device_to_code.get(device).cloned()
    }

    /// Whether `device` is bound to any active code.
    pub fn is_bound(&self, device: &DeviceId) -> bool {
        self.lock().bound_devices.contains(device)
    }

    /// Foreign devices and their remaining grace, sorted by device id.
    pub fn foreign_devices(&self) -> Vec<(DeviceId, u32)> {
        self.lock().foreign.entries()
    }

    /// Checks the internal bookkeeping invariants.
    ///
    /// Intended for tests and debug assertions in callers.
    pub fn is_consistent(&self) -> bool {
        let state = self.lock();
        let union: HashSet<&DeviceId> = state
            .active_codes
            .values()
            .flat_map(|c| c.bound_devices().iter())
            .collect();
        let union_matches = union.len() == state.bound_devices.len()
            && state.bound_devices.iter().all(|d| union.contains(d));
        let keys_match = state.active_codes.iter().all(|(id, c)| c.id() == id);
        let bindings_match = state.device_to_code.iter().all(|(device, id)| {
            state
                .active_codes
                .get(id)
                .map_or(true, |c| c.bound_devices().contains(device))
        });
        let single_owner = state.bound_devices.iter().all(|device| {
            state
                .active_codes
                .values()
                .filter(|c| c.bound_devices().contains(device))
                .count()
                == 1
        });
        let disjoint = state
            .foreign
            .entries()
            .iter()
            .all(|(device, _)| !state.bound_devices.contains(device));

        union_matches && keys_match && bindings_match && single_owner && disjoint
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn code(s: &str) -> CodeId {
        CodeId::from(s)
    }

    fn dev(s: &str) -> DeviceId {
        DeviceId::from(s)
    }

    fn known(devices: &[&str]) -> DeviceSnapshot {
        DeviceSnapshot::Known(devices.iter().map(|d| dev(d)).collect())
    }

    #[test]
    fn test_binding_a_tracked_device_stops_its_grace_countdown() {
        // Arrange
        let manager = CodeManager::new();
        manager.tick(known(&["D1", "D2"]));
        assert_eq!(manager.foreign_devices().len(), 2);

        // Act
        manager.bind(code("C1"), dev("D1"), 10);

        // Assert
        assert_eq!(manager.foreign_devices(), vec![(dev("D2"), GRACE)]);
        assert!(manager.is_consistent());
    }

    fn recording_manager() -> (CodeManager, Arc<StdMutex<Vec<Vec<CodeId>>>>) {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let manager = CodeManager::with_callback(move |expired| {
            sink.lock().unwrap().push(expired.to_vec());
        });
        (manager, calls)
    }

    #[test]
    fn test_bind_creates_code_with_duration() {
        // Arrange
        let manager = CodeManager::new();

        // Act
        manager.bind(code("AAAAAAAAAAA"), dev("11:22:33:44:55:66"), 3);

        // Assert
        let info = manager.query(&code("AAAAAAAAAAA"));
        assert_eq!(info.user_count, 1);
        assert_eq!(info.ttl_remaining, Some(3));
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_rebind_to_existing_code_does_not_extend_ttl() {
        let manager = CodeManager::new();
        manager.bind(code("C1"), dev("D1"), 10);
        manager.tick(known(&[]));
        manager.bind(code("C1"), dev("D2"), 60);

        let info = manager.query(&code("C1"));
        assert_eq!(info.user_count, 2);
        assert_eq!(info.ttl_remaining, Some(9));
    }

    #[test]
    fn test_bind_moves_device_between_codes() {
        // Arrange
        let manager = CodeManager::new();
        manager.bind(code("C1"), dev("D1"), 10);

        // Act
        manager.bind(code("C2"), dev("D1"), 10);

        // Assert
        assert_eq!(manager.query(&code("C1")).user_count, 0);
        assert_eq!(manager.query(&code("C2")).user_count, 1);
        assert_eq!(manager.code_for_device(&dev("D1")), Some(code("C2")));
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_rebinding_same_pair_is_idempotent() {
        let manager = CodeManager::new();
        manager.bind(code("C1"), dev("D1"), 10);
        manager.bind(code("C1"), dev("D1"), 10);
        assert_eq!(manager.query(&code("C1")).user_count, 1);
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_code_expires_after_duration_scenario() {
        // Arrange
        let (manager, calls) = recording_manager();
        manager.bind(code("AAAAAAAAAAA"), dev("11:22:33:44:55:66"), 3);

        // Act / Assert
        manager.tick(known(&[]));
        assert_eq!(manager.query(&code("AAAAAAAAAAA")).ttl_remaining, Some(2));
        assert!(calls.lock().unwrap().is_empty());

        manager.tick(known(&[]));
        assert_eq!(manager.query(&code("AAAAAAAAAAA")).ttl_remaining, Some(1));
        assert!(calls.lock().unwrap().is_empty());

        manager.tick(known(&[]));
        assert_eq!(*calls.lock().unwrap(), vec![vec![code("AAAAAAAAAAA")]]);
        assert!(manager.query(&code("AAAAAAAAAAA")).is_absent());
        assert!(!manager.is_bound(&dev("11:22:33:44:55:66")));
        assert_eq!(manager.code_for_device(&dev("11:22:33:44:55:66")), None);
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_expiry_callback_fires_once_per_tick_with_all_expired_codes() {
        let (manager, calls) = recording_manager();
        manager.bind(code("C1"), dev("D1"), 1);
        manager.bind(code("C2"), dev("D2"), 1);
        manager.bind(code("C3"), dev("D3"), 2);

        manager.tick(DeviceSnapshot::Unknown);
        manager.tick(DeviceSnapshot::Unknown);
        manager.tick(DeviceSnapshot::Unknown);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec![code("C1"), code("C2")]);
        assert_eq!(calls[1], vec![code("C3")]);
    }

    #[test]
    fn test_expired_code_id_can_be_reused() {
        let manager = CodeManager::new();
        manager.bind(code("C1"), dev("D1"), 1);
        manager.tick(known(&[]));
        manager.bind(code("C1"), dev("D2"), 4);

        let info = manager.query(&code("C1"));
        assert_eq!(info.user_count, 1);
        assert_eq!(info.ttl_remaining, Some(4));
    }

    #[test]
    fn test_bound_device_never_tracked_as_foreign() {
        // Arrange: device is already on the network and being counted down.
        let manager = CodeManager::new();
        manager.tick(known(&["D1"]));
        manager.tick(known(&["D1"]));
        assert_eq!(manager.foreign_devices().len(), 1);

        // Act
        manager.bind(code("C1"), dev("D1"), 10);
        let outcome = manager.tick(known(&["D1"]));

        // Assert
        assert_eq!(outcome, TickOutcome::Block(vec![]));
        assert!(manager.foreign_devices().is_empty());
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_foreign_device_reported_on_sixth_tick_only() {
        let manager = CodeManager::new();
        for call in 1..=5 {
            let outcome = manager.tick(known(&["DE:AD:BE:EF:00:01"]));
            assert_eq!(outcome, TickOutcome::Block(vec![]), "call {call}");
        }
        let outcome = manager.tick(known(&["DE:AD:BE:EF:00:01"]));
        assert_eq!(outcome, TickOutcome::Block(vec![dev("DE:AD:BE:EF:00:01")]));
    }

    #[test]
    fn test_reconnected_device_restarts_grace() {
        // Arrange
        let manager = CodeManager::new();
        for _ in 0..3 {
            manager.tick(known(&["D9"]));
        }

        // Act: gone on tick 4, back on tick 5
        manager.tick(known(&[]));
        manager.tick(known(&["D9"]));

        // Assert
        assert_eq!(manager.foreign_devices(), vec![(dev("D9"), GRACE)]);
    }

    #[test]
    fn test_unknown_snapshot_ages_codes_but_keeps_grace_timers() {
        let (manager, calls) = recording_manager();
        manager.bind(code("C1"), dev("D1"), 1);
        manager.tick(known(&["F1"]));
        let before = manager.foreign_devices();

        let outcome = manager.tick(DeviceSnapshot::Unknown);

        assert_eq!(outcome, TickOutcome::NoSnapshot);
        assert!(outcome.devices_to_block().is_empty());
        assert_eq!(manager.foreign_devices(), before);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_device_from_expired_code_becomes_foreign() {
        let manager = CodeManager::new();
        manager.bind(code("C1"), dev("D1"), 1);

        manager.tick(known(&["D1"]));

        assert_eq!(manager.foreign_devices(), vec![(dev("D1"), GRACE)]);
    }

    #[test]
    fn test_delete_releases_devices_and_is_idempotent() {
        // Arrange
        let manager = CodeManager::new();
        manager.bind(code("C1"), dev("D1"), 10);
        manager.bind(code("C1"), dev("D2"), 10);
        manager.bind(code("C2"), dev("D3"), 10);

        // Act
        manager.delete(&code("C1"));
        let once = manager.snapshot();
        manager.delete(&code("C1"));

        // Assert
        assert_eq!(manager.snapshot(), once);
        assert!(manager.query(&code("C1")).is_absent());
        assert!(!manager.is_bound(&dev("D1")));
        assert!(manager.is_bound(&dev("D3")));
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_delete_unknown_code_is_noop() {
        let manager = CodeManager::new();
        manager.delete(&code("NOPE"));
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn test_query_unknown_code_returns_absent_marker() {
        let manager = CodeManager::new();
        assert_eq!(manager.query(&code("MISSING")), CodeInfo::ABSENT);
    }

    #[test]
    fn test_snapshot_is_sorted_by_id() {
        let manager = CodeManager::new();
        manager.bind(code("ZZZ"), dev("D1"), 5);
        manager.bind(code("AAA"), dev("D2"), 7);

        let ids: Vec<_> = manager.snapshot().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![code("AAA"), code("ZZZ")]);
    }

    #[test]
    fn test_custom_grace_applies_to_new_devices() {
        let manager = CodeManager::with_grace(2, None);
        assert!(manager.tick(known(&["F"])).devices_to_block().is_empty());
        assert!(manager.tick(known(&["F"])).devices_to_block().is_empty());
        assert_eq!(manager.tick(known(&["F"])).devices_to_block(), &[dev("F")]);
    }

    #[test]
    fn test_snapshot_from_option() {
        assert_eq!(DeviceSnapshot::from(None), DeviceSnapshot::Unknown);
        assert_eq!(
            DeviceSnapshot::from(Some(HashSet::new())),
            DeviceSnapshot::Known(HashSet::new())
        );
    }
}
