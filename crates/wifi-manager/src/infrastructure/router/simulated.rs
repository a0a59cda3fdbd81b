//! In-memory router for headless runs and tests.
//!
//! Keeps a table of connected devices keyed by IP address.  Blocked devices
//! vanish from [`Router::connected_devices`] until [`Router::unblock_all`].
//! Snapshot failures can be injected to exercise the "unknown snapshot" path.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;
use wifi_core::DeviceId;

use crate::application::ports::{Router, RouterError};

#[derive(Debug, Default)]
struct NetworkTable {
    connected: HashMap<IpAddr, DeviceId>,
    blocked: HashSet<DeviceId>,
    fail_snapshots: bool,
    refuse_blocks: HashSet<DeviceId>,
}

/// A [`Router`] whose network is staged by the caller.
#[derive(Debug, Default)]
pub struct SimulatedRouter {
    table: Mutex<NetworkTable>,
}

impl SimulatedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Puts `device` on the network at `ip`.
    pub fn connect(&self, ip: IpAddr, device: DeviceId) {
        self.lock().connected.insert(ip, device);
    }

    /// Takes whatever device holds `ip` off the network.
    pub fn disconnect(&self, ip: IpAddr) {
        self.lock().connected.remove(&ip);
    }

    /// Devices currently blocked, sorted.
    pub fn blocked(&self) -> Vec<DeviceId> {
        let mut blocked: Vec<_> = self.lock().blocked.iter().cloned().collect();
        blocked.sort();
        blocked
    }

    /// Makes every following snapshot fail (or succeed again).
    pub fn set_snapshot_failure(&self, fail: bool) {
        self.lock().fail_snapshots = fail;
    }

    /// Makes blocking `device` fail.
    pub fn refuse_block(&self, device: DeviceId) {
        self.lock().refuse_blocks.insert(device);
    }
}

#[async_trait]
impl Router for SimulatedRouter {
    async fn connected_devices(&self) -> Result<HashSet<DeviceId>, RouterError> {
        let table = self.lock();
        if table.fail_snapshots {
            return Err(RouterError::Unreachable("simulated snapshot failure".to_string()));
        }
        Ok(table
            .connected
            .values()
            .filter(|device| !table.blocked.contains(*device))
            .cloned()
            .collect())
    }

    async fn resolve_device(&self, ip: IpAddr) -> Result<Option<DeviceId>, RouterError> {
        let table = self.lock();
        Ok(table
            .connected
            .get(&ip)
            .filter(|device| !table.blocked.contains(*device))
            .cloned())
    }

    async fn block_device(&self, device: &DeviceId) -> Result<(), RouterError> {
        let mut table = self.lock();
        if table.refuse_blocks.contains(device) {
            return Err(RouterError::Rejected {
                action: "block",
                device: device.clone(),
            });
        }
        table.blocked.insert(device.clone());
        info!("blocked {device}");
        Ok(())
    }

    async fn unblock_all(&self) -> Result<(), RouterError> {
        let mut table = self.lock();
        info!("unblocking {} device(s)", table.blocked.len());
        table.blocked.clear();
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_connected_devices_lists_staged_devices() {
        // Arrange
        let router = SimulatedRouter::new();
        router.connect(ip("192.168.1.20"), DeviceId::from("A"));
        router.connect(ip("192.168.1.21"), DeviceId::from("B"));

        // Act
        let devices = router.connected_devices().await.unwrap();

        // Assert
        assert_eq!(devices.len(), 2);
        assert!(devices.contains(&DeviceId::from("A")));
    }

    #[tokio::test]
    async fn test_blocked_device_disappears_until_unblock_all() {
        let router = SimulatedRouter::new();
        router.connect(ip("192.168.1.20"), DeviceId::from("A"));

        router.block_device(&DeviceId::from("A")).await.unwrap();
        assert!(router.connected_devices().await.unwrap().is_empty());
        assert_eq!(router.resolve_device(ip("192.168.1.20")).await.unwrap(), None);

        router.unblock_all().await.unwrap();
        assert_eq!(router.connected_devices().await.unwrap().len(), 1);
        assert!(router.blocked().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_reported() {
        let router = SimulatedRouter::new();
        router.set_snapshot_failure(true);
        assert!(matches!(
            router.connected_devices().await,
            Err(RouterError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_device_by_ip() {
        let router = SimulatedRouter::new();
        router.connect(ip("10.0.0.7"), DeviceId::from("AA:BB:CC:00:00:07"));
        assert_eq!(
            router.resolve_device(ip("10.0.0.7")).await.unwrap(),
            Some(DeviceId::from("AA:BB:CC:00:00:07"))
        );
        assert_eq!(router.resolve_device(ip("10.0.0.8")).await.unwrap(), None);
    }
}
