//! RegisterDeviceUseCase: turns a redeemed code into a device binding.
//!
//! The registration page only knows the guest's IP address.  This use case
//! asks the router which hardware address holds that IP, binds that device to
//! the code in the [`CodeManager`], and records the registration in the store
//! so it survives a restart.
//!
//! Registrations arrive on a channel and are handled by a small pool of
//! concurrent workers ([`RegisterDeviceUseCase::spawn_workers`]), because router
//! lookups are slow and one stuck lookup must not hold up everyone else.

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use wifi_core::{CodeId, CodeManager, DeviceId};

use super::ports::{CodeStore, Router, RouterError, StoreError};

/// Error type for the register-device use case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("router lookup failed: {0}")]
    Router(#[from] RouterError),
    #[error("registration not recorded: {0}")]
    Store(#[from] StoreError),
}

/// A guest redeemed `code` from `ip`; the code is valid for `duration` ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub ip: IpAddr,
    pub code: CodeId,
    pub duration: u32,
}

pub struct RegisterDeviceUseCase {
    router: Arc<dyn Router>,
    manager: Arc<CodeManager>,
    store: Arc<dyn CodeStore>,
}

impl RegisterDeviceUseCase {
    pub fn new(
        router: Arc<dyn Router>,
        manager: Arc<CodeManager>,
        store: Arc<dyn CodeStore>,
    ) -> Self {
        Self {
            router,
            manager,
            store,
        }
    }

    /// Handles one registration.
    ///
    /// Returns the bound device, or `None` when no device currently holds the
    /// requesting IP (the guest left before the lookup finished).
    ///
    /// # Errors
    ///
    /// [`RegisterError::Router`] if the lookup fails.  [`RegisterError::Store`]
    /// if the code is not (or no longer) in the store; nothing is bound in
    /// either case.
    pub async fn handle(
        &self,
        request: RegistrationRequest,
    ) -> Result<Option<DeviceId>, RegisterError> {
        let Some(device) = self.router.resolve_device(request.ip).await? else {
            warn!("no device found at {} for code {}", request.ip, request.code);
            return Ok(None);
        };

        // A code purged while the request was queued must not come back.
        self.store.mark_used(&request.code)?;

        self.manager
            .bind(request.code.clone(), device.clone(), request.duration);
        info!(
            "registered {device} at {} with code {}",
            request.ip, request.code
        );

        self.store
            .record_registration(request.ip, &request.code, &device)?;
        Ok(Some(device))
    }

    /// Drains `requests` with at most `workers` registrations in flight.
    ///
    /// The returned task finishes once the sending side is dropped and every
    /// in-flight registration has completed.
    pub fn spawn_workers(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<RegistrationRequest>,
        workers: usize,
    ) -> JoinHandle<()> {
        let permits = Arc::new(Semaphore::new(workers.max(1)));
        tokio::spawn(async move {
            let mut in_flight = Vec::new();
            while let Some(request) = requests.recv().await {
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };
                let use_case = Arc::clone(&self);
                in_flight.retain(|task: &JoinHandle<()>| !task.is_finished());
                in_flight.push(tokio::spawn(async move {
                    let _permit = permit;
                    let ip = request.ip;
                    if let Err(e) = use_case.handle(request).await {
                        error!("registration from {ip} failed: {e}");
                    }
                }));
            }
            for task in in_flight {
                if let Err(e) = task.await {
                    error!("registration worker panicked: {e}");
                }
            }
            info!("registration queue closed");
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockRouter;
    use crate::infrastructure::storage::memory::MemoryCodeStore;
    use mockall::predicate::eq;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn request(ip_str: &str, code: &str) -> RegistrationRequest {
        RegistrationRequest {
            ip: ip(ip_str),
            code: CodeId::from(code),
            duration: 30,
        }
    }

    fn use_case(router: MockRouter) -> (RegisterDeviceUseCase, Arc<CodeManager>, Arc<MemoryCodeStore>) {
        let manager = Arc::new(CodeManager::new());
        let store = Arc::new(MemoryCodeStore::new());
        let uc = RegisterDeviceUseCase::new(Arc::new(router), manager.clone(), store.clone());
        (uc, manager, store)
    }

    #[tokio::test]
    async fn test_handle_binds_resolved_device() {
        // Arrange
        let mut router = MockRouter::new();
        router
            .expect_resolve_device()
            .with(eq(ip("192.168.1.50")))
            .times(1)
            .returning(|_| Ok(Some(DeviceId::from("AA:BB:CC:DD:EE:01"))));
        let (uc, manager, store) = use_case(router);
        store.add_code(&CodeId::from("GUESTCODE01"), 30).unwrap();

        // Act
        let bound = uc.handle(request("192.168.1.50", "GUESTCODE01")).await.unwrap();

        // Assert
        assert_eq!(bound, Some(DeviceId::from("AA:BB:CC:DD:EE:01")));
        let info = manager.query(&CodeId::from("GUESTCODE01"));
        assert_eq!((info.user_count, info.ttl_remaining), (1, Some(30)));
        assert!(store.all_codes().unwrap()[0].used);
        assert_eq!(store.registrations().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_unresolved_ip_binds_nothing() {
        let mut router = MockRouter::new();
        router.expect_resolve_device().returning(|_| Ok(None));
        let (uc, manager, store) = use_case(router);

        let bound = uc.handle(request("192.168.1.51", "GUESTCODE01")).await.unwrap();

        assert_eq!(bound, None);
        assert!(manager.snapshot().is_empty());
        assert!(store.registrations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_router_failure_is_reported() {
        let mut router = MockRouter::new();
        router
            .expect_resolve_device()
            .returning(|_| Err(RouterError::Unreachable("timeout".to_string())));
        let (uc, manager, _store) = use_case(router);

        let result = uc.handle(request("192.168.1.52", "GUESTCODE01")).await;

        assert!(matches!(result, Err(RegisterError::Router(_))));
        assert!(manager.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_handle_unknown_code_binds_nothing() {
        let mut router = MockRouter::new();
        router
            .expect_resolve_device()
            .returning(|_| Ok(Some(DeviceId::from("D1"))));
        let (uc, manager, _store) = use_case(router);

        let result = uc.handle(request("192.168.1.53", "NOTINSTORE0")).await;

        assert_eq!(
            result,
            Err(RegisterError::Store(StoreError::UnknownCode(CodeId::from(
                "NOTINSTORE0"
            ))))
        );
        assert!(!manager.is_bound(&DeviceId::from("D1")));
        assert!(manager.query(&CodeId::from("NOTINSTORE0")).is_absent());
    }

    #[tokio::test]
    async fn test_handle_after_expiry_purge_does_not_revive_code() {
        // Arrange: the code expired and was purged while the request waited.
        let mut router = MockRouter::new();
        router
            .expect_resolve_device()
            .returning(|_| Ok(Some(DeviceId::from("LATE:DEVICE"))));
        let (uc, manager, store) = use_case(router);
        let code = CodeId::from("EXPIRED0000");
        store.add_code(&code, 1).unwrap();
        manager.bind(code.clone(), DeviceId::from("EARLY:DEVICE"), 1);
        manager.tick(wifi_core::DeviceSnapshot::Unknown);
        store.delete_codes(std::slice::from_ref(&code)).unwrap();

        // Act
        let result = uc.handle(request("192.168.1.54", "EXPIRED0000")).await;

        // Assert
        assert!(matches!(
            result,
            Err(RegisterError::Store(StoreError::UnknownCode(_)))
        ));
        assert!(manager.query(&code).is_absent());
        assert!(!manager.is_bound(&DeviceId::from("LATE:DEVICE")));
        assert!(store.all_codes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_workers_process_every_queued_request() {
        // Arrange
        let mut router = MockRouter::new();
        router
            .expect_resolve_device()
            .times(6)
            .returning(|ip| Ok(Some(DeviceId::from(format!("dev-{ip}")))));
        let (uc, manager, store) = use_case(router);
        let code = CodeId::from("SHAREDCODE0");
        store.add_code(&code, 30).unwrap();
        let (tx, rx) = mpsc::channel(16);
        let workers = Arc::new(uc).spawn_workers(rx, 2);

        // Act
        for host in 1..=6 {
            tx.send(request(&format!("10.0.0.{host}"), "SHAREDCODE0"))
                .await
                .unwrap();
        }
        drop(tx);
        workers.await.unwrap();

        // Assert
        assert_eq!(manager.query(&code).user_count, 6);
        assert_eq!(store.registrations().unwrap().len(), 6);
        assert!(manager.is_consistent());
    }
}
