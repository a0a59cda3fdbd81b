//! Ports: the traits through which use cases reach the outside world.
//!
//! The production router adapter drives a vendor web console and the
//! production store is a relational database; both live outside this
//! repository.  The infrastructure layer ships in-memory implementations
//! ([`SimulatedRouter`](crate::infrastructure::router::simulated::SimulatedRouter),
//! [`MemoryCodeStore`](crate::infrastructure::storage::memory::MemoryCodeStore))
//! used by tests and by the headless binary.

use std::collections::HashSet;
use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;
use wifi_core::{CodeId, DeviceId};

/// Error type for router operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    /// The router could not be reached or its session expired.
    #[error("router unreachable: {0}")]
    Unreachable(String),

    /// The router refused the requested change.
    #[error("router rejected {action} for {device}")]
    Rejected { action: &'static str, device: DeviceId },
}

/// The network equipment that sees and blocks devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Router: Send + Sync {
    /// Hardware addresses of every device currently connected.
    async fn connected_devices(&self) -> Result<HashSet<DeviceId>, RouterError>;

    /// Hardware address of the connected device using `ip`, if any.
    async fn resolve_device(&self, ip: IpAddr) -> Result<Option<DeviceId>, RouterError>;

    /// Removes `device` from the network.
    async fn block_device(&self, device: &DeviceId) -> Result<(), RouterError>;

    /// Lifts every block.
    async fn unblock_all(&self) -> Result<(), RouterError>;
}

/// Error type for code store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The code was never issued.
    #[error("unknown code: {0}")]
    UnknownCode(CodeId),

    /// The backing storage failed.
    #[error("code store failure: {0}")]
    Backend(String),
}

/// One issued code as recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCode {
    pub code: CodeId,
    /// `true` once at least one device redeemed the code.
    pub used: bool,
    /// Minutes left; the issued duration until the code is first redeemed.
    pub remaining: u32,
}

/// One successful registration as recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub ip: IpAddr,
    pub code: CodeId,
    pub device: DeviceId,
}

/// Durable record of issued codes and registrations.
pub trait CodeStore: Send + Sync {
    /// Records a freshly issued code.  Returns `false` if it already exists.
    fn add_code(&self, code: &CodeId, duration: u32) -> Result<bool, StoreError>;

    /// Flags `code` as redeemed.
    fn mark_used(&self, code: &CodeId) -> Result<(), StoreError>;

    /// Records that `device` at `ip` registered with `code`.
    fn record_registration(
        &self,
        ip: IpAddr,
        code: &CodeId,
        device: &DeviceId,
    ) -> Result<(), StoreError>;

    /// Stores the remaining lifetime of an active code.
    fn update_remaining(&self, code: &CodeId, remaining: u32) -> Result<(), StoreError>;

    /// Forgets `codes` and the registrations that used them.
    fn delete_codes(&self, codes: &[CodeId]) -> Result<(), StoreError>;

    /// Every issued code, sorted by id.
    fn all_codes(&self) -> Result<Vec<StoredCode>, StoreError>;

    /// Every registration on record.
    fn registrations(&self) -> Result<Vec<Registration>, StoreError>;

    /// Forgets every code and every registration.
    fn clear(&self) -> Result<(), StoreError>;
}
