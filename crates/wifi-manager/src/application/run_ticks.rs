//! TickDriver: the periodic heartbeat of the service.
//!
//! Once per interval the driver:
//!
//! 1. asks the router for the connected-device list (a failure becomes
//!    [`DeviceSnapshot::Unknown`] so code aging still happens),
//! 2. calls [`CodeManager::tick`],
//! 3. asks the router to block every device the tick reported,
//! 4. writes each active code's remaining time to the store,
//! 5. every `unblock_every` ticks, lifts all router blocks so a device that
//!    was blocked by mistake eventually gets another chance.
//!
//! Router and store failures are logged and never retried here; the next tick
//! starts from a clean slate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wifi_core::{CodeManager, DeviceSnapshot, TickOutcome};

use super::ports::{CodeStore, Router};

/// What happened during one [`TickDriver::tick_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Devices the router confirmed as blocked.
    pub blocked: usize,
    /// Devices the router failed to block.
    pub block_failures: usize,
    /// Whether all blocks were lifted at the end of this tick.
    pub unblocked_all: bool,
}

pub struct TickDriver {
    router: Arc<dyn Router>,
    manager: Arc<CodeManager>,
    store: Arc<dyn CodeStore>,
    unblock_every: u32,
    ticks_since_unblock: u32,
    ticks: u64,
}

impl TickDriver {
    /// `unblock_every == 0` disables the periodic unblock.
    pub fn new(
        router: Arc<dyn Router>,
        manager: Arc<CodeManager>,
        store: Arc<dyn CodeStore>,
        unblock_every: u32,
    ) -> Self {
        Self {
            router,
            manager,
            store,
            unblock_every,
            ticks_since_unblock: 0,
            ticks: 0,
        }
    }

    /// Ticks performed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs a single tick.
    pub async fn tick_once(&mut self) -> TickReport {
        debug!("tick {}", self.ticks);
        let snapshot = match self.router.connected_devices().await {
            Ok(devices) => DeviceSnapshot::Known(devices),
            Err(e) => {
                warn!("connected-device list unavailable: {e}");
                DeviceSnapshot::Unknown
            }
        };

        let outcome = self.manager.tick(snapshot);

        let mut blocked = 0;
        let mut block_failures = 0;
        for device in outcome.devices_to_block() {
            match self.router.block_device(device).await {
                Ok(()) => {
                    info!("blocked foreign device {device}");
                    blocked += 1;
                }
                Err(e) => {
                    error!("failed to block {device}: {e}");
                    block_failures += 1;
                }
            }
        }

        for summary in self.manager.snapshot() {
            if let Err(e) = self
                .store
                .update_remaining(&summary.id, summary.ttl_remaining)
            {
                debug!("remaining time of {} not stored: {e}", summary.id);
            }
        }

        self.ticks += 1;
        let unblocked_all = self.advance_unblock_schedule().await;

        TickReport {
            outcome,
            blocked,
            block_failures,
            unblocked_all,
        }
    }

    async fn advance_unblock_schedule(&mut self) -> bool {
        if self.unblock_every == 0 {
            return false;
        }
        self.ticks_since_unblock += 1;
        if self.ticks_since_unblock < self.unblock_every {
            return false;
        }
        self.ticks_since_unblock = 0;
        match self.router.unblock_all().await {
            Ok(()) => {
                info!("scheduled unblock of all devices");
                true
            }
            Err(e) => {
                error!("scheduled unblock failed: {e}");
                false
            }
        }
    }

    /// Ticks every `interval` until `shutdown` flips to `true` or its sender
    /// is dropped.  The first tick happens immediately.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("tick driver started with interval {interval:?}");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.tick_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("tick driver stopped after {} ticks", self.ticks);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
