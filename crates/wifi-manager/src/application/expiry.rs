//! Expiry notifications: from the manager's callback to the code store.
//!
//! [`CodeManager::tick`](wifi_core::CodeManager::tick) calls its expiry
//! callback synchronously.  The callback built here only pushes the ids onto an
//! unbounded channel, so store latency never extends a tick.  A separate task
//! ([`purge_expired`]) drains the channel and deletes the codes from the store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use wifi_core::{CodeId, ExpiryCallback};

use super::ports::CodeStore;

/// Builds an expiry callback and the receiver that observes it.
pub fn expiry_channel() -> (ExpiryCallback, mpsc::UnboundedReceiver<Vec<CodeId>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: ExpiryCallback = Box::new(move |codes: &[CodeId]| {
        if tx.send(codes.to_vec()).is_err() {
            warn!("expiry receiver dropped; {} code(s) not purged", codes.len());
        }
    });
    (callback, rx)
}

/// Deletes every batch of expired codes from `store` until the sending side
/// (the manager) is dropped.
pub async fn purge_expired(
    mut rx: mpsc::UnboundedReceiver<Vec<CodeId>>,
    store: Arc<dyn CodeStore>,
) {
    while let Some(codes) = rx.recv().await {
        match store.delete_codes(&codes) {
            Ok(()) => info!("purged expired codes: {codes:?}"),
            Err(e) => warn!("failed to purge expired codes {codes:?}: {e}"),
        }
    }
}
