//! Startup restore: rebuilds bindings the previous process lost.
//!
//! The manager keeps everything in memory.  If the service restarts while
//! guests are online, their bindings would vanish and the next ticks would
//! treat them as foreign.  Before the first tick, every stored registration
//! whose code is still marked used is bound again, with the code's last
//! recorded remaining time as its duration.

use std::collections::HashMap;

use tracing::{debug, info};
use wifi_core::CodeManager;

use super::ports::{CodeStore, StoreError};

/// Rebinds stored registrations.  Returns how many devices were bound.
///
/// # Errors
///
/// Returns the store error if codes or registrations cannot be read.
pub fn restore_bindings(manager: &CodeManager, store: &dyn CodeStore) -> Result<usize, StoreError> {
    let remaining: HashMap<_, _> = store
        .all_codes()?
        .into_iter()
        .filter(|c| c.used && c.remaining > 0)
        .map(|c| (c.code, c.remaining))
        .collect();

    let mut restored = 0;
    for registration in store.registrations()? {
        match remaining.get(&registration.code) {
            Some(&duration) => {
                manager.bind(registration.code, registration.device, duration);
                restored += 1;
            }
            None => debug!(
                "skipping registration of {} with inactive code {}",
                registration.device, registration.code
            ),
        }
    }
    info!("restored {restored} binding(s) from the code store");
    Ok(restored)
}
