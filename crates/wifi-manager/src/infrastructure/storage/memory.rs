//! In-memory [`CodeStore`] implementation.
//!
//! Used by the headless binary and by tests.  Registrations are keyed by IP
//! address: a new registration from the same address replaces the old one.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use wifi_core::{CodeId, DeviceId};

use crate::application::ports::{CodeStore, Registration, StoreError, StoredCode};

#[derive(Debug, Default)]
struct Tables {
    codes: BTreeMap<CodeId, StoredCode>,
    registrations: HashMap<IpAddr, Registration>,
}

/// A [`CodeStore`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    tables: Mutex<Tables>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CodeStore for MemoryCodeStore {
    fn add_code(&self, code: &CodeId, duration: u32) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        if tables.codes.contains_key(code) {
            return Ok(false);
        }
        tables.codes.insert(
            code.clone(),
            StoredCode {
                code: code.clone(),
                used: false,
                remaining: duration,
            },
        );
        Ok(true)
    }

    fn mark_used(&self, code: &CodeId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let stored = tables
            .codes
            .get_mut(code)
            .ok_or_else(|| StoreError::UnknownCode(code.clone()))?;
        stored.used = true;
        Ok(())
    }

    fn record_registration(
        &self,
        ip: IpAddr,
        code: &CodeId,
        device: &DeviceId,
    ) -> Result<(), StoreError> {
        self.lock().registrations.insert(
            ip,
            Registration {
                ip,
                code: code.clone(),
                device: device.clone(),
            },
        );
        Ok(())
    }

    fn update_remaining(&self, code: &CodeId, remaining: u32) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let stored = tables
            .codes
            .get_mut(code)
            .ok_or_else(|| StoreError::UnknownCode(code.clone()))?;
        stored.remaining = remaining;
        Ok(())
    }

    fn delete_codes(&self, codes: &[CodeId]) -> Result<(), StoreError> {
        let mut tables = self.lock();
        for code in codes {
            tables.codes.remove(code);
        }
        tables
            .registrations
            .retain(|_, registration| !codes.contains(&registration.code));
        Ok(())
    }

    fn all_codes(&self) -> Result<Vec<StoredCode>, StoreError> {
        Ok(self.lock().codes.values().cloned().collect())
    }

    fn registrations(&self) -> Result<Vec<Registration>, StoreError> {
        let mut registrations: Vec<_> = self.lock().registrations.values().cloned().collect();
        registrations.sort_by_key(|r| r.ip);
        Ok(registrations)
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = Tables::default();
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
