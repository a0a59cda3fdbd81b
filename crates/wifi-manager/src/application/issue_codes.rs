//! CodeIssuer: operator-facing code management.
//!
//! Covers the three things an operator does with codes:
//!
//! - **issue** a new code for a requested duration,
//! - **revoke** a code before it runs out,
//! - **list** every issued code with its live user count and remaining time.
//!
//! A code that has been issued but not yet redeemed exists only in the store;
//! the [`CodeManager`] learns about it on the first binding.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use wifi_core::{generate_code_id, CodeId, CodeManager};

use super::ports::{CodeStore, StoreError};

/// Attempts to find an unused code id before giving up.
const MAX_GENERATION_ATTEMPTS: usize = 8;

/// Error type for the issue-codes use case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IssueError {
    #[error("no free code id after {0} attempts")]
    Exhausted(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Clamps operator-entered durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    pub min: u32,
    pub max: u32,
    pub fallback: u32,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            min: 5,
            max: 60,
            fallback: 60,
        }
    }
}

impl DurationPolicy {
    /// Turns raw operator input into a duration.
    ///
    /// Blank input means "cancel" and yields `None`.  Unparseable input yields
    /// the fallback.  Numbers (fractions included) are clamped to
    /// `min..=max` and truncated.
    pub fn resolve(&self, input: &str) -> Option<u32> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        match input.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                let clamped = value.clamp(f64::from(self.min), f64::from(self.max));
                Some(clamped as u32)
            }
            _ => Some(self.fallback),
        }
    }

    /// Clamps an already numeric duration.
    pub fn clamp(&self, duration: u32) -> u32 {
        duration.clamp(self.min, self.max)
    }
}

/// A freshly issued code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: CodeId,
    pub duration: u32,
}

/// One row of the operator's code list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeStatus {
    pub code: CodeId,
    pub used: bool,
    pub users: usize,
    pub remaining: u32,
}

pub struct CodeIssuer {
    manager: Arc<CodeManager>,
    store: Arc<dyn CodeStore>,
    policy: DurationPolicy,
}

impl CodeIssuer {
    pub fn new(manager: Arc<CodeManager>, store: Arc<dyn CodeStore>, policy: DurationPolicy) -> Self {
        Self {
            manager,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> DurationPolicy {
        self.policy
    }

    /// Generates a new code valid for `duration` ticks (clamped) and records
    /// it in the store.
    ///
    /// # Errors
    ///
    /// [`IssueError::Exhausted`] if every generated id was already taken;
    /// [`IssueError::Store`] if the store fails.
    pub fn issue(&self, duration: u32) -> Result<IssuedCode, IssueError> {
        let duration = self.policy.clamp(duration);
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let code = generate_code_id();
            if !self.manager.query(&code).is_absent() {
                continue;
            }
            if self.store.add_code(&code, duration)? {
                info!("issued code {code} for {duration} ticks");
                return Ok(IssuedCode { code, duration });
            }
        }
        Err(IssueError::Exhausted(MAX_GENERATION_ATTEMPTS))
    }

    /// Revokes `code`: its devices lose access on the next tick and the store
    /// forgets it.  Unknown codes are ignored.
    ///
    /// # Errors
    ///
    /// Returns the store error if the deletion could not be recorded.  The
    /// in-memory revocation has already happened at that point.
    pub fn revoke(&self, code: &CodeId) -> Result<(), StoreError> {
        self.manager.delete(code);
        self.store.delete_codes(std::slice::from_ref(code))?;
        info!("revoked code {code}");
        Ok(())
    }

    /// Wipes the store: every issued code and registration is forgotten.
    ///
    /// Bindings already active in the manager keep running until they expire;
    /// they are simply no longer persisted or listed.
    ///
    /// # Errors
    ///
    /// Returns the store error if the store could not be cleared.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        warn!("code store reset");
        Ok(())
    }

    /// Lists every issued code with live figures from the manager.
    ///
    /// Active codes report their remaining ticks, and that value is written
    /// back to the store.  Codes not yet redeemed report their issued duration.
    ///
    /// # Errors
    ///
    /// Returns the store error if the code list cannot be read.
    pub fn status(&self) -> Result<Vec<CodeStatus>, StoreError> {
        let mut rows = Vec::new();
        for stored in self.store.all_codes()? {
            let info = self.manager.query(&stored.code);
            let remaining = match info.ttl_remaining {
                Some(ttl) => {
                    if let Err(e) = self.store.update_remaining(&stored.code, ttl) {
                        warn!("failed to persist remaining time of {}: {e}", stored.code);
                    }
                    ttl
                }
                None => stored.remaining,
            };
            rows.push(CodeStatus {
                code: stored.code,
                used: stored.used,
                users: info.user_count,
                remaining,
            });
        }
        Ok(rows)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
