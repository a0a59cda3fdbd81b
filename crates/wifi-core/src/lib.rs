//! # wifi-core
//!
//! Domain library for Wifi Manager: the state machine that owns access-code
//! lifetimes, device-to-code bindings, and the foreign-device grace tracker.
//!
//! This crate has zero dependencies on routers, databases, UI frameworks, or
//! async runtimes.  It reacts to two external signals only: a device binding
//! to a code, and a periodic tick carrying the router's connected-device list.
//!
//! # Architecture overview (for beginners)
//!
//! Wifi Manager hands out short **access codes**.  A guest types a code into a
//! registration page, the registration service resolves the guest's hardware
//! address, and the device is *bound* to that code.  Every code has a lifetime
//! measured in ticks (one tick per minute in a typical deployment).  When the
//! lifetime runs out, the code and all its bindings vanish.
//!
//! Devices that show up on the network without ever binding to a code are
//! **foreign**.  They get a short grace period, after which they are reported
//! so the router adapter can block them.
//!
//! - **`domain::code`** – A single access code and the devices using it.
//! - **`domain::foreign`** – The grace-period countdown for foreign devices.
//! - **`domain::code_manager`** – The orchestrator that owns everything above
//!   behind one lock and exposes `bind`, `tick`, `delete`, and `query`.
//! - **`domain::code_id`** – Random 11-character code strings.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `wifi_core::CodeManager` instead of `wifi_core::domain::code_manager::CodeManager`.
pub use domain::code::{Code, CodeId, DeviceId};
pub use domain::code_id::{generate_code_id, generate_code_id_with, CODE_ALPHABET, CODE_LENGTH};
pub use domain::code_manager::{
    CodeInfo, CodeManager, CodeSummary, DeviceSnapshot, ExpiryCallback, TickOutcome,
};
pub use domain::foreign::{ForeignTracker, GRACE};
