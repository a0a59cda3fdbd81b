//! Application layer use cases for the Wifi Manager service.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the domain (`wifi-core`, pure rules
//! about codes and grace periods) and the infrastructure (the router adapter,
//! the code store, the config file).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** the [`CodeManager`](wifi_core::CodeManager) to fulfil a
//!   goal (e.g. "a guest redeemed a code, let their laptop in").
//! - **Depend on abstractions** (the traits in [`ports`]) rather than concrete
//!   router or database code, so tests can substitute in-memory versions.
//!
//! # Sub-modules
//!
//! - **`ports`**           – The `Router` and `CodeStore` traits.
//! - **`run_ticks`**       – Drives one `tick` per interval and enforces the
//!   resulting block list.
//! - **`register_device`** – Turns a registration (IP + code) into a binding.
//! - **`issue_codes`**     – Generates, lists, and revokes codes for the operator.
//! - **`expiry`**          – Carries expired code ids out of the manager lock
//!   and purges them from the store.
//! - **`restore`**         – Rebuilds bindings from the store at startup.

pub mod expiry;
pub mod issue_codes;
pub mod ports;
pub mod register_device;
pub mod restore;
pub mod run_ticks;
