//! Domain entities for Wifi Manager.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" here? (for beginners)
//!
//! The domain layer holds the rules that make the system what it is: how long
//! a code lives, which device belongs to which code, and when an unregistered
//! device has overstayed its welcome.  None of it knows *how* the router is
//! driven or *where* codes are stored.  Outer layers call into the domain; the
//! domain never calls out, except through the expiry callback it is handed at
//! construction time.

/// A single access code and its bound devices.
pub mod code;

/// Random code-string generation.
pub mod code_id;

/// The TTL/eviction orchestrator.
///
/// See [`code_manager::CodeManager`] for the main type.
pub mod code_manager;

/// Grace-period tracking for devices that never claimed a code.
pub mod foreign;
