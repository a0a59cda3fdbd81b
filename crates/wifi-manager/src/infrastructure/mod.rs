//! Infrastructure layer for the Wifi Manager service.
//!
//! Contains the adapters behind the application ports (router, code store),
//! the configuration file, and the operator console.
//!
//! **Dependency rule**: this layer may depend on `application` and `wifi_core`,
//! but MUST NOT be imported by the `application` or domain layers, except by
//! their tests.

pub mod console;
pub mod router;
pub mod storage;
