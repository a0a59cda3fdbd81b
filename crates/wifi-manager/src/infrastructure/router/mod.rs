//! Router adapters.
//!
//! The production adapter automates the router's web console and is not part
//! of this repository.  [`simulated::SimulatedRouter`] keeps the device table
//! in memory so the service can run headless and tests can stage networks.

pub mod simulated;
