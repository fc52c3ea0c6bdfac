//! Core library for the cryosweep application.
//!
//! This library contains the protocol envelope, transport layer, and
//! instrument handles for a cryostat/magnet controller and a lock-in DAQ
//! unit, plus the sweep sequencer that drives them through nested
//! field/temperature/gate-voltage experiments.

pub mod config;
pub mod error;
pub mod instrument;
pub mod protocol;
pub mod setpoint;
pub mod sweep;
pub mod transport;
