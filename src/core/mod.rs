//! Core module containing the session engine
//!
//! This module provides:
//! - Port enumeration and device access behind swappable traits
//! - Port selection by name or serial number
//! - Background port registry with published snapshots
//! - Line reader bound to one open device
//! - Connection session with state machine and toggle semantics
//! - Output log of received, sent and error lines
//! - Virtual device simulation

pub mod error;
pub mod output;
pub mod reader;
pub mod registry;
pub mod retention;
pub mod selector;
pub mod session;
pub mod simulator;
pub mod state_machine;
pub mod transport;
