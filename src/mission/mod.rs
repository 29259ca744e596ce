//! # Mission Module
//!
//! The two mission loops, independent of any runtime or hardware backend.
//!
//! This module handles:
//! - The payload's read, encode, send and log cycle (`flight`)
//! - The ground station's receive, decode and record cycle (`ground`)

pub mod flight;
pub mod ground;

pub use flight::{CycleReport, FlightComputer, FlightStats, SendOutcome};
pub use ground::{GroundStation, LinkStats};
