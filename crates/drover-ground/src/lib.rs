//! Ground-station library for the drover system.
//!
//! This crate ties the TETHER protocol crates into the ground-side
//! application model:
//! - A roster of named robots, each with a secure channel
//! - Sealing drive commands and opening telemetry
//! - Out-of-band provisioning messages (robot announce / ground key)
//! - An admission wait-list for robots that are not yet provisioned
//!
//! Transport is deliberately absent: callers move the produced byte
//! slices over whatever serial or radio link they have.

#![forbid(unsafe_code)]

pub mod announce;
pub mod station;
pub mod tickets;

pub use announce::{GroundKeyMessage, RobotAnnounce};
pub use station::{Groundstation, RobotEntry};
pub use tickets::{Ticket, TicketBook};
