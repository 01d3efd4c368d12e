//! Shared wire types and view-model logic for the certwatch console.
//!
//! Everything here is pure: no I/O, no clock access. Callers pass a reference
//! instant wherever remaining-validity is derived so results are reproducible.

pub mod expiry;
pub mod filter;
pub mod params;
pub mod stats;
pub mod views;
