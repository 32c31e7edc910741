//! osrm-prep - regional OSRM dataset preparation.
//!
//! Downloads regional OpenStreetMap extracts, runs the OSRM toolchain over
//! each one and collects the resulting graph files into a data directory.

pub mod config;
pub mod error;
pub mod models;
pub mod regions;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
