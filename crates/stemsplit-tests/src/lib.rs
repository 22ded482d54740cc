//! Integration test crate for StemSplit.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! The mock backends below stand in for real networks.

pub mod mocks;

#[cfg(test)]
mod demix;

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod srs;
