//! Integration test crate for Splicer.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the timeline and media crates to verify they work together.
//! The export tests drive the orchestrator through a scripted engine.

#[cfg(test)]
mod support;


#[cfg(test)]
mod export;
