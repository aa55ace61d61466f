//! Data layer for the job tracker.
//!
//! Reads the application sheet into typed records, aggregates statuses and
//! platforms over time windows, reshapes the results into tidy tables and
//! runs the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod attribution;
pub mod reader;
pub mod reshape;

pub use tracker_core as core;
