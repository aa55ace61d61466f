//! Runtime layer for the job tracker.
//!
//! Resolves credentials, decides where the sheet comes from and fetches it
//! with a timeout and a single retry.

pub mod credentials;
pub mod data_manager;
pub mod source;

pub use tracker_core as core;
pub use tracker_data as data;
