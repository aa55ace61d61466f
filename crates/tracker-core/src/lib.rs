//! Core types for the job application tracker.
//!
//! Holds the typed record model, time windows, the shared error type,
//! dashboard configuration and the date/formatting helpers used by the data
//! and runtime crates.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{Result, TrackerError};
