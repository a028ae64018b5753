//! Scanner worker.
//!
//! This crate provides:
//! - Environment-driven configuration for the detector and scan engine
//! - A [`Scanner`] that owns a detector registry and runs image / video jobs
//! - The `vscan` command-line entry point

pub mod config;
pub mod error;
pub mod scanner;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use scanner::Scanner;
