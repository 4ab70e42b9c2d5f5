//! Application initialization.
//!
//! Logger setup for the worker binary; everything else the worker needs is
//! wired through [`Inserter::new`](crate::inserter::Inserter::new).

mod logger;

// Re-export public API
pub use logger::init_logger_with;
