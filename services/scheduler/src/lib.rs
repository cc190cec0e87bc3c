//! convoy scheduler library.
//!
//! This crate primarily ships a `convoy-scheduler` binary, but exposes its
//! state store, plan applier, and worker for integration testing and reuse.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod state;
