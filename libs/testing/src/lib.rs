//! Test fixtures shared by convoy crates.
//!
//! Everything lives under [`mock`]; builders return plain structs so tests
//! tweak fields directly instead of going through setters.

pub mod mock;
