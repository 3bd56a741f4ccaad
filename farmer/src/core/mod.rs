//! Deterministic, pure logic shared by the farming engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod backoff;
pub mod command;
pub mod goals;
pub mod snapshot;
pub mod streak;
pub mod types;
