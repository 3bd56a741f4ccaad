//! I/O helpers for the farming engine.

pub mod client;
pub mod config;
pub mod service;
pub mod transport;
