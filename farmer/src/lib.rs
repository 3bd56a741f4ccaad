//! Multi-profile progress farming engine.
//!
//! Each profile binds one account token to a strategy and runs as its own
//! cooperative worker task. An operator steers the running profiles through a
//! single command queue and watches them through a read-only status projection.
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (command parsing, goal evaluation,
//!   backoff math, streak arithmetic). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP transport, retrying client,
//!   remote service calls, config files). Isolated behind traits so tests can
//!   script the remote side.
//!
//! Orchestration modules ([`strategy`], [`worker`], [`orchestrator`],
//! [`dispatcher`], [`status`]) coordinate core logic with I/O.

pub mod core;
pub mod dispatcher;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod pacing;
pub mod profile;
pub mod status;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod worker;
