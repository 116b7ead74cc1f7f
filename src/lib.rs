//! Workspace root crate.
//!
//! This crate has no runtime surface of its own — it exists so that
//! `tests/integration/*.rs` can depend on `broker-core`, `broker-protocol`,
//! `mqttd`, and `mqttc` as dev-dependencies and drive the broker end to end,
//! the same role the root `rusty_timer` crate plays for its own workspace.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
