//! ClickHouse adapter for the Beacon event store contract.

pub mod client;

pub use client::ClickHouseEventStore;
