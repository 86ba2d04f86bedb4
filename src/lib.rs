//! RustyPing - live ICMP/TCP latency monitor for the terminal
//!
//! This library probes one or more hosts at a fixed cadence, keeps a bounded
//! window of recent samples per host and renders them as a live dashboard, or
//! as plain lines when no terminal is available.

pub mod headless;
pub mod monitor;
pub mod probe;
pub mod tui;
