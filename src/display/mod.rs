// src/display/mod.rs
//! Output sinks for decoded events

pub mod terminal;

pub use terminal::{OutputFormat, TerminalSink};
