// src/term/mod.rs

pub mod broker;

pub use broker::{BrokerState, TerminalBroker, TerminalEvent};
