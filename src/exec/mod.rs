// src/exec/mod.rs

pub mod channel;
pub mod manager;

pub use channel::ExecutionEvent;
pub use manager::{ExecutionInput, ExecutionManager};
