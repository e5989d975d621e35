// src/proc/mod.rs

pub mod channel;

pub use channel::{OutputStream, ProcessChannel, ProcessEvent, ProcessHandle};
