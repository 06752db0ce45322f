pub mod client;

pub use client::{call, execute, CallRequest, CallResult, DEFAULT_TIMEOUT};
