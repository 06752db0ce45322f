//! Profile configuration and authenticated calls for management API tooling.
//!
//! A caller resolves a [`storage::Configuration`] through [`storage::ConfigStore`]
//! (bootstrapping or repairing it interactively when needed), then passes the
//! chosen profile's credentials to [`api::call`].

pub mod api;
pub mod cli;
pub mod error;
pub mod logging;
pub mod storage;

pub use error::{CallError, ConfigError};
