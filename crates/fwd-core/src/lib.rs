//! Core of the Telegram message forwarder.
//!
//! This crate is framework-agnostic. The chat transport lives behind the
//! ports in [`ports`] and is implemented in adapter crates.

pub mod audit;
pub mod command;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod policy;
pub mod ports;
pub mod supervisor;

pub use errors::{Error, Result};
