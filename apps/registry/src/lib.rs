//! Veterinary registry core.
//!
//! Species, breeds, clients and pets governed by one lifecycle engine: uniqueness checks,
//! parent activation rules, dependent-table scans and paged listing over a pluggable
//! record store.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use error::{Error, ErrorKind, Result};
