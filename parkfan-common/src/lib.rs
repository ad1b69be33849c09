//! # Parkfan Common Library
//!
//! Shared code for the parkfan ingestion services:
//! - Error type and result alias
//! - Configuration file resolution and TOML loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
