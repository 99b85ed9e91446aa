//! # Staffing Common Library
//!
//! Shared code for the staffing dashboard including:
//! - Database schema, models and queries
//! - Allocation engine (total hours, role shares, recalculation)
//! - Configuration loading
//! - Utility functions

pub mod allocation;
pub mod config;
pub mod db;
pub mod error;
pub mod uuid_utils;

pub use error::{Error, Result};
