//! # rowqueue-core
//!
//! Core crate for rowqueue. Contains the storage traits every backend
//! implements, configuration schemas, the record types that flow through
//! those traits, and the unified error system.
//!
//! This crate has **no** internal dependencies on other rowqueue crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
