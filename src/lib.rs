//! ContentDesk - Backend Library
//!
//! Backend for a content-operations dashboard: content ideas, scheduled
//! posts, connected social accounts, role-based access control, and an
//! append-only activity log.

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
