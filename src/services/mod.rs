//! Business logic services.

pub mod activity_service;
pub mod auth_service;
pub mod encryption;
pub mod event_bus;
pub mod permission_service;
pub mod webhook_service;
