//! HTTP request handlers.

pub mod accounts;
pub mod activity;
pub mod auth;
pub mod automation;
pub mod events;
pub mod health;
pub mod ideas;
pub mod permissions;
pub mod posts;
pub mod projects;
pub mod roles;
pub mod users;
