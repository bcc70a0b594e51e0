//! Database models (SQLx).

pub mod account;
pub mod activity;
pub mod idea;
pub mod permission;
pub mod post;
pub mod project;
pub mod role;
pub mod user;
