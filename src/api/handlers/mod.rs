//! API handlers for Taskpass.
//!
//! Route handlers live here; everything auth-related is under [`auth`].

pub mod auth;
pub mod health;
pub mod root;
