//! HTTP route handlers.

pub mod counter;
pub mod health;
pub mod helpers;
pub mod search;
