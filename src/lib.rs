//! Scoped Python guest contexts and the greeting runner built on them.

pub mod config;
pub mod execution;
pub mod handlers;
