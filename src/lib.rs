//! User directory service with a Redis-backed response cache and
//! mutation-driven invalidation.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
