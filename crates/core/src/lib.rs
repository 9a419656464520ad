//! AgriSathi Core - Shared domain types.
//!
//! This crate provides common types used across all AgriSathi components:
//! - `api` - REST backend for farmer onboarding and advisory
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, sessions and languages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
