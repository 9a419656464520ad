//! AgriSathi API library.
//!
//! The REST backend as a library, so the binary, the CLI and the integration
//! tests share one router and one set of stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod ai;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
