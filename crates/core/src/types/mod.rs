//! Core types for AgriSathi.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod language;
pub mod session;

pub use email::{Email, EmailError};
pub use id::*;
pub use language::{LanguageError, PreferredLanguage};
pub use session::{SessionId, SessionIdError};
