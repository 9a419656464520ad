//! Business logic services.

pub mod auth;
pub mod email;
pub mod options;
pub mod registration;

pub use auth::{AccountService, AuthError, JwtService};
pub use email::{EmailError, EmailService};
pub use registration::{RegistrationError, RegistrationService};
