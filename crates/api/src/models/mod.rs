//! Domain models for the API.

pub mod farmer;
pub mod registration;

pub use farmer::{
    EmailVerification, FarmProfile, Farmer, FarmerProfile, NewFarmer, PasswordReset,
    ProfileUpdate,
};
pub use registration::{
    DraftCredentials, DraftUpdate, FarmInfo, LocationInfo, PersonalInfo, RegistrationDraft,
    RegistrationStep,
};
