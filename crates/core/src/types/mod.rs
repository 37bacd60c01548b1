//! Core types for Imported.

pub mod email;
pub mod token;
pub mod user;

pub use email::{Email, EmailError};
pub use token::{AuthPayload, BearerToken, RefreshToken};
pub use user::{SessionUser, normalize_roles};
