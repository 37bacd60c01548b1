//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Login and signup-with-autologin against the commerce API

pub mod auth;
