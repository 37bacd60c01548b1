//! Imported Core - Shared types library.
//!
//! This crate provides the types shared by every Imported component:
//! - `storefront` - Auth gateway in front of the upstream commerce API
//! - `session` - Client-side session store and token refresh
//! - `cli` - Terminal front-end over the session client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. The same
//! `AuthPayload` shape is produced by the storefront and consumed by the
//! session client, so both sides agree on the wire format by construction.
//!
//! # Modules
//!
//! - [`types`] - Email addresses, bearer/refresh tokens, user profiles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
