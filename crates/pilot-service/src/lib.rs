//! Pilot HTTP API Service.
//!
//! This crate provides the HTTP API for pilot, including:
//!
//! - Company management and the credit ledger
//! - AI assist and chat with per-request credit metering
//! - GDevelop game sessions (conversational game editing, preview, export)
//! - Game publishing (share links, custom domains)
//! - Payment webhooks
//!
//! # Authentication
//!
//! End-user requests carry a JWT validated against the auth provider's JWKS.
//! Admin endpoints use the `X-Admin-Key` header.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async for consistency

pub mod auth;
pub mod config;
pub mod credits;
pub mod crypto;
pub mod error;
pub mod gdevelop;
pub mod handlers;
pub mod providers;
pub mod routes;
pub mod state;

pub use config::{GDevelopConfig, ServiceConfig};
pub use credits::CreditManager;
pub use error::ApiError;
pub use providers::{ChatProvider, ProviderRegistry};
pub use routes::create_router;
pub use state::AppState;
