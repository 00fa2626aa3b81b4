//! HTTP request handlers.
//!
//! - `health` - health check
//! - `companies` - company registration and lookup
//! - `credits` - balance, ledger, analytics, admin grants
//! - `chat` - credit-gated AI chat and assist
//! - `providers` - configured provider listing
//! - `gdevelop` - game sessions, previews, exports
//! - `games` - publishing: share links and custom domains
//! - `webhooks` - payment webhook

pub mod chat;
pub mod companies;
pub mod credits;
pub mod games;
pub mod gdevelop;
pub mod health;
pub mod providers;
pub mod webhooks;
