//! Pilot Client SDK.
//!
//! This crate provides a client library for the engine plugins (Unreal,
//! desktop) to interact with the pilot API.
//!
//! # Example
//!
//! ```no_run
//! use pilot_client::{ChatRequest, PilotClient};
//!
//! # async fn example() -> Result<(), pilot_client::ClientError> {
//! let client = PilotClient::new("https://api.surrealpilot.com", "user-token");
//!
//! let reply = client
//!     .chat(ChatRequest {
//!         message: "How do I add a jump?".to_string(),
//!         provider: None,
//!         model: None,
//!         context: None,
//!     })
//!     .await?;
//!
//! println!("{} ({} credits)", reply.response, reply.credits.deducted);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, PilotClient};
pub use error::ClientError;
pub use types::*;
