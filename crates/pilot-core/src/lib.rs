//! Core types for the SurrealPilot metering service.
//!
//! This crate provides the domain types shared by the store, the HTTP
//! service, and the client SDK:
//!
//! - **Identifiers**: `CompanyId`, `UserId`, `WorkspaceId`, `SessionId`,
//!   `GameId`, `TransactionId`
//! - **Companies**: `Company`, `Plan`
//! - **Credits**: `CreditTransaction`, `TransactionType`, `TransactionMetadata`
//! - **Sessions**: `GameSession`, `ConversationEntry`, `SessionStatus`
//! - **Games**: `GameRecord` plus game-JSON validation and merging
//! - **Cost**: token estimation and engine surcharges
//!
//! # Credit unit
//!
//! One credit covers roughly one AI token of usage. Balances are stored as
//! `i64` whole credits; amounts on the ledger are always positive, with the
//! direction carried by the transaction type.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod company;
pub mod cost;
pub mod credits;
pub mod game;
pub mod ids;
pub mod publish;
pub mod session;

pub use company::{Company, Plan};
pub use cost::{engine_surcharge, estimate_tokens, EngineType};
pub use credits::{CreditTransaction, TransactionMetadata, TransactionType};
pub use game::{merge_preserving_existing, validate_game_json, ValidationIssue};
pub use ids::{CompanyId, GameId, IdError, SessionId, TransactionId, UserId, WorkspaceId};
pub use publish::{normalize_domain, DomainError, DomainStatus, GameRecord, ShareSettings};
pub use session::{ConversationEntry, ConversationRole, GameSession, SessionStatus};
