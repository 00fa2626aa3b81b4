//! GDevelop engine integration.
//!
//! - `game` - AI-driven game creation and modification over sessions
//! - `cli` - the external export CLI wrapper
//! - `builds` - preview and export builds on top of the CLI
//! - `recovery` - per-session failure tracking and fallback suggestions

pub mod builds;
pub mod cli;
pub mod game;
pub mod recovery;

pub use builds::BuildService;
pub use cli::{CliError, GDevelopCli};
pub use game::{extract_game_json, ChatTurnOptions, GameService, TurnOutcome};
pub use recovery::{ErrorCategory, ErrorRecovery};
