//! Cost estimation helpers.
//!
//! The affordability check runs before the provider call, so it works from
//! an estimate; the deduction afterwards uses the provider's actual usage.

use serde::{Deserialize, Serialize};

/// Safety margin applied to the raw character-based estimate, in percent.
const ESTIMATE_MARGIN_PERCENT: u64 = 20;

/// Rough characters-per-token ratio for English prose and JSON.
const CHARS_PER_TOKEN: u64 = 4;

/// Minimum estimate for any non-empty request.
const MIN_ESTIMATE: i64 = 1;

/// PlayCanvas MCP operations incur one surcharge credit per this many actions.
const PLAYCANVAS_ACTIONS_PER_CREDIT: u32 = 10;

/// Game engine backends a workspace can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    /// PlayCanvas (browser, MCP-driven).
    PlayCanvas,
    /// Unreal Engine (plugin bridge).
    Unreal,
    /// GDevelop (CLI builds).
    GDevelop,
}

impl EngineType {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlayCanvas => "playcanvas",
            Self::Unreal => "unreal",
            Self::GDevelop => "gdevelop",
        }
    }
}

/// Estimate the token cost of a request from the message text and the size
/// of any contextual payload (scene state, game JSON, history) in bytes.
///
/// Uses `ceil(chars / 4)` plus a 20% margin, and never returns less than 1
/// for a non-empty request.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn estimate_tokens(message: &str, context_bytes: usize) -> i64 {
    let chars = message.chars().count() as u64 + context_bytes as u64;
    if chars == 0 {
        return 0;
    }

    let raw = chars.div_ceil(CHARS_PER_TOKEN);
    let with_margin = raw + (raw * ESTIMATE_MARGIN_PERCENT).div_ceil(100);

    (with_margin as i64).max(MIN_ESTIMATE)
}

/// Surcharge credits for engine-specific MCP operations.
///
/// PlayCanvas actions cost a tenth of a credit each; the ledger works in
/// whole credits, so the surcharge is rounded up with a minimum of one
/// credit for any PlayCanvas operation. Other engines carry no surcharge.
#[must_use]
pub fn engine_surcharge(engine: EngineType, action_count: u32) -> i64 {
    match engine {
        EngineType::PlayCanvas => {
            i64::from(action_count.div_ceil(PLAYCANVAS_ACTIONS_PER_CREDIT).max(1))
        }
        EngineType::Unreal | EngineType::GDevelop => 0,
    }
}
