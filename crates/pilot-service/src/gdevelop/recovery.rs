//! Per-session failure tracking.
//!
//! Repeated failures in one session usually mean the user is asking for
//! something the pipeline cannot build. After a threshold of failures in the
//! same category within a time window, handlers surface simplification
//! suggestions instead of letting the user retry blind. Builds are never
//! retried automatically.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use pilot_core::SessionId;

/// Failures within the window before fallback suggestions kick in.
const FALLBACK_THRESHOLD: u32 = 3;

/// How long a failure counts toward the threshold.
const FAILURE_WINDOW: Duration = Duration::from_secs(600);

/// Failure category, tracked independently per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Game document failed validation.
    Validation,
    /// Preview or export build failed.
    Build,
    /// AI provider call failed.
    Provider,
}

impl ErrorCategory {
    /// Simplification suggestions shown once the threshold is reached.
    #[must_use]
    pub const fn suggestions(self) -> &'static [&'static str] {
        match self {
            Self::Validation => &[
                "Ask for one change at a time instead of several",
                "Describe the object or scene by the name shown in the editor",
                "Start from a simpler game and add features step by step",
            ],
            Self::Build => &[
                "Remove recently added objects or events and rebuild",
                "Reduce the number of scenes before exporting",
                "Try a preview build before a full export",
            ],
            Self::Provider => &[
                "Retry in a moment",
                "Try a shorter message",
                "Switch to a different AI provider if one is configured",
            ],
        }
    }
}

/// In-memory failure counters with a sliding window.
pub struct ErrorRecovery {
    window: Duration,
    threshold: u32,
    failures: Mutex<HashMap<(SessionId, ErrorCategory), Vec<Instant>>>,
}

impl Default for ErrorRecovery {
    fn default() -> Self {
        Self {
            window: FAILURE_WINDOW,
            threshold: FALLBACK_THRESHOLD,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl ErrorRecovery {
    /// Record a failure and return the count within the current window.
    pub fn record_failure(&self, session_id: SessionId, category: ErrorCategory) -> u32 {
        let now = Instant::now();
        let Ok(mut failures) = self.failures.lock() else {
            return 1;
        };

        let entry = failures.entry((session_id, category)).or_default();
        entry.retain(|at| now.duration_since(*at) < self.window);
        entry.push(now);
        u32::try_from(entry.len()).unwrap_or(u32::MAX)
    }

    /// Whether the session has hit the threshold for this category.
    pub fn should_suggest_fallback(&self, session_id: SessionId, category: ErrorCategory) -> bool {
        let now = Instant::now();
        let Ok(failures) = self.failures.lock() else {
            return false;
        };

        failures
            .get(&(session_id, category))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|at| now.duration_since(**at) < self.window)
                    .count()
            })
            .is_some_and(|count| count >= self.threshold as usize)
    }

    /// Drop all counters for a session (called on success or deletion).
    pub fn clear_session(&self, session_id: SessionId) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.retain(|(id, _), _| *id != session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_after_three_failures() {
        let recovery = ErrorRecovery::default();
        let session = SessionId::generate();

        assert_eq!(recovery.record_failure(session, ErrorCategory::Build), 1);
        assert!(!recovery.should_suggest_fallback(session, ErrorCategory::Build));
        recovery.record_failure(session, ErrorCategory::Build);
        assert!(!recovery.should_suggest_fallback(session, ErrorCategory::Build));
        recovery.record_failure(session, ErrorCategory::Build);
        assert!(recovery.should_suggest_fallback(session, ErrorCategory::Build));
    }

    #[test]
    fn categories_tracked_independently() {
        let recovery = ErrorRecovery::default();
        let session = SessionId::generate();

        for _ in 0..3 {
            recovery.record_failure(session, ErrorCategory::Validation);
        }
        assert!(recovery.should_suggest_fallback(session, ErrorCategory::Validation));
        assert!(!recovery.should_suggest_fallback(session, ErrorCategory::Build));
    }

    #[test]
    fn clear_resets_all_categories() {
        let recovery = ErrorRecovery::default();
        let session = SessionId::generate();

        for _ in 0..3 {
            recovery.record_failure(session, ErrorCategory::Provider);
        }
        recovery.clear_session(session);
        assert!(!recovery.should_suggest_fallback(session, ErrorCategory::Provider));
    }

    #[test]
    fn expired_failures_fall_out_of_the_window() {
        let recovery = ErrorRecovery {
            window: Duration::from_millis(10),
            threshold: 2,
            failures: Mutex::new(HashMap::new()),
        };
        let session = SessionId::generate();

        recovery.record_failure(session, ErrorCategory::Build);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(recovery.record_failure(session, ErrorCategory::Build), 1);
        assert!(!recovery.should_suggest_fallback(session, ErrorCategory::Build));
    }

    #[test]
    fn suggestions_exist_per_category() {
        assert!(!ErrorCategory::Validation.suggestions().is_empty());
        assert!(!ErrorCategory::Build.suggestions().is_empty());
        assert!(!ErrorCategory::Provider.suggestions().is_empty());
    }
}
