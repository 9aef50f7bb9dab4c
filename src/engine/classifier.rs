//! Failure signatures and streak tracking for circuit breaking.
//!
//! Two independent granularities: the exact signature (tool + canonical
//! arguments + truncated error) drives the hard breaker; the category
//! signature (tool + coarse error bucket) drives a one-time soft warning.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Error text beyond this length does not sharpen a signature.
const SIGNATURE_ERROR_PREFIX: usize = 200;

/// Coarse error bucket, assigned by keyword sniffing over the error text.
/// Heuristic on purpose; swapping in a typed error kind later only touches
/// [`FailureCategory::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    NotFound,
    Permission,
    Timeout,
    ParseError,
    NotAllowed,
    Network,
    Unknown,
}

impl FailureCategory {
    pub fn classify(error: &str) -> Self {
        let text = error.to_lowercase();
        if text.contains("not found") || text.contains("no such file") || text.contains("missing") {
            Self::NotFound
        } else if text.contains("permission") || text.contains("denied") || text.contains("approval")
        {
            Self::Permission
        } else if text.contains("timed out") || text.contains("timeout") {
            Self::Timeout
        } else if text.contains("parse") || text.contains("invalid json") || text.contains("malformed")
        {
            Self::ParseError
        } else if text.contains("not allowed") || text.contains("outside the task") || text.contains("scope")
        {
            Self::NotAllowed
        } else if text.contains("network") || text.contains("connection") || text.contains("unreachable")
        {
            Self::Network
        } else {
            Self::Unknown
        }
    }

    pub fn bucket(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Timeout => "timeout",
            Self::ParseError => "parse_error",
            Self::NotAllowed => "not_allowed",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

/// What the engine should do after recording one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerVerdict {
    Continue,
    /// Inject this coaching message into the conversation and keep going.
    Warn(String),
    /// Stop the run; backfill the rest of the batch.
    Tripped,
}

#[derive(Debug)]
pub struct FailureClassifier {
    max_consecutive_failures: usize,
    exact_streak: usize,
    last_exact: Option<String>,
    category_streak: usize,
    last_category: Option<String>,
    warned_streak: Option<usize>,
}

impl FailureClassifier {
    pub fn new(max_consecutive_failures: usize) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
            exact_streak: 0,
            last_exact: None,
            category_streak: 0,
            last_category: None,
            warned_streak: None,
        }
    }

    /// Any success resets both streaks and clears both last signatures.
    pub fn record_success(&mut self) {
        self.exact_streak = 0;
        self.last_exact = None;
        self.category_streak = 0;
        self.last_category = None;
        self.warned_streak = None;
    }

    /// Record one failure and return the resulting verdict.
    pub fn record_failure(
        &mut self,
        tool: &str,
        arguments: &Map<String, Value>,
        error: &str,
    ) -> BreakerVerdict {
        let exact = exact_signature(tool, arguments, error);
        if self.last_exact.as_deref() == Some(exact.as_str()) {
            self.exact_streak += 1;
        } else {
            self.exact_streak = 1;
            self.last_exact = Some(exact);
        }

        let category = FailureCategory::classify(error);
        let category_sig = category_signature(tool, category);
        if self.last_category.as_deref() == Some(category_sig.as_str()) {
            self.category_streak += 1;
        } else {
            self.category_streak = 1;
            self.last_category = Some(category_sig);
            self.warned_streak = None;
        }

        if self.exact_streak >= self.max_consecutive_failures {
            return BreakerVerdict::Tripped;
        }

        if self.category_streak >= self.warn_threshold()
            && self.warned_streak != Some(self.category_streak)
        {
            self.warned_streak = Some(self.category_streak);
            return BreakerVerdict::Warn(format!(
                "The last {} '{tool}' calls failed the same way ({}). Try a \
                 different tool, materially different arguments, or report \
                 what is blocking you and stop.",
                self.category_streak,
                category.bucket(),
            ));
        }

        BreakerVerdict::Continue
    }

    pub fn exact_streak(&self) -> usize {
        self.exact_streak
    }

    // ceil((k + 1) / 2); tunable, nothing else depends on the formula.
    fn warn_threshold(&self) -> usize {
        (self.max_consecutive_failures + 2) / 2
    }
}

/// Exact-match signature: tool, canonical arguments, truncated error.
/// `serde_json::Map` is BTreeMap-backed, so serialization is key-sorted and
/// canonical without extra work.
pub fn exact_signature(tool: &str, arguments: &Map<String, Value>, error: &str) -> String {
    let canonical = serde_json::to_string(arguments).unwrap_or_default();
    let truncated: String = error.chars().take(SIGNATURE_ERROR_PREFIX).collect();
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update([0]);
    hasher.update(canonical.as_bytes());
    hasher.update([0]);
    hasher.update(truncated.as_bytes());
    hex_digest(hasher)
}

fn category_signature(tool: &str, category: FailureCategory) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update([0]);
    hasher.update(category.bucket().as_bytes());
    hex_digest(hasher)
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
