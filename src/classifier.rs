//! A pure function from `(exit_code, stderr_text, depth, timed_out)` to
//! `(status, confidence, reason)`. No I/O, no time source, stable output for
//! equal input.

use crate::domain::{ScanDepth, ScanStatus};

const HARD_INDICATORS: &[&str] = &[
    "invalid data found",
    "moov atom not found",
    "invalid nal unit size",
    "error while decoding",
    "decode_slice_header error",
    "truncated",
    "malformed",
    "header missing",
    "no video found",
];

const SOFT_INDICATORS: &[&str] = &[
    "non-monotonous dts",
    "non-monotonic timestamps",
    "concealing errors",
    "missing reference picture",
    "frame corruption",
];

/// Outcome of the classifier: status plus a confidence score (reported but
/// never used to alter the status) and a human-readable reason string.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: ScanStatus,
    pub confidence: f64,
    pub reason: String,
}

/// Raw outcome handed to the classifier by the [`crate::inspector`] driver.
#[derive(Debug, Clone)]
pub struct DriverOutcome {
    pub exit_code: Option<i32>,
    pub stderr_text: String,
    pub timed_out: bool,
    /// Set when the process was killed because `cancel` tripped mid-run.
    /// A cancelled outcome is never classified — the worker pool suppresses
    /// it entirely rather than calling [`classify`].
    pub cancelled: bool,
}

fn first_match<'a>(haystack_lower: &str, indicators: &'a [&'a str]) -> Option<&'a str> {
    indicators.iter().find(|needle| haystack_lower.contains(*needle)).copied()
}

/// Pick a confidence within a range proportional to how many soft/hard
/// indicators matched, biasing toward the low end when only one matched.
/// Each indicator outcome maps to a range rather than a single number; see
/// DESIGN.md for why this interpolation was chosen over a literal port of
/// the original scoring.
fn confidence_in_range(low: f64, high: f64, match_count: usize) -> f64 {
    if match_count <= 1 {
        low
    } else {
        let extra = ((match_count - 1) as f64 * 0.05).min(high - low);
        (low + extra).min(high)
    }
}

/// Classify a single job's raw outcome. Pure and deterministic.
pub fn classify(outcome: &DriverOutcome, depth: ScanDepth) -> Classification {
    let stderr_lower = outcome.stderr_text.to_lowercase();
    let stderr_empty = outcome.stderr_text.trim().is_empty();
    let success = outcome.exit_code == Some(0);

    match depth {
        ScanDepth::Quick => classify_quick(outcome, &stderr_lower, stderr_empty, success),
        ScanDepth::Deep | ScanDepth::Full => {
            classify_deep_or_full(outcome, &stderr_lower, stderr_empty, success, depth)
        }
    }
}

fn classify_quick(
    outcome: &DriverOutcome,
    stderr_lower: &str,
    stderr_empty: bool,
    success: bool,
) -> Classification {
    if outcome.timed_out {
        return Classification {
            status: ScanStatus::Suspicious,
            confidence: 0.4,
            reason: "quick pass timed out".to_string(),
        };
    }

    if success && stderr_empty {
        return Classification {
            status: ScanStatus::Healthy,
            confidence: 0.95,
            reason: String::new(),
        };
    }

    if success {
        // exit 0 but non-empty stderr: suspicious, scored by phrase match.
        let hard = first_match(stderr_lower, HARD_INDICATORS);
        let soft = first_match(stderr_lower, SOFT_INDICATORS);
        let matched = hard.or(soft);
        let confidence = match matched {
            Some(_) => confidence_in_range(0.5, 0.7, 1),
            None => 0.5,
        };
        let reason = matched
            .map(|m| format!("quick pass exited 0 with diagnostic output: {m}"))
            .unwrap_or_else(|| "quick pass exited 0 with unrecognized diagnostic output".to_string());
        return Classification {
            status: ScanStatus::Suspicious,
            confidence,
            reason,
        };
    }

    // non-zero exit code.
    if let Some(hard) = first_match(stderr_lower, HARD_INDICATORS) {
        return Classification {
            status: ScanStatus::Corrupt,
            confidence: confidence_in_range(0.85, 0.95, 1),
            reason: format!("hard corruption indicator: {hard}"),
        };
    }
    if let Some(soft) = first_match(stderr_lower, SOFT_INDICATORS) {
        return Classification {
            status: ScanStatus::Suspicious,
            confidence: confidence_in_range(0.5, 0.7, 1),
            reason: format!("soft corruption indicator: {soft}"),
        };
    }

    Classification {
        status: ScanStatus::Suspicious,
        confidence: 0.5,
        reason: "non-zero exit with no recognized indicator".to_string(),
    }
}

fn classify_deep_or_full(
    outcome: &DriverOutcome,
    stderr_lower: &str,
    stderr_empty: bool,
    success: bool,
    depth: ScanDepth,
) -> Classification {
    if depth == ScanDepth::Deep && outcome.timed_out {
        return Classification {
            status: ScanStatus::Corrupt,
            confidence: 0.7,
            reason: "deep pass timed out".to_string(),
        };
    }

    if success && stderr_empty {
        return Classification {
            status: ScanStatus::Healthy,
            confidence: 0.99,
            reason: String::new(),
        };
    }

    let hard = first_match(stderr_lower, HARD_INDICATORS);
    let soft = first_match(stderr_lower, SOFT_INDICATORS);
    let indicator = hard.or(soft);
    let reason = match indicator {
        Some(m) => format!("error indicator at {depth} depth: {m}"),
        None if !success => "non-zero exit with no recognized indicator".to_string(),
        None => "non-empty diagnostic output at deep depth".to_string(),
    };
    Classification {
        status: ScanStatus::Corrupt,
        confidence: confidence_in_range(0.8, 0.95, if indicator.is_some() { 1 } else { 0 }),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit_code: Option<i32>, stderr: &str, timed_out: bool) -> DriverOutcome {
        DriverOutcome {
            exit_code,
            stderr_text: stderr.to_string(),
            timed_out,
            cancelled: false,
        }
    }

    #[test]
    fn quick_healthy_on_clean_exit() {
        let c = classify(&outcome(Some(0), "", false), ScanDepth::Quick);
        assert_eq!(c.status, ScanStatus::Healthy);
        assert!(c.confidence >= 0.9);
    }

    #[test]
    fn quick_hard_indicator_is_corrupt() {
        let c = classify(
            &outcome(Some(1), "Error: moov atom not found", false),
            ScanDepth::Quick,
        );
        assert_eq!(c.status, ScanStatus::Corrupt);
        assert!(c.confidence >= 0.85 && c.confidence <= 0.95);
    }

    #[test]
    fn quick_soft_indicator_is_suspicious() {
        let c = classify(
            &outcome(Some(1), "non-monotonous DTS in stream 0", false),
            ScanDepth::Quick,
        );
        assert_eq!(c.status, ScanStatus::Suspicious);
        assert!(c.confidence >= 0.5 && c.confidence <= 0.7);
    }

    #[test]
    fn quick_timeout_is_suspicious_with_low_confidence() {
        let c = classify(&outcome(None, "", true), ScanDepth::Quick);
        assert_eq!(c.status, ScanStatus::Suspicious);
        assert_eq!(c.confidence, 0.4);
    }

    #[test]
    fn deep_healthy_on_clean_exit() {
        let c = classify(&outcome(Some(0), "", false), ScanDepth::Deep);
        assert_eq!(c.status, ScanStatus::Healthy);
        assert!(c.confidence >= 0.95);
    }

    #[test]
    fn deep_any_error_indicator_is_corrupt() {
        let c = classify(
            &outcome(Some(1), "Error while decoding stream 0:0", false),
            ScanDepth::Deep,
        );
        assert_eq!(c.status, ScanStatus::Corrupt);
    }

    #[test]
    fn deep_timeout_is_corrupt() {
        let c = classify(&outcome(None, "", true), ScanDepth::Deep);
        assert_eq!(c.status, ScanStatus::Corrupt);
        assert_eq!(c.confidence, 0.7);
    }

    #[test]
    fn full_never_treats_timeout_specially() {
        // `timed_out` should not even be reachable for `full`, but classifier
        // stays pure: a stray timed_out=true at Full depth still falls
        // through to the generic success/error branch rather than the
        // Deep-only timeout branch.
        let c = classify(&outcome(Some(0), "", true), ScanDepth::Full);
        assert_eq!(c.status, ScanStatus::Healthy);
    }

    #[test]
    fn classifier_is_pure_and_stable() {
        let a = classify(&outcome(Some(1), "truncated file", false), ScanDepth::Quick);
        let b = classify(&outcome(Some(1), "truncated file", false), ScanDepth::Quick);
        assert_eq!(a, b);
    }

    #[test]
    fn indicator_match_is_case_insensitive() {
        let c = classify(
            &outcome(Some(1), "MOOV ATOM NOT FOUND", false),
            ScanDepth::Quick,
        );
        assert_eq!(c.status, ScanStatus::Corrupt);
    }

    #[test]
    fn first_listed_indicator_wins_ties() {
        // "invalid data found" is listed before "truncated"; a stderr blob
        // containing both must report the first-listed one.
        let c = classify(
            &outcome(Some(1), "invalid data found, stream truncated", false),
            ScanDepth::Quick,
        );
        assert!(c.reason.contains("invalid data found"));
    }
}
