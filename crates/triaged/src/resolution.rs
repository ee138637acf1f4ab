//! Heuristic resolution detection over conversational message streams.
//!
//! A pure guard chain; each guard short-circuits. Order is load-bearing:
//! the cooldown and negative-context checks run before the positive
//! keyword check so "is this fixed?" never reads as a resolution.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum time since initial detection before a resolution can register.
/// Prevents the very message that opened the case from closing it.
pub const RESOLUTION_COOLDOWN_MINUTES: i64 = 5;

/// How many trailing messages are scanned for open questions.
const RECENT_MESSAGE_WINDOW: usize = 3;

static NEGATIVE_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(what if|would (it|that)|in case|suppose|try(ing)? to|troubleshoot(ing)?|still (not|broken|failing|down)|not (working|fixed|resolved)|doesn'?t work|isn'?t work(ing)?|issue (persists|remains)|same (error|problem)|keeps? (happening|failing))\b",
    )
    .expect("negative-context pattern compiles")
});

static POSITIVE_RESOLUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(fixed|resolved|solved|sorted|working now|works now|all good|back (up|online)|no longer (an issue|happening)|that did it|problem (is )?gone)\b",
    )
    .expect("positive-resolution pattern compiles")
});

/// Pure input snapshot for one resolution check.
#[derive(Debug, Clone)]
pub struct ResolutionCheckContext {
    /// When the case was first detected in the conversation.
    pub detected_at: DateTime<Utc>,
    /// Last messages in the conversation, most recent last.
    pub recent_messages: Vec<String>,
    pub already_resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub is_resolved: bool,
    pub reason: &'static str,
}

impl Resolution {
    fn no(reason: &'static str) -> Self {
        Self {
            is_resolved: false,
            reason,
        }
    }
}

/// Decide whether `message` indicates the case is resolved, given the
/// conversation context at `now`.
pub fn detect_resolution(
    message: &str,
    ctx: &ResolutionCheckContext,
    now: DateTime<Utc>,
) -> Resolution {
    if ctx.already_resolved {
        return Resolution::no("case already marked resolved");
    }

    if now - ctx.detected_at < Duration::minutes(RESOLUTION_COOLDOWN_MINUTES) {
        return Resolution::no("within post-detection cooldown");
    }

    let trimmed = message.trim();
    if trimmed.ends_with('?') || NEGATIVE_CONTEXT.is_match(trimmed) {
        return Resolution::no("negative context in message");
    }

    if !POSITIVE_RESOLUTION.is_match(trimmed) {
        return Resolution::no("no resolution keyword");
    }

    let recent_questions = ctx
        .recent_messages
        .iter()
        .rev()
        .take(RECENT_MESSAGE_WINDOW)
        .any(|m| m.contains('?'));
    if recent_questions {
        return Resolution::no("recent messages contain open questions");
    }

    Resolution {
        is_resolved: true,
        reason: "resolution keyword with no negative signals",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ResolutionCheckContext {
        ResolutionCheckContext {
            detected_at: Utc::now() - Duration::minutes(30),
            recent_messages: vec![],
            already_resolved: false,
        }
    }

    #[test]
    fn test_clear_resolution_detected() {
        let result = detect_resolution("that fixed it, all good", &ctx(), Utc::now());
        assert!(result.is_resolved);
    }

    #[test]
    fn test_question_never_resolves_despite_keywords() {
        let result = detect_resolution("is this fixed?", &ctx(), Utc::now());
        assert!(!result.is_resolved);
        assert_eq!(result.reason, "negative context in message");
    }

    #[test]
    fn test_cooldown_blocks_immediate_resolution() {
        let mut c = ctx();
        c.detected_at = Utc::now() - Duration::minutes(2);
        let result = detect_resolution("it is fixed now", &c, Utc::now());
        assert!(!result.is_resolved);
        assert_eq!(result.reason, "within post-detection cooldown");
    }

    #[test]
    fn test_already_resolved_short_circuits_first() {
        let mut c = ctx();
        c.already_resolved = true;
        // Even within cooldown, the already-resolved guard wins.
        c.detected_at = Utc::now();
        let result = detect_resolution("fixed", &c, Utc::now());
        assert_eq!(result.reason, "case already marked resolved");
    }

    #[test]
    fn test_negative_phrasing_blocks_positive_keyword() {
        let result = detect_resolution("still not fixed after the patch", &ctx(), Utc::now());
        assert!(!result.is_resolved);
        assert_eq!(result.reason, "negative context in message");
    }

    #[test]
    fn test_hypothetical_phrasing_blocked() {
        let result = detect_resolution("what if we reboot, would that leave it fixed", &ctx(), Utc::now());
        assert!(!result.is_resolved);
    }

    #[test]
    fn test_no_keyword_is_not_resolved() {
        let result = detect_resolution("thanks for the help", &ctx(), Utc::now());
        assert!(!result.is_resolved);
        assert_eq!(result.reason, "no resolution keyword");
    }

    #[test]
    fn test_recent_questions_block_resolution() {
        let mut c = ctx();
        c.recent_messages = vec![
            "old message".to_string(),
            "did you try restarting?".to_string(),
            "ok".to_string(),
        ];
        let result = detect_resolution("working now", &c, Utc::now());
        assert!(!result.is_resolved);
        assert_eq!(result.reason, "recent messages contain open questions");
    }

    #[test]
    fn test_question_outside_window_ignored() {
        let mut c = ctx();
        c.recent_messages = vec![
            "did you try restarting?".to_string(),
            "yes".to_string(),
            "rebooted".to_string(),
            "done".to_string(),
        ];
        let result = detect_resolution("working now", &c, Utc::now());
        assert!(result.is_resolved);
    }
}
