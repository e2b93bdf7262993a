//! Content-aware thread response classifier (§4.2). Pure function of the
//! last message's body and its `is_sent_by_user` flag — no store access,
//! so it is trivially unit-testable in isolation.

use crate::domain::enums::AwaitingResponseFrom;
use once_cell::sync::Lazy;
use regex::Regex;

/// Set Q: question/ask signals (case-insensitive).
static QUESTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\?\s*$",
        r"\bthoughts\b",
        r"\binterested\b",
        r"\blet me know\b",
        r"\bcircle back\b",
        r"\bfollow up\b",
        r"\bwhat do you think\b",
        r"\bcan you\b",
        r"\bcould you\b",
        r"\bwould you\b",
        r"\bdo you have\b",
        r"\bare you\b.*\?",
        r"\bwhen can\b",
        r"\bschedule\b.*\bcall\b",
        r"\bbook\b.*\btime\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

/// Set C: completion/acknowledgement signals, matched line-exact (case-insensitive).
static CONCLUDED_LINES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^thanks\.?$",
        r"^sounds good\.?$",
        r"^great,?\s*thanks\.?$",
        r"^will do\.?$",
        r"^no worries\.?$",
        r"^talk soon\.?$",
        r"^see you\.?$",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

fn non_blank_lines(body: &str) -> Vec<&str> {
    body.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// §4.2 decision order applied to the last message in a thread.
pub fn classify(last_body: &str, is_sent_by_user: bool) -> AwaitingResponseFrom {
    if last_body.trim().is_empty() {
        return if is_sent_by_user {
            AwaitingResponseFrom::OtherParty
        } else {
            AwaitingResponseFrom::User
        };
    }

    let lines = non_blank_lines(last_body);
    let tail: Vec<&str> = lines.iter().rev().take(3).copied().collect();
    if tail.iter().any(|line| matches_any(&CONCLUDED_LINES, line)) {
        return AwaitingResponseFrom::None;
    }

    if is_sent_by_user {
        if matches_any(&QUESTION_PATTERNS, last_body) {
            AwaitingResponseFrom::OtherParty
        } else {
            AwaitingResponseFrom::None
        }
    } else if matches_any(&QUESTION_PATTERNS, last_body) {
        AwaitingResponseFrom::User
    } else {
        AwaitingResponseFrom::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_from_other_means_user_owes_reply() {
        assert_eq!(classify("", false), AwaitingResponseFrom::User);
    }

    #[test]
    fn empty_body_from_user_means_other_owes_reply() {
        assert_eq!(classify("", true), AwaitingResponseFrom::OtherParty);
    }

    #[test]
    fn concluded_signal_wins_regardless_of_sender() {
        assert_eq!(
            classify("Thanks for everything — all set.", false),
            AwaitingResponseFrom::None
        );
    }

    #[test]
    fn user_asking_a_question_means_other_owes_reply() {
        assert_eq!(
            classify("What's your pricing for a team of 30?", true),
            AwaitingResponseFrom::OtherParty
        );
    }

    #[test]
    fn other_asking_a_question_means_user_owes_reply() {
        assert_eq!(
            classify("Would you be open to a quick call this week?", false),
            AwaitingResponseFrom::User
        );
    }

    #[test]
    fn plain_statement_with_no_signals_is_none() {
        assert_eq!(classify("Here is the invoice as requested.", false), AwaitingResponseFrom::None);
    }
}
