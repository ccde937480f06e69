//! Actor-to-owner normalization.
//!
//! Events carry a free-form `actor` string (`"system"`, `"anonymous"`,
//! `"user_42"`, bare digits, or arbitrary text from upstream integrations).
//! Storage keys memories and log rows by a numeric owner id, so the mapping
//! from actor to owner must be pure and reproducible: the same actor string
//! always resolves to the same owner.

use lazy_static::lazy_static;
use regex::Regex;

/// Actor strings treated as the system principal (owner id 0).
const SYSTEM_ACTORS: &[&str] = &["system", "assistant"];

lazy_static! {
    /// First embedded run of digits anywhere in the actor string.
    static ref DIGIT_RUN_REGEX: Regex = Regex::new(r"\d+").unwrap();
}

/// Resolve a free-form actor string to a numeric owner id.
///
/// Rules, in priority order:
/// 1. empty or `"anonymous"` → `None`
/// 2. a recognized system literal → `Some(0)`
/// 3. `"user_<digits>"` → `Some(<digits>)`
/// 4. a string that is purely digits → itself
/// 5. the first embedded run of digits anywhere in the string
/// 6. otherwise → `None`
///
/// Unmappable actors (including digit runs that overflow `i64`) resolve to
/// `None` rather than erroring; the anonymous owner is the sink for every
/// malformed input.
pub fn resolve_owner(actor: &str) -> Option<i64> {
    if actor.is_empty() || actor == "anonymous" {
        return None;
    }
    if SYSTEM_ACTORS.contains(&actor) {
        return Some(0);
    }
    if let Some(digits) = actor.strip_prefix("user_") {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return digits.parse().ok();
        }
    }
    if actor.bytes().all(|b| b.is_ascii_digit()) {
        return actor.parse().ok();
    }
    DIGIT_RUN_REGEX
        .find(actor)
        .and_then(|m| m.as_str().parse().ok())
}

/// Reconstruct a display actor from a stored owner id.
///
/// Inverse-ish of [`resolve_owner`]: `0` is the system, positive ids are
/// users, and a missing owner is anonymous. Lossy by design (the original
/// free-form actor is not retained in storage).
pub fn actor_for_owner(owner_id: Option<i64>) -> String {
    match owner_id {
        Some(0) => "system".to_string(),
        Some(id) => format!("user_{}", id),
        None => "anonymous".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_anonymous_are_unowned() {
        assert_eq!(resolve_owner(""), None);
        assert_eq!(resolve_owner("anonymous"), None);
    }

    #[test]
    fn system_literals_map_to_zero() {
        assert_eq!(resolve_owner("system"), Some(0));
        assert_eq!(resolve_owner("assistant"), Some(0));
    }

    #[test]
    fn user_prefix_extracts_id() {
        assert_eq!(resolve_owner("user_7"), Some(7));
        assert_eq!(resolve_owner("user_1234"), Some(1234));
    }

    #[test]
    fn bare_digits_parse_directly() {
        assert_eq!(resolve_owner("42"), Some(42));
    }

    #[test]
    fn first_embedded_digit_run_wins() {
        assert_eq!(resolve_owner("abc123"), Some(123));
        assert_eq!(resolve_owner("agent-55-of-99"), Some(55));
    }

    #[test]
    fn unmappable_actors_resolve_to_none() {
        assert_eq!(resolve_owner("ceo"), None);
        assert_eq!(resolve_owner("user_"), None);
        // Digit run too large for i64 falls through to None instead of erroring.
        assert_eq!(resolve_owner("id-99999999999999999999999999"), None);
    }

    #[test]
    fn mapping_is_reproducible() {
        for actor in ["user_7", "system", "", "abc123", "ceo"] {
            assert_eq!(resolve_owner(actor), resolve_owner(actor));
        }
    }

    #[test]
    fn owner_round_trips_to_display_actor() {
        assert_eq!(actor_for_owner(Some(0)), "system");
        assert_eq!(actor_for_owner(Some(9)), "user_9");
        assert_eq!(actor_for_owner(None), "anonymous");
    }
}
