use chrono::{Duration, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};

/// Active educational override grants
///
/// Grants are global, not site-scoped: one active grant suspends all
/// schedule and budget blocking until it expires. Resubmitting a code
/// refreshes its expiry rather than extending it.
#[derive(Debug, Default)]
pub struct OverrideRegistry {
    grants: HashMap<String, NaiveDateTime>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or refresh a grant for a valid code
    ///
    /// Returns true iff `code` is in the valid set; otherwise no state
    /// changes.
    pub fn grant(
        &mut self,
        code: &str,
        now: NaiveDateTime,
        lifetime_minutes: u32,
        valid_codes: &BTreeSet<String>,
    ) -> bool {
        if !valid_codes.contains(code) {
            return false;
        }

        let expires_at = now + Duration::minutes(i64::from(lifetime_minutes));
        self.grants.insert(code.to_string(), expires_at);
        true
    }

    /// True iff at least one grant is still live, purging expired ones
    pub fn is_active(&mut self, now: NaiveDateTime) -> bool {
        self.grants.retain(|_, expires_at| *expires_at > now);
        !self.grants.is_empty()
    }

    /// Administrative reset, used by the emergency block
    pub fn clear_all(&mut self) {
        self.grants.clear();
    }
}
