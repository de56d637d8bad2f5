//! Literal variable substitution.
//!
//! # Responsibilities
//! - Hold the per-message variable map, in insertion order
//! - Replace every variable occurrence in template/command text
//!
//! # Design Decisions
//! - Replacement is literal and sequential, not regex
//! - Caller variables go in first; the fixed `$message`/`$channel`
//!   pair is overlaid last and can never be shadowed
//! - Variable names must be sigil-prefixed and no name may be a
//!   prefix of another; behavior under prefix collisions is
//!   unspecified

/// Fixed variable holding the inbound payload as text.
pub const VAR_MESSAGE: &str = "$message";
/// Fixed variable holding the inbound channel name.
pub const VAR_CHANNEL: &str = "$channel";

/// Insertion-ordered variable-to-value map, built fresh per message
/// and never persisted.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    vars: Vec<(String, String)>,
}

impl SubstitutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the per-message context: caller extras first, then the
    /// fixed pair overlaid so it wins on any collision.
    pub fn for_message(channel: &str, payload: &str, extra: &[(String, String)]) -> Self {
        let mut ctx = Self::new();
        for (name, value) in extra {
            ctx.insert(name, value);
        }
        ctx.insert(VAR_MESSAGE, payload);
        ctx.insert(VAR_CHANNEL, channel);
        ctx
    }

    /// Insert a variable. Re-inserting an existing name replaces its
    /// value in place, keeping the original position.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.vars.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.vars.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Sequentially replace every variable that appears in `text`,
    /// in insertion order.
    pub fn apply(&self, text: &str) -> String {
        let mut rendered = text.to_string();
        for (name, value) in &self.vars {
            if rendered.contains(name.as_str()) {
                rendered = rendered.replace(name.as_str(), value);
            }
        }
        rendered
    }
}
