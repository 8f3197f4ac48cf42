//! Field validation.
//!
//! Each entity exposes an ordered list of named [`Rule`]s. [`check`] runs all
//! of them and collects every failure into a [`ValidationErrors`] map keyed by
//! field name, so a caller can re-render a form with every problem at once.
//! Rules are plain functions; nothing is registered dynamically.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Inputs a rule may depend on besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    /// The instant the record is being validated at.
    pub now: DateTime<Utc>,
    /// How far ahead of `now` a session may be scheduled (inclusive).
    pub max_future: Duration,
}

impl RuleContext {
    /// Context using the default one-year (365 day) scheduling horizon.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            max_future: Duration::days(crate::config::DEFAULT_MAX_FUTURE_DAYS),
        }
    }
}

/// One named check against a single field.
pub struct Rule<T> {
    /// Stable rule name, useful in logs.
    pub name: &'static str,
    /// Field the message is reported under.
    pub field: &'static str,
    /// Returns `Some(message)` when the record violates the rule.
    pub check: fn(&T, &RuleContext) -> Option<String>,
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Field name → human-readable messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    /// An empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a single field error.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    /// Messages recorded for `field` (empty when the field is fine).
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[][..], Vec::as_slice)
    }

    /// Whether `field` carries `message`.
    #[must_use]
    pub fn has(&self, field: &str, message: &str) -> bool {
        self.get(field).iter().any(|m| m == message)
    }

    /// `true` when no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields that failed, in order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// Fold another error set into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when at least one field failed.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{field} {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Run every rule in order and collect the failures.
///
/// # Errors
///
/// Returns all field errors when any rule fails.
pub fn check<T>(rules: &[Rule<T>], subject: &T, ctx: &RuleContext) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for rule in rules {
        if let Some(message) = (rule.check)(subject, ctx) {
            tracing::trace!(rule = rule.name, field = rule.field, %message, "Validation rule failed");
            errors.add(rule.field, message);
        }
    }
    errors.into_result()
}

// ---------------------------------------------------------------------------
// Reusable checks
// ---------------------------------------------------------------------------

/// Message for a missing or whitespace-only value.
pub const BLANK: &str = "can't be blank";

/// `Some("can't be blank")` when `value` is empty after trimming.
#[must_use]
pub fn presence(value: &str) -> Option<String> {
    value.trim().is_empty().then(|| BLANK.to_string())
}

/// Length bounds in characters. Blank values are left to [`presence`].
#[must_use]
pub fn length_within(value: &str, min: usize, max: usize) -> Option<String> {
    if value.trim().is_empty() {
        return None;
    }
    let len = value.chars().count();
    if len < min {
        Some(format!("is too short (minimum is {min} characters)"))
    } else {
        max_length(value, max)
    }
}

/// Upper length bound in characters.
#[must_use]
pub fn max_length(value: &str, max: usize) -> Option<String> {
    (value.chars().count() > max).then(|| format!("is too long (maximum is {max} characters)"))
}

/// Upper length bound for optional text; `None` always passes.
#[must_use]
pub fn optional_max_length(value: Option<&str>, max: usize) -> Option<String> {
    value.and_then(|v| max_length(v, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: String,
    }

    fn name_present(n: &Named, _: &RuleContext) -> Option<String> {
        presence(&n.name)
    }

    fn name_length(n: &Named, _: &RuleContext) -> Option<String> {
        length_within(&n.name, 2, 5)
    }

    const RULES: &[Rule<Named>] = &[
        Rule { name: "name_present", field: "name", check: name_present },
        Rule { name: "name_length", field: "name", check: name_length },
    ];

    fn ctx() -> RuleContext {
        RuleContext::at(Utc::now())
    }

    #[test]
    fn passing_record_yields_ok() {
        let named = Named { name: "Ada".into() };
        assert!(check(RULES, &named, &ctx()).is_ok());
    }

    #[test]
    fn blank_reports_presence_only() {
        let named = Named { name: "   ".into() };
        let errors = check(RULES, &named, &ctx()).expect_err("should fail");
        assert_eq!(errors.get("name"), [BLANK.to_string()]);
    }

    #[test]
    fn length_messages_name_the_bound() {
        let short = check(RULES, &Named { name: "a".into() }, &ctx()).expect_err("should fail");
        assert!(short.has("name", "is too short (minimum is 2 characters)"));

        let long = check(RULES, &Named { name: "abcdef".into() }, &ctx()).expect_err("should fail");
        assert!(long.has("name", "is too long (maximum is 5 characters)"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Five two-byte characters.
        assert!(length_within("ééééé", 2, 5).is_none());
    }

    #[test]
    fn display_joins_field_messages() {
        let mut errors = ValidationErrors::single("title", BLANK);
        errors.add("system", "is too long (maximum is 50 characters)");
        assert_eq!(
            errors.to_string(),
            "system is too long (maximum is 50 characters), title can't be blank"
        );
    }
}
