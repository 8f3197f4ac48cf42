//! Play sessions: one scheduled or played evening of a campaign.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WeekStart;
use crate::temporal;
use crate::types::{CampaignId, SessionId};
use crate::validation::{self, Rule, RuleContext, ValidationErrors};

/// Upper notes bound, in characters.
pub const NOTES_MAX: usize = 2000;

/// Message for a session scheduled beyond the horizon.
pub const TOO_FAR_AHEAD: &str = "cannot be more than a year in the future";

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier.
    pub id: SessionId,
    /// Owning campaign.
    pub campaign_id: CampaignId,
    /// When the session was (or will be) played.
    pub played_at: DateTime<Utc>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// When the session was recorded.
    pub created_at: DateTime<Utc>,
    /// Last edit.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Played strictly before `now`.
    #[must_use]
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        temporal::is_past(self.played_at, now)
    }

    /// Scheduled strictly after `now`.
    #[must_use]
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        temporal::is_upcoming(self.played_at, now)
    }

    /// Falls on `now`'s calendar date.
    #[must_use]
    pub fn is_today(&self, now: DateTime<Utc>) -> bool {
        temporal::is_today(self.played_at, now)
    }

    /// Falls within `now`'s calendar week.
    #[must_use]
    pub fn is_this_week(&self, now: DateTime<Utc>, week_start: WeekStart) -> bool {
        temporal::is_this_week(self.played_at, now, week_start)
    }

    /// The editable fields of this session as a draft.
    #[must_use]
    pub fn to_draft(&self) -> SessionDraft {
        SessionDraft {
            played_at: Some(self.played_at),
            notes: self.notes.clone(),
        }
    }
}

/// User-supplied session fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    /// Required. No later than the scheduling horizon.
    pub played_at: Option<DateTime<Utc>>,
    /// Optional notes, at most 2000 characters.
    #[serde(default)]
    pub notes: Option<String>,
}

impl SessionDraft {
    /// A draft for a session at `played_at` with no notes.
    #[must_use]
    pub fn at(played_at: DateTime<Utc>) -> Self {
        Self {
            played_at: Some(played_at),
            notes: None,
        }
    }

    /// Attach notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Run [`RULES`] against this draft at `ctx.now`.
    ///
    /// The horizon is relative to the validation instant, so a draft that
    /// passed yesterday may fail today if it is persisted again.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self, ctx: &RuleContext) -> Result<(), ValidationErrors> {
        validation::check(RULES, self, ctx)
    }
}

fn played_at_present(s: &SessionDraft, _: &RuleContext) -> Option<String> {
    s.played_at.is_none().then(|| validation::BLANK.to_string())
}

fn played_at_horizon(s: &SessionDraft, ctx: &RuleContext) -> Option<String> {
    let played_at = s.played_at?;
    // A horizon past chrono's range bounds nothing.
    let too_far = match ctx.now.checked_add_signed(ctx.max_future) {
        Some(limit) => played_at > limit,
        None => ctx.max_future < Duration::zero(),
    };
    too_far.then(|| TOO_FAR_AHEAD.to_string())
}

fn notes_length(s: &SessionDraft, _: &RuleContext) -> Option<String> {
    validation::optional_max_length(s.notes.as_deref(), NOTES_MAX)
}

/// Session validation rules, in evaluation order.
pub const RULES: &[Rule<SessionDraft>] = &[
    Rule { name: "played_at_present", field: "played_at", check: played_at_present },
    Rule { name: "played_at_horizon", field: "played_at", check: played_at_horizon },
    Rule { name: "notes_length", field: "notes", check: notes_length },
];
