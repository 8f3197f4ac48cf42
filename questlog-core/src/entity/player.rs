//! Players: people who join campaigns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PlayerId;
use crate::validation::{self, Rule, RuleContext, ValidationErrors};

/// Name length bounds, in characters.
pub const NAME_MIN: usize = 2;
/// Upper name bound, in characters.
pub const NAME_MAX: usize = 50;
/// Upper bio bound, in characters.
pub const BIO_MAX: usize = 500;

/// A stored player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Unique, lower-cased email address.
    pub email: String,
    /// Optional short biography.
    pub bio: Option<String>,
    /// When the player registered.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
}

impl Player {
    /// The name when present, otherwise the local part of the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.email.split('@').next().unwrap_or(&self.email)
        } else {
            &self.name
        }
    }

    /// The editable fields of this player as a draft.
    #[must_use]
    pub fn to_draft(&self) -> PlayerDraft {
        PlayerDraft {
            name: self.name.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
        }
    }
}

/// User-supplied player fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDraft {
    /// Display name, 2–50 characters.
    pub name: String,
    /// Email address; normalised before validation.
    pub email: String,
    /// Optional biography, at most 500 characters.
    #[serde(default)]
    pub bio: Option<String>,
}

impl PlayerDraft {
    /// A draft with no bio.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            bio: None,
        }
    }

    /// Attach a biography.
    #[must_use]
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Trim and lower-case the email; drop an empty bio.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.clone(),
            email: self.email.trim().to_lowercase(),
            bio: self.bio.clone().filter(|b| !b.trim().is_empty()),
        }
    }

    /// Run [`RULES`] against this draft. Email uniqueness is the store's job.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self, ctx: &RuleContext) -> Result<(), ValidationErrors> {
        validation::check(RULES, self, ctx)
    }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerChanges {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New email address.
    #[serde(default)]
    pub email: Option<String>,
    /// New bio; `Some(None)` clears it.
    #[serde(default)]
    pub bio: Option<Option<String>>,
}

impl PlayerChanges {
    /// Overlay these changes on `player`'s current fields.
    #[must_use]
    pub fn apply_to(&self, player: &Player) -> PlayerDraft {
        let mut draft = player.to_draft();
        if let Some(name) = &self.name {
            draft.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            draft.email.clone_from(email);
        }
        if let Some(bio) = &self.bio {
            draft.bio.clone_from(bio);
        }
        draft
    }
}

/// `local@domain`, one `@`, no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
}

fn name_present(p: &PlayerDraft, _: &RuleContext) -> Option<String> {
    validation::presence(&p.name)
}

fn name_length(p: &PlayerDraft, _: &RuleContext) -> Option<String> {
    validation::length_within(&p.name, NAME_MIN, NAME_MAX)
}

fn email_present(p: &PlayerDraft, _: &RuleContext) -> Option<String> {
    validation::presence(&p.email)
}

fn email_format(p: &PlayerDraft, _: &RuleContext) -> Option<String> {
    let email = p.email.trim();
    (!email.is_empty() && !is_valid_email(email)).then(|| "is invalid".to_string())
}

fn bio_length(p: &PlayerDraft, _: &RuleContext) -> Option<String> {
    validation::optional_max_length(p.bio.as_deref(), BIO_MAX)
}

/// Player validation rules, in evaluation order.
pub const RULES: &[Rule<PlayerDraft>] = &[
    Rule { name: "name_present", field: "name", check: name_present },
    Rule { name: "name_length", field: "name", check: name_length },
    Rule { name: "email_present", field: "email", check: email_present },
    Rule { name: "email_format", field: "email", check: email_format },
    Rule { name: "bio_length", field: "bio", check: bio_length },
];
