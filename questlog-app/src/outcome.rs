//! Results of user actions that the access policy may refuse.
//!
//! A refusal is not an error: the caller shows a notice and moves on.
//! Errors (`NotFound`, validation, storage) stay on the `Err` side of the
//! surrounding `Result`.

use serde::Serialize;
use serde_json::{Value, json};

use questlog_core::access::{ADMIN_REQUIRED, Denial, NO_ACCESS};

/// Notice shown when a player tries to edit someone else's profile.
pub const NOT_AUTHORIZED: &str = "Not authorized";

/// A user-facing reason for a refusal.
///
/// Notices carry no data about the resource that was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Not a member of the campaign.
    NoAccess,
    /// A member, but the action needs an admin.
    AdminRequired,
    /// Acting on another player's account.
    NotAuthorized,
}

impl Notice {
    /// Text to show the player.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::NoAccess => NO_ACCESS,
            Self::AdminRequired => ADMIN_REQUIRED,
            Self::NotAuthorized => NOT_AUTHORIZED,
        }
    }
}

impl From<Denial> for Notice {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotMember => Self::NoAccess,
            Denial::NotAdmin => Self::AdminRequired,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// What a permitted action produced, or why it was not permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    /// The action ran.
    Done(T),
    /// The action was refused before touching anything.
    Denied(Notice),
}

impl<T> Outcome<T> {
    /// Whether the action ran.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The refusal notice, if any.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Done(_) => None,
            Self::Denied(notice) => Some(*notice),
        }
    }

    /// The value, discarding a refusal.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Denied(_) => None,
        }
    }

    /// Transform the value of a completed action.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Done(value) => Outcome::Done(f(value)),
            Self::Denied(notice) => Outcome::Denied(notice),
        }
    }
}

impl<T: Serialize> Outcome<T> {
    /// Render for a JSON response body.
    ///
    /// Completed actions become `{"status": "done", "data": ...}`; refusals
    /// become `{"status": "denied", "notice": "...", "reason": "..."}`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `T` fails to serialize.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        Ok(match self {
            Self::Done(value) => json!({ "status": "done", "data": serde_json::to_value(value)? }),
            Self::Denied(notice) => json!({
                "status": "denied",
                "notice": notice.message(),
                "reason": notice,
            }),
        })
    }
}
