//! Core type definitions for Questlog.
//!
//! Identifiers are UUID newtypes stored as lowercase hyphenated text, so
//! their SQL ordering matches their in-memory [`Ord`].

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0.hyphenated().to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                Uuid::parse_str(text)
                    .map(Self)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

id_type!(
    /// Unique identifier for a player.
    PlayerId
);
id_type!(
    /// Unique identifier for a campaign.
    CampaignId
);
id_type!(
    /// Unique identifier for a membership row.
    MembershipId
);
id_type!(
    /// Unique identifier for a play session.
    SessionId
);

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A player's standing within one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full management rights: settings, sessions, deletion.
    Admin,
    /// Participant. Read-only on campaign settings.
    Member,
}

impl Role {
    /// Every valid role, in display order.
    pub const ALL: [Role; 2] = [Role::Admin, Role::Member];

    /// The stored / wire spelling of this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of [`Role::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownRole| FromSqlError::Other(Box::new(e)))
    }
}

// ---------------------------------------------------------------------------
// Cascade accounting
// ---------------------------------------------------------------------------

/// Rows removed alongside a deleted player or campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Membership rows removed.
    pub memberships: usize,
    /// Session rows removed (always zero for player deletion).
    pub sessions: usize,
}

impl CascadeReport {
    /// Total dependent rows removed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.memberships + self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn role_rejects_unknown_spelling() {
        assert_eq!(
            "moderator".parse::<Role>(),
            Err(UnknownRole("moderator".to_string()))
        );
        assert!("Admin".parse::<Role>().is_err(), "roles are case-sensitive");
    }

    #[test]
    fn id_display_is_hyphenated_uuid() {
        let id = PlayerId::new();
        assert_eq!(id.to_string(), id.0.hyphenated().to_string());
    }
}
