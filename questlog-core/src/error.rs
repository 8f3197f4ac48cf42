//! Error types for the Questlog core library.

use thiserror::Error;

use crate::types::{CampaignId, PlayerId};
use crate::validation::ValidationErrors;

/// Top-level error type for all Questlog operations.
#[derive(Error, Debug)]
pub enum QuestlogError {
    /// One or more fields failed validation. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The player already holds a membership in this campaign.
    #[error("Player {player} is already a member of campaign {campaign}")]
    DuplicateMembership {
        /// The joining player.
        player: PlayerId,
        /// The campaign they already belong to.
        campaign: CampaignId,
    },

    /// A record with the given ID does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Which kind of record was looked up (`"player"`, `"campaign"`, ...).
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuestlogError {
    /// Build a [`QuestlogError::NotFound`] for any displayable identifier.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Field errors carried by a [`QuestlogError::Validation`], if any.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Field errors to show on a form, including a duplicate membership
    /// rendered as an error on `player`.
    #[must_use]
    pub fn field_errors(&self) -> Option<ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors.clone()),
            Self::DuplicateMembership { .. } => Some(ValidationErrors::single(
                "player",
                crate::entity::membership::ALREADY_MEMBER,
            )),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for QuestlogError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, QuestlogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_membership_surfaces_as_player_field_error() {
        let err = QuestlogError::DuplicateMembership {
            player: PlayerId::new(),
            campaign: CampaignId::new(),
        };
        assert!(err.validation_errors().is_none());
        let fields = err.field_errors().expect("field errors");
        assert!(fields.has("player", "is already a member of this campaign"));
    }

    #[test]
    fn not_found_renders_entity_and_id() {
        let err = QuestlogError::not_found("campaign", 42);
        assert_eq!(err.to_string(), "campaign not found: 42");
        assert!(err.field_errors().is_none());
    }
}
