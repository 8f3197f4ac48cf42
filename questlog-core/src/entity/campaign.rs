//! Campaigns: a tracked game with its own roster and session log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CampaignId;
use crate::validation::{self, Rule, RuleContext, ValidationErrors};

/// Lower title bound, in characters.
pub const TITLE_MIN: usize = 3;
/// Upper title bound, in characters.
pub const TITLE_MAX: usize = 100;
/// Lower description bound, in characters.
pub const DESCRIPTION_MIN: usize = 10;
/// Upper description bound, in characters.
pub const DESCRIPTION_MAX: usize = 1000;
/// Upper ruleset label bound, in characters.
pub const SYSTEM_MAX: usize = 50;

/// A stored campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier.
    pub id: CampaignId,
    /// Campaign title.
    pub title: String,
    /// Pitch or summary.
    pub description: String,
    /// Ruleset label, e.g. "D&D 5e" or "Pathfinder".
    pub system: String,
    /// When the campaign was created.
    pub created_at: DateTime<Utc>,
    /// Last settings change.
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// The editable fields of this campaign as a draft.
    #[must_use]
    pub fn to_draft(&self) -> CampaignDraft {
        CampaignDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            system: self.system.clone(),
        }
    }
}

/// User-supplied campaign fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDraft {
    /// Title, 3–100 characters.
    pub title: String,
    /// Description, 10–1000 characters.
    pub description: String,
    /// Ruleset label, at most 50 characters.
    pub system: String,
}

impl CampaignDraft {
    /// Build a draft from its three fields.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            system: system.into(),
        }
    }

    /// Run [`RULES`] against this draft.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self, ctx: &RuleContext) -> Result<(), ValidationErrors> {
        validation::check(RULES, self, ctx)
    }
}

fn title_present(c: &CampaignDraft, _: &RuleContext) -> Option<String> {
    validation::presence(&c.title)
}

fn title_length(c: &CampaignDraft, _: &RuleContext) -> Option<String> {
    validation::length_within(&c.title, TITLE_MIN, TITLE_MAX)
}

fn description_present(c: &CampaignDraft, _: &RuleContext) -> Option<String> {
    validation::presence(&c.description)
}

fn description_length(c: &CampaignDraft, _: &RuleContext) -> Option<String> {
    validation::length_within(&c.description, DESCRIPTION_MIN, DESCRIPTION_MAX)
}

fn system_present(c: &CampaignDraft, _: &RuleContext) -> Option<String> {
    validation::presence(&c.system)
}

fn system_length(c: &CampaignDraft, _: &RuleContext) -> Option<String> {
    validation::max_length(&c.system, SYSTEM_MAX)
}

/// Campaign validation rules, in evaluation order.
pub const RULES: &[Rule<CampaignDraft>] = &[
    Rule { name: "title_present", field: "title", check: title_present },
    Rule { name: "title_length", field: "title", check: title_length },
    Rule { name: "description_present", field: "description", check: description_present },
    Rule { name: "description_length", field: "description", check: description_length },
    Rule { name: "system_present", field: "system", check: system_present },
    Rule { name: "system_length", field: "system", check: system_length },
];
