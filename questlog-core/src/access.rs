//! Access policy: who may view or administer a campaign.
//!
//! Every decision is derived from the single membership row for a
//! (player, campaign) pair. Because that pair is unique, a player is either
//! an admin, a plain member, or not in the campaign at all; the admin and
//! member rosters are therefore disjoint and together cover every player
//! in the campaign.
//!
//! A denial is a value, never an error. Callers render
//! [`Denial::message`] to the user and must not reveal anything about the
//! campaign they were denied.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::entity::{Membership, Player};
use crate::error::Result;
use crate::store::Store;
use crate::types::{CampaignId, PlayerId, Role};

/// Notice shown to a player outside the campaign.
pub const NO_ACCESS: &str = "You don't have access to this campaign.";

/// Notice shown to a member attempting an admin-only action.
pub const ADMIN_REQUIRED: &str = "You must be an admin to perform this action.";

// ---------------------------------------------------------------------------
// Lookup seam
// ---------------------------------------------------------------------------

/// Anything that can answer "what role does this player hold here?".
///
/// The store answers from SQLite; a slice of memberships answers from
/// memory, which keeps the policy testable without a database.
pub trait MembershipLookup {
    /// The role `player` holds in `campaign`, or `None` without a membership.
    ///
    /// # Errors
    ///
    /// Implementations backed by storage return their read errors.
    fn role_of(&self, player: PlayerId, campaign: CampaignId) -> Result<Option<Role>>;
}

impl MembershipLookup for Store {
    fn role_of(&self, player: PlayerId, campaign: CampaignId) -> Result<Option<Role>> {
        Store::role_of(self, player, campaign)
    }
}

impl MembershipLookup for [Membership] {
    fn role_of(&self, player: PlayerId, campaign: CampaignId) -> Result<Option<Role>> {
        Ok(self
            .iter()
            .find(|m| m.player_id == player && m.campaign_id == campaign)
            .map(|m| m.role))
    }
}

/// True iff `player` holds any membership in `campaign`.
///
/// # Errors
///
/// Propagates lookup failures.
pub fn member_of<L: MembershipLookup + ?Sized>(lookup: &L, player: PlayerId, campaign: CampaignId) -> Result<bool> {
    Ok(lookup.role_of(player, campaign)?.is_some())
}

/// True iff `player` holds an admin membership in `campaign`.
///
/// No membership means `false`, not an error.
///
/// # Errors
///
/// Propagates lookup failures.
pub fn admin_of<L: MembershipLookup + ?Sized>(lookup: &L, player: PlayerId, campaign: CampaignId) -> Result<bool> {
    Ok(lookup.role_of(player, campaign)? == Some(Role::Admin))
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// What a caller is trying to do with a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Read the campaign, its roster and sessions. Any member.
    View,
    /// Change settings, delete, or schedule sessions. Admins only.
    Manage,
}

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// The player has no membership in the campaign.
    NotMember,
    /// The player is a member but the action needs an admin.
    NotAdmin,
}

impl Denial {
    /// User-facing notice for this denial.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::NotMember => NO_ACCESS,
            Self::NotAdmin => ADMIN_REQUIRED,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Allowed; carries the role that granted it.
    Granted(Role),
    /// Refused.
    Denied(Denial),
}

impl Decision {
    /// Whether access was granted.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Decide `access` for a player holding `role` (or nothing).
    #[must_use]
    pub fn for_role(role: Option<Role>, access: Access) -> Self {
        match (role, access) {
            (None, _) => Self::Denied(Denial::NotMember),
            (Some(Role::Member), Access::Manage) => Self::Denied(Denial::NotAdmin),
            (Some(role), _) => Self::Granted(role),
        }
    }
}

/// Check whether `player` may perform `access` on `campaign`.
///
/// Denials are logged at `warn` with the player, campaign and the access
/// that was requested.
///
/// # Errors
///
/// Propagates lookup failures. A refusal is `Ok(Decision::Denied(_))`.
pub fn authorize<L: MembershipLookup + ?Sized>(
    lookup: &L,
    player: PlayerId,
    campaign: CampaignId,
    access: Access,
) -> Result<Decision> {
    let decision = Decision::for_role(lookup.role_of(player, campaign)?, access);
    if let Decision::Denied(denial) = decision {
        warn!(
            player = %player,
            campaign = %campaign,
            required = ?access,
            reason = ?denial,
            "Campaign access denied"
        );
    }
    Ok(decision)
}

// ---------------------------------------------------------------------------
// Rosters
// ---------------------------------------------------------------------------

/// Players holding the admin role in `campaign`, ordered by name.
///
/// # Errors
///
/// Returns [`crate::QuestlogError::Database`] on SQLite failures.
pub fn admin_players(store: &Store, campaign: CampaignId) -> Result<Vec<Player>> {
    store.players_with_role(campaign, Role::Admin)
}

/// Players holding the member role in `campaign`, ordered by name.
///
/// # Errors
///
/// Returns [`crate::QuestlogError::Database`] on SQLite failures.
pub fn member_players(store: &Store, campaign: CampaignId) -> Result<Vec<Player>> {
    store.players_with_role(campaign, Role::Member)
}

/// A campaign's players partitioned by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    /// Admins, ordered by name.
    pub admins: Vec<Player>,
    /// Plain members, ordered by name.
    pub members: Vec<Player>,
}

impl Roster {
    /// Load both partitions for `campaign` in one read.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn load(store: &Store, campaign: CampaignId) -> Result<Self> {
        let mut roster = Self::default();
        for (player, role) in store.campaign_roster(campaign)? {
            match role {
                Role::Admin => roster.admins.push(player),
                Role::Member => roster.members.push(player),
            }
        }
        Ok(roster)
    }

    /// Total number of players in the campaign.
    #[must_use]
    pub fn len(&self) -> usize {
        self.admins.len() + self.members.len()
    }

    /// Whether the campaign has no players at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty() && self.members.is_empty()
    }

    /// The role of `player` according to this roster.
    #[must_use]
    pub fn role_of(&self, player: PlayerId) -> Option<Role> {
        if self.admins.iter().any(|p| p.id == player) {
            Some(Role::Admin)
        } else if self.members.iter().any(|p| p.id == player) {
            Some(Role::Member)
        } else {
            None
        }
    }
}
