//! Memberships: the join between a player and a campaign, with a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CampaignId, MembershipId, PlayerId, Role};
use crate::validation::ValidationErrors;

/// Message when a player tries to join a campaign twice.
pub const ALREADY_MEMBER: &str = "is already a member of this campaign";

/// A stored membership. At most one exists per (player, campaign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Unique identifier.
    pub id: MembershipId,
    /// The member.
    pub player_id: PlayerId,
    /// The campaign joined.
    pub campaign_id: CampaignId,
    /// Standing within the campaign.
    pub role: Role,
    /// When the player joined.
    pub created_at: DateTime<Utc>,
    /// Last role change.
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Holds the plain member role.
    #[must_use]
    pub fn is_member(&self) -> bool {
        self.role == Role::Member
    }

    /// May change settings or delete the campaign.
    #[must_use]
    pub fn can_manage_campaign(&self) -> bool {
        self.is_admin()
    }

    /// May schedule or edit sessions.
    #[must_use]
    pub fn can_edit_sessions(&self) -> bool {
        self.is_admin()
    }
}

/// Parse a role as submitted by a form, reporting field errors.
///
/// # Errors
///
/// `role` "can't be blank" for empty input, "is not included in the list"
/// for anything other than `admin` / `member`.
pub fn parse_role(input: &str) -> Result<Role, ValidationErrors> {
    if input.trim().is_empty() {
        return Err(ValidationErrors::single("role", crate::validation::BLANK));
    }
    input
        .parse()
        .map_err(|_| ValidationErrors::single("role", "is not included in the list"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(role: Role) -> Membership {
        let now = Utc::now();
        Membership {
            id: MembershipId::new(),
            player_id: PlayerId::new(),
            campaign_id: CampaignId::new(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admin_permissions() {
        let admin = membership(Role::Admin);
        assert!(admin.is_admin());
        assert!(!admin.is_member());
        assert!(admin.can_manage_campaign());
        assert!(admin.can_edit_sessions());
    }

    #[test]
    fn member_permissions() {
        let member = membership(Role::Member);
        assert!(member.is_member());
        assert!(!member.is_admin());
        assert!(!member.can_manage_campaign());
        assert!(!member.can_edit_sessions());
    }

    #[test]
    fn parse_role_accepts_known_roles() {
        assert_eq!(parse_role("admin"), Ok(Role::Admin));
        assert_eq!(parse_role("member"), Ok(Role::Member));
    }

    #[test]
    fn parse_role_rejects_blank_and_unknown() {
        assert!(parse_role("").expect_err("blank").has("role", "can't be blank"));
        assert!(
            parse_role("invalid_role")
                .expect_err("unknown")
                .has("role", "is not included in the list")
        );
    }

    #[test]
    fn roles_constant_lists_both() {
        assert_eq!(Role::ALL, [Role::Admin, Role::Member]);
    }
}
