//! Membership rows and the (player, campaign) uniqueness guarantee.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::campaigns::campaign_exists;
use super::players::{PLAYER_COLUMNS, collect_players, player_exists, player_row};
use super::{Store, micros_at, stamp, to_micros, unique_violation};
use crate::entity::{Membership, Player};
use crate::error::{QuestlogError, Result};
use crate::types::{CampaignId, MembershipId, PlayerId, Role};
use crate::validation::ValidationErrors;

const MEMBERSHIP_COLUMNS: &str =
    "m.id, m.player_id, m.campaign_id, m.role, m.created_at, m.updated_at";

/// Message for a reference to a player or campaign that does not exist.
pub const MUST_EXIST: &str = "must exist";

fn membership_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        player_id: row.get(1)?,
        campaign_id: row.get(2)?,
        role: row.get(3)?,
        created_at: micros_at(row, 4)?,
        updated_at: micros_at(row, 5)?,
    })
}

fn collect_memberships(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Membership>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, membership_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(super) fn lookup_role(conn: &Connection, player: PlayerId, campaign: CampaignId) -> Result<Option<Role>> {
    let mut stmt =
        conn.prepare_cached("SELECT role FROM memberships WHERE player_id = ?1 AND campaign_id = ?2")?;
    Ok(stmt
        .query_row(params![player, campaign], |row| row.get(0))
        .optional()?)
}

/// Check references and uniqueness, then insert. Must run inside a write
/// transaction so the check and the insert are one atomic step.
pub(super) fn insert_membership(
    conn: &Connection,
    player: PlayerId,
    campaign: CampaignId,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Membership> {
    let mut errors = ValidationErrors::new();
    if !player_exists(conn, player)? {
        errors.add("player", MUST_EXIST);
    }
    if !campaign_exists(conn, campaign)? {
        errors.add("campaign", MUST_EXIST);
    }
    errors.into_result()?;
    let now = stamp(now);

    if lookup_role(conn, player, campaign)?.is_some() {
        return Err(QuestlogError::DuplicateMembership { player, campaign });
    }

    let membership = Membership {
        id: MembershipId::new(),
        player_id: player,
        campaign_id: campaign,
        role,
        created_at: now,
        updated_at: now,
    };
    write_membership(conn, &membership)?;
    Ok(membership)
}

/// Insert a row as is. The unique index on (player, campaign) surfaces as
/// `DuplicateMembership`, covering writers that race past `lookup_role`.
fn write_membership(conn: &Connection, membership: &Membership) -> Result<()> {
    let (player, campaign) = (membership.player_id, membership.campaign_id);
    conn.execute(
        "INSERT INTO memberships (id, player_id, campaign_id, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            membership.id,
            player,
            campaign,
            membership.role,
            to_micros(membership.created_at),
            to_micros(membership.updated_at)
        ],
    )
    .map_err(|err| match unique_violation(&err) {
        Some(detail) if detail.contains("memberships.") => {
            QuestlogError::DuplicateMembership { player, campaign }
        }
        _ => QuestlogError::Database(err),
    })?;
    Ok(())
}

impl Store {
    /// Add `player` to `campaign` with `role`.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::DuplicateMembership`] if the player already belongs
    /// to the campaign (under any role), [`QuestlogError::Validation`] with
    /// "must exist" when the player or campaign is unknown.
    pub fn create_membership(
        &self,
        player: PlayerId,
        campaign: CampaignId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Membership> {
        let membership = self.write(|tx| insert_membership(tx, player, campaign, role, now))?;
        info!(
            player = %player,
            campaign = %campaign,
            role = %role,
            "Membership created"
        );
        Ok(membership)
    }

    /// The membership binding `player` to `campaign`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn membership_for(&self, player: PlayerId, campaign: CampaignId) -> Result<Option<Membership>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships m
             WHERE m.player_id = ?1 AND m.campaign_id = ?2"
        ))?;
        Ok(stmt.query_row(params![player, campaign], membership_row).optional()?)
    }

    /// Change the role on an existing membership.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] for an unknown membership id.
    pub fn update_membership_role(&self, id: MembershipId, role: Role, now: DateTime<Utc>) -> Result<Membership> {
        let now = stamp(now);
        let membership = self.write(|tx| {
            let changed = tx.execute(
                "UPDATE memberships SET role = ?1, updated_at = ?2 WHERE id = ?3",
                params![role, to_micros(now), id],
            )?;
            if changed == 0 {
                return Err(QuestlogError::not_found("membership", id));
            }
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships m WHERE m.id = ?1"
            ))?;
            Ok(stmt.query_row(params![id], membership_row)?)
        })?;
        debug!(membership = %id, role = %role, "Membership role changed");
        Ok(membership)
    }

    /// Remove a single membership. Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn delete_membership(&self, id: MembershipId) -> Result<bool> {
        let deleted = self.write(|tx| Ok(tx.execute("DELETE FROM memberships WHERE id = ?1", params![id])?))?;
        Ok(deleted > 0)
    }

    /// Every membership in `campaign`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn memberships_for_campaign(&self, campaign: CampaignId) -> Result<Vec<Membership>> {
        collect_memberships(
            &self.conn(),
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships m
                 WHERE m.campaign_id = ?1 ORDER BY m.created_at, m.id"
            ),
            params![campaign],
        )
    }

    /// Every membership held by `player`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn memberships_for_player(&self, player: PlayerId) -> Result<Vec<Membership>> {
        collect_memberships(
            &self.conn(),
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships m
                 WHERE m.player_id = ?1 ORDER BY m.created_at, m.id"
            ),
            params![player],
        )
    }

    /// Every membership with `role`, across all campaigns.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn memberships_with_role(&self, role: Role) -> Result<Vec<Membership>> {
        collect_memberships(
            &self.conn(),
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships m
                 WHERE m.role = ?1 ORDER BY m.created_at, m.id"
            ),
            params![role],
        )
    }

    /// Admin memberships across all campaigns.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn admin_memberships(&self) -> Result<Vec<Membership>> {
        self.memberships_with_role(Role::Admin)
    }

    /// Plain member memberships across all campaigns.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn member_memberships(&self) -> Result<Vec<Membership>> {
        self.memberships_with_role(Role::Member)
    }

    /// Players holding `role` in `campaign`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn players_with_role(&self, campaign: CampaignId, role: Role) -> Result<Vec<Player>> {
        collect_players(
            &self.conn(),
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players p
                 JOIN memberships m ON m.player_id = p.id
                 WHERE m.campaign_id = ?1 AND m.role = ?2
                 ORDER BY p.name, p.id"
            ),
            params![campaign, role],
        )
    }

    /// Every player in `campaign` with the role they hold, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn campaign_roster(&self, campaign: CampaignId) -> Result<Vec<(Player, Role)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {PLAYER_COLUMNS}, m.role FROM players p
             JOIN memberships m ON m.player_id = p.id
             WHERE m.campaign_id = ?1
             ORDER BY p.name, p.id"
        ))?;
        let rows = stmt.query_map(params![campaign], |row| Ok((player_row(row)?, row.get(6)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The role `player` holds in `campaign`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn role_of(&self, player: PlayerId, campaign: CampaignId) -> Result<Option<Role>> {
        lookup_role(&self.conn(), player, campaign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuestlogConfig;
    use crate::entity::{CampaignDraft, PlayerDraft};

    struct Fixture {
        store: Store,
        player: PlayerId,
        campaign: CampaignId,
    }

    fn fixture() -> Fixture {
        let store = Store::open_in_memory(&QuestlogConfig::default()).expect("open");
        let now = Utc::now();
        let player = store
            .create_player(&PlayerDraft::new("Pip", "pip@example.com"), now)
            .expect("player")
            .id;
        let campaign = store
            .create_campaign(&CampaignDraft::new("Curse of Strahd", "Gothic horror in Barovia.", "D&D 5e"), now)
            .expect("campaign")
            .id;
        Fixture { store, player, campaign }
    }

    #[test]
    fn second_membership_for_pair_is_duplicate() {
        let f = fixture();
        let now = Utc::now();
        f.store.create_membership(f.player, f.campaign, Role::Member, now).expect("first");

        for role in Role::ALL {
            let err = f
                .store
                .create_membership(f.player, f.campaign, role, now)
                .expect_err("duplicate");
            assert!(matches!(
                err,
                QuestlogError::DuplicateMembership { player, campaign }
                    if player == f.player && campaign == f.campaign
            ));
        }
        assert_eq!(f.store.count("memberships").expect("count"), 1);
    }

    #[test]
    fn unique_index_violation_maps_to_duplicate() {
        let f = fixture();
        let now = Utc::now();
        f.store.create_membership(f.player, f.campaign, Role::Member, now).expect("first");

        // Bypass the application-level check to hit the index directly.
        let conn = f.store.conn();
        let err = conn
            .execute(
                "INSERT INTO memberships (id, player_id, campaign_id, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'member', 0, 0)",
                params![MembershipId::new(), f.player, f.campaign],
            )
            .expect_err("index");
        assert!(unique_violation(&err).is_some_and(|d| d.contains("memberships.")));
    }

    #[test]
    fn index_rejection_on_insert_is_duplicate_membership() {
        let f = fixture();
        let first = f.store.create_membership(f.player, f.campaign, Role::Member, Utc::now()).expect("first");

        // Same pair under a fresh id, as a writer that skipped the role lookup would insert.
        let again = Membership {
            id: MembershipId::new(),
            role: Role::Admin,
            ..first
        };
        let err = write_membership(&f.store.conn(), &again).expect_err("duplicate");
        assert!(matches!(
            err,
            QuestlogError::DuplicateMembership { player, campaign } if player == f.player && campaign == f.campaign
        ));
        assert_eq!(f.store.count("memberships").expect("count"), 1);
    }

    #[test]
    fn missing_references_are_field_errors() {
        let f = fixture();
        let err = f
            .store
            .create_membership(PlayerId::new(), CampaignId::new(), Role::Member, Utc::now())
            .expect_err("dangling");
        let errors = err.validation_errors().expect("validation");
        assert!(errors.has("player", MUST_EXIST));
        assert!(errors.has("campaign", MUST_EXIST));
    }

    #[test]
    fn scopes_filter_by_role_player_and_campaign() {
        let f = fixture();
        let now = Utc::now();
        let other = f
            .store
            .create_player(&PlayerDraft::new("Quinn", "quinn@example.com"), now)
            .expect("other")
            .id;
        let admin = f.store.create_membership(other, f.campaign, Role::Admin, now).expect("admin");
        let member = f.store.create_membership(f.player, f.campaign, Role::Member, now).expect("member");

        assert_eq!(f.store.admin_memberships().expect("admins"), [admin.clone()]);
        assert_eq!(f.store.member_memberships().expect("members"), [member.clone()]);
        assert_eq!(f.store.memberships_for_player(f.player).expect("for player"), [member.clone()]);
        assert_eq!(f.store.memberships_for_campaign(f.campaign).expect("for campaign").len(), 2);
    }

    #[test]
    fn role_can_be_changed() {
        let f = fixture();
        let now = Utc::now();
        let m = f.store.create_membership(f.player, f.campaign, Role::Member, now).expect("member");
        let promoted = f.store.update_membership_role(m.id, Role::Admin, now).expect("promote");
        assert!(promoted.is_admin());
        assert_eq!(f.store.role_of(f.player, f.campaign).expect("role"), Some(Role::Admin));
    }

    #[test]
    fn deleting_player_removes_memberships_keeps_campaign() {
        let f = fixture();
        f.store.create_membership(f.player, f.campaign, Role::Admin, Utc::now()).expect("member");
        let report = f.store.delete_player(f.player).expect("delete");
        assert_eq!(report.memberships, 1);
        assert!(f.store.get_campaign(f.campaign).expect("get").is_some());
        assert!(f.store.membership_for(f.player, f.campaign).expect("lookup").is_none());
    }
}
