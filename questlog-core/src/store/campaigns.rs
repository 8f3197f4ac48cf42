//! Campaign rows, including the create-with-admin transaction and the
//! cascading delete.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::memberships::insert_membership;
use super::players::player_exists;
use super::{Store, micros_at, stamp, to_micros};
use crate::entity::{Campaign, CampaignDraft, Membership};
use crate::error::{QuestlogError, Result};
use crate::types::{CampaignId, CascadeReport, PlayerId, Role};

pub(crate) const CAMPAIGN_COLUMNS: &str =
    "c.id, c.title, c.description, c.system, c.created_at, c.updated_at";

/// Newest first, id as tie-break.
pub(crate) const RECENT: &str = "c.created_at DESC, c.id DESC";

pub(super) fn campaign_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        system: row.get(3)?,
        created_at: micros_at(row, 4)?,
        updated_at: micros_at(row, 5)?,
    })
}

pub(super) fn fetch_campaign(conn: &Connection, id: CampaignId) -> Result<Option<Campaign>> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c WHERE c.id = ?1"))?;
    Ok(stmt.query_row(params![id], campaign_row).optional()?)
}

pub(super) fn campaign_exists(conn: &Connection, id: CampaignId) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM campaigns WHERE id = ?1")?;
    Ok(stmt.exists(params![id])?)
}

pub(crate) fn collect_campaigns(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Campaign>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, campaign_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn insert_campaign(conn: &Connection, draft: &CampaignDraft, now: DateTime<Utc>) -> Result<Campaign> {
    let now = stamp(now);
    let campaign = Campaign {
        id: CampaignId::new(),
        title: draft.title.clone(),
        description: draft.description.clone(),
        system: draft.system.clone(),
        created_at: now,
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO campaigns (id, title, description, system, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            campaign.id,
            campaign.title,
            campaign.description,
            campaign.system,
            to_micros(now),
            to_micros(now)
        ],
    )?;
    Ok(campaign)
}

impl Store {
    /// Create a campaign with no members.
    ///
    /// Most callers want [`Store::create_campaign_with_admin`]; this is the
    /// bare insert for imports and fixtures.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::Validation`] when the draft fails its rules.
    pub fn create_campaign(&self, draft: &CampaignDraft, now: DateTime<Utc>) -> Result<Campaign> {
        draft.validate(&self.rule_context(now))?;
        let campaign = self.write(|tx| insert_campaign(tx, draft, now))?;
        debug!(campaign = %campaign.id, "Created campaign");
        Ok(campaign)
    }

    /// Create a campaign and make `creator` its first admin, atomically.
    ///
    /// Two explicit steps in one transaction: insert the campaign, then
    /// insert the creator's admin membership. If either fails, neither row
    /// exists afterwards.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::Validation`] when the draft fails its rules,
    /// [`QuestlogError::NotFound`] when `creator` does not exist.
    pub fn create_campaign_with_admin(
        &self,
        draft: &CampaignDraft,
        creator: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<(Campaign, Membership)> {
        let start = Instant::now();
        draft.validate(&self.rule_context(now))?;

        let (campaign, membership) = self.write(|tx| {
            if !player_exists(tx, creator)? {
                return Err(QuestlogError::not_found("player", creator));
            }
            let campaign = insert_campaign(tx, draft, now)?;
            let membership = insert_membership(tx, creator, campaign.id, Role::Admin, now)?;
            Ok((campaign, membership))
        })?;

        info!(
            campaign = %campaign.id,
            creator = %creator,
            elapsed_us = start.elapsed().as_micros(),
            "Campaign created with admin"
        );
        Ok((campaign, membership))
    }

    /// Replace a campaign's title, description and system.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] for an unknown id,
    /// [`QuestlogError::Validation`] when the draft fails its rules.
    pub fn update_campaign(&self, id: CampaignId, draft: &CampaignDraft, now: DateTime<Utc>) -> Result<Campaign> {
        draft.validate(&self.rule_context(now))?;
        let now = stamp(now);
        let campaign = self.write(|tx| {
            let existing =
                fetch_campaign(tx, id)?.ok_or_else(|| QuestlogError::not_found("campaign", id))?;
            tx.execute(
                "UPDATE campaigns SET title = ?1, description = ?2, system = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![draft.title, draft.description, draft.system, to_micros(now), id],
            )?;
            Ok(Campaign {
                title: draft.title.clone(),
                description: draft.description.clone(),
                system: draft.system.clone(),
                updated_at: now,
                ..existing
            })
        })?;
        debug!(campaign = %id, "Updated campaign");
        Ok(campaign)
    }

    /// Look up a campaign by id.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        fetch_campaign(&self.conn(), id)
    }

    /// Look up a campaign by id, treating a miss as an error.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] when no such campaign exists.
    pub fn find_campaign(&self, id: CampaignId) -> Result<Campaign> {
        self.get_campaign(id)?
            .ok_or_else(|| QuestlogError::not_found("campaign", id))
    }

    /// Delete a campaign with all of its memberships and sessions.
    ///
    /// Players who belonged to the campaign are left untouched.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] when no such campaign exists.
    pub fn delete_campaign(&self, id: CampaignId) -> Result<CascadeReport> {
        let report = self.write(|tx| {
            let sessions = tx.execute("DELETE FROM sessions WHERE campaign_id = ?1", params![id])?;
            let memberships =
                tx.execute("DELETE FROM memberships WHERE campaign_id = ?1", params![id])?;
            if tx.execute("DELETE FROM campaigns WHERE id = ?1", params![id])? == 0 {
                return Err(QuestlogError::not_found("campaign", id));
            }
            Ok(CascadeReport {
                memberships,
                sessions,
            })
        })?;

        info!(
            campaign = %id,
            memberships = report.memberships,
            sessions = report.sessions,
            "Deleted campaign"
        );
        Ok(report)
    }
}
