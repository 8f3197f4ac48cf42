//! Session rows and the calendar-scoped queries over them.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::campaigns::campaign_exists;
use super::memberships::MUST_EXIST;
use super::{Store, micros_at, stamp, to_micros};
use crate::entity::{Session, SessionDraft};
use crate::error::{QuestlogError, Result};
use crate::temporal::{self, TimeSpan};
use crate::types::{CampaignId, SessionId};
use crate::validation::ValidationErrors;

const SESSION_COLUMNS: &str = "s.id, s.campaign_id, s.played_at, s.notes, s.created_at, s.updated_at";

/// Sort order for session listings.
///
/// Both orders break `played_at` ties by session id, so `Recent` is always
/// the exact reverse of `Chronological`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrder {
    /// Oldest first.
    #[default]
    Chronological,
    /// Newest first.
    Recent,
}

impl SessionOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::Chronological => "s.played_at ASC, s.id ASC",
            Self::Recent => "s.played_at DESC, s.id DESC",
        }
    }
}

fn session_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        played_at: micros_at(row, 2)?,
        notes: row.get(3)?,
        created_at: micros_at(row, 4)?,
        updated_at: micros_at(row, 5)?,
    })
}

fn fetch_session(conn: &Connection, id: SessionId) -> Result<Option<Session>> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = ?1"))?;
    Ok(stmt.query_row(params![id], session_row).optional()?)
}

fn collect_sessions(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, session_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Notes are optional; an all-whitespace value is stored as absent.
fn clean_notes(notes: Option<&String>) -> Option<String> {
    notes.filter(|n| !n.trim().is_empty()).cloned()
}

/// `played_at` of a draft that already passed validation.
fn draft_played_at(draft: &SessionDraft) -> Result<DateTime<Utc>> {
    draft
        .played_at
        .map(stamp)
        .ok_or_else(|| ValidationErrors::single("played_at", crate::validation::BLANK).into())
}

impl Store {
    /// Schedule or record a session for `campaign`.
    ///
    /// The one-year horizon is measured from `now`.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::Validation`] when the draft fails its rules or the
    /// campaign does not exist ("campaign must exist").
    pub fn create_session(&self, campaign: CampaignId, draft: &SessionDraft, now: DateTime<Utc>) -> Result<Session> {
        draft.validate(&self.rule_context(now))?;
        let played_at = draft_played_at(draft)?;
        let now = stamp(now);

        let session = self.write(|tx| {
            if !campaign_exists(tx, campaign)? {
                return Err(ValidationErrors::single("campaign", MUST_EXIST).into());
            }
            let session = Session {
                id: SessionId::new(),
                campaign_id: campaign,
                played_at,
                notes: clean_notes(draft.notes.as_ref()),
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO sessions (id, campaign_id, played_at, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id,
                    campaign,
                    to_micros(played_at),
                    session.notes,
                    to_micros(now),
                    to_micros(now)
                ],
            )?;
            Ok(session)
        })?;

        debug!(
            session = %session.id,
            campaign = %campaign,
            upcoming = session.is_upcoming(now),
            "Created session"
        );
        Ok(session)
    }

    /// Replace a session's date and notes.
    ///
    /// The draft is re-validated against `now`, so a session cannot be
    /// pushed past the horizon by an edit.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] for an unknown id,
    /// [`QuestlogError::Validation`] when the draft fails its rules.
    pub fn update_session(&self, id: SessionId, draft: &SessionDraft, now: DateTime<Utc>) -> Result<Session> {
        draft.validate(&self.rule_context(now))?;
        let played_at = draft_played_at(draft)?;
        let now = stamp(now);
        let notes = clean_notes(draft.notes.as_ref());

        let session = self.write(|tx| {
            let existing = fetch_session(tx, id)?.ok_or_else(|| QuestlogError::not_found("session", id))?;
            tx.execute(
                "UPDATE sessions SET played_at = ?1, notes = ?2, updated_at = ?3 WHERE id = ?4",
                params![to_micros(played_at), notes, to_micros(now), id],
            )?;
            Ok(Session {
                played_at,
                notes: notes.clone(),
                updated_at: now,
                ..existing
            })
        })?;
        debug!(session = %id, "Updated session");
        Ok(session)
    }

    /// Look up a session by id.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        fetch_session(&self.conn(), id)
    }

    /// Look up a session by id, treating a miss as an error.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] when no such session exists.
    pub fn find_session(&self, id: SessionId) -> Result<Session> {
        self.get_session(id)?
            .ok_or_else(|| QuestlogError::not_found("session", id))
    }

    /// Delete a single session.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] when no such session exists.
    pub fn delete_session(&self, id: SessionId) -> Result<()> {
        self.write(|tx| {
            if tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])? == 0 {
                return Err(QuestlogError::not_found("session", id));
            }
            Ok(())
        })?;
        debug!(session = %id, "Deleted session");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    /// Every session of `campaign` in `order`.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn sessions_for_campaign(&self, campaign: CampaignId, order: SessionOrder) -> Result<Vec<Session>> {
        collect_sessions(
            &self.conn(),
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.campaign_id = ?1 ORDER BY {}",
                order.sql()
            ),
            params![campaign],
        )
    }

    /// Every session in the store, in `order`.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn all_sessions(&self, order: SessionOrder) -> Result<Vec<Session>> {
        collect_sessions(
            &self.conn(),
            &format!("SELECT {SESSION_COLUMNS} FROM sessions s ORDER BY {}", order.sql()),
            [],
        )
    }

    /// Sessions whose `played_at` falls inside `span`, boundaries included.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn sessions_between(&self, span: TimeSpan, order: SessionOrder) -> Result<Vec<Session>> {
        collect_sessions(
            &self.conn(),
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions s
                 WHERE s.played_at >= ?1 AND s.played_at <= ?2 ORDER BY {}",
                order.sql()
            ),
            params![to_micros(span.start), to_micros(span.end)],
        )
    }

    /// Sessions played strictly before `now`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn past_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let mut sessions = self.all_sessions(SessionOrder::Recent)?;
        sessions.retain(|s| s.is_past(now));
        Ok(sessions)
    }

    /// Sessions scheduled strictly after `now`, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn upcoming_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let mut sessions = self.all_sessions(SessionOrder::Chronological)?;
        sessions.retain(|s| s.is_upcoming(now));
        Ok(sessions)
    }

    /// Sessions in `now`'s calendar month, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn sessions_this_month(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        self.sessions_between(temporal::month_span(now), SessionOrder::Chronological)
    }

    /// Sessions in the calendar month before `now`'s, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn sessions_last_month(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        self.sessions_between(temporal::previous_month_span(now), SessionOrder::Chronological)
    }

    /// The latest session of `campaign` by `played_at`, past or future.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn last_session(&self, campaign: CampaignId) -> Result<Option<Session>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.campaign_id = ?1 ORDER BY {} LIMIT 1",
            SessionOrder::Recent.sql()
        ))?;
        Ok(stmt.query_row(params![campaign], session_row).optional()?)
    }

    /// Sessions of `campaign` scheduled after `now`, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn upcoming_sessions_for(&self, campaign: CampaignId, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let mut sessions = self.sessions_for_campaign(campaign, SessionOrder::Chronological)?;
        sessions.retain(|s| s.is_upcoming(now));
        Ok(sessions)
    }
}
