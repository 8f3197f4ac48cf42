//! Player rows.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::{Store, micros_at, stamp, to_micros, unique_violation};
use crate::entity::{Player, PlayerDraft};
use crate::error::{QuestlogError, Result};
use crate::types::{CascadeReport, PlayerId};
use crate::validation::ValidationErrors;

pub(crate) const PLAYER_COLUMNS: &str = "p.id, p.name, p.email, p.bio, p.created_at, p.updated_at";

/// Message for an email already registered to another player.
pub const EMAIL_TAKEN: &str = "has already been taken";

pub(super) fn player_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        bio: row.get(3)?,
        created_at: micros_at(row, 4)?,
        updated_at: micros_at(row, 5)?,
    })
}

pub(super) fn fetch_player(conn: &Connection, id: PlayerId) -> Result<Option<Player>> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {PLAYER_COLUMNS} FROM players p WHERE p.id = ?1"))?;
    Ok(stmt.query_row(params![id], player_row).optional()?)
}

pub(super) fn player_exists(conn: &Connection, id: PlayerId) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM players WHERE id = ?1")?;
    Ok(stmt.exists(params![id])?)
}

pub(crate) fn collect_players(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Player>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, player_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Is `email` registered to a player other than `except`?
fn email_taken(conn: &Connection, email: &str, except: Option<PlayerId>) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT id FROM players WHERE email = ?1")?;
    let owner: Option<PlayerId> = stmt.query_row(params![email], |row| row.get(0)).optional()?;
    Ok(owner.is_some_and(|owner| Some(owner) != except))
}

/// Rule errors plus the uniqueness check, collected together.
fn check_player(
    store: &Store,
    conn: &Connection,
    draft: &PlayerDraft,
    except: Option<PlayerId>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut errors = draft.validate(&store.rule_context(now)).err().unwrap_or_default();
    if errors.get("email").is_empty() && email_taken(conn, &draft.email, except)? {
        errors.add("email", EMAIL_TAKEN);
    }
    errors.into_result().map_err(QuestlogError::from)
}

fn map_player_write(err: rusqlite::Error) -> QuestlogError {
    match unique_violation(&err) {
        Some(detail) if detail.contains("players.email") => {
            QuestlogError::Validation(ValidationErrors::single("email", EMAIL_TAKEN))
        }
        _ => QuestlogError::Database(err),
    }
}

impl Store {
    /// Register a new player.
    ///
    /// The email is trimmed and lower-cased before validation, so uniqueness
    /// is case-insensitive.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::Validation`] for rule failures or a taken email,
    /// [`QuestlogError::Database`] on SQLite failures.
    pub fn create_player(&self, draft: &PlayerDraft, now: DateTime<Utc>) -> Result<Player> {
        let start = Instant::now();
        let now = stamp(now);
        let draft = draft.normalized();
        let player = self.write(|tx| {
            check_player(self, tx, &draft, None, now)?;
            let player = Player {
                id: PlayerId::new(),
                name: draft.name.clone(),
                email: draft.email.clone(),
                bio: draft.bio.clone(),
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO players (id, name, email, bio, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    player.id,
                    player.name,
                    player.email,
                    player.bio,
                    to_micros(now),
                    to_micros(now)
                ],
            )
            .map_err(map_player_write)?;
            Ok(player)
        })?;

        debug!(
            player = %player.id,
            elapsed_us = start.elapsed().as_micros(),
            "Created player"
        );
        Ok(player)
    }

    /// Replace a player's editable fields.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] for an unknown id,
    /// [`QuestlogError::Validation`] for rule failures or a taken email.
    pub fn update_player(&self, id: PlayerId, draft: &PlayerDraft, now: DateTime<Utc>) -> Result<Player> {
        let now = stamp(now);
        let draft = draft.normalized();
        let player = self.write(|tx| {
            let existing = fetch_player(tx, id)?.ok_or_else(|| QuestlogError::not_found("player", id))?;
            check_player(self, tx, &draft, Some(id), now)?;
            tx.execute(
                "UPDATE players SET name = ?1, email = ?2, bio = ?3, updated_at = ?4 WHERE id = ?5",
                params![draft.name, draft.email, draft.bio, to_micros(now), id],
            )
            .map_err(map_player_write)?;
            Ok(Player {
                name: draft.name.clone(),
                email: draft.email.clone(),
                bio: draft.bio.clone(),
                updated_at: now,
                ..existing
            })
        })?;

        debug!(player = %player.id, "Updated player");
        Ok(player)
    }

    /// Look up a player by id.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn get_player(&self, id: PlayerId) -> Result<Option<Player>> {
        fetch_player(&self.conn(), id)
    }

    /// Look up a player by id, treating a miss as an error.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] when no such player exists.
    pub fn find_player(&self, id: PlayerId) -> Result<Player> {
        self.get_player(id)?
            .ok_or_else(|| QuestlogError::not_found("player", id))
    }

    /// Look up a player by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn find_player_by_email(&self, email: &str) -> Result<Option<Player>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {PLAYER_COLUMNS} FROM players p WHERE p.email = ?1"))?;
        Ok(stmt.query_row(params![email.trim()], player_row).optional()?)
    }

    /// All players, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] on SQLite failures.
    pub fn list_players(&self) -> Result<Vec<Player>> {
        collect_players(
            &self.conn(),
            &format!("SELECT {PLAYER_COLUMNS} FROM players p ORDER BY p.name, p.id"),
            [],
        )
    }

    /// Delete a player and every membership they hold.
    ///
    /// Campaigns the player belonged to are left untouched.
    ///
    /// # Errors
    ///
    /// [`QuestlogError::NotFound`] when no such player exists.
    pub fn delete_player(&self, id: PlayerId) -> Result<CascadeReport> {
        let report = self.write(|tx| {
            let memberships = tx.execute("DELETE FROM memberships WHERE player_id = ?1", params![id])?;
            if tx.execute("DELETE FROM players WHERE id = ?1", params![id])? == 0 {
                return Err(QuestlogError::not_found("player", id));
            }
            Ok(CascadeReport {
                memberships,
                sessions: 0,
            })
        })?;

        debug!(player = %id, memberships = report.memberships, "Deleted player");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuestlogConfig;

    fn store() -> Store {
        Store::open_in_memory(&QuestlogConfig::default()).expect("open")
    }

    #[test]
    fn create_and_find() {
        let store = store();
        let now = Utc::now();
        let draft = PlayerDraft::new("Test Player", "Test@Example.com").with_bio("GM since 2009");
        let created = store.create_player(&draft, now).expect("create");

        let found = store.find_player(created.id).expect("find");
        assert_eq!(found.name, "Test Player");
        assert_eq!(found.email, "test@example.com");
        assert_eq!(found.bio.as_deref(), Some("GM since 2009"));
        assert_eq!(found.created_at.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn duplicate_email_is_a_field_error() {
        let store = store();
        let now = Utc::now();
        store
            .create_player(&PlayerDraft::new("First", "same@example.com"), now)
            .expect("first");

        let err = store
            .create_player(&PlayerDraft::new("Second", "SAME@example.com"), now)
            .expect_err("duplicate");
        let errors = err.validation_errors().expect("validation error");
        assert!(errors.has("email", EMAIL_TAKEN));
        assert_eq!(store.count("players").expect("count"), 1);
    }

    #[test]
    fn invalid_draft_writes_nothing() {
        let store = store();
        let err = store
            .create_player(&PlayerDraft::new("", "not-an-email"), Utc::now())
            .expect_err("invalid");
        let errors = err.validation_errors().expect("validation error");
        assert!(errors.has("name", "can't be blank"));
        assert!(errors.has("email", "is invalid"));
        assert_eq!(store.count("players").expect("count"), 0);
    }

    #[test]
    fn update_keeps_own_email_and_rejects_others() {
        let store = store();
        let now = Utc::now();
        let ana = store.create_player(&PlayerDraft::new("Ana", "ana@example.com"), now).expect("ana");
        store.create_player(&PlayerDraft::new("Bo", "bo@example.com"), now).expect("bo");

        let renamed = store
            .update_player(ana.id, &PlayerDraft::new("Ana Lucia", "ana@example.com"), now)
            .expect("rename");
        assert_eq!(renamed.name, "Ana Lucia");
        assert_eq!(renamed.created_at, ana.created_at);

        let err = store
            .update_player(ana.id, &PlayerDraft::new("Ana", "bo@example.com"), now)
            .expect_err("taken");
        assert!(err.validation_errors().expect("validation").has("email", EMAIL_TAKEN));
    }

    #[test]
    fn update_unknown_player_is_not_found() {
        let err = store()
            .update_player(PlayerId::new(), &PlayerDraft::new("Ana", "a@b.c"), Utc::now())
            .expect_err("missing");
        assert!(matches!(err, QuestlogError::NotFound { entity: "player", .. }));
    }

    #[test]
    fn find_by_email_ignores_case() {
        let store = store();
        let ana = store
            .create_player(&PlayerDraft::new("Ana", "ana@example.com"), Utc::now())
            .expect("ana");
        let found = store.find_player_by_email("ANA@example.com").expect("query");
        assert_eq!(found.map(|p| p.id), Some(ana.id));
    }

    #[test]
    fn delete_unknown_player_is_not_found() {
        assert!(matches!(
            store().delete_player(PlayerId::new()),
            Err(QuestlogError::NotFound { .. })
        ));
    }
}
