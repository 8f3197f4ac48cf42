//! SQLite entity store.
//!
//! Four tables mirror the four entities:
//!
//! ```sql
//! players     (id TEXT PK, name, email UNIQUE COLLATE NOCASE, bio, created_at, updated_at)
//! campaigns   (id TEXT PK, title, description, system, created_at, updated_at)
//! memberships (id TEXT PK, player_id → players, campaign_id → campaigns, role,
//!              created_at, updated_at, UNIQUE (player_id, campaign_id))
//! sessions    (id TEXT PK, campaign_id → campaigns, played_at, notes,
//!              created_at, updated_at)
//! ```
//!
//! Timestamps are stored as integer microseconds since the Unix epoch so
//! SQL ordering and range filters match [`chrono`] ordering exactly.
//!
//! Every write validates its draft first and runs inside a single
//! `IMMEDIATE` transaction; a failed write leaves no partial rows behind.
//! Unique-index violations that slip past the application-level checks are
//! mapped back to [`QuestlogError::DuplicateMembership`] or to a field error,
//! never surfaced as a raw SQLite error.

mod campaigns;
mod memberships;
mod players;
mod sessions;

pub(crate) use campaigns::{CAMPAIGN_COLUMNS, RECENT, collect_campaigns};
pub use memberships::MUST_EXIST;
pub(crate) use players::{PLAYER_COLUMNS, collect_players};
pub use players::EMAIL_TAKEN;
pub use sessions::SessionOrder;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OpenFlags, Row, Transaction, TransactionBehavior};
use tracing::info;

use crate::config::{PersistenceConfig, QuestlogConfig};
use crate::error::{QuestlogError, Result};
use crate::validation::RuleContext;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS players (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL COLLATE NOCASE,
    bio        TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS index_players_on_email ON players (email);

CREATE TABLE IF NOT EXISTS campaigns (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    system      TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS index_campaigns_on_system ON campaigns (system);

CREATE TABLE IF NOT EXISTS memberships (
    id          TEXT PRIMARY KEY,
    player_id   TEXT NOT NULL REFERENCES players (id) ON DELETE CASCADE,
    campaign_id TEXT NOT NULL REFERENCES campaigns (id) ON DELETE CASCADE,
    role        TEXT NOT NULL CHECK (role IN ('admin', 'member')),
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS index_memberships_on_player_and_campaign
    ON memberships (player_id, campaign_id);
CREATE INDEX IF NOT EXISTS index_memberships_on_campaign ON memberships (campaign_id);

CREATE TABLE IF NOT EXISTS sessions (
    id          TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL REFERENCES campaigns (id) ON DELETE CASCADE,
    played_at   INTEGER NOT NULL,
    notes       TEXT,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS index_sessions_on_campaign_and_played_at
    ON sessions (campaign_id, played_at);
";

/// Handle to the SQLite database holding all Questlog entities.
///
/// # Usage
///
/// ```no_run
/// # use questlog_core::{CampaignDraft, PlayerDraft, QuestlogConfig, Store};
/// # use chrono::Utc;
/// let config = QuestlogConfig::default();
/// let store = Store::open("questlog.db", &config)?;
/// let now = Utc::now();
/// let gm = store.create_player(&PlayerDraft::new("Gwen", "gwen@example.com"), now)?;
/// let draft = CampaignDraft::new("Lost Mines", "Goblins, caves and a lost forge.", "D&D 5e");
/// let (campaign, _admin) = store.create_campaign_with_admin(&draft, gm.id, now)?;
/// # Ok::<(), questlog_core::QuestlogError>(())
/// ```
pub struct Store {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    max_future: Duration,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db_path", &self.db_path)
            .field("max_future", &self.max_future)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) a database at `path`.
    ///
    /// The schema is created if missing. Foreign keys are always enforced;
    /// WAL mode follows `config.persistence.wal_mode`.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Config`] if `config` fails
    /// [`QuestlogConfig::validate`], and [`QuestlogError::Database`] on
    /// SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &QuestlogConfig) -> Result<Self> {
        config.validate()?;
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.persistence.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        Self::prepare(&conn, &config.persistence)?;

        info!(
            path = %db_path.display(),
            wal = config.persistence.wal_mode,
            "Questlog store opened"
        );

        Self::from_parts(conn, db_path, config)
    }

    /// Open the database named by `config.persistence.path`.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`].
    pub fn open_configured(config: &QuestlogConfig) -> Result<Self> {
        Self::open(&config.persistence.path, config)
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Config`] for an out-of-range config and
    /// [`QuestlogError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &QuestlogConfig) -> Result<Self> {
        config.validate()?;
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn, &config.persistence)?;
        Self::from_parts(conn, PathBuf::from(":memory:"), config)
    }

    fn prepare(conn: &Connection, config: &PersistenceConfig) -> Result<()> {
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_millis(u64::from(config.busy_timeout_ms)))?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn from_parts(conn: Connection, db_path: PathBuf, config: &QuestlogConfig) -> Result<Self> {
        let days = config.sessions.max_future_days;
        let max_future = Duration::try_days(days)
            .ok_or_else(|| QuestlogError::Config(format!("max_future_days out of range: {days}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            max_future,
        })
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Validation context for a write performed at `now`.
    #[must_use]
    pub fn rule_context(&self, now: DateTime<Utc>) -> RuleContext {
        RuleContext {
            now,
            max_future: self.max_future,
        }
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Run `f` inside an `IMMEDIATE` transaction, committing only on `Ok`.
    ///
    /// `IMMEDIATE` takes the write lock up front, so a check-then-insert
    /// inside `f` cannot interleave with another writer.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Return the path to the database file (or `:memory:` for in-memory DBs).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run an integrity check on the database.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::Database`] if the check query itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Count rows in one of the entity tables.
    ///
    /// # Errors
    ///
    /// Returns [`QuestlogError::NotFound`] for an unknown table name, or
    /// [`QuestlogError::Database`] on SQLite failures.
    pub fn count(&self, table: &str) -> Result<usize> {
        let sql = match table {
            "players" => "SELECT COUNT(*) FROM players",
            "campaigns" => "SELECT COUNT(*) FROM campaigns",
            "memberships" => "SELECT COUNT(*) FROM memberships",
            "sessions" => "SELECT COUNT(*) FROM sessions",
            other => return Err(QuestlogError::not_found("table", other)),
        };
        let count: i64 = self.conn().query_row(sql, [], |row| row.get(0))?;
        row_count(count)
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

fn row_count(count: i64) -> Result<usize> {
    usize::try_from(count).map_err(|_| QuestlogError::Database(rusqlite::Error::IntegralValueOutOfRange(0, count)))
}

/// `t` at the precision the store keeps, so written and re-read values compare equal.
pub(crate) fn stamp(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(6)
}

pub(crate) fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

pub(crate) fn micros_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

/// The "table.column, ..." detail of a unique-index violation, if `err` is one.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(detail))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Some(detail.as_str())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PlayerDraft;

    #[test]
    fn in_memory_store_passes_integrity_check() {
        let store = Store::open_in_memory(&QuestlogConfig::default()).expect("open");
        assert!(store.integrity_check().expect("check"));
        assert_eq!(store.db_path(), Path::new(":memory:"));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("questlog.db");
        let config = QuestlogConfig::default();
        let now = Utc::now();

        let id = {
            let store = Store::open(&path, &config).expect("open");
            store
                .create_player(&PlayerDraft::new("Ana", "ana@example.com"), now)
                .expect("create")
                .id
        };

        let reopened = Store::open(&path, &config).expect("reopen");
        let player = reopened.find_player(id).expect("find");
        assert_eq!(player.email, "ana@example.com");
        assert_eq!(reopened.count("players").expect("count"), 1);
    }

    #[test]
    fn count_rejects_unknown_table() {
        let store = Store::open_in_memory(&QuestlogConfig::default()).expect("open");
        assert!(matches!(
            store.count("sqlite_master"),
            Err(QuestlogError::NotFound { entity: "table", .. })
        ));
    }

    #[test]
    fn negative_count_is_a_database_error() {
        assert_eq!(row_count(3).expect("count"), 3);
        assert!(matches!(
            row_count(-1),
            Err(QuestlogError::Database(rusqlite::Error::IntegralValueOutOfRange(0, -1)))
        ));
    }

    #[test]
    fn out_of_range_config_is_rejected_on_open() {
        let mut config = QuestlogConfig::default();
        config.sessions.max_future_days = 100_000_000;
        let err = Store::open_in_memory(&config).expect_err("horizon");
        assert!(matches!(err, QuestlogError::Config(_)));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("never.db");
        config.sessions.max_future_days = 365;
        config.campaigns.active_window_days = -5;
        assert!(matches!(Store::open(&path, &config), Err(QuestlogError::Config(_))));
        assert!(!path.exists());
    }

    #[test]
    fn micros_round_trip_preserves_ordering() {
        let a = DateTime::from_timestamp_micros(1_000_000).expect("valid");
        let b = a + Duration::microseconds(1);
        assert!(to_micros(a) < to_micros(b));
    }

    #[test]
    fn stamp_drops_sub_microsecond_precision() {
        let t = DateTime::from_timestamp(1_700_000_000, 123_456_789).expect("valid");
        assert_eq!(stamp(t).timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(to_micros(stamp(t)), to_micros(t));
    }
}
