//! Derived views over the store.
//!
//! Campaign listings come back newest first (`created_at` descending, id
//! as tie-break); player listings by name. Every result has set semantics:
//! a campaign with many sessions or a player with many memberships appears
//! once.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::entity::{Campaign, Player};
use crate::error::Result;
use crate::store::{CAMPAIGN_COLUMNS, PLAYER_COLUMNS, RECENT, Store, collect_campaigns, collect_players};
use crate::types::{PlayerId, Role};

impl Store {
    /// Campaigns whose `system` equals `label` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn campaigns_by_system(&self, label: &str) -> Result<Vec<Campaign>> {
        collect_campaigns(
            &self.conn(),
            &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c WHERE c.system = ?1 ORDER BY {RECENT}"),
            params![label],
        )
    }

    /// Campaigns with at least one session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn campaigns_with_sessions(&self) -> Result<Vec<Campaign>> {
        collect_campaigns(
            &self.conn(),
            &format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c
                 WHERE EXISTS (SELECT 1 FROM sessions s WHERE s.campaign_id = c.id)
                 ORDER BY {RECENT}"
            ),
            [],
        )
    }

    /// Campaigns with a session played after `now - window_days`.
    ///
    /// Only the lower bound is checked, so a campaign whose only session is
    /// scheduled next month still counts as active.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn active_campaigns(&self, now: DateTime<Utc>, window_days: i64) -> Result<Vec<Campaign>> {
        // Windows reaching past chrono's range count every session (or none, if negative).
        let cutoff = Duration::try_days(window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .map_or(if window_days < 0 { i64::MAX } else { i64::MIN }, |c| c.timestamp_micros());
        collect_campaigns(
            &self.conn(),
            &format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c
                 WHERE EXISTS (
                     SELECT 1 FROM sessions s WHERE s.campaign_id = c.id AND s.played_at > ?1
                 )
                 ORDER BY {RECENT}"
            ),
            params![cutoff],
        )
    }

    /// All campaigns, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn recent_campaigns(&self) -> Result<Vec<Campaign>> {
        collect_campaigns(
            &self.conn(),
            &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c ORDER BY {RECENT}"),
            [],
        )
    }

    /// Campaigns `player` belongs to under any role, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn campaigns_for_player(&self, player: PlayerId) -> Result<Vec<Campaign>> {
        collect_campaigns(
            &self.conn(),
            &format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c
                 JOIN memberships m ON m.campaign_id = c.id
                 WHERE m.player_id = ?1
                 ORDER BY {RECENT}"
            ),
            params![player],
        )
    }

    fn campaigns_with_role(&self, player: PlayerId, role: Role) -> Result<Vec<Campaign>> {
        collect_campaigns(
            &self.conn(),
            &format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c
                 JOIN memberships m ON m.campaign_id = c.id
                 WHERE m.player_id = ?1 AND m.role = ?2
                 ORDER BY {RECENT}"
            ),
            params![player, role],
        )
    }

    /// Campaigns where `player` is an admin.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn campaigns_as_admin(&self, player: PlayerId) -> Result<Vec<Campaign>> {
        self.campaigns_with_role(player, Role::Admin)
    }

    /// Campaigns where `player` is a plain member.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn campaigns_as_member(&self, player: PlayerId) -> Result<Vec<Campaign>> {
        self.campaigns_with_role(player, Role::Member)
    }

    /// Players whose name contains `needle`, ignoring case.
    ///
    /// Matching is done on Unicode lower-case forms. SQL `LIKE` only folds
    /// ASCII, so for an ASCII needle it narrows the ASCII-only names in
    /// SQLite and every name with a non-ASCII character is still checked in
    /// Rust. `%` and `_` in the needle match literally. An empty needle
    /// matches everyone.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn search_players_by_name(&self, needle: &str) -> Result<Vec<Player>> {
        let lowered = needle.to_lowercase();
        let mut players = if needle.is_ascii() {
            collect_players(
                &self.conn(),
                &format!(
                    "SELECT {PLAYER_COLUMNS} FROM players p
                     WHERE p.name LIKE ?1 ESCAPE '\\' OR p.name GLOB '*[^ -~]*'
                     ORDER BY p.name, p.id"
                ),
                params![like_pattern(needle)],
            )?
        } else {
            self.list_players()?
        };
        players.retain(|p| p.name.to_lowercase().contains(&lowered));
        Ok(players)
    }

    /// Players holding at least one membership, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn players_with_campaigns(&self) -> Result<Vec<Player>> {
        collect_players(
            &self.conn(),
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players p
                 WHERE EXISTS (SELECT 1 FROM memberships m WHERE m.player_id = p.id)
                 ORDER BY p.name, p.id"
            ),
            [],
        )
    }

    /// Alias of [`Store::players_with_campaigns`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::QuestlogError::Database`] on SQLite failures.
    pub fn active_players(&self) -> Result<Vec<Player>> {
        self.players_with_campaigns()
    }
}

/// `%needle%` with LIKE wildcards and the escape character escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_pattern;
    use crate::config::QuestlogConfig;
    use crate::entity::{CampaignDraft, PlayerDraft, SessionDraft};
    use crate::store::Store;
    use crate::types::Role;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, 18, 30, 0).single().expect("valid")
    }

    fn store() -> Store {
        Store::open_in_memory(&QuestlogConfig::default()).expect("open")
    }

    fn campaign(store: &Store, title: &str, system: &str, created: DateTime<Utc>) -> crate::Campaign {
        store
            .create_campaign(&CampaignDraft::new(title, "A campaign worth playing.", system), created)
            .expect("campaign")
    }

    #[test]
    fn by_system_is_exact_match() {
        let store = store();
        let five_e = campaign(&store, "Lost Mines", "D&D 5e", now());
        campaign(&store, "Masks", "PbtA", now());
        campaign(&store, "Old School", "D&D 5e Legacy", now());

        assert_eq!(store.campaigns_by_system("D&D 5e").expect("query"), [five_e]);
        assert!(store.campaigns_by_system("d&d 5e").expect("query").is_empty());
    }

    #[test]
    fn with_sessions_has_set_semantics() {
        let store = store();
        let busy = campaign(&store, "Busy", "Fate", now());
        campaign(&store, "Idle", "Fate", now());
        for days in 1..=3 {
            store
                .create_session(busy.id, &SessionDraft::at(now() - Duration::days(days)), now())
                .expect("session");
        }
        assert_eq!(store.campaigns_with_sessions().expect("query"), [busy]);
    }

    #[test]
    fn active_counts_recent_and_future_sessions() {
        let store = store();
        let recent = campaign(&store, "Recent", "Fate", now());
        let stale = campaign(&store, "Stale", "Fate", now() - Duration::seconds(1));
        let future = campaign(&store, "Future", "Fate", now() - Duration::seconds(2));
        store
            .create_session(recent.id, &SessionDraft::at(now() - Duration::days(5)), now())
            .expect("recent");
        store
            .create_session(stale.id, &SessionDraft::at(now() - Duration::days(31)), now())
            .expect("stale");
        store
            .create_session(future.id, &SessionDraft::at(now() + Duration::days(200)), now())
            .expect("future");

        let active = store.active_campaigns(now(), 30).expect("active");
        assert_eq!(active, [recent, future]);
    }

    #[test]
    fn active_window_lower_bound_is_exclusive() {
        let store = store();
        let edge = campaign(&store, "Edge", "Fate", now());
        store
            .create_session(edge.id, &SessionDraft::at(now() - Duration::days(30)), now())
            .expect("edge");
        assert!(store.active_campaigns(now(), 30).expect("active").is_empty());
        assert_eq!(store.active_campaigns(now(), 31).expect("active").len(), 1);
    }

    #[test]
    fn active_window_past_calendar_range_does_not_overflow() {
        let store = store();
        let old = campaign(&store, "Old", "Fate", now());
        store
            .create_session(old.id, &SessionDraft::at(now() - Duration::days(20_000)), now())
            .expect("old");
        assert_eq!(store.active_campaigns(now(), i64::MAX / 2).expect("huge"), [old]);
        assert!(store.active_campaigns(now(), i64::MIN / 2).expect("negative").is_empty());
    }

    #[test]
    fn player_campaign_views() {
        let store = store();
        let ana = store.create_player(&PlayerDraft::new("Ana", "ana@example.com"), now()).expect("ana");
        let bo = store.create_player(&PlayerDraft::new("Bo", "bo@example.com"), now()).expect("bo");
        store.create_player(&PlayerDraft::new("Cy", "cy@example.com"), now()).expect("cy");

        let (older, _) = store
            .create_campaign_with_admin(
                &CampaignDraft::new("Older", "Started last spring.", "Fate"),
                ana.id,
                now() - Duration::days(90),
            )
            .expect("older");
        let (newer, _) = store
            .create_campaign_with_admin(&CampaignDraft::new("Newer", "Started this week.", "Fate"), bo.id, now())
            .expect("newer");
        store.create_membership(ana.id, newer.id, Role::Member, now()).expect("join");

        assert_eq!(store.campaigns_for_player(ana.id).expect("all"), [newer.clone(), older.clone()]);
        assert_eq!(store.campaigns_as_admin(ana.id).expect("admin"), [older.clone()]);
        assert_eq!(store.campaigns_as_member(ana.id).expect("member"), [newer.clone()]);
        assert_eq!(store.recent_campaigns().expect("recent"), [newer, older]);

        let names: Vec<_> = store
            .players_with_campaigns()
            .expect("players")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Ana", "Bo"]);
        assert_eq!(store.active_players().expect("active").len(), 2);
    }

    #[test]
    fn name_search_ignores_case_including_non_ascii() {
        let store = store();
        for (name, email) in [("Élodie", "e@example.com"), ("Melody", "m@example.com"), ("Bart", "b@example.com")] {
            store.create_player(&PlayerDraft::new(name, email), now()).expect("player");
        }
        let names = |q: &str| -> Vec<String> {
            store
                .search_players_by_name(q)
                .expect("search")
                .into_iter()
                .map(|p| p.name)
                .collect()
        };
        assert_eq!(names("LOD"), ["Melody", "Élodie"]);
        assert_eq!(names("éLO"), ["Élodie"]);
        assert_eq!(names("").len(), 3);
        assert!(names("zz").is_empty());
    }

    #[test]
    fn name_search_treats_like_wildcards_literally() {
        let store = store();
        for (name, email) in [
            ("100% Dice", "d@example.com"),
            ("Snake_Eyes", "s@example.com"),
            ("Snakeyes", "k@example.com"),
            ("Back\\Slash", "b@example.com"),
            ("Ørjan", "o@example.com"),
        ] {
            store.create_player(&PlayerDraft::new(name, email), now()).expect("player");
        }
        let names = |q: &str| -> Vec<String> {
            store
                .search_players_by_name(q)
                .expect("search")
                .into_iter()
                .map(|p| p.name)
                .collect()
        };
        assert_eq!(names("%"), ["100% Dice"]);
        assert_eq!(names("e_e"), ["Snake_Eyes"]);
        assert_eq!(names("k\\s"), ["Back\\Slash"]);
        assert_eq!(names("RJ"), ["Ørjan"]);
        assert_eq!(like_pattern("a%b_c\\"), "%a\\%b\\_c\\\\%");
    }
}
