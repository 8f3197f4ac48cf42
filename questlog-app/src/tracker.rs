//! The per-player service.
//!
//! Each method is one user action. It samples the clock once, checks the
//! access policy for the current player, and only then reads or writes.
//! A missing campaign is indistinguishable from one the player cannot see:
//! both come back as [`Notice::NoAccess`].

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use questlog_core::access::{self, Access, Decision, Roster};
use questlog_core::entity::PlayerChanges;
use questlog_core::store::SessionOrder;
use questlog_core::temporal::{Calendar, Timing};
use questlog_core::{
    Campaign, CampaignDraft, CampaignId, CascadeReport, Membership, Player, PlayerDraft, PlayerId,
    QuestlogConfig, Result, Role, Session, SessionDraft, SessionId, Store,
};

use crate::clock::{Clock, SystemClock};
use crate::outcome::{Notice, Outcome};

/// Everything shown on a campaign's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignOverview {
    /// The campaign itself.
    pub campaign: Campaign,
    /// Admins, by name.
    pub admins: Vec<Player>,
    /// Plain members, by name.
    pub members: Vec<Player>,
    /// Latest session by date, past or future.
    pub last_session: Option<Session>,
    /// Sessions after now, soonest first.
    pub upcoming: Vec<Session>,
    /// Role of the player viewing the page.
    pub viewer_role: Role,
}

/// A single session with its calendar placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDetail {
    /// The session.
    pub session: Session,
    /// Where it falls relative to the instant it was viewed.
    pub timing: Timing,
}

/// Campaign tracker operating on behalf of a current player.
pub struct Tracker<C: Clock = SystemClock> {
    store: Store,
    config: QuestlogConfig,
    clock: C,
}

impl<C: Clock> std::fmt::Debug for Tracker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker").field("store", &self.store).finish_non_exhaustive()
    }
}

impl Tracker<SystemClock> {
    /// Open the configured database with the system clock.
    ///
    /// # Errors
    ///
    /// Returns the store's open error, including `Config` for day counts
    /// out of range.
    pub fn open(config: QuestlogConfig) -> Result<Self> {
        let store = Store::open_configured(&config)?;
        Ok(Self::new(store, config, SystemClock))
    }
}

impl<C: Clock> Tracker<C> {
    /// Wrap an open store.
    #[must_use]
    pub fn new(store: Store, config: QuestlogConfig, clock: C) -> Self {
        Self { store, config, clock }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &QuestlogConfig {
        &self.config
    }

    /// The clock used to stamp operations.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn calendar(&self, now: DateTime<Utc>) -> Calendar {
        Calendar::at(now, self.config.calendar.week_start)
    }

    fn authorize(
        &self,
        current: PlayerId,
        campaign: CampaignId,
        access: Access,
    ) -> Result<std::result::Result<Role, Notice>> {
        Ok(match access::authorize(&self.store, current, campaign, access)? {
            Decision::Granted(role) => Ok(role),
            Decision::Denied(denial) => Err(Notice::from(denial)),
        })
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Sign up a new player.
    ///
    /// # Errors
    ///
    /// Validation errors for bad fields or a taken email.
    pub fn register_player(&self, draft: &PlayerDraft) -> Result<Player> {
        let player = self.store.create_player(draft, self.clock.now())?;
        info!(player = %player.id, "Player registered");
        Ok(player)
    }

    /// Edit a profile. Players may only edit their own.
    ///
    /// # Errors
    ///
    /// `NotFound` if the player is gone, validation errors for bad fields.
    pub fn update_profile(&self, current: PlayerId, player: PlayerId, changes: &PlayerChanges) -> Result<Outcome<Player>> {
        if current != player {
            debug!(current = %current, target = %player, "Profile edit refused");
            return Ok(Outcome::Denied(Notice::NotAuthorized));
        }
        let now = self.clock.now();
        let existing = self.store.find_player(player)?;
        let updated = self.store.update_player(player, &changes.apply_to(&existing), now)?;
        Ok(Outcome::Done(updated))
    }

    // ------------------------------------------------------------------
    // Campaigns
    // ------------------------------------------------------------------

    /// Campaigns the current player belongs to, newest first.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn list_campaigns(&self, current: PlayerId) -> Result<Outcome<Vec<Campaign>>> {
        Ok(Outcome::Done(self.store.campaigns_for_player(current)?))
    }

    /// Campaigns with a session inside the configured activity window.
    ///
    /// Only those the current player belongs to are returned.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn active_campaigns(&self, current: PlayerId) -> Result<Outcome<Vec<Campaign>>> {
        let now = self.clock.now();
        let mut active = self
            .store
            .active_campaigns(now, self.config.campaigns.active_window_days)?;
        let mine = self.store.campaigns_for_player(current)?;
        active.retain(|c| mine.iter().any(|m| m.id == c.id));
        Ok(Outcome::Done(active))
    }

    /// Start a campaign with the current player as its first admin.
    ///
    /// # Errors
    ///
    /// Validation errors for the draft, `NotFound` for an unknown player.
    pub fn create_campaign(&self, current: PlayerId, draft: &CampaignDraft) -> Result<Outcome<(Campaign, Membership)>> {
        let created = self
            .store
            .create_campaign_with_admin(draft, current, self.clock.now())?;
        Ok(Outcome::Done(created))
    }

    /// A campaign's page: roster, last session and what is coming up.
    ///
    /// # Errors
    ///
    /// Storage errors only; refusals are `Outcome::Denied`.
    pub fn show_campaign(&self, current: PlayerId, campaign: CampaignId) -> Result<Outcome<CampaignOverview>> {
        let start = Instant::now();
        let now = self.clock.now();
        let viewer_role = match self.authorize(current, campaign, Access::View)? {
            Ok(role) => role,
            Err(notice) => return Ok(Outcome::Denied(notice)),
        };

        let record = self.store.find_campaign(campaign)?;
        let Roster { admins, members } = Roster::load(&self.store, campaign)?;
        let last_session = self.store.last_session(campaign)?;
        let upcoming = self.store.upcoming_sessions_for(campaign, now)?;

        debug!(
            campaign = %campaign,
            upcoming = upcoming.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Campaign overview built"
        );
        Ok(Outcome::Done(CampaignOverview {
            campaign: record,
            admins,
            members,
            last_session,
            upcoming,
            viewer_role,
        }))
    }

    /// Change a campaign's title, description or system. Admins only.
    ///
    /// # Errors
    ///
    /// Validation errors for the draft.
    pub fn update_campaign(
        &self,
        current: PlayerId,
        campaign: CampaignId,
        draft: &CampaignDraft,
    ) -> Result<Outcome<Campaign>> {
        let now = self.clock.now();
        if let Err(notice) = self.authorize(current, campaign, Access::Manage)? {
            return Ok(Outcome::Denied(notice));
        }
        Ok(Outcome::Done(self.store.update_campaign(campaign, draft, now)?))
    }

    /// Delete a campaign with its memberships and sessions. Admins only.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn delete_campaign(&self, current: PlayerId, campaign: CampaignId) -> Result<Outcome<CascadeReport>> {
        if let Err(notice) = self.authorize(current, campaign, Access::Manage)? {
            return Ok(Outcome::Denied(notice));
        }
        let report = self.store.delete_campaign(campaign)?;
        info!(campaign = %campaign, by = %current, removed = report.total(), "Campaign deleted by admin");
        Ok(Outcome::Done(report))
    }

    /// Join a campaign as a plain member.
    ///
    /// # Errors
    ///
    /// `DuplicateMembership` if already in the campaign, a "must exist"
    /// validation error for an unknown campaign or player.
    pub fn join_campaign(&self, current: PlayerId, campaign: CampaignId) -> Result<Outcome<Membership>> {
        let membership = self
            .store
            .create_membership(current, campaign, Role::Member, self.clock.now())?;
        Ok(Outcome::Done(membership))
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Schedule or record a session. Admins only.
    ///
    /// # Errors
    ///
    /// Validation errors for the draft, including the one-year horizon.
    pub fn schedule_session(
        &self,
        current: PlayerId,
        campaign: CampaignId,
        draft: &SessionDraft,
    ) -> Result<Outcome<Session>> {
        let now = self.clock.now();
        if let Err(notice) = self.authorize(current, campaign, Access::Manage)? {
            return Ok(Outcome::Denied(notice));
        }
        Ok(Outcome::Done(self.store.create_session(campaign, draft, now)?))
    }

    /// A campaign's sessions in `order`. Members only.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn list_sessions(
        &self,
        current: PlayerId,
        campaign: CampaignId,
        order: SessionOrder,
    ) -> Result<Outcome<Vec<SessionDetail>>> {
        let calendar = self.calendar(self.clock.now());
        if let Err(notice) = self.authorize(current, campaign, Access::View)? {
            return Ok(Outcome::Denied(notice));
        }
        let details = self
            .store
            .sessions_for_campaign(campaign, order)?
            .into_iter()
            .map(|session| SessionDetail {
                timing: calendar.classify(session.played_at),
                session,
            })
            .collect();
        Ok(Outcome::Done(details))
    }

    /// One session. Members of its campaign only.
    ///
    /// An unknown session id is denied with `NoAccess`, the same as a
    /// session in a campaign the player is not part of.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn show_session(&self, current: PlayerId, session: SessionId) -> Result<Outcome<SessionDetail>> {
        let calendar = self.calendar(self.clock.now());
        let Some(session) = self.store.get_session(session)? else {
            return Ok(Outcome::Denied(Notice::NoAccess));
        };
        if let Err(notice) = self.authorize(current, session.campaign_id, Access::View)? {
            return Ok(Outcome::Denied(notice));
        }
        Ok(Outcome::Done(SessionDetail {
            timing: calendar.classify(session.played_at),
            session,
        }))
    }
}
