//! # Questlog Core Library
//!
//! Campaign tracking for tabletop role-playing groups. Players join
//! campaigns through role-based memberships and record play sessions.
//!
//! The crate is split along four concerns:
//!
//! - **Entity store** ([`store::Store`]): SQLite-backed players, campaigns,
//!   memberships and sessions, with validation gates and cascading deletes.
//! - **Access policy** ([`access`]): who may view or administer a campaign.
//! - **Session calendar** ([`temporal`]): past / upcoming / today / this-week /
//!   month classification against an explicitly supplied `now`.
//! - **Queries** ([`query`]): derived views such as active campaigns and
//!   admin/member rosters.
//!
//! Nothing in this crate reads the wall clock. Every time-dependent call
//! takes `now: DateTime<Utc>` so one logical operation sees one instant.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod config;
pub mod entity;
pub mod error;
pub mod query;
pub mod store;
pub mod temporal;
pub mod types;
pub mod validation;

pub use config::QuestlogConfig;
pub use entity::{Campaign, CampaignDraft, Membership, Player, PlayerDraft, Session, SessionDraft};
pub use error::{QuestlogError, Result};
pub use store::Store;
pub use types::*;
pub use validation::ValidationErrors;
