//! # questlog-app: Interface Layer for Questlog
//!
//! This crate sits between a request boundary (HTTP handlers or a CLI)
//! and the `questlog-core` library. Every operation runs on behalf of a
//! "current player" and enforces the campaign access policy before it
//! touches the store.
//!
//! ## Modules
//!
//! - `tracker`: the [`Tracker`] service with one method per user action
//! - `outcome`: [`Outcome`] and [`Notice`]: denials as values, not errors
//! - `clock`: the [`Clock`] seam; each operation samples `now` once
//! - `telemetry`: `tracing-subscriber` initialisation from config

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod outcome;
pub mod telemetry;
pub mod tracker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use outcome::{Notice, Outcome};
pub use tracker::{CampaignOverview, SessionDetail, Tracker};
