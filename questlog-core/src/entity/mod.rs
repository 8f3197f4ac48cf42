//! Entity records and their validation rules.
//!
//! Each entity comes in two shapes: the stored record (`Player`,
//! `Campaign`, ...) carrying its identifier and timestamps, and a draft
//! (`PlayerDraft`, ...) holding the user-editable fields. Drafts are what
//! get validated; the store only ever writes a draft that passed.

pub mod campaign;
pub mod membership;
pub mod player;
pub mod session;

pub use campaign::{Campaign, CampaignDraft};
pub use membership::Membership;
pub use player::{Player, PlayerChanges, PlayerDraft};
pub use session::{Session, SessionDraft};
