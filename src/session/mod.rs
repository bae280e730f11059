// src/session/mod.rs — Durable conversion sessions

pub mod identity;
pub mod store;
pub mod types;

pub use identity::SourceIdentity;
pub use store::SessionStore;
pub use types::{
    ConversionOptions, OutputLayout, Session, SessionStats, SessionStatus, SessionUpdate,
};
