//! Persisted record types.

pub mod call;
pub mod user;

pub use call::{CallKind, CallLog, CallStatus, Participant};
pub use user::UserProfile;
