//! # tether-calls
//!
//! Call signaling for one-to-one voice/video calls between marketplace users.
//!
//! The media itself flows through an external relay; this crate only decides
//! who may join which relay channel and tells the other side what happened:
//! - [`signaling`]: the ringing → answered/declined → ended workflow
//! - [`credentials`]: signed, time-limited relay credentials
//! - [`store`]: the persisted call log (PostgreSQL, or in-memory in lite mode)
//! - [`directory`]: caller name and avatar for the ringing screen
//!
//! Notifications go through the hub and are best-effort: if the other side has
//! no live connection, the event is dropped.

pub mod credentials;
pub mod directory;
pub mod signaling;
pub mod store;

pub use credentials::{MediaCredentialIssuer, SignedTokenIssuer};
pub use directory::{CallerDirectory, MemoryCallerDirectory};
pub use signaling::{CallOutcome, CallSignaling, CallTicket};
pub use store::{CallLogStore, MemoryCallLogStore};
