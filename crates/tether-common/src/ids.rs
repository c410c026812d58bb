//! Identifier generation.
//!
//! Record ids are UUID v7 (time-sortable, uncoordinated). Connection session
//! ids are random v4 so two sockets from the same address never collide.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new time-sortable record ID.
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

/// Generate a fresh identifier for one live connection.
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Media channel name for a new call: `call_<8 hex chars>_<unix seconds>`.
pub fn generate_channel_name(now: DateTime<Utc>) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    let prefix = simple.get(..8).unwrap_or(&simple);
    format!("call_{prefix}_{}", now.timestamp())
}
