//! Public profile of a marketplace user, as shown on a ringing screen.
//!
//! Accounts are owned by the marketplace service; this is a read-only view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
}
