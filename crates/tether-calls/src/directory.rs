//! Caller lookup for the ringing screen.
//!
//! Reads the marketplace `users` table in production. In lite mode the
//! directory is an in-process map that starts empty, so notifications go out
//! without a name or avatar.

use std::collections::HashMap;
use std::sync::Arc;
use tether_common::error::TetherResult;
use tether_common::models::UserProfile;
use tether_db::{Database, repository::users};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub enum CallerDirectory {
    Postgres(Database),
    Memory(MemoryCallerDirectory),
}

impl CallerDirectory {
    pub fn memory() -> Self {
        Self::Memory(MemoryCallerDirectory::default())
    }

    pub async fn lookup(&self, user_id: Uuid) -> TetherResult<Option<UserProfile>> {
        match self {
            Self::Postgres(db) => Ok(users::find_profile(&db.pg, user_id)
                .await?
                .map(UserProfile::from)),
            Self::Memory(mem) => Ok(mem.profiles.read().await.get(&user_id).cloned()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryCallerDirectory {
    profiles: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
}

impl MemoryCallerDirectory {
    pub async fn upsert(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}
