//! Call log persistence.
//!
//! PostgreSQL in production; an in-process map when no database is
//! configured (lite mode) and in tests. Updates are compare-and-set on the
//! prior status so concurrent actions on one call cannot both win.

use std::collections::HashMap;
use std::sync::Arc;
use tether_common::error::TetherResult;
use tether_common::models::{CallLog, CallStatus};
use tether_db::{Database, repository::call_logs};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub enum CallLogStore {
    Postgres(Database),
    Memory(MemoryCallLogStore),
}

impl CallLogStore {
    pub fn memory() -> Self {
        Self::Memory(MemoryCallLogStore::default())
    }

    pub async fn insert(&self, call: &CallLog) -> TetherResult<()> {
        match self {
            Self::Postgres(db) => call_logs::insert(&db.pg, call).await?,
            Self::Memory(mem) => mem.insert(call).await,
        }
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> TetherResult<Option<CallLog>> {
        match self {
            Self::Postgres(db) => call_logs::find_by_id(&db.pg, id)
                .await?
                .map(CallLog::try_from)
                .transpose(),
            Self::Memory(mem) => Ok(mem.find(id).await),
        }
    }

    /// Write `call` if the stored row is still in `expected` status.
    pub async fn update_if_status(&self, call: &CallLog, expected: CallStatus) -> TetherResult<bool> {
        match self {
            Self::Postgres(db) => Ok(call_logs::update_if_status(&db.pg, call, expected).await?),
            Self::Memory(mem) => Ok(mem.update_if_status(call, expected).await),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryCallLogStore {
    calls: Arc<RwLock<HashMap<Uuid, CallLog>>>,
}

impl MemoryCallLogStore {
    async fn insert(&self, call: &CallLog) {
        self.calls.write().await.insert(call.id, call.clone());
    }

    async fn find(&self, id: Uuid) -> Option<CallLog> {
        self.calls.read().await.get(&id).cloned()
    }

    async fn update_if_status(&self, call: &CallLog, expected: CallStatus) -> bool {
        let mut calls = self.calls.write().await;
        match calls.get_mut(&call.id) {
            Some(stored) if stored.status == expected => {
                *stored = call.clone();
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.read().await.is_empty()
    }
}
