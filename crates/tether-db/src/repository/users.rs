//! Read-only access to the marketplace `users` table.

use tether_common::models::UserProfile;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct UserProfileRow {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

impl From<UserProfileRow> for UserProfile {
    fn from(row: UserProfileRow) -> Self {
        UserProfile {
            id: row.id,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
        }
    }
}

/// Find a user's display profile by ID.
pub async fn find_profile(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<UserProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, UserProfileRow>(
        "SELECT id, full_name, avatar_url FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
