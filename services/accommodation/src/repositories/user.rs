//! Read-only access to the participant directory

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AccommodationResult;
use crate::models::UserProfile;
use crate::repositories::UserDirectory;

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_id(&self, id: Uuid) -> AccommodationResult<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, gender, participant_id, phone
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let gender: Option<String> = row.try_get("gender")?;
                let user = UserProfile {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    // Directory data is not ours to validate; unknown values read as unset
                    gender: gender.and_then(|g| g.parse().ok()),
                    participant_id: row.try_get("participant_id")?,
                    phone: row.try_get("phone")?,
                };
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}
