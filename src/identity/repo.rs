use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, DUPLICATE_KEY_MSG};

/// Local user account reconciled from federated logins. The email is the
/// cross-provider dedup key; provider ids are only ever added, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    google_id: Option<String>,
    github_id: Option<String>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: Some(row.id),
            email: row.email,
            google_id: row.google_id,
            github_id: row.github_id,
            created_at: row.created_at,
        }
    }
}

/// Store interface for user accounts. Uniqueness of email and of each
/// provider id is enforced by the store's indexes, never by check-then-act
/// logic in callers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, Error>;
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<User>, Error>;
    /// Insert or replace; assigns an id when the record has none.
    async fn save(&self, user: User) -> Result<User, Error>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_by(&self, column: &'static str, value: &str) -> Result<Option<User>, Error> {
        let query = format!(
            "SELECT id, email, google_id, github_id, created_at FROM users WHERE {column} = $1"
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.find_by("email", email).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, Error> {
        self.find_by("google_id", google_id).await
    }

    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<User>, Error> {
        self.find_by("github_id", github_id).await
    }

    async fn save(&self, user: User) -> Result<User, Error> {
        let id = user.id.unwrap_or_else(Uuid::new_v4);
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, google_id, github_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                google_id = EXCLUDED.google_id,
                github_id = EXCLUDED.github_id
            RETURNING id, email, google_id, github_id, created_at
            "#,
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.google_id)
        .bind(&user.github_id)
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(User::from(row))
    }
}

/// In-memory store backing `AppState::fake()` and the service tests.
/// Mirrors the unique email / provider-id indexes of the Postgres schema.
#[derive(Default)]
pub struct MemUserStore {
    items: Mutex<Vec<User>>,
}

impl MemUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("user store lock").len()
    }
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let items = self.items.lock().expect("user store lock");
        Ok(items.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, Error> {
        let items = self.items.lock().expect("user store lock");
        Ok(items
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<User>, Error> {
        let items = self.items.lock().expect("user store lock");
        Ok(items
            .iter()
            .find(|u| u.github_id.as_deref() == Some(github_id))
            .cloned())
    }

    async fn save(&self, mut user: User) -> Result<User, Error> {
        let mut items = self.items.lock().expect("user store lock");
        let id = user.id.unwrap_or_else(Uuid::new_v4);
        user.id = Some(id);

        let collides = items.iter().any(|u| {
            u.id != Some(id)
                && (u.email == user.email
                    || (user.google_id.is_some() && u.google_id == user.google_id)
                    || (user.github_id.is_some() && u.github_id == user.github_id))
        });
        if collides {
            return Err(Error::Duplicate(DUPLICATE_KEY_MSG.into()));
        }

        match items.iter_mut().find(|u| u.id == Some(id)) {
            Some(existing) => *existing = user.clone(),
            None => items.push(user.clone()),
        }
        Ok(user)
    }
}
