use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Mutex;
use time::{macros::date, Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{Error, DUPLICATE_KEY_MSG};

/// Deadline stored when the client does not send one.
pub const EPOCH: Date = date!(1970 - 01 - 01);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Small,
    Medium,
    Big,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Small => "SMALL",
            Priority::Medium => "MEDIUM",
            Priority::Big => "BIG",
        }
    }

    fn from_column(value: &str) -> Result<Self, Error> {
        match value {
            "SMALL" => Ok(Priority::Small),
            "MEDIUM" => Ok(Priority::Medium),
            "BIG" => Ok(Priority::Big),
            other => Err(Error::Persistence(anyhow::anyhow!(
                "unexpected priority column value: {other}"
            ))),
        }
    }
}

/// Todo record. The id is assigned by the store on first save and never
/// changes afterwards; user_id points back at the creating user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub deadline: Date,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct TodoRow {
    id: Uuid,
    name: String,
    deadline: Date,
    priority: String,
    user_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl TryFrom<TodoRow> for Todo {
    type Error = Error;

    fn try_from(row: TodoRow) -> Result<Self, Error> {
        Ok(Todo {
            id: Some(row.id),
            name: row.name,
            deadline: row.deadline,
            priority: Priority::from_column(&row.priority)?,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

/// Store interface for todo records. Name uniqueness is enforced by the
/// store itself (unique index), not by callers.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Todo>, Error>;
    async fn find_all(&self) -> Result<Vec<Todo>, Error>;
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<Todo>, Error>;
    /// Insert or replace; assigns an id when the record has none.
    async fn save(&self, todo: Todo) -> Result<Todo, Error>;
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, Error>;
}

#[derive(Clone)]
pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Todo>, Error> {
        let row = sqlx::query_as::<_, TodoRow>(
            r#"
            SELECT id, name, deadline, priority, user_id, created_at
            FROM todos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Todo::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Todo>, Error> {
        let rows = sqlx::query_as::<_, TodoRow>(
            r#"
            SELECT id, name, deadline, priority, user_id, created_at
            FROM todos
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Todo::try_from).collect()
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<Todo>, Error> {
        let rows = sqlx::query_as::<_, TodoRow>(
            r#"
            SELECT id, name, deadline, priority, user_id, created_at
            FROM todos
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Todo::try_from).collect()
    }

    async fn save(&self, todo: Todo) -> Result<Todo, Error> {
        let id = todo.id.unwrap_or_else(Uuid::new_v4);
        let row = sqlx::query_as::<_, TodoRow>(
            r#"
            INSERT INTO todos (id, name, deadline, priority, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                deadline = EXCLUDED.deadline,
                priority = EXCLUDED.priority
            RETURNING id, name, deadline, priority, user_id, created_at
            "#,
        )
        .bind(id)
        .bind(&todo.name)
        .bind(todo.deadline)
        .bind(todo.priority.as_str())
        .bind(todo.user_id)
        .bind(todo.created_at)
        .fetch_one(&self.db)
        .await?;
        Todo::try_from(row)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store backing `AppState::fake()` and the service tests.
/// Mirrors the unique-name behavior of the Postgres index.
#[derive(Default)]
pub struct MemTodoStore {
    items: Mutex<Vec<Todo>>,
}

impl MemTodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("todo store lock").len()
    }
}

#[async_trait]
impl TodoStore for MemTodoStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Todo>, Error> {
        let items = self.items.lock().expect("todo store lock");
        Ok(items.iter().find(|t| t.id == Some(id)).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Todo>, Error> {
        Ok(self.items.lock().expect("todo store lock").clone())
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<Todo>, Error> {
        let items = self.items.lock().expect("todo store lock");
        Ok(items
            .iter()
            .filter(|t| t.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn save(&self, mut todo: Todo) -> Result<Todo, Error> {
        let mut items = self.items.lock().expect("todo store lock");
        let id = todo.id.unwrap_or_else(Uuid::new_v4);
        todo.id = Some(id);
        if items.iter().any(|t| t.id != Some(id) && t.name == todo.name) {
            return Err(Error::Duplicate(DUPLICATE_KEY_MSG.into()));
        }
        match items.iter_mut().find(|t| t.id == Some(id)) {
            Some(existing) => *existing = todo.clone(),
            None => items.push(todo.clone()),
        }
        Ok(todo)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, Error> {
        let mut items = self.items.lock().expect("todo store lock");
        let before = items.len();
        items.retain(|t| t.id != Some(id));
        Ok(items.len() < before)
    }
}
