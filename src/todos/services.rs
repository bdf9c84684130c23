use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::error::{parse_record_id, Error};
use crate::todos::dto::TodoPayload;
use crate::todos::repo::{Priority, Todo, TodoStore, EPOCH};

/// Validated CRUD over todo records.
///
/// Every operation validates its arguments before the first store call, so a
/// rejected request leaves the store untouched. Each call performs at most one
/// store read and one store write.
#[derive(Clone)]
pub struct TodoService {
    store: Arc<dyn TodoStore>,
}

impl TodoService {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    /// All todos, unfiltered, in store order.
    pub async fn list(&self) -> Result<Vec<Todo>, Error> {
        self.store.find_all().await
    }

    /// Todos created by one user. An unknown user simply has none.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Todo>, Error> {
        let user_id = parse_record_id(user_id)?;
        self.store.find_by_user_id(user_id).await
    }

    pub async fn get(&self, id: &str) -> Result<Todo, Error> {
        let id = parse_record_id(id)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound("no todo was found with the given id".into()))
    }

    /// Persist a new todo. The store assigns the id; a missing deadline
    /// defaults to the epoch sentinel.
    pub async fn create(&self, candidate: TodoPayload) -> Result<Todo, Error> {
        let (name, priority) = validated(&candidate)?;

        let todo = Todo {
            id: None,
            name,
            deadline: candidate.deadline.unwrap_or(EPOCH),
            priority,
            user_id: candidate.user_id,
            created_at: OffsetDateTime::now_utc(),
        };

        let saved = self.store.save(todo).await?;
        info!(todo_id = ?saved.id, name = %saved.name, "todo saved");
        Ok(saved)
    }

    /// Replace name, deadline and priority of an existing todo. The id and
    /// the user back-reference never change.
    pub async fn update(&self, id: &str, candidate: TodoPayload) -> Result<Todo, Error> {
        let id = parse_record_id(id)?;
        let (name, priority) = validated(&candidate)?;

        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound("no todo was found with the given id".into()))?;

        let updated = Todo {
            id: current.id,
            name,
            deadline: candidate.deadline.unwrap_or(EPOCH),
            priority,
            user_id: current.user_id,
            created_at: current.created_at,
        };

        let saved = self.store.save(updated).await?;
        info!(todo_id = ?saved.id, name = %saved.name, "todo updated");
        Ok(saved)
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let id = parse_record_id(id)?;
        let deleted = self.store.delete_by_id(id).await?;
        if !deleted {
            return Err(Error::NotFound("no todo was found with the given id".into()));
        }
        info!(todo_id = %id, "todo deleted");
        Ok(())
    }
}

fn validated(candidate: &TodoPayload) -> Result<(String, Priority), Error> {
    let name = candidate.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(Error::Validation("the todo's name must not be empty".into()));
    }
    let priority = candidate
        .priority
        .ok_or_else(|| Error::Validation("the todo's priority is missing".into()))?;
    Ok((name.to_string(), priority))
}

#[cfg(test)]
mod service_tests {
    use super::*;
    use crate::todos::repo::{MemTodoStore, Priority};
    use time::macros::date;
    use uuid::Uuid;

    fn service() -> (Arc<MemTodoStore>, TodoService) {
        let store = Arc::new(MemTodoStore::new());
        (store.clone(), TodoService::new(store))
    }

    fn payload(name: &str, priority: Option<Priority>) -> TodoPayload {
        TodoPayload {
            name: Some(name.to_string()),
            deadline: None,
            priority,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults_deadline_to_epoch() {
        let (_, svc) = service();

        let todo = svc
            .create(payload("Buy milk", Some(Priority::Small)))
            .await
            .expect("create");

        assert!(todo.id.is_some());
        assert_eq!(todo.priority, Priority::Small);
        assert_eq!(todo.deadline, EPOCH);
    }

    #[tokio::test]
    async fn created_todo_round_trips_through_get() {
        let (_, svc) = service();

        let saved = svc
            .create(payload("Water plants", Some(Priority::Medium)))
            .await
            .expect("create");
        let fetched = svc
            .get(&saved.id.expect("assigned id").to_string())
            .await
            .expect("get");

        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn create_rejects_empty_name_without_touching_the_store() {
        let (store, svc) = service();

        let err = svc.create(payload("", Some(Priority::Big))).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn create_rejects_missing_name_and_missing_priority() {
        let (store, svc) = service();

        let err = svc
            .create(TodoPayload {
                priority: Some(Priority::Small),
                ..TodoPayload::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = svc.create(payload("Buy milk", None)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn create_surfaces_duplicate_names_from_the_store() {
        let (_, svc) = service();

        svc.create(payload("Buy milk", Some(Priority::Small)))
            .await
            .expect("first create");
        let err = svc
            .create(payload("Buy milk", Some(Priority::Big)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn get_rejects_empty_ids_and_reports_unknown_ones() {
        let (_, svc) = service();

        assert!(matches!(svc.get("").await.unwrap_err(), Error::InvalidInput(_)));
        assert!(matches!(
            svc.get("nonexistent-id").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            svc.get(&Uuid::new_v4().to_string()).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn update_replaces_fields_but_keeps_id_and_user() {
        let (_, svc) = service();
        let owner = Uuid::new_v4();

        let saved = svc
            .create(TodoPayload {
                name: Some("Walk the dog".into()),
                deadline: None,
                priority: Some(Priority::Small),
                user_id: Some(owner),
            })
            .await
            .expect("create");
        let id = saved.id.expect("assigned id").to_string();

        let updated = svc
            .update(
                &id,
                TodoPayload {
                    name: Some("Walk the dog twice".into()),
                    deadline: Some(date!(2026 - 09 - 01)),
                    priority: Some(Priority::Big),
                    user_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.user_id, Some(owner));
        assert_eq!(updated.name, "Walk the dog twice");
        assert_eq!(updated.deadline, date!(2026 - 09 - 01));
        assert_eq!(updated.priority, Priority::Big);
    }

    #[tokio::test]
    async fn update_surfaces_duplicate_names_from_the_store() {
        let (_, svc) = service();

        svc.create(payload("Buy milk", Some(Priority::Small)))
            .await
            .expect("first create");
        let other = svc
            .create(payload("Buy bread", Some(Priority::Small)))
            .await
            .expect("second create");

        let err = svc
            .update(
                &other.id.expect("assigned id").to_string(),
                payload("Buy milk", Some(Priority::Small)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_validates_before_reading_the_store() {
        let (_, svc) = service();

        let saved = svc
            .create(payload("Do laundry", Some(Priority::Medium)))
            .await
            .expect("create");
        let id = saved.id.expect("assigned id").to_string();

        let err = svc.update(&id, payload("", None)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let unchanged = svc.get(&id).await.expect("get");
        assert_eq!(unchanged, saved);
    }

    #[tokio::test]
    async fn update_reports_unknown_ids() {
        let (_, svc) = service();

        let err = svc
            .update(
                &Uuid::new_v4().to_string(),
                payload("Anything", Some(Priority::Small)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_not_idempotent_on_success() {
        let (_, svc) = service();

        let saved = svc
            .create(payload("Take out trash", Some(Priority::Small)))
            .await
            .expect("create");
        let id = saved.id.expect("assigned id").to_string();

        svc.delete(&id).await.expect("first delete");
        let err = svc.delete(&id).await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_rejects_empty_ids() {
        let (_, svc) = service();
        assert!(matches!(
            svc.delete("").await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn list_for_user_filters_by_owner() {
        let (_, svc) = service();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();

        for (name, owner) in [("One", ann), ("Two", bob), ("Three", ann)] {
            svc.create(TodoPayload {
                name: Some(name.into()),
                deadline: None,
                priority: Some(Priority::Small),
                user_id: Some(owner),
            })
            .await
            .expect("create");
        }

        let all = svc.list().await.expect("list");
        assert_eq!(all.len(), 3);

        let anns = svc.list_for_user(&ann.to_string()).await.expect("scoped list");
        assert_eq!(anns.len(), 2);
        assert!(anns.iter().all(|t| t.user_id == Some(ann)));

        let err = svc.list_for_user("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
