use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::Error,
    identity::dto::PrincipalPayload,
    state::AppState,
    todos::{dto::TodoPayload, repo::Todo},
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos))
        .route("/todos/:todo_id", get(get_todo))
        .route("/users/:user_id/todos", get(list_todos_for_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", post(save_todo))
        .route("/todos/:todo_id", put(update_todo).delete(delete_todo))
        .route("/todos/mine", post(list_my_todos))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, Error> {
    let todos = state.todos.list().await?;
    Ok(Json(todos))
}

#[instrument(skip(state))]
pub async fn list_todos_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Todo>>, Error> {
    let todos = state.todos.list_for_user(&user_id).await?;
    Ok(Json(todos))
}

/// Scoped listing for the calling principal: the auth layer posts the
/// resolved principal and gets back the todos of the matching account.
#[instrument(skip(state, payload))]
pub async fn list_my_todos(
    State(state): State<AppState>,
    Json(payload): Json<PrincipalPayload>,
) -> Result<Json<Vec<Todo>>, Error> {
    let principal = payload.into_principal()?;
    let user = state
        .identity
        .find_for_principal(&principal)
        .await?
        .ok_or_else(|| Error::NotFound("the given user does not exist in the database".into()))?;
    let user_id = user
        .id
        .ok_or_else(|| Error::Persistence(anyhow::anyhow!("stored user has no id")))?;
    let todos = state.todos.list_for_user(&user_id.to_string()).await?;
    Ok(Json(todos))
}

#[instrument(skip(state))]
pub async fn get_todo(
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
) -> Result<Json<Todo>, Error> {
    let todo = state.todos.get(&todo_id).await?;
    Ok(Json(todo))
}

#[instrument(skip(state, payload))]
pub async fn save_todo(
    State(state): State<AppState>,
    Json(payload): Json<TodoPayload>,
) -> Result<(StatusCode, Json<Todo>), Error> {
    let todo = state.todos.create(payload).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

#[instrument(skip(state, payload))]
pub async fn update_todo(
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
    Json(payload): Json<TodoPayload>,
) -> Result<Json<Todo>, Error> {
    let todo = state.todos.update(&todo_id, payload).await?;
    Ok(Json(todo))
}

#[instrument(skip(state))]
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
) -> Result<StatusCode, Error> {
    state.todos.delete(&todo_id).await?;
    Ok(StatusCode::OK)
}
