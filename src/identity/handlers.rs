use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::Error,
    identity::{
        dto::{PrincipalPayload, UsernameResponse},
        repo::User,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/user", post(current_user))
}

/// Reconcile a freshly authenticated principal into its local account.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<PrincipalPayload>,
) -> Result<Json<User>, Error> {
    let principal = payload.into_principal()?;
    let user = state.identity.resolve(&principal).await?;
    Ok(Json(user))
}

/// Display name for the principal, for the client header bar.
#[instrument(skip(state, payload))]
pub async fn current_user(
    State(state): State<AppState>,
    Json(payload): Json<PrincipalPayload>,
) -> Result<Json<UsernameResponse>, Error> {
    let principal = payload.into_principal()?;
    let name = state.identity.username(&principal)?;
    Ok(Json(UsernameResponse { name }))
}
