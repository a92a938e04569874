use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    accounts::{
        dto::{AccountView, LoginRequest, LoginResponse, RegisterRequest, UserResponse},
        middleware::{require_auth, CurrentAccount},
        repo::AccountStore,
    },
    error::ApiError,
    response::ApiResponse,
    state::AppState,
};

pub fn user_routes<S: AccountStore>(state: AppState<S>) -> Router<AppState<S>> {
    let protected = Router::new()
        .route("/users/:id", get(get_user::<S>))
        .route_layer(middleware::from_fn_with_state(state, require_auth::<S>));

    Router::new()
        .route("/users", post(register::<S>))
        .route("/users/login", post(login::<S>))
        .merge(protected)
}

#[instrument(skip_all)]
pub async fn register<S: AccountStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<AccountView>, ApiError> {
    let Json(payload) = payload?;
    let view = state.accounts.register(payload).await?;
    Ok(ApiResponse::created(view))
}

#[instrument(skip_all)]
pub async fn login<S: AccountStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let Json(payload) = payload?;
    let token = state.accounts.login(payload).await?;
    Ok(ApiResponse::ok(LoginResponse { token }))
}

#[instrument(skip_all)]
pub async fn get_user<S: AccountStore>(
    State(state): State<AppState<S>>,
    Extension(CurrentAccount(caller_id)): Extension<CurrentAccount>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let Path(id) = id?;
    let user = state.accounts.get_account(id).await?;
    Ok(ApiResponse::ok(UserResponse { caller_id, user }))
}
