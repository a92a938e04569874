use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod middleware;
pub mod password;
pub mod repo;
mod repo_types;
pub mod services;
mod token;

pub use repo::PgAccountStore;

pub fn router<S: repo::AccountStore>(state: AppState<S>) -> Router<AppState<S>> {
    handlers::user_routes(state)
}
