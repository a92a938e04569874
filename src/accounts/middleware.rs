use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    accounts::{repo::AccountStore, services::ServiceError, token},
    error::ApiError,
    state::AppState,
};

/// Id of the authenticated caller, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentAccount(pub Uuid);

const BAD_TOKEN: &str = "missing or invalid bearer token";

fn bearer_token(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    token::is_well_formed(token).then(|| token.to_owned())
}

pub async fn require_auth<S: AccountStore>(
    State(state): State<AppState<S>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&req) else {
        warn!("rejected request without a usable bearer token");
        return Err(ApiError::Unauthorized(BAD_TOKEN));
    };

    let account_id = match state.accounts.authenticate(&token).await {
        Ok(id) => id,
        Err(ServiceError::Unauthorized) => {
            warn!("unknown bearer token");
            return Err(ApiError::Unauthorized(BAD_TOKEN));
        }
        Err(e) => return Err(e.into()),
    };

    req.extensions_mut().insert(CurrentAccount(account_id));
    Ok(next.run(req).await)
}
