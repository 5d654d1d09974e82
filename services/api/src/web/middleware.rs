//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use medassist_core::domain::{Role, UserAccount};
use medassist_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::state::AppState;

/// Reads the `session` cookie value from the request headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Resolves the session cookie to the signed-in account.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserAccount, StatusCode> {
    let auth_session_id = session_id_from_headers(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            warn!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    let account = state.db.get_user(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => StatusCode::UNAUTHORIZED,
        other => {
            error!("Failed to load user {}: {:?}", user_id, other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    if !account.enabled {
        warn!(user_id = %account.id, "rejected request from disabled account");
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(account)
}

/// Middleware that validates the auth session cookie and loads the account.
///
/// If valid, inserts the `UserAccount` into request extensions for handlers to use.
/// A missing or expired session is 401; a disabled account is 403.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let account = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(account);
    Ok(next.run(req).await)
}

/// Middleware for admin routes. Runs inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, StatusCode> {
    let is_admin = req
        .extensions()
        .get::<UserAccount>()
        .map(|account| account.role == Role::Admin)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if !is_admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::state::test_support::app_state;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use medassist_core::ports::DatabaseService;
    use medassist_core::testing::{account, Fakes};

    fn cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn finds_the_session_cookie_among_others() {
        let headers = cookie("theme=dark; session=abc123; lang=es");
        assert_eq!(session_id_from_headers(&headers), Some("abc123"));
        assert_eq!(session_id_from_headers(&cookie("session=")), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn valid_session_resolves_the_account() {
        let fakes = Fakes::default();
        let user = account(Role::Premium);
        fakes.db.insert_user(user.clone(), "hash");
        fakes
            .db
            .create_auth_session("s1", user.id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        let state = app_state(&fakes);

        let resolved = authenticate(&state, &cookie("session=s1")).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(
            authenticate(&state, &cookie("session=nope")).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn disabled_accounts_are_forbidden() {
        let fakes = Fakes::default();
        let mut user = account(Role::Free);
        user.enabled = false;
        fakes.db.insert_user(user.clone(), "hash");
        fakes
            .db
            .create_auth_session("s2", user.id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        let state = app_state(&fakes);

        assert_eq!(
            authenticate(&state, &cookie("session=s2")).await.unwrap_err(),
            StatusCode::FORBIDDEN
        );
    }
}
