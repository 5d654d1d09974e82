//! services/api/src/web/admin.rs
//!
//! Account administration: roles, enabling and disabling, deletion, and a view of
//! the quota policy. Mounted behind `require_auth` and `require_admin`.

use crate::error::port_error_response;
use crate::web::{protocol::*, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use medassist_core::domain::{Role, UserAccount};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Every account with its current usage.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All accounts", body = [AdminUserResponse]),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let users = state.db.list_users().await.map_err(|e| {
        error!("Failed to list users: {:?}", e);
        port_error_response(&e, "list users")
    })?;

    let ledger = state.orchestrator.ledger();
    let now = Utc::now();
    let mut rows = Vec::with_capacity(users.len());
    for user in users {
        let usage = match ledger.counters(user.id, now).await {
            Ok(counters) => Some(UsageResponse::new(
                user.role,
                counters,
                ledger.policy().ceilings(user.role),
            )),
            Err(e) => {
                warn!(user_id = %user.id, "usage unavailable: {}", e);
                None
            }
        };
        rows.push(AdminUserResponse::new(user, usage));
    }
    Ok(Json(rows))
}

/// Change an account's role.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = AdminUserResponse),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "No such user")
    ),
    params(("id" = Uuid, Path, description = "The user id."))
)]
pub async fn update_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<UserAccount>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let role: Role = body
        .role
        .parse()
        .map_err(|e: medassist_core::domain::UnknownRole| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if admin.id == user_id && role != Role::Admin {
        return Err((
            StatusCode::BAD_REQUEST,
            "Administrators cannot remove their own admin role".to_string(),
        ));
    }

    let user = state
        .db
        .update_user_role(user_id, role)
        .await
        .map_err(|e| port_error_response(&e, "update the role"))?;
    info!(admin_id = %admin.id, %user_id, role = %role, "role changed");
    Ok(Json(AdminUserResponse::new(user, None)))
}

/// Enable or disable an account. Disabled accounts keep their data but cannot sign in.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/enabled",
    request_body = UpdateEnabledRequest,
    responses(
        (status = 200, description = "Account updated", body = AdminUserResponse),
        (status = 404, description = "No such user")
    ),
    params(("id" = Uuid, Path, description = "The user id."))
)]
pub async fn update_enabled_handler(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<UserAccount>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateEnabledRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if admin.id == user_id && !body.enabled {
        return Err((
            StatusCode::BAD_REQUEST,
            "Administrators cannot disable their own account".to_string(),
        ));
    }
    let user = state
        .db
        .set_user_enabled(user_id, body.enabled)
        .await
        .map_err(|e| port_error_response(&e, "update the account"))?;
    info!(admin_id = %admin.id, %user_id, enabled = body.enabled, "account state changed");
    Ok(Json(AdminUserResponse::new(user, None)))
}

/// Delete an account with its sessions and stored questions.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "No such user")
    ),
    params(("id" = Uuid, Path, description = "The user id."))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<UserAccount>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if admin.id == user_id {
        return Err((
            StatusCode::BAD_REQUEST,
            "Administrators cannot delete their own account".to_string(),
        ));
    }
    state
        .db
        .delete_user(user_id)
        .await
        .map_err(|e| port_error_response(&e, "delete the user"))?;
    info!(admin_id = %admin.id, %user_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The ceilings in force for every role.
#[utoipa::path(
    get,
    path = "/admin/quota-policy",
    responses((status = 200, description = "Quota policy", body = QuotaPolicyResponse))
)]
pub async fn quota_policy_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.orchestrator.ledger().policy();
    let roles = Role::ALL
        .iter()
        .map(|role| {
            let ceilings = policy.ceilings(*role);
            RoleCeilingsResponse {
                role: role.as_str().to_string(),
                daily: ceilings.daily,
                monthly: ceilings.monthly,
            }
        })
        .collect();
    Json(QuotaPolicyResponse {
        roles,
        guest_limit: state.config.guest_query_limit,
        utc_offset_minutes: state.config.quota_offset.local_minus_utc() / 60,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::state::test_support::app_state;
    use medassist_core::testing::{account, Fakes};

    fn setup() -> (Fakes, Arc<AppState>, UserAccount, UserAccount) {
        let fakes = Fakes::default();
        let state = app_state(&fakes);
        let admin = account(Role::Admin);
        let user = account(Role::Free);
        fakes.db.insert_user(admin.clone(), "hash");
        fakes.db.insert_user(user.clone(), "hash");
        (fakes, state, admin, user)
    }

    #[tokio::test]
    async fn promotes_a_user() {
        let (_fakes, state, admin, user) = setup();
        update_role_handler(
            State(state.clone()),
            Extension(admin),
            Path(user.id),
            Json(UpdateRoleRequest {
                role: "premium".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(state.db.get_user(user.id).await.unwrap().role, Role::Premium);
    }

    #[tokio::test]
    async fn rejects_unknown_roles_and_self_demotion() {
        let (_fakes, state, admin, user) = setup();
        let err = update_role_handler(
            State(state.clone()),
            Extension(admin.clone()),
            Path(user.id),
            Json(UpdateRoleRequest {
                role: "gold".to_string(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = update_role_handler(
            State(state),
            Extension(admin.clone()),
            Path(admin.id),
            Json(UpdateRoleRequest {
                role: "free".to_string(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn disables_and_deletes() {
        let (fakes, state, admin, user) = setup();
        fakes.db.insert_query_at(Some(user.id), Utc::now());

        update_enabled_handler(
            State(state.clone()),
            Extension(admin.clone()),
            Path(user.id),
            Json(UpdateEnabledRequest { enabled: false }),
        )
        .await
        .unwrap();
        assert!(!state.db.get_user(user.id).await.unwrap().enabled);

        let response = delete_user_handler(State(state.clone()), Extension(admin.clone()), Path(user.id))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(fakes.db.stored_queries().is_empty());

        let err = delete_user_handler(State(state), Extension(admin), Path(user.id))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_users_with_usage_even_when_counting_fails() {
        let (fakes, state, _admin, user) = setup();
        fakes.db.insert_query_at(Some(user.id), Utc::now());
        let response = list_users_handler(State(state.clone()))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        fakes.db.fail_counts();
        let response = list_users_handler(State(state)).await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
