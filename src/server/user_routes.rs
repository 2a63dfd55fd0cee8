//! `/v1/users` endpoints: registration, profile and user administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::session::Session;
use super::state::*;
use crate::user::{NewUser, Permission, User, UserFilter, UserRole, UserUpdate};

#[derive(Serialize, Debug)]
struct UserView {
    id: usize,
    email: String,
    first_name: String,
    last_name: String,
    full_name: String,
    is_staff: bool,
    is_active: bool,
    created: i64,
}

impl UserView {
    fn new(user: User, roles: &[UserRole]) -> Self {
        UserView {
            full_name: user.full_name(),
            is_staff: roles.contains(&UserRole::Admin),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            created: user.created,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RegisterBody {
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    password: String,
}

#[derive(Deserialize, Debug)]
struct UpdateUserBody {
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: Option<bool>,
    password: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ListUsersQuery {
    is_active: Option<String>,
    search: Option<String>,
}

fn detail_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn internal_error(context: &str, err: anyhow::Error) -> Response {
    error!("{}: {:#}", context, err);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn can_manage(session: &Session, user_id: usize) -> bool {
    session.user_id == user_id || session.has_permission(Permission::ManageUsers)
}

fn load_user_view(state: &ServerState, user_id: usize) -> Response {
    let user_manager = state.user_manager.lock().unwrap();
    let user = match user_manager.get_user(user_id) {
        Ok(Some(user)) => user,
        Ok(None) => return detail_response(StatusCode::NOT_FOUND, "Not found."),
        Err(e) => return internal_error("Failed to load user", e),
    };
    match user_manager.get_user_roles(user_id) {
        Ok(roles) => Json(UserView::new(user, &roles)).into_response(),
        Err(e) => internal_error("Failed to load user roles", e),
    }
}

async fn register_user(
    State(state): State<ServerState>,
    Json(body): Json<RegisterBody>,
) -> Response {
    let email = body.email.trim().to_lowercase();
    let mut errors = serde_json::Map::new();
    if !email.contains('@') {
        errors.insert("email".to_string(), json!(["Enter a valid email address."]));
    }
    if body.password.is_empty() {
        errors.insert("password".to_string(), json!(["This field may not be blank."]));
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
    }

    let user_id = {
        let user_manager = state.user_manager.lock().unwrap();
        match user_manager.get_user_id(&email) {
            Ok(Some(_)) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "email": ["user with this email already exists."] })),
                )
                    .into_response()
            }
            Ok(None) => {}
            Err(e) => return internal_error("Failed to look up user", e),
        }
        match user_manager.register_user(
            NewUser {
                email,
                first_name: body.first_name,
                last_name: body.last_name,
            },
            &body.password,
            UserRole::Regular,
        ) {
            Ok(id) => id,
            Err(e) => return internal_error("Failed to register user", e),
        }
    };
    info!("User {} registered", user_id);

    let response = load_user_view(&state, user_id);
    if response.status() == StatusCode::OK {
        let (mut parts, body) = response.into_parts();
        parts.status = StatusCode::CREATED;
        return Response::from_parts(parts, body);
    }
    response
}

async fn get_me(session: Session, State(state): State<ServerState>) -> Response {
    load_user_view(&state, session.user_id)
}

async fn list_users(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<ListUsersQuery>,
) -> Response {
    if !session.has_permission(Permission::ManageUsers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let filter = UserFilter {
        is_active: query.is_active.map(|v| v.eq_ignore_ascii_case("true")),
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let user_manager = state.user_manager.lock().unwrap();
    let users = match user_manager.list_users(&filter) {
        Ok(users) => users,
        Err(e) => return internal_error("Failed to list users", e),
    };
    let mut views = Vec::with_capacity(users.len());
    for user in users {
        match user_manager.get_user_roles(user.id) {
            Ok(roles) => views.push(UserView::new(user, &roles)),
            Err(e) => return internal_error("Failed to load user roles", e),
        }
    }
    Json(views).into_response()
}

async fn get_user(
    session: Session,
    State(state): State<ServerState>,
    Path(user_id): Path<usize>,
) -> Response {
    if !can_manage(&session, user_id) {
        return StatusCode::FORBIDDEN.into_response();
    }
    load_user_view(&state, user_id)
}

async fn update_user(
    session: Session,
    State(state): State<ServerState>,
    Path(user_id): Path<usize>,
    Json(body): Json<UpdateUserBody>,
) -> Response {
    if !can_manage(&session, user_id) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if body.is_active.is_some() && !session.has_permission(Permission::ManageUsers) {
        return detail_response(
            StatusCode::FORBIDDEN,
            "Only administrators can change the active flag.",
        );
    }

    {
        let user_manager = state.user_manager.lock().unwrap();
        let update = UserUpdate {
            first_name: body.first_name,
            last_name: body.last_name,
            is_active: body.is_active,
        };
        if !update.is_empty() {
            match user_manager.update_user(user_id, &update) {
                Ok(true) => {}
                Ok(false) => return detail_response(StatusCode::NOT_FOUND, "Not found."),
                Err(e) => return internal_error("Failed to update user", e),
            }
        }
        if let Some(password) = body.password.filter(|p| !p.is_empty()) {
            if let Err(e) = user_manager.set_password(user_id, &password) {
                return internal_error("Failed to set password", e);
            }
        }
    }
    load_user_view(&state, user_id)
}

async fn delete_user(
    session: Session,
    State(state): State<ServerState>,
    Path(user_id): Path<usize>,
) -> Response {
    if !can_manage(&session, user_id) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let deleted = state.user_manager.lock().unwrap().delete_user(user_id);
    match deleted {
        Ok(true) => {
            info!("User {} deleted by user {}", user_id, session.user_id);
            match state.song_store.delete_songs_by_owner(user_id) {
                Ok(count) => info!("Deleted {} songs of user {}", count, user_id),
                Err(e) => error!("Failed to delete songs of user {}: {}", user_id, e),
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => detail_response(StatusCode::NOT_FOUND, "Not found."),
        Err(e) => internal_error("Failed to delete user", e),
    }
}

pub fn make_user_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", post(register_user).get(list_users))
        .route("/me", get(get_me))
        .route(
            "/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_flag_follows_admin_role() {
        let user = User {
            id: 7,
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            is_active: true,
            created: 100,
        };
        let view = UserView::new(user.clone(), &[UserRole::Regular]);
        assert!(!view.is_staff);
        assert_eq!(view.full_name, "Ada Lovelace");

        let view = UserView::new(user, &[UserRole::Regular, UserRole::Admin]);
        assert!(view.is_staff);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }
}
