use anyhow::Result;
use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info};

use axum_extra::extract::cookie::{Cookie, SameSite};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::song_routes::make_song_routes;
use super::user_routes::make_user_routes;
use super::{log_requests, state::*, ServerConfig};
use crate::user::auth::AuthTokenValue;
use crate::user::LoginOutcome;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

const INVALID_CREDENTIALS_DETAIL: &str = "No active account found with the given credentials";
const INACTIVE_ACCOUNT_DETAIL: &str =
    "Your account has been deactivated. Please contact an administrator.";

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> Response {
    debug!("login() called for {}", body.email);
    let outcome = user_manager.lock().unwrap().login(&body.email, &body.password);
    match outcome {
        Ok(LoginOutcome::LoggedIn(auth_token)) => {
            let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, auth_token.value.0.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (
                StatusCode::CREATED,
                [(axum::http::header::SET_COOKIE, cookie.to_string())],
                Json(LoginSuccessResponse {
                    token: auth_token.value.0,
                }),
            )
                .into_response()
        }
        Ok(LoginOutcome::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": INVALID_CREDENTIALS_DETAIL })),
        )
            .into_response(),
        Ok(LoginOutcome::Inactive) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": INACTIVE_ACCOUNT_DETAIL })),
        )
            .into_response(),
        Err(err) => {
            error!("Error during login: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    let locked_manager = user_manager.lock().unwrap();
    match locked_manager.delete_auth_token(session.user_id, &AuthTokenValue(session.token)) {
        Ok(()) => {
            let cookie_value = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                // Expire it in the past
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
                .same_site(SameSite::Lax)
                .build();

            (
                StatusCode::OK,
                [(axum::http::header::SET_COOKIE, cookie_value.to_string())],
            )
                .into_response()
        }
        Err(err) => {
            debug!("Logout failed: {}", err);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_manager: GuardedUserManager,
        services: SongServices,
    ) -> ServerState {
        ServerState {
            config,
            start_time: std::time::Instant::now(),
            user_manager,
            song_store: services.song_store,
            lyrics_fetcher: services.lyrics_fetcher,
            dispatcher: services.dispatcher,
        }
    }
}

/// Everything the song endpoints need besides users.
pub struct SongServices {
    pub song_store: GuardedSongStore,
    pub lyrics_fetcher: GuardedLyricsFetcher,
    pub dispatcher: GuardedDispatcher,
}

pub fn make_app(
    config: ServerConfig,
    user_manager: GuardedUserManager,
    services: SongServices,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), user_manager, services);

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/songs", make_song_routes(state.clone()))
        .nest("/v1/users", make_user_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    user_manager: GuardedUserManager,
    services: SongServices,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, user_manager, services)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Ready to serve at port {}!", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
