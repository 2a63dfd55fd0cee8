//! `/v1/songs` endpoints: song registration, listing and analysis status.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use super::session::Session;
use super::state::*;
use crate::song::{NewSong, PageRequest, Song, SongFilter, SongStatus, SongStore};
use crate::user::User;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
const MAX_FIELD_LENGTH: usize = 255;
const SONGS_PATH: &str = "/v1/songs";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SongOwner {
    pub id: usize,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for SongOwner {
    fn from(user: &User) -> Self {
        SongOwner {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name(),
        }
    }
}

/// A song as shown in listings, without lyrics.
#[derive(Serialize, Debug)]
pub struct SongView {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub status: SongStatus,
    pub message: Option<String>,
    pub summary: Option<String>,
    pub countries: Vec<String>,
    pub created: i64,
    pub modified: i64,
    pub created_by: Option<SongOwner>,
}

#[derive(Serialize, Debug)]
pub struct SongDetailView {
    #[serde(flatten)]
    pub song: SongView,
    pub lyrics: Option<String>,
}

impl SongView {
    fn new(song: Song, owner: Option<SongOwner>) -> Self {
        SongView {
            id: song.id,
            artist: song.artist,
            title: song.title,
            status: song.status,
            message: song.message,
            summary: song.summary,
            countries: song.countries,
            created: song.created,
            modified: song.modified,
            created_by: owner,
        }
    }
}

impl SongDetailView {
    fn new(mut song: Song, owner: Option<SongOwner>) -> Self {
        let lyrics = song.lyrics.take();
        SongDetailView {
            song: SongView::new(song, owner),
            lyrics,
        }
    }
}

#[derive(Serialize, Debug)]
struct SongPage {
    count: usize,
    next: Option<String>,
    previous: Option<String>,
    results: Vec<SongView>,
}

#[derive(Deserialize, Debug)]
struct CreateSongBody {
    artist: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ListSongsQuery {
    artist: Option<String>,
    title: Option<String>,
    status: Option<String>,
    search: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
}

fn internal_error(context: &str, err: anyhow::Error) -> Response {
    error!("{}: {:#}", context, err);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Checks a required text field, returning the trimmed value or the
/// validation error for it.
fn validate_field(value: Option<&str>) -> Result<String, &'static str> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err("This field may not be blank.");
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err("Ensure this field has no more than 255 characters.");
    }
    Ok(value.to_string())
}

fn load_owners(state: &ServerState, songs: &[Song]) -> HashMap<usize, SongOwner> {
    let user_manager = state.user_manager.lock().unwrap();
    let mut owners = HashMap::new();
    for song in songs {
        if owners.contains_key(&song.created_by) {
            continue;
        }
        match user_manager.get_user(song.created_by) {
            Ok(Some(user)) => {
                owners.insert(song.created_by, SongOwner::from(&user));
            }
            Ok(None) => debug!("Owner {} of song {} is gone", song.created_by, song.id),
            Err(e) => error!("Failed to load owner {}: {}", song.created_by, e),
        }
    }
    owners
}

fn detail_view(state: &ServerState, song: Song) -> SongDetailView {
    let owner = load_owners(state, std::slice::from_ref(&song)).remove(&song.created_by);
    SongDetailView::new(song, owner)
}

/// Loads a song the session is allowed to see.
fn get_visible_song(
    state: &ServerState,
    session: &Session,
    song_id: &str,
) -> Result<Song, Response> {
    match state.song_store.get_song(song_id) {
        Ok(Some(song)) if song.created_by == session.user_id || session.sees_all_songs() => {
            Ok(song)
        }
        Ok(_) => Err(not_found()),
        Err(e) => Err(internal_error("Failed to load song", e)),
    }
}

fn page_link(query: &ListSongsQuery, page: usize, page_size: usize) -> String {
    let mut params: Vec<(&str, String)> = Vec::new();
    for (key, value) in [
        ("artist", &query.artist),
        ("title", &query.title),
        ("status", &query.status),
        ("search", &query.search),
    ] {
        if let Some(value) = value {
            params.push((key, value.clone()));
        }
    }
    params.push(("page", page.to_string()));
    params.push(("page_size", page_size.to_string()));

    let Ok(mut url) = reqwest::Url::parse(&format!("http://localhost{}", SONGS_PATH)) else {
        return SONGS_PATH.to_string();
    };
    url.query_pairs_mut().extend_pairs(params);
    match url.query() {
        Some(q) => format!("{}?{}", SONGS_PATH, q),
        None => SONGS_PATH.to_string(),
    }
}

fn already_exists(state: &ServerState, song: Song) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "message": "Song already exists",
            "data": detail_view(state, song),
        })),
    )
        .into_response()
}

/// Inserts the song, or returns the one a concurrent request registered for
/// the same owner in the meantime. The flag is true when a row was inserted.
fn insert_or_find(store: &dyn SongStore, new_song: &NewSong) -> anyhow::Result<(Song, bool)> {
    let err = match store.create_song(new_song) {
        Ok(song) => return Ok((song, true)),
        Err(err) => err,
    };
    match store.find_song(new_song.created_by, &new_song.artist, &new_song.title)? {
        Some(existing) => {
            debug!(
                "Song {} - {} was registered concurrently as {}",
                new_song.artist, new_song.title, existing.id
            );
            Ok((existing, false))
        }
        None => Err(err),
    }
}

async fn create_song(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<CreateSongBody>,
) -> Response {
    let (artist, title) = match (
        validate_field(body.artist.as_deref()),
        validate_field(body.title.as_deref()),
    ) {
        (Ok(artist), Ok(title)) => (artist, title),
        (artist, title) => {
            let mut errors = serde_json::Map::new();
            if let Err(e) = artist {
                errors.insert("artist".to_string(), json!([e]));
            }
            if let Err(e) = title {
                errors.insert("title".to_string(), json!([e]));
            }
            return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
        }
    };

    match state.song_store.find_song(session.user_id, &artist, &title) {
        Ok(Some(existing)) => return already_exists(&state, existing),
        Ok(None) => {}
        Err(e) => return internal_error("Failed to look up song", e),
    }

    if state.config.verify_songs_on_create {
        if let Err(err) = state.lyrics_fetcher.check_song_exists(&artist, &title).await {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": format!("Cannot analyze song: {}", err),
                    "success": false,
                })),
            )
                .into_response();
        }
    }

    let new_song = NewSong {
        artist,
        title,
        created_by: session.user_id,
    };
    let song = match insert_or_find(state.song_store.as_ref(), &new_song) {
        Ok((song, true)) => song,
        Ok((existing, false)) => return already_exists(&state, existing),
        Err(e) => return internal_error("Failed to create song", e),
    };
    let handle = state.dispatcher.enqueue(&song.id);
    info!(
        "Song {} created by user {}, queued as task {}",
        song.id,
        session.user_id,
        handle.task_id()
    );

    // Re-read so the response carries the recorded task and current status.
    let song = match state.song_store.get_song(&song.id) {
        Ok(Some(song)) => song,
        Ok(None) => song,
        Err(e) => return internal_error("Failed to reload song", e),
    };
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Song created and queued for analysis",
            "data": detail_view(&state, song),
        })),
    )
        .into_response()
}

async fn list_songs(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<ListSongsQuery>,
) -> Response {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match SongStatus::from_str(raw) {
            Some(status) => Some(status),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "status": [format!("Select a valid choice. {} is not one of the available choices.", raw)]
                    })),
                )
                    .into_response()
            }
        },
    };
    let page = query.page.unwrap_or(1);
    let page_size = query
        .page_size
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    if page == 0 {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Invalid page." }))).into_response();
    }

    let non_empty = |s: &Option<String>| {
        s.as_ref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let filter = SongFilter {
        owner: (!session.sees_all_songs()).then_some(session.user_id),
        artist: non_empty(&query.artist),
        title: non_empty(&query.title),
        status,
        search: non_empty(&query.search),
    };
    let offset = (page - 1) * page_size;
    let (count, songs) = match state.song_store.list_songs(
        &filter,
        PageRequest {
            offset,
            limit: page_size,
        },
    ) {
        Ok(result) => result,
        Err(e) => return internal_error("Failed to list songs", e),
    };
    if page > 1 && offset >= count {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Invalid page." }))).into_response();
    }

    let owners = load_owners(&state, &songs);
    let results = songs
        .into_iter()
        .map(|song| {
            let owner = owners.get(&song.created_by).cloned();
            SongView::new(song, owner)
        })
        .collect();

    Json(SongPage {
        count,
        next: (offset + page_size < count).then(|| page_link(&query, page + 1, page_size)),
        previous: (page > 1).then(|| page_link(&query, page - 1, page_size)),
        results,
    })
    .into_response()
}

async fn get_song(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Response {
    match get_visible_song(&state, &session, &id) {
        Ok(song) => Json(detail_view(&state, song)).into_response(),
        Err(response) => response,
    }
}

async fn delete_song(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = get_visible_song(&state, &session, &id) {
        return response;
    }
    match state.song_store.delete_song(&id) {
        Ok(true) => {
            info!("Song {} deleted by user {}", id, session.user_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => not_found(),
        Err(e) => internal_error("Failed to delete song", e),
    }
}

async fn reanalyze_song(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Response {
    let song = match get_visible_song(&state, &session, &id) {
        Ok(song) => song,
        Err(response) => return response,
    };

    if state.config.verify_songs_on_create {
        if let Err(err) = state
            .lyrics_fetcher
            .check_song_exists(&song.artist, &song.title)
            .await
        {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": format!("Cannot reanalyze song: {}", err),
                    "success": false,
                })),
            )
                .into_response();
        }
    }

    match state.song_store.reset_for_reanalysis(&id) {
        Ok(true) => {}
        Ok(false) => return not_found(),
        Err(e) => return internal_error("Failed to reset song", e),
    }
    let handle = state.dispatcher.enqueue_reanalysis(&id);
    info!("Song {} queued for re-analysis as task {}", id, handle.task_id());

    let song = match state.song_store.get_song(&id) {
        Ok(Some(song)) => song,
        Ok(None) => return not_found(),
        Err(e) => return internal_error("Failed to reload song", e),
    };
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Song queued for re-analysis",
            "data": detail_view(&state, song),
        })),
    )
        .into_response()
}

/// HTTP status and message reported for a song in the given state.
pub fn status_response_parts(status: SongStatus, message: Option<&str>) -> (StatusCode, String) {
    match status {
        SongStatus::Completed => (StatusCode::OK, "Analysis completed successfully".to_string()),
        SongStatus::Processing => (StatusCode::ACCEPTED, "Song is being processed".to_string()),
        SongStatus::Pending => (StatusCode::ACCEPTED, "Song is queued for analysis".to_string()),
        SongStatus::Error => (
            StatusCode::BAD_REQUEST,
            message.unwrap_or_default().to_string(),
        ),
        SongStatus::Unknown => (StatusCode::INTERNAL_SERVER_ERROR, "Unknown status".to_string()),
    }
}

async fn get_song_status(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Response {
    let song = match get_visible_song(&state, &session, &id) {
        Ok(song) => song,
        Err(response) => return response,
    };
    let (code, message) = status_response_parts(song.status, song.message.as_deref());
    (
        code,
        Json(json!({ "status": song.status, "message": message })),
    )
        .into_response()
}

pub fn make_song_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", post(create_song).get(list_songs))
        .route("/{id}", get(get_song).delete(delete_song))
        .route("/{id}/reanalyze", post(reanalyze_song))
        .route("/{id}/status", get(get_song_status))
        .with_state(state)
}
