//! Relational route tree (`/api/v1`), integer ids.
//!
//! Link mutations are GET endpoints, matching the original API surface.

use super::api::{err, ok, respond, respond_empty, respond_list, unauthorized};
use super::session::{PrincipalRef, Session};
use super::state::ServerState;
use crate::domain::MediaKind;
use crate::relational::models::{Album, Artist, Media, User};
use crate::store::Repository;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/artists", post(create_artist).get(list_artists))
        .route(
            "/artists/{id}",
            get(get_artist).put(update_artist).delete(delete_artist),
        )
        .route("/artists/{id}/albums", get(artist_albums))
        .route("/albums", post(create_album).get(list_albums))
        .route(
            "/albums/{id}",
            get(get_album).put(update_album).delete(delete_album),
        )
        .route("/medias", post(create_media).get(list_medias))
        .route(
            "/medias/{id}",
            get(get_media).put(update_media).delete(delete_media),
        )
        .route("/followings/follow/{artist_id}", get(follow))
        .route("/followings/unfollow/{artist_id}", get(unfollow))
        .route("/followings/followings/{user_id}", get(followings))
        .route("/followings/followers/{artist_id}", get(followers))
        .route("/likes/like/{media_id}", get(like))
        .route("/likes/dislike/{media_id}", get(dislike))
        .route("/likes/liked-medias/{user_id}", get(liked_medias))
        .route("/likes/liked-users/{media_id}", get(liked_users))
        .route("/visits/visit/{media_id}", get(visit))
        .route("/visits/visited-medias/{user_id}", get(visited_medias))
        .route("/visits/visited-users/{media_id}", get(visited_users))
}

fn session_user_id(session: &Session) -> Option<i64> {
    match session.principal {
        PrincipalRef::Relational(id) => Some(id),
        PrincipalRef::Document(_) => None,
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    full_name: String,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar_path: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user_id: i64,
}

async fn register(
    State(state): State<ServerState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let user = User {
        id: None,
        username: body.username,
        password_hash: String::new(),
        security_stamp: String::new(),
        concurrency_stamp: String::new(),
        full_name: body.full_name,
        avatar_path: body.avatar_path,
        bio: body.bio,
        is_active: true,
        roles: vec![],
    };
    respond(
        state
            .sql_identity
            .register(user, &body.password, &CancellationToken::new()),
        |user| user,
    )
}

async fn login(State(state): State<ServerState>, Json(body): Json<LoginRequest>) -> Response {
    match state.sql_identity.verify_login(&body.username, &body.password) {
        Ok(Some(user)) => {
            let user_id = user.id.expect("persisted user has an id");
            let token = state.sessions.issue(
                user.username,
                user.roles,
                PrincipalRef::Relational(user_id),
            );
            ok(LoginResponse { token, user_id })
        }
        Ok(None) => unauthorized(),
        Err(error) => err(error),
    }
}

async fn logout(State(state): State<ServerState>, session: Session) -> Response {
    state.sessions.revoke(&session.token);
    super::api::ok_empty()
}

async fn list_users(State(state): State<ServerState>, session: Session) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_list(state.sql_users.get_all(&CancellationToken::new()))
}

async fn get_user(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    if !session.can_act_for_sql_user(id) {
        return unauthorized();
    }
    match state.sql_users.get_by_id_untracked(&id) {
        Ok(Some(user)) => ok(user),
        Ok(None) => err(crate::store::StoreError::NotFound("user")),
        Err(error) => err(error),
    }
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    full_name: String,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar_path: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

async fn update_user(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Response {
    if !session.can_act_for_sql_user(id) {
        return unauthorized();
    }
    let mut user = match state.sql_users.get_by_id_tracked(&id) {
        Ok(Some(user)) => user,
        Ok(None) => return err(crate::store::StoreError::NotFound("user")),
        Err(error) => return err(error),
    };
    user.full_name = body.full_name;
    user.bio = body.bio;
    user.avatar_path = body.avatar_path;
    if let Some(is_active) = body.is_active {
        if !session.is_admin() {
            return unauthorized();
        }
        user.is_active = is_active;
    }
    respond_empty(state.sql_users.update(&user, &CancellationToken::new()))
}

async fn delete_user(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    if !session.can_act_for_sql_user(id) {
        return unauthorized();
    }
    respond_empty(state.sql_identity.delete_user(id, &CancellationToken::new()))
}

// =============================================================================
// Artists
// =============================================================================

#[derive(Deserialize)]
struct ArtistRequest {
    artistic_name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    birth_date: Option<NaiveDate>,
    #[serde(default)]
    avatar_path: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

async fn create_artist(
    State(state): State<ServerState>,
    session: Session,
    Json(body): Json<ArtistRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let mut artist = Artist {
        id: None,
        artistic_name: body.artistic_name,
        full_name: body.full_name,
        birth_date: body.birth_date,
        avatar_path: body.avatar_path,
        bio: body.bio,
    };
    match state.sql_artists.add(&mut artist, &CancellationToken::new()) {
        Ok(()) => ok(artist),
        Err(error) => err(error),
    }
}

async fn list_artists(State(state): State<ServerState>) -> Response {
    respond_list(state.sql_artists.get_all(&CancellationToken::new()))
}

async fn get_artist(State(state): State<ServerState>, Path(id): Path<i64>) -> Response {
    match state.sql_artists.get_by_id_untracked(&id) {
        Ok(Some(artist)) => ok(artist),
        Ok(None) => err(crate::store::StoreError::NotFound("artist")),
        Err(error) => err(error),
    }
}

async fn update_artist(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
    Json(body): Json<ArtistRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let artist = Artist {
        id: Some(id),
        artistic_name: body.artistic_name,
        full_name: body.full_name,
        birth_date: body.birth_date,
        avatar_path: body.avatar_path,
        bio: body.bio,
    };
    respond_empty(state.sql_artists.update(&artist, &CancellationToken::new()))
}

async fn delete_artist(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_empty(state.sql_artists.delete_by_id(&id, &CancellationToken::new()))
}

async fn artist_albums(State(state): State<ServerState>, Path(id): Path<i64>) -> Response {
    match state.sql_artists.get_by_id_untracked(&id) {
        Ok(Some(_)) => respond_list(state.sql_albums.get_by_artist(id)),
        Ok(None) => err(crate::store::StoreError::NotFound("artist")),
        Err(error) => err(error),
    }
}

// =============================================================================
// Albums
// =============================================================================

#[derive(Deserialize)]
struct AlbumRequest {
    title: String,
    genre: String,
    release_date: NaiveDate,
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    is_single: bool,
    #[serde(default)]
    copyright: Option<String>,
    #[serde(default)]
    artwork_path: Option<String>,
    artist_ids: Vec<i64>,
}

impl AlbumRequest {
    fn into_album(self, id: Option<i64>) -> Album {
        Album {
            id,
            title: self.title,
            genre: self.genre,
            release_date: self.release_date,
            is_complete: self.is_complete,
            is_single: self.is_single,
            copyright: self.copyright,
            artwork_path: self.artwork_path,
            artist_ids: self.artist_ids,
        }
    }
}

async fn create_album(
    State(state): State<ServerState>,
    session: Session,
    Json(body): Json<AlbumRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let mut album = body.into_album(None);
    match state.sql_albums.add(&mut album, &CancellationToken::new()) {
        Ok(()) => ok(album),
        Err(error) => err(error),
    }
}

async fn list_albums(State(state): State<ServerState>) -> Response {
    respond_list(state.sql_albums.get_all(&CancellationToken::new()))
}

async fn get_album(State(state): State<ServerState>, Path(id): Path<i64>) -> Response {
    match state.sql_albums.get_by_id_tracked(&id) {
        Ok(Some(album)) => ok(album),
        Ok(None) => err(crate::store::StoreError::NotFound("album")),
        Err(error) => err(error),
    }
}

async fn update_album(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
    Json(body): Json<AlbumRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let album = body.into_album(Some(id));
    respond_empty(state.sql_albums.update(&album, &CancellationToken::new()))
}

async fn delete_album(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_empty(state.sql_albums.delete_by_id(&id, &CancellationToken::new()))
}

// =============================================================================
// Medias
// =============================================================================

#[derive(Deserialize)]
struct MediaRequest {
    title: String,
    kind: MediaKind,
    file_path: String,
    #[serde(default)]
    release_date: Option<NaiveDate>,
    #[serde(default)]
    artwork_path: Option<String>,
    #[serde(default)]
    isrc: Option<String>,
    track_number: i32,
    #[serde(default)]
    lyric: Option<String>,
    album_id: i64,
}

impl MediaRequest {
    fn into_media(self, id: Option<i64>) -> Media {
        Media {
            id,
            title: self.title,
            kind: self.kind,
            file_path: self.file_path,
            release_date: self.release_date,
            artwork_path: self.artwork_path,
            isrc: self.isrc,
            track_number: self.track_number,
            lyric: self.lyric,
            album_id: self.album_id,
        }
    }
}

async fn create_media(
    State(state): State<ServerState>,
    session: Session,
    Json(body): Json<MediaRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let mut media = body.into_media(None);
    match state.sql_medias.add(&mut media, &CancellationToken::new()) {
        Ok(()) => ok(media),
        Err(error) => err(error),
    }
}

async fn list_medias(State(state): State<ServerState>) -> Response {
    respond_list(state.sql_medias.get_all(&CancellationToken::new()))
}

async fn get_media(State(state): State<ServerState>, Path(id): Path<i64>) -> Response {
    match state.sql_medias.get_by_id_untracked(&id) {
        Ok(Some(media)) => ok(media),
        Ok(None) => err(crate::store::StoreError::NotFound("media")),
        Err(error) => err(error),
    }
}

async fn update_media(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
    Json(body): Json<MediaRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let media = body.into_media(Some(id));
    respond_empty(state.sql_medias.update(&media, &CancellationToken::new()))
}

async fn delete_media(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<i64>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_empty(state.sql_medias.delete_by_id(&id, &CancellationToken::new()))
}

// =============================================================================
// Followings / Likes / Visits
// =============================================================================

async fn follow(
    State(state): State<ServerState>,
    session: Session,
    Path(artist_id): Path<i64>,
) -> Response {
    let user_id = match session_user_id(&session) {
        Some(id) => id,
        None => return unauthorized(),
    };
    respond_empty(state.sql_links.follow(user_id, artist_id, &CancellationToken::new()))
}

async fn unfollow(
    State(state): State<ServerState>,
    session: Session,
    Path(artist_id): Path<i64>,
) -> Response {
    let user_id = match session_user_id(&session) {
        Some(id) => id,
        None => return unauthorized(),
    };
    respond_empty(state.sql_links.unfollow(user_id, artist_id, &CancellationToken::new()))
}

async fn followings(
    State(state): State<ServerState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> Response {
    if !session.can_act_for_sql_user(user_id) {
        return unauthorized();
    }
    respond_list(state.sql_links.followings(user_id, &CancellationToken::new()))
}

async fn followers(
    State(state): State<ServerState>,
    session: Session,
    Path(artist_id): Path<i64>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_list(state.sql_links.followers(artist_id, &CancellationToken::new()))
}

async fn like(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<i64>,
) -> Response {
    let user_id = match session_user_id(&session) {
        Some(id) => id,
        None => return unauthorized(),
    };
    respond_empty(state.sql_links.like(user_id, media_id, &CancellationToken::new()))
}

async fn dislike(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<i64>,
) -> Response {
    let user_id = match session_user_id(&session) {
        Some(id) => id,
        None => return unauthorized(),
    };
    respond_empty(state.sql_links.dislike(user_id, media_id, &CancellationToken::new()))
}

async fn liked_medias(
    State(state): State<ServerState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> Response {
    if !session.can_act_for_sql_user(user_id) {
        return unauthorized();
    }
    respond_list(state.sql_links.liked_medias(user_id, &CancellationToken::new()))
}

async fn liked_users(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<i64>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_list(state.sql_links.liked_users(media_id, &CancellationToken::new()))
}

async fn visit(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<i64>,
) -> Response {
    let user_id = match session_user_id(&session) {
        Some(id) => id,
        None => return unauthorized(),
    };
    respond_empty(state.sql_links.visit(user_id, media_id, &CancellationToken::new()))
}

async fn visited_medias(
    State(state): State<ServerState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> Response {
    if !session.can_act_for_sql_user(user_id) {
        return unauthorized();
    }
    respond_list(state.sql_links.visited_medias(user_id, &CancellationToken::new()))
}

async fn visited_users(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<i64>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    respond_list(state.sql_links.visited_users(media_id, &CancellationToken::new()))
}
