//! Document route tree (`/api/v2`), string ids.
//!
//! The document backend receives no cancellation signal from these
//! handlers, matching the original callers.

use super::api::{bad_request, err, ok, ok_empty, respond_list, unauthorized};
use super::session::{PrincipalRef, Session};
use super::state::ServerState;
use crate::document::models::{Album, Artist, Media, User};
use crate::document::DocId;
use crate::domain::MediaKind;
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

fn parse_id(raw: &str) -> Result<DocId, Response> {
    raw.parse()
        .map_err(|_| bad_request(format!("Invalid id '{}'", raw)))
}

fn session_user_id(session: &Session) -> Option<DocId> {
    match session.principal {
        PrincipalRef::Document(id) => Some(id),
        PrincipalRef::Relational(_) => None,
    }
}

/// User projection without credential material.
#[derive(Serialize)]
struct UserResultDto {
    id: String,
    username: String,
    full_name: String,
    avatar_path: Option<String>,
    bio: Option<String>,
    is_active: bool,
    roles: Vec<String>,
    following_artists: Vec<DocId>,
    liked_medias: Vec<DocId>,
    visited_medias: Vec<DocId>,
}

impl UserResultDto {
    fn from_entity(user: User) -> UserResultDto {
        UserResultDto {
            id: user.id.map(|id| id.to_string()).unwrap_or_default(),
            username: user.username,
            full_name: user.full_name,
            avatar_path: user.avatar_path,
            bio: user.bio,
            is_active: user.is_active,
            roles: user.roles,
            following_artists: user.following_artists,
            liked_medias: user.liked_medias,
            visited_medias: user.visited_medias,
        }
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
    user_id: String,
}

async fn register(
    State(state): State<ServerState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let user = User {
        id: None,
        username: body.username,
        password_hash: String::new(),
        concurrency_stamp: String::new(),
        security_stamp: String::new(),
        full_name: body.full_name,
        avatar_path: body.avatar_path,
        bio: body.bio,
        is_active: true,
        roles: vec![],
        following_artists: vec![],
        liked_medias: vec![],
        visited_medias: vec![],
    };
    match state.doc_db.register(user, &body.password) {
        Ok(user) => ok(UserResultDto::from_entity(user)),
        Err(error) => err(error),
    }
}

async fn login(State(state): State<ServerState>, Json(body): Json<LoginRequest>) -> Response {
    match state.doc_db.verify_login(&body.username, &body.password) {
        Some(user) => {
            let user_id = user.id.expect("persisted user has an id");
            let roles = user
                .roles
                .iter()
                .filter_map(|r| crate::domain::UserRole::from_db_str(r))
                .collect();
            let token =
                state
                    .sessions
                    .issue(user.username, roles, PrincipalRef::Document(user_id));
            ok(LoginResponse {
                token,
                user_id: user_id.to_string(),
            })
        }
        None => unauthorized(),
    }
}

async fn logout(State(state): State<ServerState>, session: Session) -> Response {
    state.sessions.revoke(&session.token);
    ok_empty()
}

async fn list_users(State(state): State<ServerState>, session: Session) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    match Repository::<User>::get_all(&*state.doc_db, &CancellationToken::new()) {
        Ok(users) => respond_list(Ok(users
            .into_iter()
            .map(UserResultDto::from_entity)
            .collect::<Vec<_>>())),
        Err(error) => err(error),
    }
}

async fn get_user(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !session.can_act_for_doc_user(&id) {
        return unauthorized();
    }
    match state.doc_db.users.find_by_id(&id) {
        Some(user) => ok(UserResultDto::from_entity(user)),
        None => err(crate::store::StoreError::NotFound("user")),
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
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !session.can_act_for_doc_user(&id) {
        return unauthorized();
    }
    let mut user = match state.doc_db.users.find_by_id(&id) {
        Some(user) => user,
        None => return err(crate::store::StoreError::NotFound("user")),
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
    match state.doc_db.update(&user, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
}

async fn delete_user(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !session.can_act_for_doc_user(&id) {
        return unauthorized();
    }
    match state.doc_db.delete_user(&id) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
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
        full_name: body.full_name,
        artistic_name: body.artistic_name,
        birth_date: body.birth_date,
        avatar_path: body.avatar_path,
        bio: body.bio,
        followers: vec![],
        albums: vec![],
    };
    match state.doc_db.add(&mut artist, &CancellationToken::new()) {
        Ok(()) => ok(artist),
        Err(error) => err(error),
    }
}

async fn list_artists(State(state): State<ServerState>) -> Response {
    respond_list(Repository::<Artist>::get_all(
        &*state.doc_db,
        &CancellationToken::new(),
    ))
}

async fn get_artist(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.doc_db.artists.find_by_id(&id) {
        Some(artist) => ok(artist),
        None => err(crate::store::StoreError::NotFound("artist")),
    }
}

async fn update_artist(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<ArtistRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    // Whole-document replace needs the stored relationship lists.
    let mut artist = match state.doc_db.artists.find_by_id(&id) {
        Some(artist) => artist,
        None => return err(crate::store::StoreError::NotFound("artist")),
    };
    artist.artistic_name = body.artistic_name;
    artist.full_name = body.full_name;
    artist.birth_date = body.birth_date;
    artist.avatar_path = body.avatar_path;
    artist.bio = body.bio;
    match state.doc_db.update(&artist, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
}

async fn delete_artist(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match Repository::<Artist>::delete_by_id(&*state.doc_db, &id, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
}

/// One fetch per stored album id, the document backend's O(n) fan-out.
async fn artist_albums(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let artist = match state.doc_db.artists.find_by_id(&id) {
        Some(artist) => artist,
        None => return err(crate::store::StoreError::NotFound("artist")),
    };
    let albums: Vec<Album> = artist
        .albums
        .iter()
        .filter_map(|album_id| state.doc_db.albums.find_by_id(album_id))
        .collect();
    respond_list(Ok(albums))
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
    artist_ids: Vec<String>,
}

fn parse_ids(raw: &[String]) -> Result<Vec<DocId>, Response> {
    raw.iter().map(|s| parse_id(s)).collect()
}

async fn create_album(
    State(state): State<ServerState>,
    session: Session,
    Json(body): Json<AlbumRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let artist_ids = match parse_ids(&body.artist_ids) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let mut album = Album {
        id: None,
        title: body.title,
        release_date: body.release_date,
        genre: body.genre,
        is_complete: body.is_complete,
        is_single: body.is_single,
        copyright: body.copyright,
        artwork_path: body.artwork_path,
        artists: artist_ids,
        medias: vec![],
    };
    match state.doc_db.add(&mut album, &CancellationToken::new()) {
        Ok(()) => ok(album),
        Err(error) => err(error),
    }
}

async fn list_albums(State(state): State<ServerState>) -> Response {
    respond_list(Repository::<Album>::get_all(
        &*state.doc_db,
        &CancellationToken::new(),
    ))
}

async fn get_album(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.doc_db.albums.find_by_id(&id) {
        Some(album) => ok(album),
        None => err(crate::store::StoreError::NotFound("album")),
    }
}

async fn update_album(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<AlbumRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let artist_ids = match parse_ids(&body.artist_ids) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let mut album = match state.doc_db.albums.find_by_id(&id) {
        Some(album) => album,
        None => return err(crate::store::StoreError::NotFound("album")),
    };
    album.title = body.title;
    album.genre = body.genre;
    album.release_date = body.release_date;
    album.is_complete = body.is_complete;
    album.is_single = body.is_single;
    album.copyright = body.copyright;
    album.artwork_path = body.artwork_path;
    album.artists = artist_ids;
    match state.doc_db.update(&album, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
}

async fn delete_album(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match Repository::<Album>::delete_by_id(&*state.doc_db, &id, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
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
    album_id: String,
}

async fn create_media(
    State(state): State<ServerState>,
    session: Session,
    Json(body): Json<MediaRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let album_id = match parse_id(&body.album_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut media = Media {
        id: None,
        title: body.title,
        kind: body.kind,
        file_path: body.file_path,
        release_date: body.release_date,
        artwork_path: body.artwork_path,
        isrc: body.isrc,
        track_number: body.track_number,
        lyric: body.lyric,
        album_id,
        liked_users: vec![],
        visited_users: vec![],
    };
    match state.doc_db.add(&mut media, &CancellationToken::new()) {
        Ok(()) => ok(media),
        Err(error) => err(error),
    }
}

async fn list_medias(State(state): State<ServerState>) -> Response {
    respond_list(Repository::<Media>::get_all(
        &*state.doc_db,
        &CancellationToken::new(),
    ))
}

async fn get_media(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.doc_db.medias.find_by_id(&id) {
        Some(media) => ok(media),
        None => err(crate::store::StoreError::NotFound("media")),
    }
}

async fn update_media(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<MediaRequest>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let album_id = match parse_id(&body.album_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut media = match state.doc_db.medias.find_by_id(&id) {
        Some(media) => media,
        None => return err(crate::store::StoreError::NotFound("media")),
    };
    media.title = body.title;
    media.kind = body.kind;
    media.file_path = body.file_path;
    media.release_date = body.release_date;
    media.artwork_path = body.artwork_path;
    media.isrc = body.isrc;
    media.track_number = body.track_number;
    media.lyric = body.lyric;
    media.album_id = album_id;
    match state.doc_db.update(&media, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
}

async fn delete_media(
    State(state): State<ServerState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match Repository::<Media>::delete_by_id(&*state.doc_db, &id, &CancellationToken::new()) {
        Ok(()) => ok_empty(),
        Err(error) => err(error),
    }
}

// =============================================================================
// Followings / Likes / Visits
// =============================================================================

fn with_session_and_target(
    session: &Session,
    raw_target: &str,
) -> Result<(DocId, DocId), Response> {
    let user_id = session_user_id(session).ok_or_else(unauthorized)?;
    let target_id = parse_id(raw_target)?;
    Ok((user_id, target_id))
}

async fn follow(
    State(state): State<ServerState>,
    session: Session,
    Path(artist_id): Path<String>,
) -> Response {
    match with_session_and_target(&session, &artist_id) {
        Ok((user_id, artist_id)) => match state.doc_links.follow(&user_id, &artist_id) {
            Ok(()) => ok_empty(),
            Err(error) => err(error),
        },
        Err(response) => response,
    }
}

async fn unfollow(
    State(state): State<ServerState>,
    session: Session,
    Path(artist_id): Path<String>,
) -> Response {
    match with_session_and_target(&session, &artist_id) {
        Ok((user_id, artist_id)) => match state.doc_links.unfollow(&user_id, &artist_id) {
            Ok(()) => ok_empty(),
            Err(error) => err(error),
        },
        Err(response) => response,
    }
}

async fn followings(
    State(state): State<ServerState>,
    session: Session,
    Path(user_id): Path<String>,
) -> Response {
    let user_id = match parse_id(&user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !session.can_act_for_doc_user(&user_id) {
        return unauthorized();
    }
    respond_list(state.doc_links.followings(&user_id))
}

async fn followers(
    State(state): State<ServerState>,
    session: Session,
    Path(artist_id): Path<String>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let artist_id = match parse_id(&artist_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.doc_links.followers(&artist_id) {
        Ok(users) => respond_list(Ok(users
            .into_iter()
            .map(UserResultDto::from_entity)
            .collect::<Vec<_>>())),
        Err(error) => err(error),
    }
}

async fn like(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<String>,
) -> Response {
    match with_session_and_target(&session, &media_id) {
        Ok((user_id, media_id)) => match state.doc_links.like(&user_id, &media_id) {
            Ok(()) => ok_empty(),
            Err(error) => err(error),
        },
        Err(response) => response,
    }
}

async fn dislike(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<String>,
) -> Response {
    match with_session_and_target(&session, &media_id) {
        Ok((user_id, media_id)) => match state.doc_links.dislike(&user_id, &media_id) {
            Ok(()) => ok_empty(),
            Err(error) => err(error),
        },
        Err(response) => response,
    }
}

async fn liked_medias(
    State(state): State<ServerState>,
    session: Session,
    Path(user_id): Path<String>,
) -> Response {
    let user_id = match parse_id(&user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !session.can_act_for_doc_user(&user_id) {
        return unauthorized();
    }
    respond_list(state.doc_links.liked_medias(&user_id))
}

async fn liked_users(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<String>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let media_id = match parse_id(&media_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.doc_links.liked_users(&media_id) {
        Ok(users) => respond_list(Ok(users
            .into_iter()
            .map(UserResultDto::from_entity)
            .collect::<Vec<_>>())),
        Err(error) => err(error),
    }
}

async fn visit(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<String>,
) -> Response {
    match with_session_and_target(&session, &media_id) {
        Ok((user_id, media_id)) => match state.doc_links.visit(&user_id, &media_id) {
            Ok(()) => ok_empty(),
            Err(error) => err(error),
        },
        Err(response) => response,
    }
}

async fn visited_medias(
    State(state): State<ServerState>,
    session: Session,
    Path(user_id): Path<String>,
) -> Response {
    let user_id = match parse_id(&user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !session.can_act_for_doc_user(&user_id) {
        return unauthorized();
    }
    respond_list(state.doc_links.visited_medias(&user_id))
}

async fn visited_users(
    State(state): State<ServerState>,
    session: Session,
    Path(media_id): Path<String>,
) -> Response {
    if !session.is_admin() {
        return unauthorized();
    }
    let media_id = match parse_id(&media_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.doc_links.visited_users(&media_id) {
        Ok(users) => respond_list(Ok(users
            .into_iter()
            .map(UserResultDto::from_entity)
            .collect::<Vec<_>>())),
        Err(error) => err(error),
    }
}
