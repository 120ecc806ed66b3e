//! Relationship maintenance on the document backend: two-way id lists,
//! idempotent revisit, scan-and-strip deletion, and the last-write-wins
//! window the paired replaces leave open.

mod common;

use common::{cancel, doc_db, seed_doc_album, seed_doc_artist, seed_doc_media, seed_doc_user};
use fonoteca_server::document::models as doc;
use fonoteca_server::domain::rules::RuleViolation;
use fonoteca_server::links::DocumentLinkService;
use fonoteca_server::store::{Repository, StoreError};

#[test]
fn follow_writes_both_id_lists() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");

    links.follow(&user_id, &artist_id).unwrap();

    let user = db.users.find_by_id(&user_id).unwrap();
    let artist = db.artists.find_by_id(&artist_id).unwrap();
    assert!(user.following_artists.contains(&artist_id));
    assert!(artist.followers.contains(&user_id));
}

#[test]
fn duplicate_follow_is_rejected_and_lists_unchanged() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");

    links.follow(&user_id, &artist_id).unwrap();
    let err = links.follow(&user_id, &artist_id).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rule(RuleViolation::DuplicateLink { .. })
    ));

    assert_eq!(db.users.find_by_id(&user_id).unwrap().following_artists.len(), 1);
    assert_eq!(db.artists.find_by_id(&artist_id).unwrap().followers.len(), 1);
}

#[test]
fn unfollow_restores_pre_follow_state() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");

    links.follow(&user_id, &artist_id).unwrap();
    links.unfollow(&user_id, &artist_id).unwrap();

    assert!(db.users.find_by_id(&user_id).unwrap().following_artists.is_empty());
    assert!(db.artists.find_by_id(&artist_id).unwrap().followers.is_empty());

    let err = links.unfollow(&user_id, &artist_id).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rule(RuleViolation::MissingLink { .. })
    ));
}

#[test]
fn revisit_is_idempotent_with_no_timestamp() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Memories", artist_id, false);
    let media_id = seed_doc_media(&db, "Talagh", album_id);

    links.visit(&user_id, &media_id).unwrap();
    let before = db.users.find_by_id(&user_id).unwrap().visited_medias;

    // A repeat visit must not fail and must leave the lists untouched.
    links.visit(&user_id, &media_id).unwrap();
    let after = db.users.find_by_id(&user_id).unwrap().visited_medias;
    assert_eq!(before, after);
    assert_eq!(db.medias.find_by_id(&media_id).unwrap().visited_users.len(), 1);
}

#[test]
fn single_album_rejects_second_media() {
    let (_dir, db) = doc_db();
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Single", artist_id, true);
    seed_doc_media(&db, "only-one", album_id);

    let mut second = doc::Media {
        id: None,
        title: "one-too-many".to_string(),
        kind: fonoteca_server::domain::MediaKind::Music,
        file_path: "medias/one-too-many.mp3".to_string(),
        release_date: None,
        artwork_path: None,
        isrc: None,
        track_number: 2,
        lyric: None,
        album_id,
        liked_users: vec![],
        visited_users: vec![],
    };
    let err = db.add(&mut second, &cancel()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rule(RuleViolation::SingleAlbumFull)
    ));
    assert_eq!(db.albums.find_by_id(&album_id).unwrap().medias.len(), 1);
}

#[test]
fn complete_album_rejects_new_media() {
    let (_dir, db) = doc_db();
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Finished", artist_id, false);

    let mut album = db.albums.find_by_id(&album_id).unwrap();
    album.is_complete = true;
    db.update(&album, &cancel()).unwrap();

    let mut late = doc::Media {
        id: None,
        title: "late".to_string(),
        kind: fonoteca_server::domain::MediaKind::Music,
        file_path: "medias/late.mp3".to_string(),
        release_date: None,
        artwork_path: None,
        isrc: None,
        track_number: 1,
        lyric: None,
        album_id,
        liked_users: vec![],
        visited_users: vec![],
    };
    let err = db.add(&mut late, &cancel()).unwrap_err();
    assert!(matches!(err, StoreError::Rule(RuleViolation::AlbumComplete)));
    assert!(db.albums.find_by_id(&album_id).unwrap().medias.is_empty());
}

#[test]
fn deletion_preconditions_hold() {
    let (_dir, db) = doc_db();
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Memories", artist_id, false);
    seed_doc_media(&db, "Talagh", album_id);

    let err =
        Repository::<doc::Artist>::delete_by_id(&*db, &artist_id, &cancel()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rule(RuleViolation::ArtistHasAlbums)
    ));

    let err = Repository::<doc::Album>::delete_by_id(&*db, &album_id, &cancel()).unwrap_err();
    assert!(matches!(err, StoreError::Rule(RuleViolation::AlbumHasMedias)));
}

#[test]
fn deleting_media_strips_reverse_references_by_scan() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Memories", artist_id, false);
    let media_id = seed_doc_media(&db, "Talagh", album_id);

    let fans: Vec<_> = (0..3)
        .map(|i| seed_doc_user(&db, &format!("fan{}", i)))
        .collect();
    for fan in &fans {
        links.like(fan, &media_id).unwrap();
        links.visit(fan, &media_id).unwrap();
    }

    Repository::<doc::Media>::delete_by_id(&*db, &media_id, &cancel()).unwrap();

    for fan in &fans {
        let user = db.users.find_by_id(fan).unwrap();
        assert!(!user.liked_medias.contains(&media_id));
        assert!(!user.visited_medias.contains(&media_id));
    }
    assert!(!db
        .albums
        .find_by_id(&album_id)
        .unwrap()
        .medias
        .contains(&media_id));
    assert!(db.medias.find_by_id(&media_id).is_none());
}

#[test]
fn deleting_user_strips_reverse_references() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Memories", artist_id, false);
    let media_id = seed_doc_media(&db, "Talagh", album_id);

    links.follow(&user_id, &artist_id).unwrap();
    links.like(&user_id, &media_id).unwrap();
    links.visit(&user_id, &media_id).unwrap();

    db.delete_user(&user_id).unwrap();

    assert!(db.artists.find_by_id(&artist_id).unwrap().followers.is_empty());
    let media = db.medias.find_by_id(&media_id).unwrap();
    assert!(media.liked_users.is_empty());
    assert!(media.visited_users.is_empty());
}

/// Two callers read the same user, both append, both replace: the second
/// replace clobbers the first. The stores make no attempt to detect this;
/// the contract is last-write-wins.
#[test]
fn stale_replace_clobbers_earlier_write() {
    let (_dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");
    let album_id = seed_doc_album(&db, "Memories", artist_id, false);
    let media_a = seed_doc_media(&db, "TrackA", album_id);
    let media_b = seed_doc_media(&db, "TrackB", album_id);

    // Both requests read the same pre-mutation snapshot.
    let mut copy_one = db.users.find_by_id(&user_id).unwrap();
    let mut copy_two = db.users.find_by_id(&user_id).unwrap();

    copy_one.liked_medias.push(media_a);
    db.users.replace_one(&copy_one).unwrap();
    copy_two.liked_medias.push(media_b);
    db.users.replace_one(&copy_two).unwrap();

    // The first append is silently lost.
    let stored = db.users.find_by_id(&user_id).unwrap();
    assert_eq!(stored.liked_medias, vec![media_b]);

    // The relationship is now asymmetric if the media side was written:
    // retrying the lost like self-heals both sides.
    links.like(&user_id, &media_a).unwrap();
    let healed = db.users.find_by_id(&user_id).unwrap();
    assert!(healed.liked_medias.contains(&media_a));
    assert!(db
        .medias
        .find_by_id(&media_a)
        .unwrap()
        .liked_users
        .contains(&user_id));
}

#[test]
fn collections_persist_across_reopen() {
    let (dir, db) = doc_db();
    let links = DocumentLinkService::new(db.clone());
    let user_id = seed_doc_user(&db, "masoud");
    let artist_id = seed_doc_artist(&db, "Googoosh");
    links.follow(&user_id, &artist_id).unwrap();
    drop(links);
    drop(db);

    let reopened = fonoteca_server::document::DocumentDb::open(dir.path()).unwrap();
    let user = reopened.users.find_by_id(&user_id).unwrap();
    assert!(user.following_artists.contains(&artist_id));
    // Credentials survive too.
    assert!(reopened.verify_login("masoud", "password").is_some());
}
