//! Business rules written once, as pure functions over counts and flags.
//!
//! Both storage backends route every relationship and deletion decision
//! through here so the rules cannot drift apart between them.

use std::fmt;

/// A violated business rule. Maps to a BadRequest-class response, except
/// [`RuleViolation::LastAdmin`] which is a logic error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    SingleAlbumFull,
    AlbumComplete,
    ArtistHasAlbums,
    AlbumHasMedias,
    AlbumWithoutArtists,
    DuplicateLink { what: &'static str },
    MissingLink { what: &'static str },
    LastAdmin,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::SingleAlbumFull => {
                write!(f, "Album is a single and already has a media")
            }
            RuleViolation::AlbumComplete => {
                write!(f, "Album is complete, no media can be added")
            }
            RuleViolation::ArtistHasAlbums => {
                write!(f, "Artist still owns albums and cannot be deleted")
            }
            RuleViolation::AlbumHasMedias => {
                write!(f, "Album still owns medias and cannot be deleted")
            }
            RuleViolation::AlbumWithoutArtists => {
                write!(f, "Album needs at least one artist")
            }
            RuleViolation::DuplicateLink { what } => write!(f, "{} already exists", what),
            RuleViolation::MissingLink { what } => write!(f, "{} does not exist", what),
            RuleViolation::LastAdmin => write!(f, "The last admin user cannot be removed"),
        }
    }
}

impl std::error::Error for RuleViolation {}

pub type RuleResult = Result<(), RuleViolation>;

/// A media may join an album only when the album is neither a full single
/// nor flagged complete.
pub fn ensure_album_accepts_media(
    is_single: bool,
    is_complete: bool,
    media_count: usize,
) -> RuleResult {
    if is_single && media_count > 0 {
        return Err(RuleViolation::SingleAlbumFull);
    }
    if is_complete {
        return Err(RuleViolation::AlbumComplete);
    }
    Ok(())
}

/// An artist can only be deleted once it owns no albums.
pub fn ensure_artist_deletable(album_count: usize) -> RuleResult {
    if album_count > 0 {
        return Err(RuleViolation::ArtistHasAlbums);
    }
    Ok(())
}

/// An album can only be deleted once it owns no medias.
pub fn ensure_album_deletable(media_count: usize) -> RuleResult {
    if media_count > 0 {
        return Err(RuleViolation::AlbumHasMedias);
    }
    Ok(())
}

/// Albums are meaningless without at least one owning artist.
pub fn ensure_album_has_artists(artist_count: usize) -> RuleResult {
    if artist_count == 0 {
        return Err(RuleViolation::AlbumWithoutArtists);
    }
    Ok(())
}

/// Creating a link requires that it does not exist yet.
pub fn ensure_new_link(already_linked: bool, what: &'static str) -> RuleResult {
    if already_linked {
        return Err(RuleViolation::DuplicateLink { what });
    }
    Ok(())
}

/// Removing a link requires that it exists.
pub fn ensure_link_exists(linked: bool, what: &'static str) -> RuleResult {
    if !linked {
        return Err(RuleViolation::MissingLink { what });
    }
    Ok(())
}

/// At least one admin must remain after removing one.
pub fn ensure_not_last_admin(admin_count: usize, target_is_admin: bool) -> RuleResult {
    if target_is_admin && admin_count <= 1 {
        return Err(RuleViolation::LastAdmin);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_album_rejects_second_media() {
        assert!(ensure_album_accepts_media(true, false, 0).is_ok());
        assert_eq!(
            ensure_album_accepts_media(true, false, 1),
            Err(RuleViolation::SingleAlbumFull)
        );
    }

    #[test]
    fn complete_album_rejects_any_media() {
        assert_eq!(
            ensure_album_accepts_media(false, true, 0),
            Err(RuleViolation::AlbumComplete)
        );
    }

    #[test]
    fn regular_album_accepts_media() {
        assert!(ensure_album_accepts_media(false, false, 7).is_ok());
    }

    #[test]
    fn artist_with_albums_is_not_deletable() {
        assert_eq!(ensure_artist_deletable(2), Err(RuleViolation::ArtistHasAlbums));
        assert!(ensure_artist_deletable(0).is_ok());
    }

    #[test]
    fn album_with_medias_is_not_deletable() {
        assert_eq!(ensure_album_deletable(1), Err(RuleViolation::AlbumHasMedias));
        assert!(ensure_album_deletable(0).is_ok());
    }

    #[test]
    fn duplicate_and_missing_links() {
        assert!(ensure_new_link(false, "follow").is_ok());
        assert_eq!(
            ensure_new_link(true, "follow"),
            Err(RuleViolation::DuplicateLink { what: "follow" })
        );
        assert!(ensure_link_exists(true, "follow").is_ok());
        assert_eq!(
            ensure_link_exists(false, "follow"),
            Err(RuleViolation::MissingLink { what: "follow" })
        );
    }

    #[test]
    fn last_admin_is_protected() {
        assert_eq!(ensure_not_last_admin(1, true), Err(RuleViolation::LastAdmin));
        assert!(ensure_not_last_admin(2, true).is_ok());
        assert!(ensure_not_last_admin(1, false).is_ok());
    }
}
