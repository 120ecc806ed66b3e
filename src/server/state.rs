use super::session::SessionStore;
use crate::document::DocumentDb;
use crate::links::{DocumentLinkService, RelationalLinkService};
use crate::relational::{
    SqlAlbumRepository, SqlArtistRepository, SqlBackend, SqlIdentity, SqlMediaRepository,
    SqlUserRepository,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ServerState {
    pub sql_identity: SqlIdentity,
    pub sql_users: SqlUserRepository,
    pub sql_artists: SqlArtistRepository,
    pub sql_albums: SqlAlbumRepository,
    pub sql_medias: SqlMediaRepository,
    pub sql_links: RelationalLinkService,
    pub doc_db: Arc<DocumentDb>,
    pub doc_links: DocumentLinkService,
    pub sessions: Arc<SessionStore>,
}

impl ServerState {
    pub fn new(sql_backend: SqlBackend, doc_db: Arc<DocumentDb>) -> ServerState {
        ServerState {
            sql_identity: SqlIdentity::new(sql_backend.clone()),
            sql_users: SqlUserRepository::new(sql_backend.clone()),
            sql_artists: SqlArtistRepository::new(sql_backend.clone()),
            sql_albums: SqlAlbumRepository::new(sql_backend.clone()),
            sql_medias: SqlMediaRepository::new(sql_backend.clone()),
            sql_links: RelationalLinkService::new(sql_backend),
            doc_links: DocumentLinkService::new(doc_db.clone()),
            doc_db,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
