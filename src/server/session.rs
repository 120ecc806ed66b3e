//! Bearer-token sessions. Tokens are random strings stored server-side
//! and presented in the `Authorization` header, with or without the
//! `Bearer ` prefix.

use super::state::ServerState;
use crate::document::DocId;
use crate::domain::UserRole;
use crate::store::random_string;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

/// Which backend authenticated the session, and under which identifier.
#[derive(Clone, Debug, PartialEq)]
pub enum PrincipalRef {
    Relational(i64),
    Document(DocId),
}

#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub roles: Vec<UserRole>,
    pub principal: PrincipalRef,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&UserRole::Admin)
    }

    /// True when the session belongs to the given relational user or to
    /// any admin.
    pub fn can_act_for_sql_user(&self, user_id: i64) -> bool {
        self.is_admin() || self.principal == PrincipalRef::Relational(user_id)
    }

    pub fn can_act_for_doc_user(&self, user_id: &DocId) -> bool {
        self.is_admin() || self.principal == PrincipalRef::Document(*user_id)
    }
}

#[derive(Default)]
pub struct SessionStore {
    tokens: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore::default()
    }

    /// Issues a fresh 64-char token for the principal.
    pub fn issue(
        &self,
        username: String,
        roles: Vec<UserRole>,
        principal: PrincipalRef,
    ) -> String {
        let token = random_string(64);
        let session = Session {
            token: token.clone(),
            username,
            roles,
            principal,
        };
        self.tokens.lock().unwrap().insert(token.clone(), session);
        token
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.tokens.lock().unwrap().get(token).cloned()
    }

    pub fn revoke(&self, token: &str) -> Option<Session> {
        self.tokens.lock().unwrap().remove(token)
    }
}

fn extract_token(parts: &Parts) -> Option<String> {
    let raw = parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)?
        .to_str()
        .ok()?;
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw).to_string())
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = axum::response::Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = match extract_token(parts) {
            Some(token) => token,
            None => {
                debug!("No session token in headers");
                return Err(super::api::unauthorized());
            }
        };
        match state.sessions.get(&token) {
            Some(session) => Ok(session),
            None => {
                debug!("Unknown session token");
                Err(super::api::unauthorized())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_get_revoke_round_trip() {
        let store = SessionStore::new();
        let token = store.issue(
            "masoud".to_string(),
            vec![UserRole::User],
            PrincipalRef::Relational(7),
        );
        assert_eq!(token.len(), 64);

        let session = store.get(&token).unwrap();
        assert_eq!(session.username, "masoud");
        assert!(!session.is_admin());
        assert!(session.can_act_for_sql_user(7));
        assert!(!session.can_act_for_sql_user(8));

        store.revoke(&token);
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn admin_can_act_for_anyone() {
        let store = SessionStore::new();
        let token = store.issue(
            "admin".to_string(),
            vec![UserRole::Admin],
            PrincipalRef::Relational(1),
        );
        let session = store.get(&token).unwrap();
        assert!(session.can_act_for_sql_user(999));
        assert!(session.can_act_for_doc_user(&crate::document::doc_id::DocId::generate()));
    }
}
