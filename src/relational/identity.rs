//! Credential store for the relational backend: argon2 password hashes,
//! security/concurrency stamps, role assignment, admin bootstrap.

use super::models::User;
use super::SqlBackend;
use crate::domain::rules;
use crate::domain::UserRole;
use crate::relational::SqlUserRepository;
use crate::store::{random_string, Repository, StoreError, StoreResult};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod fonoteca_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
        Argon2,
    };

    #[cfg(not(feature = "test-fast-hasher"))]
    fn hasher() -> Argon2<'static> {
        Argon2::default()
    }

    // DO NOT use in production!
    #[cfg(feature = "test-fast-hasher")]
    fn hasher() -> Argon2<'static> {
        use argon2::{Algorithm, Params, Version};
        Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(1024, 1, 1, None).expect("valid test params"),
        )
    }

    pub fn hash(plain: &[u8]) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(hasher()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string())
    }

    pub fn verify(plain: &[u8], target_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(target_hash).map_err(|err| anyhow!("{}", err))?;
        Ok(hasher().verify_password(plain, &parsed).is_ok())
    }
}

#[derive(Clone)]
pub struct SqlIdentity {
    users: SqlUserRepository,
}

impl SqlIdentity {
    pub fn new(backend: SqlBackend) -> Self {
        SqlIdentity {
            users: SqlUserRepository::new(backend),
        }
    }

    pub fn users(&self) -> &SqlUserRepository {
        &self.users
    }

    /// Hashes the password and persists the user with fresh stamps.
    pub fn register(
        &self,
        mut user: User,
        password: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<User> {
        if password.is_empty() {
            return Err(StoreError::Validation(
                "Field 'password' is required but was empty".to_string(),
            ));
        }
        user.password_hash = fonoteca_argon2::hash(password.as_bytes())?;
        user.security_stamp = random_string(32);
        user.concurrency_stamp = random_string(32);
        if user.roles.is_empty() {
            user.roles.push(UserRole::User);
        }
        self.users.add(&mut user, cancel)?;
        Ok(user)
    }

    /// Verifies the password against the stored argon2 hash. Returns the
    /// user with roles loaded, or None for unknown/inactive/bad-password.
    pub fn verify_login(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let user = match self.users.find_by_username(username)? {
            None => return Ok(None),
            Some(user) => user,
        };
        if !user.is_active {
            return Ok(None);
        }
        if fonoteca_argon2::verify(password.as_bytes(), &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Re-hashes the password and rotates both stamps in one update.
    pub fn change_password(
        &self,
        user_id: i64,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<()> {
        let mut user = self
            .users
            .get_by_id_tracked(&user_id)?
            .ok_or(StoreError::NotFound("user"))?;
        user.password_hash = fonoteca_argon2::hash(new_password.as_bytes())?;
        user.security_stamp = random_string(32);
        user.concurrency_stamp = random_string(32);
        self.users.update(&user, cancel)
    }

    /// Deletes the user unless that would remove the last admin.
    pub fn delete_user(&self, user_id: i64, cancel: &CancellationToken) -> StoreResult<()> {
        let user = self
            .users
            .get_by_id_tracked(&user_id)?
            .ok_or(StoreError::NotFound("user"))?;
        let is_admin = user.roles.contains(&UserRole::Admin);
        rules::ensure_not_last_admin(self.users.count_admins()?, is_admin)?;
        self.users.delete_by_id(&user_id, cancel)
    }

    /// Idempotent bootstrap: creates the `admin` user only when no admin
    /// role assignment exists yet.
    pub fn ensure_admin(&self, bootstrap_password: &str) -> StoreResult<()> {
        if self.users.count_admins()? > 0 {
            return Ok(());
        }
        let admin = User {
            id: None,
            username: "admin".to_string(),
            password_hash: String::new(),
            security_stamp: String::new(),
            concurrency_stamp: String::new(),
            full_name: "Site admin".to_string(),
            avatar_path: None,
            bio: None,
            is_active: true,
            roles: vec![UserRole::Admin],
        };
        self.register(admin, bootstrap_password, &CancellationToken::new())?;
        info!("Bootstrapped relational admin user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SqlIdentity {
        SqlIdentity::new(SqlBackend::open_in_memory().unwrap())
    }

    fn make_user(username: &str) -> User {
        User {
            id: None,
            username: username.to_string(),
            password_hash: String::new(),
            security_stamp: String::new(),
            concurrency_stamp: String::new(),
            full_name: "Test User".to_string(),
            avatar_path: None,
            bio: None,
            is_active: true,
            roles: vec![],
        }
    }

    #[test]
    fn register_and_login_round_trip() {
        let identity = identity();
        let user = identity
            .register(make_user("masoud"), "s3cret", &CancellationToken::new())
            .unwrap();
        assert!(user.id.is_some());
        assert_ne!(user.password_hash, "s3cret");

        let found = identity.verify_login("masoud", "s3cret").unwrap();
        assert!(found.is_some());
        assert!(identity.verify_login("masoud", "wrong").unwrap().is_none());
        assert!(identity.verify_login("nobody", "s3cret").unwrap().is_none());
    }

    #[test]
    fn inactive_user_cannot_login() {
        let identity = identity();
        let mut user = identity
            .register(make_user("sleepy"), "pw", &CancellationToken::new())
            .unwrap();
        user.is_active = false;
        identity.users().update(&user, &CancellationToken::new()).unwrap();
        assert!(identity.verify_login("sleepy", "pw").unwrap().is_none());
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let identity = identity();
        identity.ensure_admin("bootpw").unwrap();
        identity.ensure_admin("otherpw").unwrap();
        let admin = identity.users().find_by_username("admin").unwrap().unwrap();
        assert!(admin.roles.contains(&UserRole::Admin));
        assert_eq!(identity.users().count_admins().unwrap(), 1);
        // The second call must not have replaced the password.
        assert!(identity.verify_login("admin", "bootpw").unwrap().is_some());
    }

    #[test]
    fn last_admin_cannot_be_deleted() {
        let identity = identity();
        identity.ensure_admin("bootpw").unwrap();
        let admin = identity.users().find_by_username("admin").unwrap().unwrap();
        let err = identity
            .delete_user(admin.id.unwrap(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(rules::RuleViolation::LastAdmin)
        ));
    }

    #[test]
    fn change_password_rotates_stamps() {
        let identity = identity();
        let user = identity
            .register(make_user("rotor"), "old", &CancellationToken::new())
            .unwrap();
        let before = identity.users().find_by_username("rotor").unwrap().unwrap();
        identity
            .change_password(user.id.unwrap(), "new", &CancellationToken::new())
            .unwrap();
        let after = identity.users().find_by_username("rotor").unwrap().unwrap();
        assert_ne!(before.security_stamp, after.security_stamp);
        assert_ne!(before.concurrency_stamp, after.concurrency_stamp);
        assert!(identity.verify_login("rotor", "new").unwrap().is_some());
        assert!(identity.verify_login("rotor", "old").unwrap().is_none());
    }
}
