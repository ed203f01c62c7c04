/*!
Credential hashing and session keys.

Keys are random, held in memory, and expire after a configurable lifetime.
Restarting the server logs everybody out.
*/
use std::collections::HashMap;

use rand::{distributions, Rng};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use crate::user::Actor;

const DEFAULT_SALT_LENGTH: usize = 8;
const DEFAULT_SALT_CHARS: &str =
"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Clone, Debug, PartialEq)]
pub enum AuthResult {
    Ok(Actor),
    InvalidKey,
    Expired,
}

/// Generate a new salt string for a freshly-registered account.
pub fn generate_salt() -> String {
    let chars: Vec<char> = DEFAULT_SALT_CHARS.chars().collect();
    // `DEFAULT_SALT_CHARS` is not empty, so this can't fail.
    let dist = match distributions::Slice::new(&chars) {
        Ok(dist) => dist,
        Err(_) => { return String::new(); },
    };
    rand::thread_rng()
        .sample_iter(&dist)
        .take(DEFAULT_SALT_LENGTH)
        .collect()
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn check_password(password: &str, salt: &str, hash: &str) -> bool {
    hash_password(password, salt) == hash
}

fn new_key() -> String {
    let key_bytes: [u8; 32] = rand::thread_rng().gen();
    let mut hasher = Sha256::new();
    hasher.update(key_bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
struct Session {
    email: String,
    actor: Actor,
    expires: OffsetDateTime,
}

/// Issued session keys, mapped to whom they were issued to.
#[derive(Debug)]
pub struct KeyRing {
    life: Duration,
    keys: RwLock<HashMap<String, Session>>,
}

impl KeyRing {
    pub fn new(life: Duration) -> Self {
        log::trace!("KeyRing::new( {:?} ) called.", &life);
        Self { life, keys: RwLock::new(HashMap::new()) }
    }

    pub async fn issue(&self, email: &str, actor: Actor) -> String {
        log::trace!("KeyRing::issue( {:?}, {:?} ) called.", email, &actor);

        let key = new_key();
        let session = Session {
            email: email.to_owned(),
            actor,
            expires: OffsetDateTime::now_utc() + self.life,
        };

        let mut keys = self.keys.write().await;
        let now = OffsetDateTime::now_utc();
        keys.retain(|_, s| s.expires > now);
        keys.insert(key.clone(), session);
        key
    }

    /// Check that `key` was issued to `email` and is still good.
    pub async fn check(&self, email: &str, key: &str) -> AuthResult {
        log::trace!("KeyRing::check( {:?}, [ key ] ) called.", email);

        let mut keys = self.keys.write().await;
        let (expired, actor) = match keys.get(key) {
            Some(s) if s.email == email => (s.expires <= OffsetDateTime::now_utc(), s.actor),
            _ => { return AuthResult::InvalidKey; },
        };

        if expired {
            keys.remove(key);
            AuthResult::Expired
        } else {
            AuthResult::Ok(actor)
        }
    }

    /// Forget a single key. Returns `false` if it wasn't live.
    pub async fn forget(&self, key: &str) -> bool {
        log::trace!("KeyRing::forget( [ key ] ) called.");
        self.keys.write().await.remove(key).is_some()
    }

    /// Forget every key issued to `actor`.
    pub async fn revoke(&self, actor: Actor) {
        log::trace!("KeyRing::revoke( {:?} ) called.", &actor);
        self.keys.write().await.retain(|_, s| s.actor != actor);
    }
}
