//! The session store: the single owner of "who is logged in".
//!
//! Nothing else in the crate reads or writes the persisted `token` / `user`
//! keys. The store serializes writers on one mutex and advances a generation
//! counter on every login and logout, so that a profile update which started
//! under one session cannot land after that session has been cleared or
//! replaced.

pub mod storage;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Session, User};

pub use storage::{FileStorage, MemoryStorage, Storage};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session data could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session file could not be replaced: {0}")]
    Persist(#[from] tempfile::PersistError),
}

struct Inner {
    storage: Box<dyn Storage>,
    generation: Mutex<u64>,
}

/// Cheaply cloneable handle to the persisted session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("generation", &*self.inner.generation.lock())
            .finish()
    }
}

impl SessionStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage: Box::new(storage),
                generation: Mutex::new(0),
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Read the persisted session.
    ///
    /// Returns `None` when either half is missing or the user record does not
    /// parse. Never fails.
    pub fn load(&self) -> Option<Session> {
        let _guard = self.inner.generation.lock();
        self.load_unlocked()
    }

    /// Bearer token of the current session, if any.
    pub fn token(&self) -> Option<String> {
        self.load().map(|s| s.token)
    }

    /// Current generation. Changes on every `save` and `clear`.
    pub fn generation(&self) -> u64 {
        *self.inner.generation.lock()
    }

    pub fn save(&self, token: &str, user: &User) -> Result<(), SessionError> {
        let mut generation = self.inner.generation.lock();
        let encoded = serde_json::to_string(user)?;
        self.inner.storage.set_many(&[
            (TOKEN_KEY, token.to_string()),
            (USER_KEY, encoded),
        ])?;
        *generation += 1;
        info!(user_id = user.id, role = %user.role(), "Session saved");
        Ok(())
    }

    /// Merge `partial` into the stored user.
    ///
    /// A no-op returning `Ok(None)` when nobody is logged in.
    pub fn update(&self, partial: &Map<String, Value>) -> Result<Option<User>, SessionError> {
        let _guard = self.inner.generation.lock();
        self.merge_unlocked(partial)
    }

    /// Like [`update`](Self::update), but only if the session is still the one
    /// observed at `generation`.
    pub fn update_at(
        &self,
        generation: u64,
        partial: &Map<String, Value>,
    ) -> Result<Option<User>, SessionError> {
        let guard = self.inner.generation.lock();
        if *guard != generation {
            debug!(
                expected = generation,
                current = *guard,
                "Discarding stale session update"
            );
            return Ok(None);
        }
        self.merge_unlocked(partial)
    }

    /// Replace the stored user wholesale, if still at `generation`.
    pub fn replace_user_at(&self, generation: u64, user: &User) -> Result<bool, SessionError> {
        let guard = self.inner.generation.lock();
        if *guard != generation || self.load_unlocked().is_none() {
            return Ok(false);
        }
        self.inner
            .storage
            .set_many(&[(USER_KEY, serde_json::to_string(user)?)])?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        let mut generation = self.inner.generation.lock();
        self.clear_unlocked(&mut generation)
    }

    /// Clear, but only if nothing has been saved or cleared since
    /// `generation`. Returns whether the session was cleared.
    pub fn clear_at(&self, generation: u64) -> Result<bool, SessionError> {
        let mut current = self.inner.generation.lock();
        if *current != generation {
            debug!(
                expected = generation,
                current = *current,
                "Keeping session replaced since the failed request"
            );
            return Ok(false);
        }
        self.clear_unlocked(&mut current)?;
        Ok(true)
    }

    /// The current generation together with the session, read under one lock.
    pub fn observe(&self) -> (u64, Option<Session>) {
        let guard = self.inner.generation.lock();
        (*guard, self.load_unlocked())
    }

    /// Load the session; if there is none, wipe whatever partial state is
    /// left in storage. Both steps happen under one lock, so a concurrent
    /// `save` is never erased.
    pub fn load_or_clear(&self) -> Option<Session> {
        let mut generation = self.inner.generation.lock();
        let session = self.load_unlocked();
        if session.is_none() {
            if let Err(e) = self.clear_unlocked(&mut generation) {
                warn!(error = %e, "Failed to clear session storage");
            }
        }
        session
    }

    fn clear_unlocked(&self, generation: &mut u64) -> Result<(), SessionError> {
        self.inner.storage.remove_many(&[TOKEN_KEY, USER_KEY])?;
        *generation += 1;
        info!("Session cleared");
        Ok(())
    }

    fn load_unlocked(&self) -> Option<Session> {
        let values = match self.inner.storage.get_many(&[TOKEN_KEY, USER_KEY]) {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Session storage unreadable");
                return None;
            }
        };
        let mut values = values.into_iter();
        let token = match values.next().flatten() {
            Some(t) if !t.is_empty() => t,
            _ => return None,
        };
        let raw = values.next().flatten()?;
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(Session { token, user }),
            Err(e) => {
                warn!(error = %e, "Stored user record is malformed");
                None
            }
        }
    }

    fn merge_unlocked(&self, partial: &Map<String, Value>) -> Result<Option<User>, SessionError> {
        let Some(session) = self.load_unlocked() else {
            debug!("No session to update");
            return Ok(None);
        };
        let merged = session.user.merged(partial)?;
        self.inner
            .storage
            .set_many(&[(USER_KEY, serde_json::to_string(&merged)?)])?;
        debug!(user_id = merged.id, fields = partial.len(), "Session user updated");
        Ok(Some(merged))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{RoleProfile, StudentProfile};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn user(verified: bool, approved: bool, profile: RoleProfile) -> User {
        User {
            id: 42,
            full_name: "Sam Student".to_string(),
            email: "sam@example.edu".to_string(),
            is_verified: verified,
            is_approved: approved,
            phone: None,
            profile_picture: None,
            created_at: None,
            profile,
        }
    }

    pub(crate) fn student(verified: bool, approved: bool) -> User {
        user(verified, approved, RoleProfile::Student(StudentProfile::default()))
    }

    #[test]
    fn test_save_then_load_roundtrips() {
        let store = SessionStore::in_memory();
        let u = student(true, true);
        store.save("tok", &u).unwrap();
        let session = store.load().unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.user, u);
    }

    #[test]
    fn test_clear_then_load_is_none() {
        let store = SessionStore::in_memory();
        store.save("tok", &student(true, true)).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_partial_state_is_logged_out() {
        let storage = MemoryStorage::new();
        storage.insert_raw(TOKEN_KEY, "tok");
        let store = SessionStore::new(storage);
        assert!(store.load().is_none());
    }

    #[test]
    fn test_malformed_user_is_logged_out() {
        let storage = MemoryStorage::new();
        storage.insert_raw(TOKEN_KEY, "tok");
        storage.insert_raw(USER_KEY, "{not json");
        let store = SessionStore::new(storage);
        assert!(store.load().is_none());

        let storage = MemoryStorage::new();
        storage.insert_raw(TOKEN_KEY, "tok");
        storage.insert_raw(USER_KEY, r#"{"full_name":"no id"}"#);
        assert!(SessionStore::new(storage).load().is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let store = SessionStore::in_memory();
        store.save("tok", &student(true, true)).unwrap();
        let partial = json!({"phone": "555-0199", "major": "Physics"});
        let updated = store.update(partial.as_object().unwrap()).unwrap().unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0199"));
        assert_eq!(updated.full_name, "Sam Student");

        let reloaded = store.load().unwrap().user;
        match reloaded.profile {
            RoleProfile::Student(p) => assert_eq!(p.major.as_deref(), Some("Physics")),
            _ => panic!("role changed"),
        }
    }

    #[test]
    fn test_update_without_session_is_noop() {
        let store = SessionStore::in_memory();
        let partial = json!({"phone": "1"});
        assert!(store.update(partial.as_object().unwrap()).unwrap().is_none());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_stale_update_after_logout_does_not_resurrect() {
        let store = SessionStore::in_memory();
        store.save("tok", &student(true, true)).unwrap();
        let (generation, _) = store.observe();

        store.clear().unwrap();
        let partial = json!({"phone": "1"});
        let res = store.update_at(generation, partial.as_object().unwrap()).unwrap();
        assert!(res.is_none());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_stale_update_after_relogin_is_dropped() {
        let store = SessionStore::in_memory();
        store.save("old", &student(true, true)).unwrap();
        let generation = store.generation();
        store.save("new", &student(true, false)).unwrap();

        let partial = json!({"full_name": "Stale"});
        assert!(store
            .update_at(generation, partial.as_object().unwrap())
            .unwrap()
            .is_none());
        assert_eq!(store.load().unwrap().user.full_name, "Sam Student");
    }

    #[test]
    fn test_clear_at_keeps_newer_login() {
        let store = SessionStore::in_memory();
        store.save("old", &student(true, true)).unwrap();
        let (generation, _) = store.observe();
        store.save("fresh", &student(true, true)).unwrap();

        assert!(!store.clear_at(generation).unwrap());
        assert_eq!(store.token().as_deref(), Some("fresh"));

        assert!(store.clear_at(store.generation()).unwrap());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_load_or_clear() {
        let storage = MemoryStorage::new();
        storage.insert_raw(TOKEN_KEY, "orphan");
        let store = SessionStore::new(storage);
        assert!(store.load_or_clear().is_none());
        assert_eq!(store.generation(), 1);

        store.save("tok", &student(true, true)).unwrap();
        assert_eq!(store.load_or_clear().unwrap().token, "tok");
        assert_eq!(store.generation(), 2);
    }

    struct CountingStorage {
        inner: MemoryStorage,
        reads: Arc<AtomicUsize>,
    }

    impl Storage for CountingStorage {
        fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, SessionError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_many(keys)
        }

        fn set_many(&self, entries: &[(&str, String)]) -> Result<(), SessionError> {
            self.inner.set_many(entries)
        }

        fn remove_many(&self, keys: &[&str]) -> Result<(), SessionError> {
            self.inner.remove_many(keys)
        }
    }

    #[test]
    fn test_load_reads_storage_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let storage = CountingStorage {
            inner: MemoryStorage::new(),
            reads: Arc::clone(&reads),
        };
        let store = SessionStore::new(storage);
        store.save("tok", &student(true, true)).unwrap();
        reads.store(0, Ordering::SeqCst);

        assert!(store.load().is_some());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::new(FileStorage::new(&path));
        store.save("tok", &student(false, false)).unwrap();

        // A second handle over the same file sees the same session.
        let other = SessionStore::new(FileStorage::new(&path));
        assert_eq!(other.load().unwrap().token, "tok");
        other.clear().unwrap();
        assert!(store.load().is_none());
    }
}
