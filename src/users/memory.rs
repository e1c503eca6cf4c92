//! In-memory `UserStore` used by the test suite, with switches to simulate
//! storage failures.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, Status, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
    fail_timestamps: AtomicBool,
    fail_bulk: AtomicBool,
    fail_listing: AtomicBool,
}

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `record_login` and `touch_activity` fail.
    pub fn fail_timestamps(&self, fail: bool) {
        self.fail_timestamps.store(fail, Ordering::SeqCst);
    }

    /// Make the bulk operations fail.
    pub fn fail_bulk(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    /// Make `list_by_last_login` fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Insert a user directly, bypassing registration.
    pub fn seed(&self, name: &str, email: &str, password_hash: &str) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: now,
            status: Status::Unverified,
            is_blocked: false,
            last_logged_in_at: None,
            last_activity_at: None,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    pub fn update(&self, id: i64, f: impl FnOnce(&mut User)) {
        if let Some(u) = self.users.lock().unwrap().iter_mut().find(|u| u.id == id) {
            f(u);
        }
    }

    pub fn count_email(&self, email: &str) -> usize {
        self.users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.email == email)
            .count()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check_bulk(&self) -> Result<(), StoreError> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn check_timestamps(&self) -> Result<(), StoreError> {
        if self.fail_timestamps.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::EmailTaken);
        }
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: new_user.created_at,
            status: Status::Unverified,
            is_blocked: false,
            last_logged_in_at: Some(new_user.created_at),
            last_activity_at: Some(new_user.created_at),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_by_last_login(&self) -> Result<Vec<User>, StoreError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut users = self.users.lock().unwrap().clone();
        // Option orders None first, so reversing puts never-logged-in users last.
        users.sort_by(|a, b| {
            b.last_logged_in_at
                .cmp(&a.last_logged_in_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(users)
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        self.check_timestamps()?;
        self.update(id, |u| {
            u.last_logged_in_at = Some(at);
            u.last_activity_at = Some(at);
        });
        Ok(())
    }

    async fn touch_activity(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        self.check_timestamps()?;
        self.update(id, |u| u.last_activity_at = Some(at));
        Ok(())
    }

    async fn set_status(&self, id: i64, status: Status) -> Result<(), StoreError> {
        self.update(id, |u| u.status = status);
        Ok(())
    }

    async fn block_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.check_bulk()?;
        let mut touched = Vec::new();
        for u in self.users.lock().unwrap().iter_mut() {
            if ids.contains(&u.id) && !u.is_blocked {
                u.is_blocked = true;
                touched.push(u.id);
            }
        }
        Ok(touched)
    }

    async fn unblock_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.check_bulk()?;
        let mut touched = Vec::new();
        for u in self.users.lock().unwrap().iter_mut() {
            if ids.contains(&u.id) && u.is_blocked {
                u.is_blocked = false;
                u.status = Status::Verified;
                touched.push(u.id);
            }
        }
        Ok(touched)
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.check_bulk()?;
        let mut users = self.users.lock().unwrap();
        let touched: Vec<i64> = users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| u.id)
            .collect();
        users.retain(|u| !ids.contains(&u.id));
        Ok(touched)
    }
}
