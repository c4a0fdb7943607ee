//! In-process `UserStore` for tests. Enforces the same uniqueness and
//! versioning rules as the Postgres schema.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User};
use crate::error::DuplicateField;

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a user, simulating an account removed out of band.
    pub fn remove(&self, username: &str) {
        self.rows
            .lock()
            .unwrap()
            .retain(|_, u| u.username != username);
    }

    pub fn get(&self, username: &str) -> Option<User> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get(username))
    }

    async fn find_conflict(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<DuplicateField>, StoreError> {
        let rows = self.rows.lock().unwrap();
        if rows.values().any(|u| u.username == username) {
            return Ok(Some(DuplicateField::Username));
        }
        if rows.values().any(|u| u.email == email) {
            return Ok(Some(DuplicateField::Email));
        }
        Ok(None)
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Duplicate(DuplicateField::Username));
        }
        if rows.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate(DuplicateField::Email));
        }

        let now = OffsetDateTime::now_utc();
        let p = new_user.profile;
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: p.first_name,
            last_name: p.last_name,
            birth_date: p.birth_date,
            age: p.age,
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            goal: p.goal,
            current_plan: String::new(),
            plan_version: 0,
            created_at: now,
            updated_at: now,
        };
        rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_plan(
        &self,
        user_id: Uuid,
        plan: &str,
        expected_version: Option<i64>,
    ) -> Result<i64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let user = rows.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        if expected_version.is_some_and(|v| v != user.plan_version) {
            return Err(StoreError::VersionConflict);
        }
        user.current_plan = plan.to_string();
        user.plan_version += 1;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.plan_version)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
