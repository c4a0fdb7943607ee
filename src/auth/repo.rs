use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::{ApiError, AuthError, DuplicateField};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     birth_date, age, height_cm, weight_kg, goal, current_plan, plan_version, \
     created_at, updated_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already registered")]
    Duplicate(DuplicateField),

    #[error("user not found")]
    NotFound,

    #[error("plan was modified concurrently")]
    VersionConflict,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => ApiError::Duplicate(field),
            // the only row a request ever writes is its own resolved user
            StoreError::NotFound => ApiError::Auth(AuthError::UnknownSubject),
            StoreError::VersionConflict => ApiError::Conflict(
                "Meal plan was changed by another request, reload it and try again".into(),
            ),
            StoreError::Database(e) => ApiError::Internal(e),
        }
    }
}

/// Durable home of user records. Owns the rows; callers only get snapshots.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Checks both unique keys; username wins when both collide.
    async fn find_conflict(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<DuplicateField>, StoreError>;

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Overwrites `current_plan` and bumps `plan_version` in one statement.
    /// With `expected_version` set the write only lands if nobody else
    /// wrote in between; `None` is last-write-wins.
    async fn update_plan(
        &self,
        user_id: Uuid,
        plan: &str,
        expected_version: Option<i64>,
    ) -> Result<i64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await
            .context("find user by username")?;
        Ok(user)
    }

    async fn find_conflict(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<DuplicateField>, StoreError> {
        let (username_taken, email_taken) = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM users WHERE username = $1),
                EXISTS (SELECT 1 FROM users WHERE email = $2)
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.db)
        .await
        .context("check username/email uniqueness")?;

        Ok(match (username_taken, email_taken) {
            (true, _) => Some(DuplicateField::Username),
            (false, true) => Some(DuplicateField::Email),
            (false, false) => None,
        })
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name,
                               birth_date, age, height_cm, weight_kg, goal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "#
        );
        let p = &new_user.profile;
        let res = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(p.birth_date)
            .bind(p.age)
            .bind(p.height_cm)
            .bind(p.weight_kg)
            .bind(&p.goal)
            .fetch_one(&self.db)
            .await;

        match res {
            Ok(user) => Ok(user),
            // lost a race with a concurrent registration
            Err(e) => match duplicate_field(&e) {
                Some(field) => Err(StoreError::Duplicate(field)),
                None => Err(anyhow::Error::new(e).context("insert user").into()),
            },
        }
    }

    async fn update_plan(
        &self,
        user_id: Uuid,
        plan: &str,
        expected_version: Option<i64>,
    ) -> Result<i64, StoreError> {
        let version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
               SET current_plan = $2,
                   plan_version = plan_version + 1,
                   updated_at = now()
             WHERE id = $1
               AND ($3::BIGINT IS NULL OR plan_version = $3)
            RETURNING plan_version
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .bind(expected_version)
        .fetch_optional(&self.db)
        .await
        .context("update current plan")?;

        if let Some(v) = version {
            return Ok(v);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("check user exists")?;

        Err(if exists {
            StoreError::VersionConflict
        } else {
            StoreError::NotFound
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .context("ping database")?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn duplicate_field(err: &sqlx::Error) -> Option<DuplicateField> {
    if !is_unique_violation(err) {
        return None;
    }
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    match db_err.constraint() {
        Some("users_username_key") => Some(DuplicateField::Username),
        Some("users_email_key") => Some(DuplicateField::Email),
        _ => None,
    }
}
