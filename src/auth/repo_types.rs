use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Descriptive attributes supplied at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<Date>,
    pub age: i32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal: String,
}

/// User record in the database.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,                   // unique user ID
    pub username: String,           // unique login name
    pub email: String,              // unique, lowercased
    pub password_hash: String,      // Argon2 PHC string, never exposed
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<Date>,
    pub age: i32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal: String,
    pub current_plan: String,       // "" until the first generate
    pub plan_version: i64,          // bumped on every plan write
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
            age: self.age,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            goal: self.goal.clone(),
        }
    }

    pub fn has_plan(&self) -> bool {
        !self.current_plan.is_empty()
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("plan_version", &self.plan_version)
            .finish_non_exhaustive()
    }
}

/// Everything needed to insert a fresh user row.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}
