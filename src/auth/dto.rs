use serde::{Deserialize, Serialize};
use time::Date;

use crate::auth::repo_types::User;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Request body for user registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, with = "iso_date::option")]
    pub birth_date: Option<Date>,
    pub age: i32,
    #[serde(alias = "height")]
    pub height_cm: f64,
    #[serde(alias = "weight")]
    pub weight_kg: f64,
    pub goal: String,
}

/// Request body for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub username: String,
}

/// Returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date::option")]
    pub birth_date: Option<Date>,
    pub age: i32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal: String,
}

impl From<&User> for ProfileResponse {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            birth_date: u.birth_date,
            age: u.age,
            height_cm: u.height_cm,
            weight_kg: u.weight_kg,
            goal: u.goal.clone(),
        }
    }
}
