use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::IssuedToken,
        password::{hash_password, verify_password},
        repo_types::{NewUser, Profile, User},
    },
    error::ApiError,
    state::AppState,
};

const MAX_PASSWORD_LEN: usize = 1024;
const MAX_NAME_LEN: usize = 100;
const MAX_GOAL_LEN: usize = 500;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn bounded_text(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Checks the profile attributes a plan is generated from.
pub(crate) fn validate_body_metrics(age: i32, height_cm: f64, weight_kg: f64) -> Result<(), ApiError> {
    if !(1..=130).contains(&age) {
        return Err(ApiError::Validation("age must be between 1 and 130".into()));
    }
    if !(height_cm.is_finite() && height_cm > 0.0 && height_cm <= 300.0) {
        return Err(ApiError::Validation(
            "height_cm must be between 0 and 300".into(),
        ));
    }
    if !(weight_kg.is_finite() && weight_kg > 0.0 && weight_kg <= 500.0) {
        return Err(ApiError::Validation(
            "weight_kg must be between 0 and 500".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_goal(goal: &str) -> Result<String, ApiError> {
    bounded_text("goal", goal, MAX_GOAL_LEN)
}

/// Normalizes and validates a registration payload. No side effects.
fn validate_registration(req: &RegisterRequest) -> Result<(String, String, Profile), ApiError> {
    let username = req.username.trim().to_string();
    if !is_valid_username(&username) {
        return Err(ApiError::Validation(
            "username must be 3-50 characters of letters, digits, '_', '.' or '-'".into(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    if req.password.is_empty() {
        return Err(ApiError::Validation("password is required".into()));
    }
    if req.password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::Validation("password is too long".into()));
    }

    validate_body_metrics(req.age, req.height_cm, req.weight_kg)?;

    let profile = Profile {
        first_name: bounded_text("first_name", &req.first_name, MAX_NAME_LEN)?,
        last_name: bounded_text("last_name", &req.last_name, MAX_NAME_LEN)?,
        birth_date: req.birth_date,
        age: req.age,
        height_cm: req.height_cm,
        weight_kg: req.weight_kg,
        goal: validate_goal(&req.goal)?,
    };
    Ok((username, email, profile))
}

/// Creates a user. Fails on either unique-key collision; never overwrites.
pub async fn register_user(state: &AppState, req: RegisterRequest) -> Result<User, ApiError> {
    let (username, email, profile) = validate_registration(&req)?;

    if let Some(field) = state.users.find_conflict(&username, &email).await? {
        warn!(username = %username, %field, "registration collides with existing user");
        return Err(ApiError::Duplicate(field));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task")??;

    let user = state
        .users
        .insert(NewUser {
            username,
            email,
            password_hash,
            profile,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Verifies credentials and mints a bearer token. Unknown user and wrong
/// password look the same to the caller.
pub async fn login_user(state: &AppState, req: LoginRequest) -> Result<IssuedToken, ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidCredentials);
    }

    let Some(user) = state.users.find_by_username(&username).await? else {
        warn!(username = %username, "login unknown username");
        return Err(ApiError::InvalidCredentials);
    };

    let password = req.password;
    let stored = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .context("password verification task")?;
    if !ok {
        warn!(username = %username, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let issued = state.keys.issue(&user.username)?;
    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(issued)
}
