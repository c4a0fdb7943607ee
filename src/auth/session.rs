use tracing::warn;

use crate::{
    auth::repo_types::User,
    error::{ApiError, AuthError},
    state::AppState,
};

/// Resolves a bearer token to the record of the user it was issued for.
///
/// Every protected operation calls this first. A well-signed token whose
/// subject has since disappeared is rejected like any other bad token.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, ApiError> {
    let username = state.keys.verify(token)?;
    match state.users.find_by_username(&username).await? {
        Some(user) => Ok(user),
        None => {
            warn!(username = %username, "token subject no longer exists");
            Err(AuthError::UnknownSubject.into())
        }
    }
}
