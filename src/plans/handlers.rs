use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{extractors::BearerToken, session::authenticate},
    error::ApiError,
    plans::{
        dto::{FollowUpRequest, FollowUpResponse, GenerateRequest, PlanResponse, TweakRequest},
        services,
    },
    state::AppState,
};

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/plans/generate", post(generate_plan))
        .route("/plans/follow-up", post(follow_up))
        .route("/plans/tweak", post(tweak_plan))
        .route("/plans/current", get(current_plan))
}

#[instrument(skip(state, token, payload))]
pub async fn generate_plan(
    State(state): State<AppState>,
    token: BearerToken,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let user = authenticate(&state, &token.0).await?;
    let plan = services::generate(&state, &user, payload).await?;
    Ok(Json(plan))
}

#[instrument(skip(state, token, payload))]
pub async fn tweak_plan(
    State(state): State<AppState>,
    token: BearerToken,
    Json(payload): Json<TweakRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let user = authenticate(&state, &token.0).await?;
    let plan = services::tweak(&state, &user, payload).await?;
    Ok(Json(plan))
}

#[instrument(skip(state, token))]
pub async fn current_plan(
    State(state): State<AppState>,
    token: BearerToken,
) -> Result<Json<PlanResponse>, ApiError> {
    let user = authenticate(&state, &token.0).await?;
    Ok(Json(services::current_plan(&user)))
}

/// An `Authorization` header, when present, must carry a valid bearer
/// token. Without one the call only goes through if anonymous follow-ups
/// are switched on.
#[instrument(skip(state, headers, token, payload))]
pub async fn follow_up(
    State(state): State<AppState>,
    headers: HeaderMap,
    token: Result<BearerToken, ApiError>,
    Json(payload): Json<FollowUpRequest>,
) -> Result<Json<FollowUpResponse>, ApiError> {
    match token {
        Ok(token) => {
            let user = authenticate(&state, &token.0).await?;
            debug!(username = %user.username, "follow-up");
        }
        Err(rejection)
            if headers.contains_key(AUTHORIZATION) || !state.config.follow_up_allow_anonymous =>
        {
            return Err(rejection)
        }
        Err(_) => debug!("anonymous follow-up"),
    }
    let response = services::follow_up(&state, payload.conversation).await?;
    Ok(Json(FollowUpResponse { response }))
}
