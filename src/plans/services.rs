//! Generate / follow-up / tweak workflow over a user's persisted plan.
//!
//! A user's plan is `Unset` while `current_plan` is empty and `Active`
//! afterwards. Generate and tweak replace the stored text; follow-up is
//! conversation only and never writes.

use anyhow::Context;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dto::{GenerateRequest, PlanResponse, TweakRequest};
use super::prompts::{self, PlanSnapshot, DIETITIAN_INSTRUCTION};
use crate::{
    auth::{
        repo_types::User,
        services::{validate_body_metrics, validate_goal},
    },
    completion::{ChatMessage, CompletionError, CompletionRequest, Role},
    error::ApiError,
    state::AppState,
};

const MAX_CHANGE_LEN: usize = 2000;
const MAX_DIET_LEN: usize = 4000;
const MAX_NAME_LEN: usize = 201;
const MAX_FOLLOW_UP_MESSAGES: usize = 100;

fn ignore_foreign_username(user: &User, claimed: Option<&str>) {
    if let Some(claimed) = claimed {
        if claimed.trim() != user.username {
            warn!(
                username = %user.username,
                claimed = %claimed,
                "request body names another user; acting as the token owner"
            );
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn snapshot_for(user: &User, req: GenerateRequest) -> Result<PlanSnapshot, ApiError> {
    let stored = user.profile();
    let age = req.age.unwrap_or(stored.age);
    let height_cm = req.height_cm.unwrap_or(stored.height_cm);
    let weight_kg = req.weight_kg.unwrap_or(stored.weight_kg);
    validate_body_metrics(age, height_cm, weight_kg)?;

    let goal = validate_goal(req.goal.as_deref().unwrap_or(&stored.goal))?;
    let first_name = non_blank(req.first_name).unwrap_or(stored.first_name);
    let last_name = non_blank(req.last_name).unwrap_or(stored.last_name);
    let name = non_blank(req.name).unwrap_or_else(|| format!("{first_name} {last_name}"));
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let current_diet = non_blank(req.current_diet);
    if current_diet
        .as_deref()
        .is_some_and(|d| d.chars().count() > MAX_DIET_LEN)
    {
        return Err(ApiError::Validation(format!(
            "current_diet must be at most {MAX_DIET_LEN} characters"
        )));
    }

    Ok(PlanSnapshot {
        name,
        age,
        height_cm,
        weight_kg,
        goal,
        plan_type: req.plan_type,
        current_diet,
    })
}

/// One bounded completion call. Timeouts and blank replies count as
/// upstream failures; nothing is retried.
async fn call_completion(
    state: &AppState,
    request: CompletionRequest,
) -> Result<String, CompletionError> {
    let limit = state.config.completion.timeout();
    let reply = match tokio::time::timeout(limit, state.completion.complete(request)).await {
        Ok(res) => res?,
        Err(_) => return Err(CompletionError::Timeout(limit)),
    };
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(reply.to_string())
}

/// Runs the completion and the plan write on their own task so a client
/// that hangs up mid-call does not abort the write.
async fn complete_and_persist(
    state: &AppState,
    user_id: Uuid,
    expected_version: Option<i64>,
    prompt: String,
) -> Result<PlanResponse, ApiError> {
    let state = state.clone();
    let task = tokio::spawn(async move {
        let request = CompletionRequest {
            system_prompt: DIETITIAN_INSTRUCTION.to_string(),
            messages: vec![ChatMessage::user(prompt)],
        };
        let plan = call_completion(&state, request).await?;
        let version = state
            .users
            .update_plan(user_id, &plan, expected_version)
            .await?;
        Ok::<_, ApiError>(PlanResponse {
            meal_plan: plan,
            version,
        })
    });
    task.await.context("plan task failed")?
}

pub async fn generate(
    state: &AppState,
    user: &User,
    req: GenerateRequest,
) -> Result<PlanResponse, ApiError> {
    ignore_foreign_username(user, req.username.as_deref());
    let snapshot = snapshot_for(user, req)?;
    debug!(username = %user.username, plan_type = ?snapshot.plan_type, "generating plan");

    let prompt = prompts::generate_prompt(&snapshot);
    let plan = complete_and_persist(state, user.id, None, prompt).await?;
    info!(username = %user.username, version = plan.version, "meal plan generated");
    Ok(plan)
}

pub async fn tweak(
    state: &AppState,
    user: &User,
    req: TweakRequest,
) -> Result<PlanResponse, ApiError> {
    ignore_foreign_username(user, req.username.as_deref());

    let change = req.change.trim();
    if change.is_empty() {
        return Err(ApiError::Validation("change is required".into()));
    }
    if change.chars().count() > MAX_CHANGE_LEN {
        return Err(ApiError::Validation(format!(
            "change must be at most {MAX_CHANGE_LEN} characters"
        )));
    }
    if !user.has_plan() {
        return Err(ApiError::NotFound(
            "No meal plan to tweak yet, generate one first".into(),
        ));
    }

    let prompt = prompts::tweak_prompt(&user.current_plan, change);
    let plan = complete_and_persist(state, user.id, Some(user.plan_version), prompt).await?;
    info!(username = %user.username, version = plan.version, "meal plan tweaked");
    Ok(plan)
}

/// Advisory chat over a caller-held history. Caller system messages are
/// dropped in favour of the fixed instruction; nothing is persisted.
pub async fn follow_up(
    state: &AppState,
    conversation: Vec<ChatMessage>,
) -> Result<String, ApiError> {
    let messages: Vec<ChatMessage> = conversation
        .into_iter()
        .filter(|m| m.role != Role::System)
        .collect();

    if messages.is_empty() {
        return Err(ApiError::Validation("conversation must not be empty".into()));
    }
    if messages.len() > MAX_FOLLOW_UP_MESSAGES {
        return Err(ApiError::Validation(format!(
            "conversation must have at most {MAX_FOLLOW_UP_MESSAGES} messages"
        )));
    }
    match messages.last() {
        Some(last) if last.role == Role::User && !last.content.trim().is_empty() => {}
        _ => {
            return Err(ApiError::Validation(
                "conversation must end with a non-empty user message".into(),
            ))
        }
    }

    let reply = call_completion(
        state,
        CompletionRequest {
            system_prompt: DIETITIAN_INSTRUCTION.to_string(),
            messages,
        },
    )
    .await?;
    Ok(reply)
}

pub fn current_plan(user: &User) -> PlanResponse {
    PlanResponse {
        meal_plan: user.current_plan.clone(),
        version: user.plan_version,
    }
}
