use serde::{Deserialize, Serialize};

use crate::completion::ChatMessage;

/// `new` starts from scratch; `tweaks` adjusts the diet the caller
/// describes in `current_diet`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    New,
    Tweaks,
}

/// Profile snapshot for a generate call. Missing fields fall back to the
/// caller's stored profile.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    /// Ignored for ownership; the token decides whose plan this is.
    #[serde(default)]
    pub username: Option<String>,
    /// Full display name; wins over `first_name` / `last_name`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default, alias = "height")]
    pub height_cm: Option<f64>,
    #[serde(default, alias = "weight")]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default, alias = "planType")]
    pub plan_type: PlanType,
    #[serde(default, alias = "currentDiet")]
    pub current_diet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TweakRequest {
    /// Ignored for ownership, see `GenerateRequest::username`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(alias = "requested_change")]
    pub change: String,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    pub conversation: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanResponse {
    pub meal_plan: String,
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct FollowUpResponse {
    pub response: String,
}
