use super::dto::PlanType;

/// System instruction sent ahead of every completion call.
pub const DIETITIAN_INSTRUCTION: &str = "You are a professional dietitian. \
     Produce evidence-based, practical meal plans and nutrition advice tailored \
     to the person you are helping. Be polite and helpful.";

/// Profile values a plan is generated from, after defaults were applied.
#[derive(Debug, Clone)]
pub struct PlanSnapshot {
    pub name: String,
    pub age: i32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal: String,
    pub plan_type: PlanType,
    pub current_diet: Option<String>,
}

pub fn generate_prompt(s: &PlanSnapshot) -> String {
    let mut prompt = format!(
        "Generate a personalized meal plan based on the following details:\n\
         Name: {}\n\
         Age: {}\n\
         Height: {} cm\n\
         Weight: {} kg\n\
         Goal: {}\n",
        s.name, s.age, s.height_cm, s.weight_kg, s.goal
    );
    if s.plan_type == PlanType::Tweaks {
        if let Some(diet) = s.current_diet.as_deref() {
            prompt.push_str(&format!(
                "Current Diet: {diet}\nAdjust this diet rather than replacing it outright.\n"
            ));
        }
    }
    prompt.push_str("Provide a detailed plan.");
    prompt
}

pub fn tweak_prompt(current_plan: &str, change: &str) -> String {
    format!(
        "Here is my current meal plan:\n\
         ---\n\
         {current_plan}\n\
         ---\n\
         Please revise it with the following change: {change}\n\
         Return the complete updated meal plan."
    )
}
