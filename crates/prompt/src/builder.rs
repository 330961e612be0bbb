//! Prompt builder for rendering templates with request variables.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use serde::Serialize;
use skylens_core::{AppError, AppResult};

/// Build a prompt from a definition and input variables.
///
/// Both the system template (when present) and the user template are
/// rendered with Handlebars against the same `variables` value.
///
/// # Example
/// ```no_run
/// use skylens_prompt::{build_prompt, builtin_prompt, NOTAM_ANSWER_PROMPT_ID};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(NOTAM_ANSWER_PROMPT_ID)?;
/// let vars = json!({"airport": "EGLL", "question": "Is 09L open?", "notices": []});
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt<T: Serialize>(
    definition: &PromptDefinition,
    variables: &T,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let variables = serde_json::to_value(variables)?;

    let system = match &definition.system {
        Some(template) => Some(render_template(template, &variables)?.trim().to_string()),
        None => None,
    };
    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &serde_json::Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
