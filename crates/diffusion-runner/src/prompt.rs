//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are read from disk (`templates/` by default) so the persona and
//! decision wording can be tuned without recompiling. `system.j2` sets up the
//! agent's adopter category and its view of the innovation; `decision.j2`
//! asks for one decision given the adoption context frozen for the step.

use minijinja::Environment;

use diffusion_core::{DecisionRequest, FrozenSnapshot};

use crate::error::RunnerError;
use crate::llm::{ChatMessage, Conversation, Role};

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// Inputs of one rendered decision prompt.
struct DecisionContext<'a> {
    snapshot: &'a FrozenSnapshot,
    adoption_attempts: u32,
    devils_advocate: bool,
}

impl PromptEngine {
    /// Create a prompt engine from the templates in `templates_dir`.
    ///
    /// The directory must contain `system.j2` and `decision.j2`.
    pub fn new(templates_dir: &str) -> Result<Self, RunnerError> {
        let system = load_template(templates_dir, "system.j2")?;
        let decision = load_template(templates_dir, "decision.j2")?;
        Self::from_sources(system, decision)
    }

    /// Create a prompt engine from template sources already in memory.
    pub fn from_sources(system: String, decision: String) -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        env.add_template_owned("system", system)
            .map_err(|e| RunnerError::Template(format!("failed to add system template: {e}")))?;
        env.add_template_owned("decision", decision).map_err(|e| {
            RunnerError::Template(format!("failed to add decision template: {e}"))
        })?;
        Ok(Self { env })
    }

    /// Build the full conversation for `request`.
    ///
    /// Every accepted earlier turn is replayed as the prompt the agent saw
    /// followed by its answer, then the current prompt closes the list.
    pub fn build_conversation(
        &self,
        request: &DecisionRequest,
    ) -> Result<Conversation, RunnerError> {
        let system = self.render_system(request)?;

        let capacity = request.history.len().saturating_mul(2).saturating_add(1);
        let mut messages = Vec::with_capacity(capacity);
        for exchange in &request.history {
            messages.push(ChatMessage {
                role: Role::User,
                content: self.render_decision(&DecisionContext {
                    snapshot: &exchange.snapshot,
                    adoption_attempts: exchange.adoption_attempts,
                    devils_advocate: request.devils_advocate,
                })?,
            });
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: exchange.response.clone(),
            });
        }
        messages.push(ChatMessage {
            role: Role::User,
            content: self.render_decision(&DecisionContext {
                snapshot: &request.snapshot,
                adoption_attempts: request.adoption_attempts,
                devils_advocate: request.devils_advocate,
            })?,
        });

        Ok(Conversation { system, messages })
    }

    fn render_system(&self, request: &DecisionRequest) -> Result<String, RunnerError> {
        let mut innovation = serde_json::Map::new();
        for (name, score) in request.innovation.entries() {
            innovation.insert(name.to_owned(), serde_json::Value::String(tenths(score)));
        }
        let ctx = serde_json::json!({
            "category": request.category.as_str(),
            "innovation": innovation,
        });
        self.render("system", &ctx)
    }

    fn render_decision(&self, decision: &DecisionContext<'_>) -> Result<String, RunnerError> {
        let ctx = serde_json::json!({
            "global_adoption_percent": percent(decision.snapshot.global_adoption_rate),
            "adopted_neighbors": decision.snapshot.adopted_neighbors,
            "neighbor_count": decision.snapshot.neighbor_count,
            "adoption_attempts": decision.adoption_attempts,
            "deciding_again": decision.adoption_attempts > 0,
            "devils_advocate": decision.devils_advocate,
        });
        self.render("decision", &ctx)
    }

    fn render(&self, name: &str, ctx: &serde_json::Value) -> Result<String, RunnerError> {
        self.env
            .get_template(name)
            .map_err(|e| RunnerError::Template(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| RunnerError::Template(format!("{name} render failed: {e}")))
    }
}

/// A `[0, 1]` score on the 0..10 scale the prompts use, rounded down.
fn tenths(score: f64) -> String {
    format!("{:.0}", (score * 10.0).floor())
}

/// A `[0, 1]` rate as a percentage with one decimal.
fn percent(rate: f64) -> String {
    format!("{:.1}", rate * 100.0)
}

/// Load a template file from the templates directory.
fn load_template(dir: &str, filename: &str) -> Result<String, RunnerError> {
    let path = std::path::Path::new(dir).join(filename);
    std::fs::read_to_string(&path).map_err(|e| {
        RunnerError::Template(format!(
            "failed to read template {}: {e}",
            path.display()
        ))
    })
}
