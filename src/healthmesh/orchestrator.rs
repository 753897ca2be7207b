//! Fixed-order multi-agent pipeline and the synthesizer that merges its outputs.
//!
//! One orchestration run is a strict state sequence with no branching or skipping:
//!
//! ```text
//! START → SYMPTOM → LIFESTYLE_1 → DIET → FITNESS → LIFESTYLE_2 → SYNTHESIZE → PERSIST → DONE
//! ```
//!
//! Later stages depend on earlier outputs (diet reads the lifestyle notes, fitness
//! reads the diet plan, the refined lifestyle pass reads both), so each agent call is
//! awaited in order — there is nothing to parallelize inside a run. Every run owns a
//! fresh [`SessionMemory`], which is what makes concurrent runs for different users
//! safe: no transcript state survives a request or is visible outside it.
//!
//! The synthesizer is a dedicated model call (not one of the four role agents). Its
//! system instruction mandates a fixed seven-section markdown wellness plan and a
//! strict JSON output contract; [`parse_synthesis`] strips a stray code fence and
//! degrades gracefully to raw-text guidance when the model ignores the contract.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::healthmesh::agents::{
    diet_task, fitness_task, lifestyle_task, refined_lifestyle_task, send_with_rotation,
    symptom_task, RoleAgent,
};
use crate::healthmesh::client_wrapper::{ClientFactory, Message};
use crate::healthmesh::error::HealthMeshError;
use crate::healthmesh::history_store::HistoryStore;
use crate::healthmesh::key_pool::KeyPool;
use crate::healthmesh::knowledge::KnowledgeBase;
use crate::healthmesh::memory::SessionMemory;

/// System instruction of the synthesizer call used by the batch pipeline.
///
/// Mandates the seven-section markdown structure and the bare-JSON output contract
/// that [`parse_synthesis`] expects.
pub(crate) const SYNTH_SYSTEM_PROMPT: &str =
    "You are an orchestrator summarizing a mild to moderate health concern.\n\
     Read the full conversation between symptom_agent, lifestyle_agent, \
     diet_agent, and fitness_agent.\n\n\
     Write a concise, well-structured wellness plan in markdown with these sections:\n\
     1. Overview – 2-3 sentences summarizing the situation and overall goal.\n\
     2. When to See a Doctor – 2-4 bullet points, clearly describing red-flag symptoms.\n\
     3. Lifestyle & Rest – 3-5 bullet points with specific, gentle daily actions.\n\
     4. Hydration & Diet – 3-5 bullet points with simple, safe food and fluid guidance.\n\
     5. Hygiene & Environment – 2-4 bullet points to reduce irritation and infection spread.\n\
     6. Movement & Activity – 2-4 bullet points with ONLY low-intensity options, \
     including a bold STOP warning for chest pain, breathing difficulty, dizziness, \
     or marked worsening.\n\
     7. Final Note – 1-2 sentences reminding that this is not a diagnosis and to \
     follow a doctor's advice.\n\n\
     Tone: calm, reassuring, non-alarming, strictly non-diagnostic. \
     Never name specific medicines or doses. Never say you replace a doctor.\n\n\
     Return ONLY valid JSON with keys:\n\
     \x20 - synthesized_guidance: the markdown text described above\n\
     \x20 - recommendations: array of short, plain-language recommendation strings\n\
     Do not wrap JSON in code fences or add any extra text.";

/// Structured output of the synthesizer call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Synthesis {
    /// The seven-section markdown wellness plan.
    #[serde(default)]
    pub synthesized_guidance: String,
    /// Short, plain-language recommendation strings.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// One entry of the ordered agent-flow trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentStep {
    /// Display name of the agent that produced this output.
    pub agent: String,
    /// Full output text of that agent.
    pub output: String,
}

/// Aggregate result of one orchestration run, persisted to the user's history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WellnessPlan {
    /// Id of the requesting user.
    pub user_id: String,
    /// The symptom text that started the run.
    pub query: String,
    /// Output of the symptom triage agent.
    pub symptom_analysis: String,
    /// Output of the lifestyle agent (refined second pass when available).
    pub lifestyle: String,
    /// Output of the diet agent.
    pub diet: String,
    /// Output of the fitness agent.
    pub fitness: String,
    /// Synthesized markdown guidance text.
    pub synthesized_guidance: String,
    /// List of short recommendation strings.
    pub recommendations: Vec<String>,
    /// Ordered trace of every agent invocation in pipeline order.
    pub agent_flow: Vec<AgentStep>,
    /// Markdown block summarizing each agent's contribution.
    pub table_markdown: String,
    /// When the run completed.
    pub created_at: DateTime<Utc>,
}

/// Strip one leading/trailing markdown code fence from synthesizer output.
///
/// Matches a fence-opening token with an optional alphabetic language tag
/// (```` ```json ````) and a fence-closing token. Text without fences is returned
/// trimmed but otherwise untouched, which makes the operation idempotent.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_start();
    let body = body.trim_end();
    body.strip_suffix("```").map(str::trim_end).unwrap_or(body)
}

/// Parse the synthesizer's raw output into a [`Synthesis`].
///
/// Policy: strip a stray code fence, then parse as JSON; on parse failure degrade
/// gracefully by treating the entire raw text as the guidance with an empty
/// recommendation list. This never fails — a malformed synthesis must not abort a
/// run that already has four good agent outputs.
pub fn parse_synthesis(raw: &str) -> Synthesis {
    let cleaned = strip_code_fence(raw);
    match serde_json::from_str::<Synthesis>(cleaned) {
        Ok(synthesis) => synthesis,
        Err(err) => {
            log::warn!(
                "synthesizer returned non-JSON output ({}); falling back to raw guidance",
                err
            );
            Synthesis {
                synthesized_guidance: cleaned.to_string(),
                recommendations: Vec::new(),
            }
        }
    }
}

/// Build a markdown block summarizing each agent's contribution.
fn build_markdown_table(plan: &WellnessPlan) -> String {
    let mut parts: Vec<String> = Vec::new();

    let mut add_block = |title: &str, text: &str| {
        if text.is_empty() {
            return;
        }
        if !parts.is_empty() {
            parts.push(String::new());
        }
        parts.push(format!("**{}**", title));
        parts.push(text.trim().to_string());
    };

    add_block("Symptom agent", &plan.symptom_analysis);
    add_block("Lifestyle agent", &plan.lifestyle);
    add_block("Diet agent", &plan.diet);
    add_block("Fitness agent", &plan.fitness);

    parts.join("\n")
}

/// Drives the fixed agent pipeline for one request at a time.
///
/// The orchestrator itself is stateless across runs — all its fields are shared,
/// thread-safe collaborators — so one instance is cheaply cloned into every
/// concurrent request.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) factory: Arc<dyn ClientFactory>,
    pub(crate) pool: Arc<KeyPool>,
    pub(crate) knowledge: Arc<KnowledgeBase>,
    pub(crate) history: Arc<dyn HistoryStore>,
}

impl Orchestrator {
    /// Wire up an orchestrator from its collaborators.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        pool: Arc<KeyPool>,
        knowledge: Arc<KnowledgeBase>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Orchestrator {
            factory,
            pool,
            knowledge,
            history,
        }
    }

    /// Run the full multi-agent pipeline and return the structured wellness plan.
    ///
    /// The result is appended to `user_id`'s history before returning.
    ///
    /// # Errors
    ///
    /// [`HealthMeshError::Input`] for blank symptoms, [`HealthMeshError::PoolExhausted`]
    /// / [`HealthMeshError::Provider`] when the model becomes unreachable, and
    /// [`HealthMeshError::Storage`] when persisting fails.
    pub async fn orchestrate(
        &self,
        symptoms: &str,
        medical_report: &str,
        user_id: &str,
    ) -> Result<WellnessPlan, HealthMeshError> {
        let symptoms = symptoms.trim();
        if symptoms.is_empty() {
            return Err(HealthMeshError::Input("Symptoms required".to_string()));
        }

        log::info!("orchestration run started for user '{}'", user_id);

        // Fresh transcript for this run; nothing leaks across requests.
        let mut memory = SessionMemory::new();
        let mut agent_flow: Vec<AgentStep> = Vec::new();

        let symptom_agent = RoleAgent::symptom(self.factory.clone(), self.pool.clone());
        let lifestyle_agent = RoleAgent::lifestyle(self.factory.clone(), self.pool.clone());
        let diet_agent = RoleAgent::diet(self.factory.clone(), self.pool.clone());
        let fitness_agent = RoleAgent::fitness(self.factory.clone(), self.pool.clone());

        // 1. Symptom triage
        let symptom_result = symptom_agent.run(&mut memory, &symptom_task(symptoms)).await?;
        agent_flow.push(AgentStep {
            agent: symptom_agent.display_name.to_string(),
            output: symptom_result.clone(),
        });

        // 2. Lifestyle, first pass
        let lifestyle_result = lifestyle_agent
            .run(&mut memory, &lifestyle_task(symptoms))
            .await?;
        agent_flow.push(AgentStep {
            agent: lifestyle_agent.display_name.to_string(),
            output: lifestyle_result.clone(),
        });

        // 3. Diet, using the lifestyle output plus retrieved snippets
        let kb = self.knowledge.retrieve(symptoms, 2);
        let diet_result = diet_agent
            .run(
                &mut memory,
                &diet_task(symptoms, medical_report, &lifestyle_result, &kb),
            )
            .await?;
        agent_flow.push(AgentStep {
            agent: diet_agent.display_name.to_string(),
            output: diet_result.clone(),
        });

        // 4. Fitness, using the diet output
        let fitness_result = fitness_agent
            .run(&mut memory, &fitness_task(symptoms, &diet_result))
            .await?;
        agent_flow.push(AgentStep {
            agent: fitness_agent.display_name.to_string(),
            output: fitness_result.clone(),
        });

        // 5. Lifestyle, second pass: surface conflicts between the diet and
        // fitness plans (e.g. an activity plan clashing with a rest recommendation).
        let refined_lifestyle = lifestyle_agent
            .run(
                &mut memory,
                &refined_lifestyle_task(symptoms, &diet_result, &fitness_result),
            )
            .await?;
        agent_flow.push(AgentStep {
            agent: lifestyle_agent.display_name.to_string(),
            output: refined_lifestyle.clone(),
        });

        // 6. Synthesize the full transcript into one structured plan
        let mut synth_messages = Vec::with_capacity(memory.len() * 2 + 2);
        synth_messages.push(Message::system(SYNTH_SYSTEM_PROMPT));
        synth_messages.extend(memory.load());
        synth_messages.push(Message::user("Generate the JSON response now."));

        let final_answer =
            send_with_rotation(&*self.factory, &self.pool, &synth_messages).await?;
        let synthesis = parse_synthesis(&final_answer.content);

        let mut plan = WellnessPlan {
            user_id: user_id.to_string(),
            query: symptoms.to_string(),
            symptom_analysis: symptom_result,
            lifestyle: refined_lifestyle,
            diet: diet_result,
            fitness: fitness_result,
            synthesized_guidance: synthesis.synthesized_guidance,
            recommendations: synthesis.recommendations,
            agent_flow,
            table_markdown: String::new(),
            created_at: Utc::now(),
        };
        plan.table_markdown = build_markdown_table(&plan);

        // 7. Persist to the user's history
        self.history.append(user_id, plan.clone()).await?;

        log::info!(
            "orchestration run finished for user '{}' ({} recommendations)",
            user_id,
            plan.recommendations.len()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_stripping_recovers_plain_json() {
        let fenced = "```json\n{\"synthesized_guidance\": \"plan\", \"recommendations\": [\"rest\"]}\n```";
        let bare = "{\"synthesized_guidance\": \"plan\", \"recommendations\": [\"rest\"]}";

        let from_fenced = parse_synthesis(fenced);
        let from_bare = parse_synthesis(bare);
        assert_eq!(from_fenced.synthesized_guidance, from_bare.synthesized_guidance);
        assert_eq!(from_fenced.recommendations, from_bare.recommendations);
    }

    #[test]
    fn fence_stripping_is_idempotent() {
        let fenced = "```json\n{\"a\": 1}\n```";
        let once = strip_code_fence(fenced);
        let twice = strip_code_fence(once);
        assert_eq!(once, twice);
        assert_eq!(once, "{\"a\": 1}");
    }

    #[test]
    fn fence_without_language_tag_is_stripped() {
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fence("  hello world \n"), "hello world");
    }

    #[test]
    fn malformed_json_degrades_to_raw_guidance() {
        let synthesis = parse_synthesis("Drink fluids and rest.");
        assert_eq!(synthesis.synthesized_guidance, "Drink fluids and rest.");
        assert!(synthesis.recommendations.is_empty());
    }

    #[test]
    fn missing_recommendations_key_defaults_to_empty() {
        let synthesis = parse_synthesis("{\"synthesized_guidance\": \"plan\"}");
        assert_eq!(synthesis.synthesized_guidance, "plan");
        assert!(synthesis.recommendations.is_empty());
    }
}
