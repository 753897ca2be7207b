//! Role-specialized agents and the key-rotating retry combinator they share.
//!
//! Each agent is one persona over the same model: a fixed system prompt carrying the
//! role description and its safety constraints (no diagnoses, no prescriptions), fed
//! with the shared transcript of everything earlier agents produced plus one
//! task-specific user message. The agent appends its own output back to the
//! transcript, so later pipeline stages build on it.
//!
//! All model calls go through [`send_with_rotation`]: acquire a key from the pool,
//! invoke; on any provider failure bench that key and retry exactly once with a
//! freshly rotated key. A second consecutive failure is fatal for the run.

use std::sync::Arc;

use crate::healthmesh::client_wrapper::{ChunkStream, ClientFactory, Message};
use crate::healthmesh::error::HealthMeshError;
use crate::healthmesh::key_pool::KeyPool;
use crate::healthmesh::memory::SessionMemory;

/// System prompt of the symptom triage agent.
const SYMPTOM_SYSTEM_PROMPT: &str = "You are a safe medical triage assistant. \
     You only assess severity and suggest if the user should see a doctor. \
     Do not provide diagnoses or prescriptions.";

/// System prompt of the lifestyle agent.
const LIFESTYLE_SYSTEM_PROMPT: &str = "You are a lifestyle coach collaborating with other agents. \
     Suggest simple lifestyle habits, sleep hygiene, stress management, \
     and daily routine tips. Keep suggestions safe and generic.";

/// System prompt of the diet agent.
const DIET_SYSTEM_PROMPT: &str =
    "You are a dietician collaborating with other agents to give general diet guidance. \
     Never claim to cure diseases or override a doctor's advice.";

/// System prompt of the fitness agent.
const FITNESS_SYSTEM_PROMPT: &str = "You are a cautious fitness coach. \
     You design simple, low-intensity plans that are generally safe. \
     Always recommend consulting a doctor before heavy exercise.";

/// Send `messages` through a freshly keyed client, rotating once on failure.
///
/// This is the single recovery point for provider errors in the whole pipeline:
/// the failing key is marked quota-exceeded (benched for the cooldown window) and
/// the call is retried on the next available key. A second failure propagates as
/// [`HealthMeshError::Provider`] and aborts the run.
pub async fn send_with_rotation(
    factory: &dyn ClientFactory,
    pool: &KeyPool,
    messages: &[Message],
) -> Result<Message, HealthMeshError> {
    let key = pool.next_key()?;
    let client = factory.client_for_key(&key);

    match client.send_message(messages).await {
        Ok(reply) => Ok(reply),
        Err(first_err) => {
            log::warn!(
                "model call failed ({}); rotating key and retrying once",
                first_err
            );
            pool.mark_quota_exceeded(&key);

            let key = pool.next_key()?;
            let client = factory.client_for_key(&key);
            client
                .send_message(messages)
                .await
                .map_err(HealthMeshError::from)
        }
    }
}

/// Streaming variant of [`send_with_rotation`].
///
/// The rotation-and-retry applies to *establishing* the stream; once chunks are
/// flowing, a mid-stream failure is the consumer's to handle (the event sequence
/// terminates — it is never restarted with duplicate tokens).
pub async fn open_stream_with_rotation(
    factory: &dyn ClientFactory,
    pool: &KeyPool,
    messages: &[Message],
) -> Result<ChunkStream, HealthMeshError> {
    let key = pool.next_key()?;
    let client = factory.client_for_key(&key);

    match client.send_message_stream(messages).await {
        Ok(stream) => Ok(stream),
        Err(first_err) => {
            log::warn!(
                "streaming model call failed ({}); rotating key and retrying once",
                first_err
            );
            pool.mark_quota_exceeded(&key);

            let key = pool.next_key()?;
            let client = factory.client_for_key(&key);
            client
                .send_message_stream(messages)
                .await
                .map_err(HealthMeshError::from)
        }
    }
}

/// One role persona over the shared model: label, system prompt, and the
/// key-pool/factory pair used to reach the provider.
pub struct RoleAgent {
    /// Stable role label used in transcript entries, e.g. `"symptom_agent"`.
    pub label: &'static str,
    /// Human-readable display name for traces and UI surfaces, e.g. `"Symptom Agent"`.
    pub display_name: &'static str,
    system_prompt: &'static str,
    factory: Arc<dyn ClientFactory>,
    pool: Arc<KeyPool>,
}

impl RoleAgent {
    /// Severity/urgency triage only; never diagnoses.
    pub fn symptom(factory: Arc<dyn ClientFactory>, pool: Arc<KeyPool>) -> Self {
        RoleAgent {
            label: "symptom_agent",
            display_name: "Symptom Agent",
            system_prompt: SYMPTOM_SYSTEM_PROMPT,
            factory,
            pool,
        }
    }

    /// Sleep, stress, and routine guidance; invoked twice per run (raw symptoms,
    /// then a refined pass over the diet and fitness outputs).
    pub fn lifestyle(factory: Arc<dyn ClientFactory>, pool: Arc<KeyPool>) -> Self {
        RoleAgent {
            label: "lifestyle_agent",
            display_name: "Lifestyle Agent",
            system_prompt: LIFESTYLE_SYSTEM_PROMPT,
            factory,
            pool,
        }
    }

    /// Food preference/avoidance plan from symptoms, report text, lifestyle output,
    /// and retrieved knowledge snippets.
    pub fn diet(factory: Arc<dyn ClientFactory>, pool: Arc<KeyPool>) -> Self {
        RoleAgent {
            label: "diet_agent",
            display_name: "Diet Agent",
            system_prompt: DIET_SYSTEM_PROMPT,
            factory,
            pool,
        }
    }

    /// Low-intensity activity guidance with an explicit stop-if-discomfort instruction.
    pub fn fitness(factory: Arc<dyn ClientFactory>, pool: Arc<KeyPool>) -> Self {
        RoleAgent {
            label: "fitness_agent",
            display_name: "Fitness Agent",
            system_prompt: FITNESS_SYSTEM_PROMPT,
            factory,
            pool,
        }
    }

    /// Run this agent once against the shared transcript.
    ///
    /// Loads the current transcript, builds `[system] + transcript + [task]`, invokes
    /// the model via [`send_with_rotation`], appends `("[label] task", output)` to the
    /// transcript, and returns the output text.
    pub async fn run(
        &self,
        memory: &mut SessionMemory,
        task: &str,
    ) -> Result<String, HealthMeshError> {
        let mut messages = Vec::with_capacity(memory.len() * 2 + 2);
        messages.push(Message::system(self.system_prompt));
        messages.extend(memory.load());
        messages.push(Message::user(task));

        let reply = send_with_rotation(&*self.factory, &self.pool, &messages).await?;

        memory.append(format!("[{}] {}", self.label, task), reply.content.clone());

        log::debug!(
            "{}: produced {} chars (transcript now {} exchanges)",
            self.label,
            reply.content.len(),
            memory.len()
        );
        Ok(reply.content)
    }
}

/// Task message for the symptom agent.
pub fn symptom_task(symptoms: &str) -> String {
    format!(
        "Analyze these symptoms and their possible severity: {}",
        symptoms
    )
}

/// Task message for the lifestyle agent's first pass.
pub fn lifestyle_task(symptoms: &str) -> String {
    format!(
        "Given the conversation so far and these symptoms: {}, \
         suggest lifestyle changes and constraints.",
        symptoms
    )
}

/// Task message for the diet agent, embedding the optional medical report text, the
/// lifestyle agent's output, and the retrieved knowledge snippets.
pub fn diet_task(symptoms: &str, report: &str, lifestyle_notes: &str, kb: &str) -> String {
    format!(
        "User symptoms: {symptoms}\n\
         Relevant medical report text (may be empty): {report}\n\
         Lifestyle information from lifestyle_agent: {lifestyle_notes}\n\
         Evidence / knowledge base snippets: {kb}\n\n\
         Suggest a safe, balanced diet plan. Mention foods to prefer and foods to avoid. \
         Highlight that this is not a replacement for a dietician or doctor."
    )
}

/// Task message for the fitness agent, embedding the diet agent's output.
pub fn fitness_task(symptoms: &str, diet_notes: &str) -> String {
    format!(
        "User symptoms: {symptoms}\n\
         Diet constraints from diet_agent: {diet_notes}\n\n\
         Recommend only low-risk, gentle physical activities, \
         and clearly tell the user to stop if they feel pain or discomfort."
    )
}

/// Task message for the lifestyle agent's second, conflict-resolving pass over the
/// diet and fitness outputs.
pub fn refined_lifestyle_task(symptoms: &str, diet_notes: &str, fitness_notes: &str) -> String {
    format!(
        "Symptoms: {symptoms}\n\n\
         Diet plan summary:\n{diet_notes}\n\n\
         Fitness plan summary:\n{fitness_notes}\n\n\
         Adjust lifestyle guidance if any conflicts or overloads are detected."
    )
}
