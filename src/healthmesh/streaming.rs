//! Streaming execution mode: the same pipeline, narrated live.
//!
//! Instead of returning one aggregate result, [`Orchestrator::stream_events`] re-runs
//! the identical agent sequence (including the second lifestyle pass) on a spawned
//! task and pushes incremental events through a bounded channel:
//!
//! - `{"type": "thought", "content": ...}` — which agent is handing off to which,
//!   with short previews (at most 160 characters) of intermediate outputs. A thought
//!   about an agent's output is only emitted after that agent's call has returned.
//! - `{"type": "answer", "content": ...}` — the synthesizer's output, forwarded
//!   chunk-by-chunk as it arrives from the model rather than all at once.
//!
//! The sequence is finite and terminates after a final delivery thought; it is not
//! restartable — each invocation is a fresh run with its own transcript. If the
//! consumer drops the receiving end, the next send fails and the producer stops at
//! that suspension point. A mid-run agent failure surfaces as a terminal thought and
//! closes the stream; it never hangs and never downgrades to an HTTP error mid-flight.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::healthmesh::agents::{
    diet_task, fitness_task, lifestyle_task, open_stream_with_rotation, refined_lifestyle_task,
    symptom_task, RoleAgent,
};
use crate::healthmesh::client_wrapper::Message;
use crate::healthmesh::memory::SessionMemory;
use crate::healthmesh::orchestrator::Orchestrator;

/// System instruction of the synthesizer call used by the streaming pipeline.
///
/// Unlike the batch synthesizer this asks for plain markdown, not JSON — the chunks
/// are rendered directly into the UI's answer bubble as they arrive.
const STREAM_SYNTH_SYSTEM_PROMPT: &str =
    "You are an orchestrator summarizing a mild to moderate health concern.\n\
     You receive outputs from:\n\
     - SymptomAgent (symptom profile)\n\
     - LifestyleAgent (may be called twice: initial + refined)\n\
     - DietAgent (diet & hydration plan)\n\
     - FitnessAgent (movement plan)\n\n\
     Produce a single safe wellness plan in markdown. \
     Do not diagnose or prescribe medicines.";

/// Maximum preview length embedded in hand-off thoughts.
const PREVIEW_CHARS: usize = 160;

/// One event of the live UI stream.
///
/// Serializes to the wire shape `{"type": "thought", "content": "..."}` /
/// `{"type": "answer", "content": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Agent-to-agent hand-off narration for the thought panel.
    Thought(String),
    /// An incremental piece of the final wellness plan.
    Answer(String),
}

/// First `PREVIEW_CHARS` characters of an agent output, for hand-off thoughts.
fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Send one event; evaluates to `false` when the consumer has gone away.
macro_rules! emit {
    ($tx:expr, $event:expr) => {
        if $tx.send($event).await.is_err() {
            log::debug!("stream consumer dropped; stopping pipeline");
            return;
        }
    };
}

/// Unwrap a pipeline step or narrate the failure and terminate the stream.
macro_rules! try_step {
    ($tx:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                log::error!("streaming pipeline aborted: {}", err);
                let _ = $tx
                    .send(StreamEvent::Thought(format!(
                        "Orchestrator → User: pipeline stopped early ({}).",
                        err
                    )))
                    .await;
                return;
            }
        }
    };
}

impl Orchestrator {
    /// Run the pipeline as a live event stream.
    ///
    /// The returned stream yields [`StreamEvent`]s in strict completion order and
    /// ends after the final delivery thought. Streaming runs are not persisted to
    /// the history store.
    pub fn stream_events(
        &self,
        symptoms: String,
        medical_report: String,
    ) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(32);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            orchestrator
                .run_streaming(tx, symptoms, medical_report)
                .await;
        });

        ReceiverStream::new(rx)
    }

    async fn run_streaming(
        self,
        tx: mpsc::Sender<StreamEvent>,
        symptoms: String,
        medical_report: String,
    ) {
        // Fresh transcript for this run, exactly as in the batch path.
        let mut memory = SessionMemory::new();

        let symptom_agent = RoleAgent::symptom(self.factory.clone(), self.pool.clone());
        let lifestyle_agent = RoleAgent::lifestyle(self.factory.clone(), self.pool.clone());
        let diet_agent = RoleAgent::diet(self.factory.clone(), self.pool.clone());
        let fitness_agent = RoleAgent::fitness(self.factory.clone(), self.pool.clone());

        // 1) Symptom agent
        emit!(
            tx,
            StreamEvent::Thought("User → Orchestrator: new wellness query received.".into())
        );
        emit!(
            tx,
            StreamEvent::Thought(
                "Orchestrator → SymptomAgent: analyze primary symptoms.".into()
            )
        );
        let symptom_result = try_step!(
            tx,
            symptom_agent.run(&mut memory, &symptom_task(&symptoms)).await
        );
        emit!(
            tx,
            StreamEvent::Thought(format!(
                "SymptomAgent → Orchestrator: symptom profile ready (example: {}...).",
                preview(&symptom_result)
            ))
        );

        // 2) Symptom → Diet + Lifestyle hand-offs
        emit!(
            tx,
            StreamEvent::Thought(
                "SymptomAgent → DietAgent: sending symptom profile for diet constraints.".into()
            )
        );
        emit!(
            tx,
            StreamEvent::Thought(
                "SymptomAgent → LifestyleAgent: sending symptom profile for lifestyle checks."
                    .into()
            )
        );

        // 3) Lifestyle agent, first pass
        let lifestyle_result = try_step!(
            tx,
            lifestyle_agent
                .run(&mut memory, &lifestyle_task(&symptoms))
                .await
        );
        emit!(
            tx,
            StreamEvent::Thought(format!(
                "LifestyleAgent → Orchestrator: first-pass lifestyle guidance ready \
                 (sleep, routine, stress). Example: {}...",
                preview(&lifestyle_result)
            ))
        );

        // 4) Diet agent, using symptoms + lifestyle constraints + retrieved snippets
        emit!(
            tx,
            StreamEvent::Thought(
                "Orchestrator → DietAgent: generate plan using symptoms + lifestyle constraints."
                    .into()
            )
        );
        let kb = self.knowledge.retrieve(&symptoms, 2);
        let diet_result = try_step!(
            tx,
            diet_agent
                .run(
                    &mut memory,
                    &diet_task(&symptoms, &medical_report, &lifestyle_result, &kb),
                )
                .await
        );
        emit!(
            tx,
            StreamEvent::Thought(format!(
                "DietAgent → Orchestrator: diet & hydration plan ready. Example: {}...",
                preview(&diet_result)
            ))
        );

        emit!(
            tx,
            StreamEvent::Thought(
                "DietAgent → FitnessAgent: sending energy & restriction profile \
                 to shape safe activity level."
                    .into()
            )
        );

        // 5) Fitness agent, using the diet restrictions
        let fitness_result = try_step!(
            tx,
            fitness_agent
                .run(&mut memory, &fitness_task(&symptoms, &diet_result))
                .await
        );
        emit!(
            tx,
            StreamEvent::Thought(format!(
                "FitnessAgent → Orchestrator: movement plan ready (light / restricted). \
                 Example: {}...",
                preview(&fitness_result)
            ))
        );

        emit!(
            tx,
            StreamEvent::Thought(
                "FitnessAgent → LifestyleAgent: sharing activity plan to detect \
                 conflicts with fatigue, sleep, or routine."
                    .into()
            )
        );

        // 6) Lifestyle agent, second pass over the diet and fitness outputs
        let refined_lifestyle = try_step!(
            tx,
            lifestyle_agent
                .run(
                    &mut memory,
                    &refined_lifestyle_task(&symptoms, &diet_result, &fitness_result),
                )
                .await
        );
        emit!(
            tx,
            StreamEvent::Thought(
                "LifestyleAgent → DietAgent & FitnessAgent: updated lifestyle \
                 constraints (sleep, stress, routine) shared for consistency."
                    .into()
            )
        );
        emit!(
            tx,
            StreamEvent::Thought(format!(
                "LifestyleAgent → Orchestrator: refined lifestyle guidance ready. Example: {}...",
                preview(&refined_lifestyle)
            ))
        );

        // 7) All agents → synthesizer, streamed chunk by chunk
        emit!(
            tx,
            StreamEvent::Thought(
                "Orchestrator → OutputSynthesizer: combining Symptom, Diet, \
                 Lifestyle, and Fitness outputs into one plan."
                    .into()
            )
        );

        let mut synth_messages = Vec::with_capacity(memory.len() * 2 + 2);
        synth_messages.push(Message::system(STREAM_SYNTH_SYSTEM_PROMPT));
        synth_messages.extend(memory.load());
        synth_messages.push(Message::user("Generate the wellness plan now."));

        let mut chunk_stream = try_step!(
            tx,
            open_stream_with_rotation(&*self.factory, &self.pool, &synth_messages).await
        );

        while let Some(chunk_result) = chunk_stream.next().await {
            match chunk_result {
                Ok(chunk) => {
                    if !chunk.content.is_empty() {
                        emit!(tx, StreamEvent::Answer(chunk.content));
                    }
                }
                Err(err) => {
                    // Once tokens have been delivered the stream is never restarted;
                    // the terminal thought below still closes the sequence cleanly.
                    log::error!("synthesizer stream failed mid-flight: {}", err);
                    break;
                }
            }
        }

        // 8) Final delivery
        emit!(
            tx,
            StreamEvent::Thought(
                "OutputSynthesizer → Orchestrator → User: final wellness plan delivered."
                    .into()
            )
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_caps_at_160_chars() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).chars().count(), 160);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn events_serialize_to_the_wire_shape() {
        let thought = StreamEvent::Thought("a → b".into());
        let answer = StreamEvent::Answer("chunk".into());

        assert_eq!(
            serde_json::to_string(&thought).unwrap(),
            "{\"type\":\"thought\",\"content\":\"a → b\"}"
        );
        assert_eq!(
            serde_json::to_string(&answer).unwrap(),
            "{\"type\":\"answer\",\"content\":\"chunk\"}"
        );
    }
}
