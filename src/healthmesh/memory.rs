//! Shared session memory for one orchestration run.
//!
//! Every agent in the pipeline reads the same ordered transcript and appends its own
//! exchange to it, so downstream agents see everything their predecessors produced.
//! The transcript is append-only for the lifetime of a run and is discarded with the
//! run — nothing persists across requests.
//!
//! One instance exists **per run**, owned by the orchestrator and lent to each agent
//! in turn. A process-wide shared transcript would leak one user's symptoms into
//! another user's run under concurrent load, so there is deliberately no global
//! instance anywhere in this crate.

use crate::healthmesh::client_wrapper::Message;

/// One agent exchange: the labelled input that was posed and the output produced.
#[derive(Clone, Debug)]
pub struct Exchange {
    /// Role label plus task summary, e.g. `"[symptom_agent] persistent headache"`.
    pub input: String,
    /// The agent's full output text.
    pub output: String,
}

/// Ordered, append-only transcript of all agent exchanges in one orchestration run.
#[derive(Default)]
pub struct SessionMemory {
    exchanges: Vec<Exchange>,
}

impl SessionMemory {
    /// Create an empty transcript for a fresh run.
    pub fn new() -> Self {
        SessionMemory::default()
    }

    /// Clear the transcript.
    ///
    /// Called at the start of a run when an instance is reused; a freshly
    /// constructed memory is already empty.
    pub fn reset(&mut self) {
        self.exchanges.clear();
    }

    /// Append one exchange. The only mutation allowed during a run.
    pub fn append(&mut self, input_label: impl Into<String>, output: impl Into<String>) {
        self.exchanges.push(Exchange {
            input: input_label.into(),
            output: output.into(),
        });
    }

    /// Render the transcript as an ordered sequence of role-tagged messages,
    /// ready to prepend to a model call: each exchange becomes a user message
    /// (the labelled input) followed by the assistant's reply.
    pub fn load(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.exchanges.len() * 2);
        for exchange in &self.exchanges {
            messages.push(Message::user(exchange.input.clone()));
            messages.push(Message::assistant(exchange.output.clone()));
        }
        messages
    }

    /// The raw exchanges, in insertion order.
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Number of exchanges recorded so far.
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// True when no agent has written yet.
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::healthmesh::client_wrapper::Role;

    #[test]
    fn load_renders_user_assistant_pairs_in_order() {
        let mut memory = SessionMemory::new();
        memory.append("[symptom_agent] headache", "sounds mild");
        memory.append("[lifestyle_agent] headache", "sleep more");

        let messages = memory.load();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "[symptom_agent] headache");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "sounds mild");
        assert_eq!(messages[2].content, "[lifestyle_agent] headache");
        assert_eq!(messages[3].content, "sleep more");
    }

    #[test]
    fn reset_clears_the_transcript() {
        let mut memory = SessionMemory::new();
        memory.append("[symptom_agent] fever", "rest");
        memory.reset();
        assert!(memory.is_empty());
        assert!(memory.load().is_empty());
    }
}
