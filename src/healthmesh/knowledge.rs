//! Keyword lookup over a static local snippet corpus.
//!
//! A very lightweight retriever feeding the diet agent: the query is lowercased and
//! whitespace-tokenized, and a snippet matches when any token appears as a substring
//! of the snippet's lowercased content. There is no ranking, stemming, or scoring —
//! a known limitation of this corpus-order keyword match, kept on purpose for a
//! small, static knowledge base.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One entry of the local knowledge base.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    /// Free-text content of the snippet.
    pub content: String,
}

/// Static, read-only corpus loaded once at process start.
#[derive(Default)]
pub struct KnowledgeBase {
    snippets: Vec<KnowledgeSnippet>,
}

impl KnowledgeBase {
    /// Load the corpus from a JSON file shaped as `[{"content": "..."}, ...]`.
    ///
    /// A missing or unreadable file yields an empty corpus rather than an error —
    /// retrieval then simply contributes no context.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let snippets = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<KnowledgeSnippet>>(&raw) {
                Ok(snippets) => snippets,
                Err(err) => {
                    log::warn!(
                        "KnowledgeBase: failed to parse {}: {}; continuing with empty corpus",
                        path.display(),
                        err
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        KnowledgeBase { snippets }
    }

    /// Build a corpus directly from snippets. Useful in tests.
    pub fn from_snippets(snippets: Vec<KnowledgeSnippet>) -> Self {
        KnowledgeBase { snippets }
    }

    /// Return up to `top_k` matching snippets in corpus order, newline-joined.
    ///
    /// Returns the empty string when the corpus is empty or nothing matches.
    pub fn retrieve(&self, query: &str, top_k: usize) -> String {
        if self.snippets.is_empty() {
            return String::new();
        }

        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();
        if tokens.is_empty() {
            return String::new();
        }

        let hits: Vec<&str> = self
            .snippets
            .iter()
            .filter(|snippet| {
                let content = snippet.content.to_lowercase();
                tokens.iter().any(|token| content.contains(token))
            })
            .take(top_k)
            .map(|snippet| snippet.content.as_str())
            .collect();

        hits.join("\n")
    }

    /// Number of snippets loaded.
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// True when no corpus was loaded.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}
