//! Round-robin API key rotation with per-key cooldown.
//!
//! LLM providers impose per-key rate and quota limits. Rotating across several keys
//! and temporarily benching a key that just failed converts hard quota errors into
//! soft, retryable degradation: the next call simply draws a different key, and the
//! benched key rejoins the rotation once its cooldown elapses.
//!
//! The pool is the only state shared across concurrent orchestration runs, so every
//! read-modify-write (select-and-rotate, mark-exhausted) happens under one mutex.
//!
//! # Example
//!
//! ```rust
//! use healthmesh::KeyPool;
//!
//! let pool = KeyPool::new(vec!["key-a".into(), "key-b".into()]);
//! let first = pool.next_key().unwrap();
//! pool.mark_quota_exceeded(&first);
//! // "key-a" is now benched; the pool keeps serving "key-b".
//! assert_eq!(pool.next_key().unwrap(), "key-b");
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::healthmesh::error::HealthMeshError;

/// How long to disable a key after a quota failure.
pub const COOLDOWN: Duration = Duration::from_secs(3600);

struct PoolState {
    /// Keys in current rotation order; the front is next up.
    rotation: Vec<String>,
    /// For each key, when it becomes usable again.
    available_at: HashMap<String, Instant>,
}

/// Thread-safe round-robin pool of provider API keys.
pub struct KeyPool {
    state: Mutex<PoolState>,
    cooldown: Duration,
}

impl KeyPool {
    /// Create a pool over the given keys, in initial rotation order.
    ///
    /// Blank keys are dropped. An empty pool is allowed but every
    /// [`next_key`](KeyPool::next_key) call on it fails.
    pub fn new(keys: Vec<String>) -> Self {
        let rotation: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        KeyPool {
            state: Mutex::new(PoolState {
                rotation,
                available_at: HashMap::new(),
            }),
            cooldown: COOLDOWN,
        }
    }

    /// Read keys from the `GROQ_API_KEY` environment variable
    /// (comma-separated: `GROQ_API_KEY=key1,key2,key3`).
    pub fn from_env() -> Self {
        let raw = std::env::var("GROQ_API_KEY").unwrap_or_default();
        Self::new(raw.split(',').map(str::to_string).collect())
    }

    /// Override the cooldown window. Mostly useful in tests.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Return the next available key, skipping keys in cooldown.
    ///
    /// The selected key is moved to the back of the rotation so that N consecutive
    /// calls over N fresh keys hand out each key exactly once.
    ///
    /// # Errors
    ///
    /// [`HealthMeshError::PoolExhausted`] when no key is configured or every key is
    /// currently benched.
    pub fn next_key(&self) -> Result<String, HealthMeshError> {
        let mut state = self.state.lock().unwrap();

        if state.rotation.is_empty() {
            return Err(HealthMeshError::PoolExhausted(
                "no GROQ_API_KEY configured".to_string(),
            ));
        }

        let now = Instant::now();
        let position = state.rotation.iter().position(|key| {
            state
                .available_at
                .get(key)
                .map(|at| *at <= now)
                .unwrap_or(true)
        });

        match position {
            Some(idx) => {
                let key = state.rotation.remove(idx);
                state.rotation.push(key.clone());
                Ok(key)
            }
            None => Err(HealthMeshError::PoolExhausted(
                "all API keys are currently in cooldown due to quota limits".to_string(),
            )),
        }
    }

    /// Mark a key as temporarily disabled because its quota was exceeded.
    ///
    /// The key stays in the rotation but is skipped by [`next_key`](KeyPool::next_key)
    /// until `now + cooldown`. Unknown keys are ignored.
    pub fn mark_quota_exceeded(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        if state.rotation.iter().any(|k| k == key) {
            let until = Instant::now() + self.cooldown;
            state.available_at.insert(key.to_string(), until);
            // Char-based suffix: keys are not guaranteed to be ASCII.
            let tail_start = key
                .char_indices()
                .rev()
                .nth(3)
                .map(|(i, _)| i)
                .unwrap_or(0);
            log::warn!(
                "KeyPool: key ending in …{} benched for {:?}",
                &key[tail_start..],
                self.cooldown
            );
        }
    }

    /// Number of keys in the pool, benched or not.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().rotation.len()
    }

    /// True when the pool has no keys at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
