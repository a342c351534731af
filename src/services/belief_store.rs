use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde_json::Value;

use crate::domain::models::belief::{Belief, BeliefSource};

/// Shared, namespaced store of confidence-weighted facts (C3).
///
/// Writes are last-write-wins; TTL expiry is lazy, evaluated only when a key is read.
#[derive(Default)]
pub struct BeliefStore {
    beliefs: RwLock<HashMap<String, Belief>>,
}

impl BeliefStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: impl Into<String>, value: Value, confidence: f64, source: BeliefSource, ttl_seconds: Option<i64>) {
        let key = key.into();
        let belief = Belief::new(key.clone(), value, confidence, source, ttl_seconds);
        self.beliefs.write().expect("belief store lock poisoned").insert(key, belief);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Belief> {
        let beliefs = self.beliefs.read().expect("belief store lock poisoned");
        let belief = beliefs.get(key)?;
        if belief.is_expired(Utc::now()) {
            None
        } else {
            Some(belief.clone())
        }
    }

    /// Prefix match over keys; expired beliefs are filtered out.
    #[must_use]
    pub fn query(&self, partial_key: &str) -> Vec<(String, Belief)> {
        let now = Utc::now();
        self.beliefs
            .read()
            .expect("belief store lock poisoned")
            .iter()
            .filter(|(k, b)| k.starts_with(partial_key) && !b.is_expired(now))
            .map(|(k, b)| (k.clone(), b.clone()))
            .collect()
    }

    pub fn remove(&self, key: &str) {
        self.beliefs.write().expect("belief store lock poisoned").remove(key);
    }
}
