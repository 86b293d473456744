//! Generation parameters.
//!
//! [`GenerationConfig`] holds the provider-agnostic knobs a prompt or a
//! call can set. Provider-specific settings go into `extra`, which is
//! forwarded untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Settings for model generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Top-p (nucleus) sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Top-k sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u64>,

    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Extra provider-specific settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Map<String, JsonValue>>,
}

impl GenerationConfig {
    /// Create new empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max output tokens.
    #[must_use]
    pub fn max_output_tokens(mut self, tokens: u64) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Set temperature.
    #[must_use]
    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set top-p.
    #[must_use]
    pub fn top_p(mut self, p: f64) -> Self {
        self.top_p = Some(p);
        self
    }

    /// Set top-k.
    #[must_use]
    pub fn top_k(mut self, k: u64) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Set stop sequences.
    #[must_use]
    pub fn stop_sequences(mut self, stops: Vec<String>) -> Self {
        self.stop_sequences = Some(stops);
        self
    }

    /// Set one provider-specific value.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extra
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Layer `overrides` on top of `self`.
    ///
    /// Every field set in `overrides` wins; `extra` maps are merged key by key.
    #[must_use]
    pub fn merge(&self, overrides: &GenerationConfig) -> GenerationConfig {
        let extra = match (&self.extra, &overrides.extra) {
            (Some(base), Some(top)) => {
                let mut merged = base.clone();
                merged.extend(top.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(merged)
            }
            (base, top) => top.clone().or_else(|| base.clone()),
        };
        GenerationConfig {
            max_output_tokens: overrides.max_output_tokens.or(self.max_output_tokens),
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            top_k: overrides.top_k.or(self.top_k),
            stop_sequences: overrides
                .stop_sequences
                .clone()
                .or_else(|| self.stop_sequences.clone()),
            extra,
        }
    }

    /// Whether nothing is set.
    pub fn is_empty(&self) -> bool {
        *self == GenerationConfig::default()
    }
}
