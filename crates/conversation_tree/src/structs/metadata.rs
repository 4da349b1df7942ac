use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Details about the model call that produced a message.
///
/// Carried on the node as an opaque payload; the tree never reads it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LlmMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    /// Ordered by key so the persisted blob is byte-stable.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LlmMetadata {
    pub fn for_model(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            provider: Some(provider.into()),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.prompt_tokens = Some(prompt_tokens);
        self.completion_tokens = Some(completion_tokens);
        self.total_tokens = Some(prompt_tokens.saturating_add(completion_tokens));
        self
    }
}
