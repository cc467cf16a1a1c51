//! Generative model adapters.
//!
//! A [`GenerativeModel`] turns one prompt input into one [`Payload`]. Each
//! instance is bound at construction to a single operation: its prompt
//! template, the output shape it expects, and its decoding parameters are
//! fixed and never change while serving requests. Adapters hold no
//! per-call mutable state and never retry; retry policy belongs to the
//! caller.
//!
//! [`ModelSet`] pairs one adapter per [`Operation`] so the cache can pick
//! the right one from the key alone.

pub mod vertex;

pub use vertex::VertexClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{Operation, Payload};

/// Shape the model is instructed to put in its `response` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// A JSON object (emotion profiles).
    Structured,
    /// A plain string (tagged lyrics).
    PlainText,
}

impl ResponseShape {
    /// Shape used for an operation.
    pub fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::Profile => ResponseShape::Structured,
            Operation::Tags => ResponseShape::PlainText,
        }
    }
}

/// Decoding parameters applied to every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,
    /// Nucleus sampling threshold. Default: 0.95.
    pub top_p: f32,
    /// Upper bound on generated tokens. Default: 1000.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.95,
            max_output_tokens: 1000,
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = n;
        self
    }
}

/// Prompt template and expected output for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub template: String,
    pub shape: ResponseShape,
    /// MIME type the model is asked to answer in.
    pub response_mime_type: String,
}

impl PromptSpec {
    /// Spec with the shape matching `operation` and a JSON envelope.
    pub fn for_operation(operation: Operation, template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            shape: ResponseShape::for_operation(operation),
            response_mime_type: "application/json".to_string(),
        }
    }

    /// Full prompt: template, newline, input.
    pub fn render(&self, input: &str) -> String {
        format!("{}\n{}", self.template, input)
    }
}

/// Synchronous request/response access to a text-generation model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Adapter name for diagnostics.
    fn name(&self) -> &str;

    /// Generate a payload for `prompt_input`.
    ///
    /// Fails with a [`ModelError`](crate::ModelError) kind; never retries.
    async fn generate(&self, prompt_input: &str) -> Result<Payload>;
}

/// One model adapter per operation.
#[derive(Clone)]
pub struct ModelSet {
    profile: Arc<dyn GenerativeModel>,
    tags: Arc<dyn GenerativeModel>,
}

impl ModelSet {
    pub fn new(profile: Arc<dyn GenerativeModel>, tags: Arc<dyn GenerativeModel>) -> Self {
        Self { profile, tags }
    }

    pub fn for_operation(&self, operation: Operation) -> &Arc<dyn GenerativeModel> {
        match operation {
            Operation::Profile => &self.profile,
            Operation::Tags => &self.tags,
        }
    }
}
