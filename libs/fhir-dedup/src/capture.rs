//! Alert sink for advisory conditions
//!
//! Advisories never interrupt a run; a [`Capture`] implementation must
//! return promptly and swallow its own failures.

use serde_json::Value;
use std::sync::Mutex;

pub trait Capture: Send + Sync {
    /// Report `text` with structured context
    fn message(&self, text: &str, extra: &Value);
}

/// Forwards advisories to `tracing` at warn level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCapture;

impl Capture for TracingCapture {
    fn message(&self, text: &str, extra: &Value) {
        tracing::warn!(extra = %extra, "{text}");
    }
}

/// Keeps every advisory in memory
#[derive(Debug, Default)]
pub struct RecordingCapture {
    messages: Mutex<Vec<(String, Value)>>,
}

impl RecordingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Value)> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Capture for RecordingCapture {
    fn message(&self, text: &str, extra: &Value) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push((text.to_string(), extra.clone()));
    }
}
