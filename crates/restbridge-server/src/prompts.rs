//! Prompt store.
//!
//! A thin template store behind `prompts/list` and `prompts/get`. Templates
//! substitute `{argument}` placeholders from the request arguments.

use parking_lot::RwLock;

use restbridge_protocol::{Content, GetPromptResult, Prompt, PromptMessage, Role};

/// A registered prompt: definition plus message template.
#[derive(Debug, Clone)]
struct PromptEntry {
    prompt: Prompt,
    template: String,
}

/// In-memory prompt store.
#[derive(Debug, Default)]
pub struct PromptStore {
    entries: RwLock<Vec<PromptEntry>>,
}

impl PromptStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt with its template. Later registrations with the
    /// same name are ignored.
    pub fn register(&self, prompt: Prompt, template: impl Into<String>) {
        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.prompt.name == prompt.name) {
            return;
        }
        entries.push(PromptEntry {
            prompt,
            template: template.into(),
        });
    }

    /// True when nothing is registered; the server then omits the prompts
    /// capability.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All prompt definitions.
    pub fn list(&self) -> Vec<Prompt> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.prompt.clone())
            .collect()
    }

    /// Render a prompt with the given arguments.
    pub fn get(
        &self,
        name: &str,
        arguments: &std::collections::HashMap<String, String>,
    ) -> Option<GetPromptResult> {
        let entries = self.entries.read();
        let entry = entries.iter().find(|entry| entry.prompt.name == name)?;
        let mut text = entry.template.clone();
        for (key, value) in arguments {
            text = text.replace(&format!("{{{key}}}"), value);
        }
        Some(GetPromptResult {
            description: entry.prompt.description.clone(),
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(text),
            }],
        })
    }
}
