use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Display and export preferences carried on the session. Opaque to the
/// generation pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub code_format: String,
    pub auto_save: bool,
    pub show_advanced: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            code_format: "auto".to_string(),
            auto_save: true,
            show_advanced: false,
        }
    }
}

/// Per-session conversation state. The history holds only user and
/// assistant turns; the system prompt is prepended at request time and is
/// never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub history: Vec<Message>,
    pub preferences: Preferences,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            preferences: Preferences::default(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(Message::assistant(content));
    }

    /// Empty the history, keeping the session id and preferences.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
