//! Turn and Part domain types.
//!
//! These are the value objects that flow through the whole system: a user
//! message becomes a user `Turn` of ordered `Part`s, the engine answers with
//! a model `Turn`, and the full sequence is what the session store persists.
//!
//! `Part` serializes in the engine's wire shape (camelCase single-key
//! objects), so a persisted history can be fed back to the engine verbatim.

use serde::{Deserialize, Serialize};

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (also carries system preamble and tool results).
    User,
    /// The conversational engine.
    Model,
}

/// Inline binary payload (image or audio), base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the payload (e.g., "image/jpeg", "audio/ogg").
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// A tool invocation requested by the engine, embedded in a model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// A tool result fed back to the engine, embedded in a user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

/// One content part of a turn.
///
/// Exactly one wire key per variant; the untagged representation matches the
/// engine's `contents[].parts[]` schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an inline-data part from a MIME type and base64 payload.
    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    /// Create a function-call part.
    pub fn function_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self::FunctionCall {
            function_call: FunctionCall {
                name: name.into(),
                args,
            },
        }
    }

    /// Create a function-response part. The result string is wrapped in the
    /// `{name, content}` object the engine expects.
    pub fn function_response(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self::FunctionResponse {
            function_response: FunctionResponse {
                name: name.clone(),
                response: serde_json::json!({
                    "name": name,
                    "content": content.into(),
                }),
            },
        }
    }

    /// The inline payload of this part, if it carries one.
    pub fn as_inline_data(&self) -> Option<&InlineData> {
        match self {
            Self::InlineData { inline_data } => Some(inline_data),
            _ => None,
        }
    }

    /// The text of this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One role-tagged exchange unit composed of ordered content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// Create a user turn.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Create a model turn.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Create a user turn holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// Create a model turn holding a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![Part::text(text)])
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}
