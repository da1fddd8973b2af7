//! OpenAI-compatible chat-completion wire types.

use serde::{Deserialize, Serialize};

/// Inbound body of `POST /v1/chat/completions`.
///
/// `max_tokens`, `temperature`, and `top_p` are accepted for compatibility but
/// have no effect: generation is performed by whatever AI chat the operator
/// pastes the transcript into.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stream: bool,
}

/// One role/content pair of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Outbound completion body: `{id, object, created, model, choices}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub finish_reason: String,
    pub message: ChatMessage,
}

impl ChatCompletionResponse {
    /// Single-choice assistant completion echoing the requested model.
    pub fn assistant(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                finish_reason: "stop".to_string(),
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: content.into(),
                },
            }],
        }
    }
}

/// OpenAI-style error body: `{"error": {"message", "type"}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub typ: String,
}

impl ErrorBody {
    pub fn new(typ: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                typ: typ.into(),
            },
        }
    }
}

/// Flatten the message sequence into the transcript published to the medium:
/// one `role: content` line per message, newline-joined.
pub fn flatten_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_is_one_line_per_message() {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: "be brief".to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            },
        ];
        assert_eq!(
            flatten_transcript(&messages),
            "system: be brief\nuser: hello"
        );
    }

    #[test]
    fn transcript_of_no_messages_is_empty() {
        assert_eq!(flatten_transcript(&[]), "");
    }

    #[test]
    fn request_parses_with_optional_fields_absent() {
        let body = r#"{"model": "gpt-x", "messages": [{"role": "user", "content": "hi"}]}"#;
        let req: ChatCompletionRequest = serde_json::from_str(body).expect("parse");
        assert_eq!(req.model, "gpt-x");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.max_tokens, None);
        assert!(!req.stream);
    }

    #[test]
    fn assistant_response_has_the_fixed_shape() {
        let res = ChatCompletionResponse::assistant("gpt-x", "Hi there!");
        assert!(res.id.starts_with("chatcmpl-"));
        assert_eq!(res.object, "chat.completion");
        assert_eq!(res.model, "gpt-x");
        assert_eq!(res.choices.len(), 1);
        assert_eq!(res.choices[0].index, 0);
        assert_eq!(res.choices[0].finish_reason, "stop");
        assert_eq!(res.choices[0].message.role, "assistant");
        assert_eq!(res.choices[0].message.content, "Hi there!");
    }
}
