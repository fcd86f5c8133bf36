//! Command proposals from the language model.
//!
//! [`ProposalClient`] is the seam the controller talks to. [`OpenAiClient`]
//! is the production implementation against an OpenAI-compatible chat
//! completions API; [`MockProposalClient`] answers offline so the binary can
//! be exercised end to end without a network.

use crate::config::{Settings, FALLBACK_MODEL};
use crate::conversation::{ConversationMessage, Role};
use crate::error::{HowError, Result};
use crate::http_client::{HttpClient, HttpResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// One `{command, explanation, warning}` answer from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalOutput {
    pub command: String,
    pub explanation: String,
    #[serde(default)]
    pub warning: Option<String>,
}

/// A parsed proposal together with the raw assistant content it came from.
///
/// The raw content is what goes back into the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub output: ProposalOutput,
    pub raw: String,
}

/// Outcome of checking the configured model against the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelection {
    Configured(String),
    Fallback { requested: String, fallback: String },
}

impl ModelSelection {
    pub fn model(&self) -> &str {
        match self {
            ModelSelection::Configured(model) => model,
            ModelSelection::Fallback { fallback, .. } => fallback,
        }
    }

    /// User-facing notice, only for a substitution.
    pub fn notice(&self) -> Option<String> {
        match self {
            ModelSelection::Configured(_) => None,
            ModelSelection::Fallback { requested, fallback } => Some(format!(
                "Model {} is not available for your user. Downgrading to {} instead.",
                requested, fallback
            )),
        }
    }
}

#[async_trait]
pub trait ProposalClient: Send + Sync {
    /// Settles which model to use for the rest of the invocation.
    ///
    /// Called once, before the first proposal.
    async fn select_model(&mut self) -> Result<ModelSelection>;

    /// Asks the model for the next proposal given the whole conversation.
    async fn propose(&self, messages: &[ConversationMessage]) -> Result<Proposal>;
}

/// Parses and validates assistant content into a [`ProposalOutput`].
///
/// `command` must be a non-empty string, `explanation` a string, and
/// `warning` absent, null or a string. An empty warning counts as absent.
pub fn parse_proposal(content: &str) -> Result<ProposalOutput> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|e| HowError::MalformedResponse(format!("not valid JSON ({}): {}", e, content)))?;

    let object = value
        .as_object()
        .ok_or_else(|| HowError::MalformedResponse(format!("expected a JSON object, got: {}", content)))?;

    let command = match object.get("command") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => return Err(HowError::MalformedResponse("\"command\" is empty".to_string())),
        Some(_) => return Err(HowError::MalformedResponse("\"command\" is not a string".to_string())),
        None => return Err(HowError::MalformedResponse("missing \"command\"".to_string())),
    };

    let explanation = match object.get("explanation") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(HowError::MalformedResponse("\"explanation\" is not a string".to_string())),
        None => return Err(HowError::MalformedResponse("missing \"explanation\"".to_string())),
    };

    let warning = match object.get("warning") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(HowError::MalformedResponse("\"warning\" is not a string".to_string())),
    };

    Ok(ProposalOutput {
        command,
        explanation,
        warning,
    })
}

/// Pulls a readable message out of an `{"error": {...}}` envelope.
pub(crate) fn extract_api_error(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: Option<ApiError>,
    }
    #[derive(Deserialize)]
    struct ApiError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<Value>,
    }

    if let Ok(ErrorEnvelope { error: Some(err) }) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = err.message.unwrap_or_else(|| "unknown error".to_string());
        let kind = err.kind.unwrap_or_else(|| "unknown".to_string());
        let code = match err.code {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => "none".to_string(),
            Some(other) => other.to_string(),
        };
        return format!("{} (type={}, code={})", message, kind, code);
    }
    body.trim().to_string()
}

fn transport_error(response: &HttpResponse) -> HowError {
    HowError::Transport(format!(
        "HTTP {}: {}",
        response.status,
        extract_api_error(&response.body)
    ))
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelItem>,
}

#[derive(Debug, Deserialize)]
struct ModelItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Proposal client for an OpenAI-compatible API.
pub struct OpenAiClient {
    http: Box<dyn HttpClient>,
    api_key: String,
    base_url: String,
    model: String,
    fallback_model: String,
}

impl OpenAiClient {
    pub fn new(http: Box<dyn HttpClient>, api_key: impl Into<String>, settings: &Settings) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            fallback_model: FALLBACK_MODEL.to_string(),
        }
    }

    /// Model that requests are currently sent with.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// Lists the model ids available to this credential.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let auth = self.auth_header();
        let response = self
            .http
            .get(&url, &[("Authorization", auth.as_str())])
            .await
            .map_err(|e| HowError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(transport_error(&response));
        }

        let parsed: ModelsResponse = serde_json::from_str(&response.body)
            .map_err(|e| HowError::Transport(format!("failed to parse models response: {}", e)))?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl ProposalClient for OpenAiClient {
    async fn select_model(&mut self) -> Result<ModelSelection> {
        let available = self.list_models().await?;
        debug!("{} models available", available.len());

        if available.iter().any(|id| id == &self.model) {
            info!("Using configured model {}", self.model);
            return Ok(ModelSelection::Configured(self.model.clone()));
        }

        warn!("Model {} not available, falling back to {}", self.model, self.fallback_model);
        let requested = std::mem::replace(&mut self.model, self.fallback_model.clone());
        Ok(ModelSelection::Fallback {
            requested,
            fallback: self.model.clone(),
        })
    }

    async fn propose(&self, messages: &[ConversationMessage]) -> Result<Proposal> {
        let url = format!("{}/chat/completions", self.base_url);
        let auth = self.auth_header();
        let body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": { "type": "json_object" }
        });

        info!("Requesting proposal from {} with {} messages", self.model, messages.len());
        let response = self
            .http
            .post_json(&url, &[("Authorization", auth.as_str())], &body)
            .await
            .map_err(|e| HowError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(transport_error(&response));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&response.body)
            .map_err(|e| HowError::Transport(format!("failed to parse completion response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| HowError::MalformedResponse("no message content returned".to_string()))?;
        debug!("Assistant content: {}", content);

        let output = parse_proposal(&content)?;
        Ok(Proposal { output, raw: content })
    }
}

/// Offline client enabled with `HOW_USE_MOCK`.
///
/// Picks a command from keywords in the query. After a failure report it
/// answers with a command that succeeds.
pub struct MockProposalClient {
    model: String,
}

impl MockProposalClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }

    fn mock_output(&self, messages: &[ConversationMessage]) -> ProposalOutput {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if messages.iter().any(|m| m.role == Role::Assistant) {
            return ProposalOutput {
                command: "echo recovered".to_string(),
                explanation: "Prints a confirmation that the previous error was fixed".to_string(),
                warning: None,
            };
        }

        let query = last_user.to_lowercase();
        if query.contains("list") && query.contains("file") {
            ProposalOutput {
                command: "ls".to_string(),
                explanation: "Lists files".to_string(),
                warning: None,
            }
        } else if query.contains("broken") {
            ProposalOutput {
                command: "how-mock-missing-command".to_string(),
                explanation: "Runs a command that does not exist".to_string(),
                warning: None,
            }
        } else if query.contains("delete") || query.contains("remove") {
            ProposalOutput {
                command: "echo 'would delete files'".to_string(),
                explanation: "Pretends to delete files".to_string(),
                warning: Some("This would permanently delete files".to_string()),
            }
        } else {
            ProposalOutput {
                command: format!("echo '{}'", last_user.replace('\'', "")),
                explanation: "Echoes the request".to_string(),
                warning: None,
            }
        }
    }
}

#[async_trait]
impl ProposalClient for MockProposalClient {
    async fn select_model(&mut self) -> Result<ModelSelection> {
        Ok(ModelSelection::Configured(self.model.clone()))
    }

    async fn propose(&self, messages: &[ConversationMessage]) -> Result<Proposal> {
        let output = self.mock_output(messages);
        let raw = serde_json::to_string(&output)
            .map_err(|e| HowError::MalformedResponse(e.to_string()))?;
        Ok(Proposal { output, raw })
    }
}
