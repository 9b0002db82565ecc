use crate::completion::{build_http_client, CompletionClient, TextCompletion};
use crate::config::{AppConfig, PromptMode};
use crate::error::ServiceError;
use crate::image::{ImageClient, ImageGeneration};
use crate::logging;
use crate::prompts;
use crate::repair::repair_and_parse;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const API_KEY_MISSING_MESSAGE: &str = "API Key is not configured.";
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, I encountered an error.";
pub const UNEXPECTED_RESPONSE_MESSAGE: &str = "Sorry, I received an unexpected response.";

// ============ Envelope ============

/// Accept any JSON value for a text field; non-strings are kept as pretty JSON
fn text_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    })
}

/// Optional variant of `text_or_json`; null and blank become `None`
fn optional_text_or_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = text_or_json(deserializer)?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

/// Drop whatever the model put here; only the image client sets this field
fn discard<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    IgnoredAny::deserialize(deserializer)?;
    Ok(None)
}

const PACKAGE_TEXT_FIELDS: [&str; 4] = ["analysis", "refactored_code", "audit_report", "unit_test"];

/// The modernization package returned for `refactor_package` requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RefactorPackage {
    #[serde(default, deserialize_with = "text_or_json")]
    pub analysis: String,
    #[serde(default, deserialize_with = "text_or_json")]
    pub refactored_code: String,
    #[serde(default, deserialize_with = "text_or_json")]
    pub audit_report: String,
    #[serde(default, deserialize_with = "text_or_json")]
    pub unit_test: String,
    #[serde(
        default,
        deserialize_with = "optional_text_or_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub diagram_prompt: Option<String>,
    #[serde(default, deserialize_with = "discard", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Any extra keys the model chose to add
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{type, content}` response returned for every orchestrator call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ResponseEnvelope {
    RefactorPackage(RefactorPackage),
    Clarification(Value),
    WebsiteCode(Value),
    Answer(Value),
    Error(String),
}

impl ResponseEnvelope {
    pub fn error(message: &str) -> Self {
        ResponseEnvelope::Error(message.to_string())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ResponseEnvelope::RefactorPackage(_) => "refactor_package",
            ResponseEnvelope::Clarification(_) => "clarification",
            ResponseEnvelope::WebsiteCode(_) => "website_code",
            ResponseEnvelope::Answer(_) => "answer",
            ResponseEnvelope::Error(_) => "error",
        }
    }
}

fn parse_package(content: Value) -> Result<RefactorPackage, ServiceError> {
    let Some(object) = content.as_object() else {
        return Err(ServiceError::UnexpectedResponse(
            "refactor_package content is not an object".to_string(),
        ));
    };
    if !PACKAGE_TEXT_FIELDS.iter().any(|key| object.contains_key(*key)) {
        return Err(ServiceError::UnexpectedResponse(
            "refactor_package content has none of the package fields".to_string(),
        ));
    }
    serde_json::from_value(content)
        .map_err(|e| ServiceError::UnexpectedResponse(format!("invalid refactor_package: {}", e)))
}

/// Turn the model's `{type, content}` decision into an envelope,
/// rejecting anything outside the known types
fn envelope_from_decision(decision: Value) -> Result<ResponseEnvelope, ServiceError> {
    let Value::Object(mut object) = decision else {
        return Err(ServiceError::UnexpectedResponse(
            "decision is not a JSON object".to_string(),
        ));
    };

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .ok_or_else(|| ServiceError::UnexpectedResponse("decision has no type".to_string()))?;
    let content = object.remove("content").unwrap_or(Value::Null);

    match kind.as_str() {
        "refactor_package" => Ok(ResponseEnvelope::RefactorPackage(parse_package(content)?)),
        "clarification" => Ok(ResponseEnvelope::Clarification(content)),
        "website_code" => Ok(ResponseEnvelope::WebsiteCode(content)),
        "answer" => Ok(ResponseEnvelope::Answer(content)),
        other => Err(ServiceError::UnexpectedResponse(format!(
            "unknown response type '{}'",
            other
        ))),
    }
}

/// Direct mode: the decision is the package itself. A model that wraps it
/// in `{type: "refactor_package", content}` anyway is unwrapped; any other
/// `type` means the model answered something that is not a package.
fn package_from_direct(mut decision: Value) -> Result<ResponseEnvelope, ServiceError> {
    if let Some(object) = decision.as_object_mut() {
        if let Some(kind) = object.remove("type") {
            if kind.as_str().map(|k| k.trim().to_lowercase()).as_deref() != Some("refactor_package") {
                return Err(ServiceError::UnexpectedResponse(format!(
                    "direct mode got response type {}",
                    kind
                )));
            }
            if let Some(content) = object.remove("content") {
                return Ok(ResponseEnvelope::RefactorPackage(parse_package(content)?));
            }
        }
    }
    Ok(ResponseEnvelope::RefactorPackage(parse_package(decision)?))
}

// ============ Orchestrator ============

pub struct Orchestrator {
    mode: PromptMode,
    has_credential: bool,
    completion: Arc<dyn TextCompletion>,
    images: Arc<dyn ImageGeneration>,
}

impl Orchestrator {
    pub fn new(
        mode: PromptMode,
        has_credential: bool,
        completion: Arc<dyn TextCompletion>,
        images: Arc<dyn ImageGeneration>,
    ) -> Self {
        Self {
            mode,
            has_credential,
            completion,
            images,
        }
    }

    /// Build the HTTP-backed orchestrator described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = build_http_client()?;
        let api_key = config.api_key.clone().unwrap_or_default();

        let completion = CompletionClient::new(
            http.clone(),
            &config.api_url,
            &config.completion_model,
            &api_key,
        );
        let images = ImageClient::new(http, &config.image_api_url, &config.image_model, &api_key);

        Ok(Self::new(
            config.mode,
            config.api_key.is_some(),
            Arc::new(completion),
            Arc::new(images),
        ))
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    /// Handle one chat message. Always yields exactly one envelope.
    pub async fn handle_user_request(
        &self,
        user_input: &str,
        target_language: Option<&str>,
    ) -> ResponseEnvelope {
        let request_id = Uuid::new_v4().to_string();
        let target_language = target_language.map(str::trim).filter(|t| !t.is_empty());
        logging::log_request(
            Some(&request_id),
            &format!(
                "Handling request: mode={}, input_chars={}, target={}",
                self.mode.as_str(),
                user_input.chars().count(),
                target_language.unwrap_or("-")
            ),
        );

        match self.run(&request_id, user_input, target_language).await {
            Ok(envelope) => {
                logging::log_request(
                    Some(&request_id),
                    &format!("Completed with type={}", envelope.type_name()),
                );
                envelope
            }
            Err(e) => {
                logging::log_error(
                    Some(&request_id),
                    &format!("An error occurred in the orchestrator: {}", e),
                );
                ResponseEnvelope::Error(self.error_message(&e))
            }
        }
    }

    async fn run(
        &self,
        request_id: &str,
        user_input: &str,
        target_language: Option<&str>,
    ) -> Result<ResponseEnvelope, ServiceError> {
        if !self.has_credential {
            return Err(ServiceError::Configuration);
        }

        let prompt = match self.mode {
            PromptMode::Direct => prompts::direct_prompt(user_input, target_language),
            PromptMode::Classifying => prompts::classifying_prompt(user_input, target_language),
        };

        let raw = self.completion.complete(&prompt, None).await?;
        logging::log_completion(
            Some(request_id),
            &format!("Got completion, length: {}", raw.len()),
        );

        let decision = repair_and_parse(self.completion.as_ref(), &raw, Some(request_id)).await?;

        let mut envelope = match self.mode {
            PromptMode::Direct => package_from_direct(decision)?,
            PromptMode::Classifying => envelope_from_decision(decision)?,
        };

        if let ResponseEnvelope::RefactorPackage(package) = &mut envelope {
            self.attach_diagram(request_id, package).await;
        }

        Ok(envelope)
    }

    /// Generate the flowchart image. Failure leaves `image_url` unset.
    async fn attach_diagram(&self, request_id: &str, package: &mut RefactorPackage) {
        package.image_url = None;

        let Some(prompt) = package
            .diagram_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            return;
        };

        match self.images.generate_image(prompt).await {
            Some(url) => {
                logging::log_image(Some(request_id), "Diagram generated");
                package.image_url = Some(url);
            }
            None => {
                logging::log_image(
                    Some(request_id),
                    "Diagram generation failed, returning package without image",
                );
            }
        }
    }

    fn error_message(&self, error: &ServiceError) -> String {
        match (self.mode, error) {
            (_, ServiceError::Configuration) => API_KEY_MISSING_MESSAGE.to_string(),
            (_, ServiceError::UnexpectedResponse(_)) => UNEXPECTED_RESPONSE_MESSAGE.to_string(),
            (PromptMode::Classifying, e) => match e.status() {
                Some(status) => format!(
                    "The AI service returned an error (HTTP {}). Please try again.",
                    status
                ),
                None => GENERIC_ERROR_MESSAGE.to_string(),
            },
            (PromptMode::Direct, _) => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}
