//! Parse model output as JSON, with one model-assisted repair on failure.
//!
//! The pipeline is strictly `parse -> (repair -> parse)`; the second parse
//! result is final.

use crate::completion::TextCompletion;
use crate::error::ServiceError;
use crate::logging;
use crate::prompts;
use serde_json::Value;

/// Output cap for the repair call
pub const REPAIR_MAX_TOKENS: u32 = 4096;

/// Remove a surrounding ```json / ``` fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse `raw` as JSON; on failure ask the model once to fix it.
pub async fn repair_and_parse(
    client: &dyn TextCompletion,
    raw: &str,
    request_id: Option<&str>,
) -> Result<Value, ServiceError> {
    let parse_error = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    logging::log_repair(
        request_id,
        &format!(
            "Model output is not valid JSON ({}), attempting repair. Output: {}",
            parse_error,
            truncate(raw, 200)
        ),
    );

    let repaired = client
        .complete(&prompts::repair_prompt(raw), Some(REPAIR_MAX_TOKENS))
        .await?;
    let cleaned = strip_code_fence(&repaired);

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => {
            logging::log_repair(request_id, "JSON repair succeeded");
            Ok(value)
        }
        Err(e) => {
            logging::log_error(
                request_id,
                &format!("JSON repair failed: {}. Output: {}", e, truncate(cleaned, 200)),
            );
            Err(ServiceError::Decode(e))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
