use crate::{
    client::CompletionClient,
    error::Error,
    naming::NamingOptions,
    outcome::{ProcessMode, ProcessingOutcome, SuccessRecord},
    template::PromptTemplates,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Structured reply expected for an item request.
#[derive(Debug, Deserialize)]
struct ItemReply {
    #[serde(rename = "processedContents", default)]
    processed_contents: Option<Value>,
}

/// Why a reply could not be turned into content.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplyError {
    /// The reply is not a JSON object
    Malformed(String),
    /// `processedContents` is absent or null
    Missing,
    /// `processedContents` is a boolean or number
    WrongType(&'static str),
}

impl std::fmt::Display for ReplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "Error parsing JSON response: {e}"),
            Self::Missing => f.write_str("response has no processedContents field"),
            Self::WrongType(kind) => write!(f, "processedContents is a {kind}, expected text"),
        }
    }
}

/// Decodes the reply text into processed content.
///
/// Strings are used as-is; objects and arrays are pretty-printed. Absent,
/// null, boolean and numeric values are rejected.
pub(crate) fn decode_reply(reply: &str) -> Result<String, ReplyError> {
    let value: Value =
        serde_json::from_str(reply).map_err(|e| ReplyError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ReplyError::Malformed("expected a JSON object".to_string()));
    }
    let decoded: ItemReply =
        serde_json::from_value(value).map_err(|e| ReplyError::Malformed(e.to_string()))?;

    match decoded.processed_contents {
        None | Some(Value::Null) => Err(ReplyError::Missing),
        Some(Value::String(text)) => Ok(text),
        Some(value @ (Value::Object(_) | Value::Array(_))) => serde_json::to_string_pretty(&value)
            .map_err(|e| ReplyError::Malformed(e.to_string())),
        Some(Value::Bool(_)) => Err(ReplyError::WrongType("boolean")),
        Some(Value::Number(_)) => Err(ReplyError::WrongType("number")),
    }
}

/// Turns one input into one [`ProcessingOutcome`].
///
/// Never returns an error: every failure along the way becomes
/// [`ProcessingOutcome::Failure`].
pub struct ItemProcessor<C> {
    client: Arc<C>,
    templates: Arc<PromptTemplates>,
    naming: NamingOptions,
}

impl<C> Clone for ItemProcessor<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            templates: Arc::clone(&self.templates),
            naming: self.naming.clone(),
        }
    }
}

impl<C: CompletionClient> ItemProcessor<C> {
    /// Creates a processor that names outputs with `naming`.
    #[must_use]
    pub fn new(client: Arc<C>, templates: Arc<PromptTemplates>, naming: NamingOptions) -> Self {
        Self {
            client,
            templates,
            naming,
        }
    }


    /// Processes one input.
    ///
    /// In [`ProcessMode::DryRun`] the composed request is returned as a
    /// preview and no call is made. Otherwise exactly one call is made and
    /// its reply decoded; there is no retry.
    pub async fn process(
        &self,
        rules: &str,
        content: &str,
        input_name: &str,
        mode: ProcessMode,
    ) -> ProcessingOutcome {
        let file_name = Path::new(input_name)
            .file_name()
            .map_or_else(|| input_name.to_string(), |n| n.to_string_lossy().into_owned());

        let messages = match self.templates.item_messages(rules, content, &file_name) {
            Ok(messages) => messages,
            Err(e) => return ProcessingOutcome::failure(input_name, e.to_string()),
        };

        if mode.is_dry_run() {
            let composed_request_text = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return ProcessingOutcome::DryRunPreview {
                input_name: input_name.to_string(),
                composed_request_text,
            };
        }

        debug!(input = input_name, "Calling completion service");

        let reply = match self.client.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                if let Error::Status { status, ref body } = e {
                    debug!(input = input_name, status, body = %body, "API response");
                }
                return ProcessingOutcome::failure(
                    input_name,
                    format!("Error calling completion service: {e}"),
                );
            }
        };

        match decode_reply(&reply) {
            Ok(content) => ProcessingOutcome::Success(SuccessRecord {
                output_file_name: self.naming.apply(&file_name),
                content,
            }),
            Err(e) => {
                warn!(input = input_name, raw_response = %reply, "Could not decode response");
                ProcessingOutcome::failure(input_name, e.to_string())
            }
        }
    }
}
