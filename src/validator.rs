use crate::{
    client::CompletionClient,
    error::{Error, Result},
    template::PromptTemplates,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The validator's judgement of a rule document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVerdict {
    /// Explicit validity flag; anything but `Some(true)` counts as invalid
    #[serde(default)]
    pub is_valid: Option<bool>,

    /// Short explanation
    #[serde(default)]
    pub reason: Option<String>,

    /// Kind of transformation the prompt describes
    #[serde(default)]
    pub prompt_type: Option<String>,
}

impl PromptVerdict {
    /// Returns true only for an explicit `isValid: true`.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.is_valid == Some(true)
    }

    /// Returns the reason, or a placeholder when none was given.
    #[must_use]
    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or("no reason given")
    }
}

/// Pre-flight check of a rule document before a multi-file run.
pub struct PromptValidator<C> {
    client: Arc<C>,
    templates: Arc<PromptTemplates>,
}

impl<C: CompletionClient> PromptValidator<C> {
    /// Creates a validator sharing the item pipeline's client and templates.
    #[must_use]
    pub const fn new(client: Arc<C>, templates: Arc<PromptTemplates>) -> Self {
        Self { client, templates }
    }

    /// Asks the service to judge `rules` and returns its verdict if accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PromptRejected`] if the request fails, the reply
    /// cannot be decoded, or the verdict is not an explicit `isValid: true`.
    pub async fn check(&self, rules: &str) -> Result<PromptVerdict> {
        let messages = self
            .templates
            .validation_messages(rules)
            .map_err(|e| rejected(format!("could not compose validation request: {e}")))?;

        let reply = self
            .client
            .complete(&messages)
            .await
            .map_err(|e| rejected(format!("validation request failed: {e}")))?;

        let verdict = serde_json::from_str::<PromptVerdict>(&reply).map_err(|e| {
            warn!(raw_response = %reply, "Validation response");
            rejected(format!("could not parse validation response: {e}"))
        })?;

        if !verdict.accepted() {
            return Err(rejected(verdict.reason_or_default()));
        }

        info!(
            prompt_type = verdict.prompt_type.as_deref().unwrap_or("unknown"),
            "Prompt validation successful: {}",
            verdict.reason_or_default()
        );
        Ok(verdict)
    }

    /// Returns true only if the service explicitly accepts `rules`.
    ///
    /// Transport failures, undecodable replies and a missing or `false`
    /// flag all yield `false`.
    pub async fn validate(&self, rules: &str) -> bool {
        match self.check(rules).await {
            Ok(_) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }
}

fn rejected(reason: impl Into<String>) -> Error {
    Error::PromptRejected {
        reason: reason.into(),
    }
}
