use crate::{
    client::ChatMessage,
    error::{Error, Result},
};
use serde::Serialize;
use tera::{Context, Tera};

const ITEM_TEMPLATE: &str = "item";
const VALIDATION_TEMPLATE: &str = "validation";

/// System instruction sent with every item request.
pub const ITEM_SYSTEM_PROMPT: &str =
    "You are a file processing assistant. Follow the rules below to process the provided file content.";

/// System instruction sent with the prompt validation request.
pub const VALIDATION_SYSTEM_PROMPT: &str = "You are a prompt validation assistant.";

const ITEM_USER_TEMPLATE: &str = r#"
# Rules
{{ rules }}

# File
```
{{ content }}
```

Process the provided File contents using the Rules, then return the results in the following JSON format only:
{
  "filename": "{{ filename }}",
  "processedContents": "processed file content here"
}

Only return valid JSON that matches this schema exactly. Do not include any explanations, markdown formatting, or other text outside the JSON."#;

const VALIDATION_USER_TEMPLATE: &str = r#"
Please evaluate the following formatting prompt and decide if it is a valid formatting prompt that can be used to modify the format of an existing text file and transform it into a new text file.

# Prompt to evaluate
{{ rules }}

Return only JSON in the following format:
{
  "isValid": true/false,
  "reason": "Brief explanation of your decision",
  "promptType": "Short label for the kind of transformation, e.g. test-generation, code-review, reformatting"
}"#;

#[derive(Serialize)]
struct ItemContext<'a> {
    rules: &'a str,
    content: &'a str,
    filename: &'a str,
}

#[derive(Serialize)]
struct ValidationContext<'a> {
    rules: &'a str,
}

/// Renders the request messages sent to the completion service.
///
/// Values are embedded verbatim; templates are registered under names without
/// an HTML extension so tera never escapes them.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    /// Creates the engine with the built-in templates registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to compile.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        tera.add_raw_template(ITEM_TEMPLATE, ITEM_USER_TEMPLATE)
            .map_err(|e| Error::template(ITEM_TEMPLATE, &e))?;
        tera.add_raw_template(VALIDATION_TEMPLATE, VALIDATION_USER_TEMPLATE)
            .map_err(|e| Error::template(VALIDATION_TEMPLATE, &e))?;

        Ok(Self { tera })
    }

    /// Renders the user message for one item.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render_item(&self, rules: &str, content: &str, filename: &str) -> Result<String> {
        let ctx = ItemContext {
            rules,
            content,
            filename,
        };
        self.render(ITEM_TEMPLATE, &ctx)
    }

    /// Renders the user message for prompt validation.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render_validation(&self, rules: &str) -> Result<String> {
        self.render(VALIDATION_TEMPLATE, &ValidationContext { rules })
    }

    /// Builds the full message list for one item.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn item_messages(
        &self,
        rules: &str,
        content: &str,
        filename: &str,
    ) -> Result<Vec<ChatMessage>> {
        Ok(vec![
            ChatMessage::system(ITEM_SYSTEM_PROMPT),
            ChatMessage::user(self.render_item(rules, content, filename)?),
        ])
    }

    /// Builds the full message list for prompt validation.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn validation_messages(&self, rules: &str) -> Result<Vec<ChatMessage>> {
        Ok(vec![
            ChatMessage::system(VALIDATION_SYSTEM_PROMPT),
            ChatMessage::user(self.render_validation(rules)?),
        ])
    }

    fn render<T: Serialize>(&self, name: &str, ctx: &T) -> Result<String> {
        let context = Context::from_serialize(ctx).map_err(|e| Error::template(name, &e))?;
        self.tera
            .render(name, &context)
            .map_err(|e| Error::template(name, &e))
    }
}
