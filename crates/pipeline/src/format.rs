//! Formatter: render the final report.
//!
//! With a model credential the template, draft and collected signals go to
//! the formatter agent in one call; the reply is reduced to text and
//! sanitized. Without one the template is filled deterministically.

use crate::sanitize::sanitize;
use nippo_agent::AgentRegistry;
use nippo_config::{FormatFailurePolicy, FormatterConfig};
use nippo_core::error::{Error, ProviderError, Result};
use nippo_core::generation::{GenerateOptions, GenerationOutput, ToolResultBuffer};
use nippo_core::report::{CollectedData, Draft};
use nippo_core::tool::ToolRegistry;
use serde_json::Value;
use tracing::{debug, warn};

/// System prompt of the formatter agent.
pub const FORMATTER_INSTRUCTIONS: &str = "You are a nippo(日報) formatter.
You MUST use only the provided draft data and collected signals.
Follow the template as closely as possible.
Output must be Markdown text only.
Do not include secrets or API keys.";

const TEXT_FIELDS: &[&str] = &["text", "content", "output", "message", "result", "data"];

/// Today's date (UTC) as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Fill the template without a model.
///
/// The date token becomes the draft date, or today when the draft has none.
/// With `positional_placeholders` set, each placeholder token is replaced by
/// the draft value at the same position (empty when there is none).
pub fn fallback(template: &str, draft: &Draft, config: &FormatterConfig) -> String {
    let date = match draft.date.trim() {
        "" => today(),
        date => date.to_string(),
    };
    let mut output = template.replace(&config.date_token, &date);

    if config.positional_placeholders {
        for (i, token) in config.placeholder_tokens.iter().take(3).enumerate() {
            if token.is_empty() {
                continue;
            }
            let value = draft.values.get(i).map(String::as_str).unwrap_or("");
            output = output.replace(token.as_str(), value);
        }
    }

    output
}

/// The formatter prompt.
pub fn build_prompt(template: &str, draft: &Draft, collected: &CollectedData) -> Result<String> {
    Ok(format!(
        "## template\n{template}\n\n## draft(JSON)\n{}\n\n## collected(JSON)\n{}",
        serde_json::to_string_pretty(draft)?,
        serde_json::to_string_pretty(collected)?,
    ))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Reduce a generation output to text.
///
/// Plain text as is; else the first non-empty text field; else the first
/// choice's message or delta content; else the whole record serialized.
pub fn output_text(output: &GenerationOutput) -> String {
    let value = match output {
        GenerationOutput::Text(text) => return text.clone(),
        GenerationOutput::Structured(Value::String(text)) => return text.clone(),
        GenerationOutput::Structured(value) => value,
    };

    if let Some(text) = TEXT_FIELDS.iter().find_map(|key| non_empty_str(value.get(*key))) {
        return text.to_string();
    }

    let choice = value.get("choices").and_then(|c| c.get(0));
    let choice_text = choice.and_then(|c| {
        non_empty_str(c.get("message").and_then(|m| m.get("content")))
            .or_else(|| non_empty_str(c.get("delta").and_then(|d| d.get("content"))))
    });
    if let Some(text) = choice_text {
        return text.to_string();
    }

    value.to_string()
}

/// Renders reports.
pub struct Formatter {
    agents: AgentRegistry,
    credential_present: bool,
    config: FormatterConfig,
}

impl Formatter {
    pub fn new(agents: AgentRegistry, credential_present: bool) -> Self {
        Self {
            agents,
            credential_present,
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FormatterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Render the report. `collected` is expected to be summarized already.
    ///
    /// Fails only when generation fails and the configured policy is
    /// [`FormatFailurePolicy::Propagate`].
    pub async fn format(
        &self,
        model: &str,
        template: &str,
        draft: &Draft,
        collected: &CollectedData,
    ) -> Result<String> {
        if !self.credential_present {
            debug!("No model credential; using template fallback");
            return Ok(fallback(template, draft, &self.config));
        }

        let prompt = build_prompt(template, draft, collected)?;
        match self.generate(model, &prompt).await {
            Ok(output) => Ok(sanitize(&output_text(&output))),
            Err(e) => match self.config.on_generation_failure {
                FormatFailurePolicy::Propagate => Err(Error::Provider(e)),
                FormatFailurePolicy::Fallback => {
                    warn!(model, error = %e, "Formatter generation failed; using template fallback");
                    Ok(fallback(template, draft, &self.config))
                }
            },
        }
    }

    async fn generate(&self, model: &str, prompt: &str) -> std::result::Result<GenerationOutput, ProviderError> {
        let agent = self.agents.get_or_build(model, ToolRegistry::new())?;
        let mut buffer = ToolResultBuffer::new();
        agent.generate(prompt, &GenerateOptions::single_shot(), &mut buffer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nippo_core::generation::Generator;
    use nippo_core::report::{GithubItem, GithubItemType, ToolKey};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    fn draft(date: &str, values: &[&str]) -> Draft {
        Draft {
            date: date.into(),
            tools: BTreeSet::from([ToolKey::Github]),
            values: values.iter().map(|v| v.to_string()).collect(),
            repos: None,
        }
    }

    struct Canned {
        reply: std::result::Result<GenerationOutput, ProviderError>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Generator for Canned {
        async fn generate(
            &self,
            prompt: &str,
            _options: &GenerateOptions,
            _tool_results: &mut ToolResultBuffer,
        ) -> std::result::Result<GenerationOutput, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn formatter(
        reply: std::result::Result<GenerationOutput, ProviderError>,
        credential: bool,
    ) -> (Formatter, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&prompts);
        let agents = AgentRegistry::new(Arc::new(
            move |_model: &str, _tools: ToolRegistry| -> std::result::Result<Arc<dyn Generator>, ProviderError> {
                Ok(Arc::new(Canned {
                    reply: reply.clone(),
                    prompts: Arc::clone(&seen),
                }))
            },
        ));
        (Formatter::new(agents, credential), prompts)
    }

    #[test]
    fn fallback_replaces_date_token() {
        let out = fallback("# {{date}}", &draft("2024-01-01", &[]), &FormatterConfig::default());
        assert_eq!(out, "# 2024-01-01");
    }

    #[test]
    fn fallback_uses_today_for_blank_date() {
        let out = fallback("{{date}}", &draft("  ", &[]), &FormatterConfig::default());
        assert_eq!(out.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&out, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn positional_placeholders_are_opt_in() {
        let template = "{{date}}\n- {{dummy.todo1}}\n- {{dummy.todo2}}\n- {{dummy.next1}}";
        let d = draft("2024-01-01", &["login", "review"]);

        let off = fallback(template, &d, &FormatterConfig::default());
        assert!(off.contains("{{dummy.todo1}}"));

        let config = FormatterConfig {
            positional_placeholders: true,
            ..FormatterConfig::default()
        };
        let on = fallback(template, &d, &config);
        assert_eq!(on, "2024-01-01\n- login\n- review\n- ");
    }

    #[test]
    fn output_text_shape_ladder() {
        let cases = [
            (GenerationOutput::Text("plain".into()), "plain"),
            (GenerationOutput::Structured(json!({"text": "", "content": "c"})), "c"),
            (GenerationOutput::Structured(json!({"message": "m", "result": "r"})), "m"),
            (
                GenerationOutput::Structured(json!({"choices": [{"message": {"content": "msg"}}]})),
                "msg",
            ),
            (
                GenerationOutput::Structured(json!({"choices": [{"delta": {"content": "delta"}}]})),
                "delta",
            ),
            (GenerationOutput::Structured(json!({"n": 1})), "{\"n\":1}"),
        ];
        for (output, expected) in cases {
            assert_eq!(output_text(&output), expected);
        }
    }

    #[test]
    fn prompt_embeds_template_draft_and_collected() {
        let collected = CollectedData {
            github: vec![GithubItem::new(GithubItemType::Pr, "Add login", "https://x/p/1")],
            calendar: vec![],
        };
        let prompt = build_prompt("# {{date}}", &draft("2024-01-01", &["a"]), &collected).unwrap();
        assert!(prompt.starts_with("## template\n# {{date}}\n\n## draft(JSON)\n{"));
        assert!(prompt.contains("\n\n## collected(JSON)\n{"));
        assert!(prompt.contains("\"Add login\""));
    }

    #[tokio::test]
    async fn no_credential_never_calls_the_model() {
        let (formatter, prompts) = formatter(Ok(GenerationOutput::Text("model".into())), false);
        let out = formatter
            .format("m", "# {{date}}", &draft("2024-01-01", &[]), &CollectedData::empty())
            .await
            .unwrap();
        assert_eq!(out, "# 2024-01-01");
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_output_is_sanitized() {
        let reply = "# 2024-01-01\n- login\n\n## draft(JSON)\n```json\n{}\n```\nBye";
        let (formatter, prompts) = formatter(Ok(GenerationOutput::Text(reply.into())), true);
        let out = formatter
            .format("m", "# {{date}}", &draft("2024-01-01", &["login"]), &CollectedData::empty())
            .await
            .unwrap();
        assert_eq!(out, "# 2024-01-01\n- login\n\nBye");
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_propagates_by_default() {
        let (formatter, _) = formatter(Err(ProviderError::Timeout("60s".into())), true);
        let err = formatter
            .format("m", "# {{date}}", &draft("2024-01-01", &[]), &CollectedData::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn failure_can_fall_back() {
        let (formatter, _) = formatter(Err(ProviderError::Timeout("60s".into())), true);
        let formatter = formatter.with_config(FormatterConfig {
            on_generation_failure: FormatFailurePolicy::Fallback,
            ..FormatterConfig::default()
        });
        let out = formatter
            .format("m", "# {{date}}", &draft("2024-01-01", &[]), &CollectedData::empty())
            .await
            .unwrap();
        assert_eq!(out, "# 2024-01-01");
    }
}
