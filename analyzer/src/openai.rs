//! OpenAI-compatible chat-completions provider.
//!
//! Covers every configured backend ("primary", "fast", "local") — anything
//! speaking the `/chat/completions` dialect. Sampling temperature is fixed
//! at configuration time; a parse failure triggers exactly one repair
//! request before the call is deemed permanently failed.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use govwatch_types::Verdict;

use crate::parse::parse_verdict;
use crate::prompt::Prompt;
use crate::provider::{AnalysisProvider, ProviderError};

/// Default per-call deadline for an LLM request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

const REPAIR_REQUEST: &str =
    "Your previous reply did not match the required schema. Please re-emit \
     your answer as exactly one JSON object in the schema, with no other text.";

/// Static configuration for one provider instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Tag recorded on verdicts, e.g. `primary`.
    pub name: String,
    /// Base URL up to but excluding `/chat/completions`.
    pub base_url: String,
    pub model: String,
    /// Bearer token; `None` for local backends that need no auth.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct ChatCompletionsProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// One round-trip: messages in, assistant text out.
    async fn complete(&self, messages: &[serde_json::Value]) -> Result<String, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": messages,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("bad completion envelope: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Transport("no choices in completion".to_string()))
    }
}

#[async_trait]
impl AnalysisProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn analyze(&self, prompt: &Prompt) -> Result<Verdict, ProviderError> {
        let mut messages = vec![
            json!({"role": "system", "content": prompt.system}),
            json!({"role": "user", "content": prompt.user}),
        ];

        let first = self.complete(&messages).await?;
        let first_error = match parse_verdict(&first, &self.config.name) {
            Ok(verdict) => return Ok(verdict),
            Err(e) => e,
        };

        tracing::debug!(
            provider = %self.config.name,
            error = %first_error,
            "provider output failed schema parse, requesting repair"
        );

        // One repair round, then the provider has permanently failed this
        // call.
        messages.push(json!({"role": "assistant", "content": first}));
        messages.push(json!({"role": "user", "content": REPAIR_REQUEST}));
        let second = self.complete(&messages).await?;
        parse_verdict(&second, &self.config.name).map_err(ProviderError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const GOOD_VERDICT: &str = r#"{
        "recommendation": "APPROVE",
        "confidence": 0.85,
        "reasoning": "Economically sound",
        "risk_assessment": "LOW"
    }"#;

    fn completion(content: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            name: "primary".to_string(),
            base_url,
            model: "test-model".to_string(),
            api_key: Some("key".to_string()),
            temperature: 0.1,
            timeout_secs: 2,
        }
    }

    fn sample_prompt() -> Prompt {
        Prompt {
            system: "system".to_string(),
            user: "user".to_string(),
            category: crate::prompt::Category::Other,
        }
    }

    #[tokio::test]
    async fn valid_first_reply_needs_no_repair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(GOOD_VERDICT)))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(server.uri())).unwrap();
        let verdict = provider.analyze(&sample_prompt()).await.unwrap();
        assert_eq!(verdict.provider, "primary");
        assert_eq!(verdict.confidence, 0.85);
    }

    #[tokio::test]
    async fn malformed_first_reply_triggers_one_repair() {
        let server = MockServer::start().await;
        // First call returns prose; the repair call returns valid JSON.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("I think yes!")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(GOOD_VERDICT)))
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(server.uri())).unwrap();
        let verdict = provider.analyze(&sample_prompt()).await.unwrap();
        assert_eq!(verdict.confidence, 0.85);

        // The repair request must include the schema reminder.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let body: Value = requests[1].body_json().unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert!(messages[3]["content"]
            .as_str()
            .unwrap()
            .contains("re-emit"));
    }

    #[tokio::test]
    async fn second_malformed_reply_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("still prose")))
            .expect(2)
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(server.uri())).unwrap();
        let err = provider.analyze(&sample_prompt()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(server.uri())).unwrap();
        let err = provider.analyze(&sample_prompt()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(server.uri())).unwrap();
        let err = provider.analyze(&sample_prompt()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(503)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn request_carries_fixed_temperature_and_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(GOOD_VERDICT)))
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(server.uri())).unwrap();
        provider.analyze(&sample_prompt()).await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 0.1);
    }
}
