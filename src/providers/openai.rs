use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EffectiveSettings;
use crate::providers::http_errors::api_request_error;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Sends one user message to an OpenAI-compatible chat-completion endpoint
/// and returns the first choice's content, trimmed.
pub async fn complete(client: &Client, settings: &EffectiveSettings, message: &str) -> Result<String> {
    let api_url = completions_url(&settings.base_url);
    let body = ChatCompletionRequest {
        model: &settings.model,
        messages: vec![ChatMessage {
            role: "user",
            content: message,
        }],
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    };
    debug!(
        api_url = %api_url,
        model = %settings.model,
        message_len = message.len(),
        "sending chat completion request"
    );

    let response = client
        .post(&api_url)
        .bearer_auth(&settings.api_key)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            warn!(
                api_url = %api_url,
                model = %settings.model,
                error = %err,
                "chat completion request failed"
            );
            api_request_error(err, &api_url)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        warn!(
            api_url = %api_url,
            model = %settings.model,
            status = %status,
            response_body_len = response_body.len(),
            "chat completion returned non-success status"
        );
        return Err(anyhow!(
            "Chat completion failed with status {}: {}",
            status,
            response_body
        ));
    }

    let parsed: ChatCompletionResponse = response
        .json()
        .await
        .context("Failed to parse chat completion response")?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("Chat completion response contained no message content"))?;
    debug!(
        model = %settings.model,
        response_len = content.len(),
        "received chat completion response"
    );
    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{complete, completions_url};
    use crate::config::EffectiveSettings;

    fn settings_for(base_url: String) -> EffectiveSettings {
        EffectiveSettings {
            api_key: "sk-test".to_string(),
            base_url,
            model: "test-model".to_string(),
            temperature: 0.5,
            max_tokens: 150,
        }
    }

    #[test]
    fn completions_url_trims_trailing_slash() {
        assert_eq!(
            completions_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn sends_bearer_auth_and_user_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 150,
                "temperature": 0.5,
                "messages": [{"role": "user", "content": "hello there"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  general kenobi \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = complete(
            &Client::new(),
            &settings_for(format!("{}/v1", server.uri())),
            "hello there",
        )
        .await
        .expect("completion should succeed");

        assert_eq!(reply, "general kenobi");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = complete(&Client::new(), &settings_for(server.uri()), "hi")
            .await
            .expect_err("completion should fail");
        let msg = format!("{err:#}");
        assert!(msg.contains("401"), "unexpected message: {msg}");
        assert!(msg.contains("bad key"), "unexpected message: {msg}");
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = complete(&Client::new(), &settings_for(server.uri()), "hi")
            .await
            .expect_err("completion should fail");
        assert!(format!("{err:#}").contains("no message content"));
    }
}
