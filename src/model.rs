use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

use crate::config::EffectiveSettings;
use crate::providers;

/// Printed in place of a reply when the remote call fails.
pub const FAILURE_SENTINEL: &str = "Error: Unable to fetch response";

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a>>;

/// The remote chat-completion call.
pub trait ChatCompletion {
    fn complete<'a>(
        &'a self,
        settings: &'a EffectiveSettings,
        message: &'a str,
    ) -> CompletionFuture<'a>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpChatCompletion {
    client: Client,
}

impl HttpChatCompletion {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ChatCompletion for HttpChatCompletion {
    fn complete<'a>(
        &'a self,
        settings: &'a EffectiveSettings,
        message: &'a str,
    ) -> CompletionFuture<'a> {
        Box::pin(async move { providers::openai::complete(&self.client, settings, message).await })
    }
}

/// Runs one completion, logging a failure and substituting
/// [`FAILURE_SENTINEL`] for the reply.
pub async fn complete_or_sentinel(
    model: &dyn ChatCompletion,
    settings: &EffectiveSettings,
    message: &str,
) -> String {
    match model.complete(settings, message).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(model = %settings.model, error = %format!("{err:#}"), "chat completion failed");
            FAILURE_SENTINEL.to_string()
        }
    }
}
