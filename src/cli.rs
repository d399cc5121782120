use clap::Parser;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Send text to a chat-completion API and print the reply.
///
/// Prompt words on the command line are sent as one message; with no words
/// and piped stdin, the whole input stream is sent instead.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley", version, about, long_about = None)]
pub struct Invocation {
    /// Start an interactive chat session
    #[arg(short, long)]
    pub chat: bool,

    /// Sampling temperature for responses
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Fetch this URL and include its content in the message
    #[arg(short, long)]
    pub url: Option<String>,

    /// Extra message placed between URL content and the prompt
    #[arg(short, long)]
    pub message: Option<String>,

    /// Delete stored configuration, regenerate keys and prompt for a new API key
    #[arg(short, long)]
    pub reset: bool,

    /// API key (overrides API_KEY and the stored key)
    #[arg(short = 'k', long)]
    pub api_key: Option<String>,

    /// API base URL (overrides API_BASE_URL and the stored URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model name (overrides MODEL and the stored model)
    #[arg(long, visible_alias = "model-name")]
    pub model: Option<String>,

    /// Prompt words
    pub prompt: Vec<String>,
}

impl Invocation {
    pub fn has_prompt(&self) -> bool {
        !self.prompt.is_empty()
    }

    pub fn prompt_text(&self) -> Option<String> {
        self.has_prompt().then(|| self.prompt.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{DEFAULT_TEMPERATURE, Invocation};

    #[test]
    fn parses_defaults() {
        let inv = Invocation::try_parse_from(["parley"]).expect("parse should succeed");
        assert!(!inv.chat);
        assert!(!inv.reset);
        assert_eq!(inv.temperature, DEFAULT_TEMPERATURE);
        assert!(inv.url.is_none());
        assert!(inv.message.is_none());
        assert!(inv.prompt_text().is_none());
    }

    #[test]
    fn parses_short_flags_and_prompt_words() {
        let inv = Invocation::try_parse_from([
            "parley", "-c", "-r", "-t", "0.2", "-u", "https://example.com", "-m", "extra", "-k",
            "sk-1", "what", "is", "this",
        ])
        .expect("parse should succeed");

        assert!(inv.chat);
        assert!(inv.reset);
        assert_eq!(inv.temperature, 0.2);
        assert_eq!(inv.url.as_deref(), Some("https://example.com"));
        assert_eq!(inv.message.as_deref(), Some("extra"));
        assert_eq!(inv.api_key.as_deref(), Some("sk-1"));
        assert_eq!(inv.prompt_text().as_deref(), Some("what is this"));
    }

    #[test]
    fn model_name_is_an_alias_for_model() {
        let inv = Invocation::try_parse_from(["parley", "--model-name", "gpt-x", "--base-url", "http://h"])
            .expect("parse should succeed");
        assert_eq!(inv.model.as_deref(), Some("gpt-x"));
        assert_eq!(inv.base_url.as_deref(), Some("http://h"));
    }

    #[test]
    fn rejects_non_numeric_temperature() {
        assert!(Invocation::try_parse_from(["parley", "-t", "warm"]).is_err());
    }
}
