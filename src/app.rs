use anyhow::{Context as _, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{debug, info};

use crate::cli::Invocation;
use crate::compose::compose;
use crate::config::{ConfigStore, EffectiveSettings, EnvOverrides, SecretPrompt};
use crate::error::ConfigError;
use crate::fetch::{PageFetcher, content_or_placeholder};
use crate::mode::{Mode, ModeInputs, select_mode};
use crate::model::{ChatCompletion, complete_or_sentinel};

const NO_OP_NOTICE: &str = "Nothing to send. Pass a prompt, pipe text on stdin, or use --chat.";

/// Everything one invocation needs, built once and passed down explicitly.
///
/// Settings are resolved on first use, so runs that end up sending nothing
/// never touch stored credentials.
pub struct Context<'a> {
    invocation: Invocation,
    env: EnvOverrides,
    store: &'a ConfigStore,
    prompt: &'a mut dyn SecretPrompt,
    model: &'a dyn ChatCompletion,
    fetcher: &'a dyn PageFetcher,
    interactive: bool,
    settings: Option<EffectiveSettings>,
}

impl<'a> Context<'a> {
    pub fn new(
        invocation: Invocation,
        env: EnvOverrides,
        store: &'a ConfigStore,
        prompt: &'a mut dyn SecretPrompt,
        model: &'a dyn ChatCompletion,
        fetcher: &'a dyn PageFetcher,
        interactive: bool,
    ) -> Self {
        Self {
            invocation,
            env,
            store,
            prompt,
            model,
            fetcher,
            interactive,
            settings: None,
        }
    }

    /// Selects a mode and runs it. A reset clears the reset flag and selects
    /// again, so this loops at most twice.
    pub async fn run<R, W>(&mut self, input: &mut R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        loop {
            let mode = select_mode(&ModeInputs::from_invocation(
                &self.invocation,
                self.interactive,
            ));
            info!(mode = mode.as_str(), interactive = self.interactive, "selected execution mode");

            match mode {
                Mode::ResetAndReprompt => {
                    self.store
                        .reset(&self.invocation, &self.env, &mut *self.prompt)?;
                    self.invocation.reset = false;
                    self.settings = None;
                    continue;
                }
                Mode::UrlOnlyQuery => {
                    let url_content = self.url_content().await;
                    let message = compose(
                        url_content.as_deref(),
                        self.invocation.message.as_deref(),
                        None,
                    );
                    self.send_once(&message, out).await?;
                }
                Mode::ChatLoop => self.chat_loop(input, out).await?,
                Mode::SingleShotArgs => {
                    let url_content = self.url_content().await;
                    let primary = self.invocation.prompt_text();
                    let message = compose(
                        url_content.as_deref(),
                        self.invocation.message.as_deref(),
                        primary.as_deref(),
                    );
                    self.send_once(&message, out).await?;
                }
                Mode::PipeIngestion => {
                    let mut raw = Vec::new();
                    input
                        .read_to_end(&mut raw)
                        .await
                        .context("Failed to read stdin")?;
                    debug!(bytes = raw.len(), "read piped input");
                    let buffered = String::from_utf8_lossy(&raw);

                    let url_content = self.url_content().await;
                    let message = compose(
                        url_content.as_deref(),
                        self.invocation.message.as_deref(),
                        Some(buffered.trim()),
                    );
                    self.send_once(&message, out).await?;
                }
                Mode::NoOpExit => {
                    writeln!(out, "{NO_OP_NOTICE}").context("Failed to write stdout")?;
                }
            }

            return Ok(());
        }
    }

    fn settings(&mut self) -> Result<&EffectiveSettings, ConfigError> {
        let settings = match self.settings.take() {
            Some(settings) => settings,
            None => self
                .store
                .resolve(&self.invocation, &self.env, &mut *self.prompt)?,
        };
        Ok(self.settings.insert(settings))
    }

    async fn url_content(&self) -> Option<String> {
        match self.invocation.url.as_deref() {
            Some(url) => Some(content_or_placeholder(self.fetcher, url).await),
            None => None,
        }
    }

    async fn send_once<W: Write>(&mut self, message: &str, out: &mut W) -> Result<()> {
        if message.is_empty() {
            debug!("composed message is empty; nothing to send");
            return Ok(());
        }

        let model = self.model;
        let settings = self.settings()?;
        let reply = complete_or_sentinel(model, settings, message).await;
        writeln!(out, "{reply}").context("Failed to write stdout")?;
        out.flush().context("Failed to flush stdout")
    }

    /// Reads one line at a time, decoding invalid UTF-8 lossily, and only reads the next line after the
    /// current reply is printed, so at most one request is in flight.
    async fn chat_loop<R, W>(&mut self, input: &mut R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let model = self.model;
        let url_content = self.url_content().await;
        let extra_message = self.invocation.message.clone();
        let settings = self.settings()?;

        writeln!(
            out,
            "Starting chat with {}. Type a message and press Enter; Ctrl-D to quit.",
            settings.model
        )
        .context("Failed to write stdout")?;

        let mut line = Vec::new();
        loop {
            write!(out, "> ").context("Failed to write stdout")?;
            out.flush().context("Failed to flush stdout")?;

            line.clear();
            let read = input
                .read_until(b'\n', &mut line)
                .await
                .context("Failed to read stdin")?;
            if read == 0 {
                break;
            }

            let decoded = String::from_utf8_lossy(&line);
            let prompt = decoded.trim();
            if prompt.is_empty() {
                continue;
            }

            let message = compose(url_content.as_deref(), extra_message.as_deref(), Some(prompt));
            let reply = complete_or_sentinel(model, settings, &message).await;
            writeln!(out, "Assistant: {reply}\n").context("Failed to write stdout")?;
        }

        writeln!(out).context("Failed to write stdout")?;
        Ok(())
    }
}
