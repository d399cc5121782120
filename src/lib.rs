pub mod app;
pub mod cli;
pub mod codec;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keystore;
pub mod logging;
pub mod mode;
pub mod model;
pub mod providers;

use anyhow::{Context as _, Result};
use clap::Parser;
use reqwest::Client;
use std::io::{self, IsTerminal};
use tokio::io::BufReader;

use app::Context;
use cli::Invocation;
use config::{ConfigPaths, ConfigStore, EnvOverrides, TerminalPrompt};
use fetch::HttpFetcher;
use model::HttpChatCompletion;

pub async fn run() -> Result<()> {
    let invocation = Invocation::parse();
    let env = EnvOverrides::from_env();
    let store = ConfigStore::new(ConfigPaths::from_env()?);
    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;
    let model = HttpChatCompletion::new(client.clone());
    let fetcher = HttpFetcher::new(client);
    let mut prompt = TerminalPrompt;
    let interactive = io::stdin().is_terminal();

    let mut ctx = Context::new(
        invocation,
        env,
        &store,
        &mut prompt,
        &model,
        &fetcher,
        interactive,
    );
    let mut input = BufReader::new(tokio::io::stdin());
    let mut out = io::stdout();
    ctx.run(&mut input, &mut out).await
}
