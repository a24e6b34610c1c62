mod cli;
mod config;
mod error;
mod ledger;
mod llm;
mod retry;
mod selector;
mod session;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use config::{AppConfig, ProviderPreset};
use llm::openai_compatible::OpenAiCompatibleProvider;
use llm::LlmProvider;
use session::Session;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Create the completion provider based on config.
fn create_llm_provider(config: &AppConfig, api_key: String) -> Result<Arc<dyn LlmProvider>> {
    // Every supported preset speaks the OpenAI chat-completions format.
    match config.preset()? {
        ProviderPreset::Groq | ProviderPreset::OpenRouter | ProviderPreset::OpenAiCompatible => {
            Ok(Arc::new(OpenAiCompatibleProvider::from_config(config, api_key)?))
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("milenai=error")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &cli::Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_required(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        }
        None => {
            // Auto-generate config file on first run
            let config_path = AppConfig::config_path()?;
            if !config_path.exists() {
                let path = AppConfig::save_default()?;
                println!("[Config] Created default config: {}", path.display());
                println!("[Config] Edit it to set your api_key, models, etc.");
            }
            AppConfig::load()?
        }
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = load_config(&cli)?;
    // A missing key stops here, before any question is taken.
    let api_key = config.api_key()?;

    println!("========================================");
    println!("  {} - Clinical Intelligence", config.assistant.name);
    println!("========================================");
    println!(
        "[Config] Provider: {}, Fast: {}, Deep: {}, API: {}",
        config.provider.name,
        config.provider.fast_model,
        config.provider.deep_model,
        config.api_base()?
    );

    let provider = create_llm_provider(&config, api_key)?;
    let session = Session::from_config(provider, &config);
    cli::run_chat_loop(session, &config).await
}
