use anyhow::Result;
use clap::Parser;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::session::{Session, SessionEvent};

const DISCLAIMER: &str =
    "This is an AI-based assistant and does not replace professional medical advice.";

/// Ask clinical practice, nursing and patient-care questions from the terminal.
#[derive(Debug, Parser)]
#[command(name = "milenai", version, about)]
pub struct Cli {
    /// Config file (default: ~/.milenai/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Provider preset: groq, openrouter or openai_compatible
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub api_base: Option<String>,
    #[arg(long)]
    pub fast_model: Option<String>,
    #[arg(long)]
    pub deep_model: Option<String>,
    /// Tracing filter, e.g. "milenai=debug" (overrides RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Command-line values win over the file and the environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = &self.provider {
            config.provider.name = provider.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.provider.api_base = Some(api_base.clone());
        }
        if let Some(model) = &self.fast_model {
            config.provider.fast_model = model.clone();
        }
        if let Some(model) = &self.deep_model {
            config.provider.deep_model = model.clone();
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Clear,
    History,
    Trending(Option<usize>),
    Stats,
    Ask(String),
}

pub fn parse_command(input: &str) -> Command {
    let lowered = input.trim().to_lowercase();
    match lowered.as_str() {
        "quit" | "exit" | "/quit" | "/exit" => return Command::Quit,
        "/clear" | "clear" => return Command::Clear,
        "/history" => return Command::History,
        "/stats" => return Command::Stats,
        _ => {}
    }
    let mut parts = lowered.split_whitespace();
    if parts.next() == Some("/trending") {
        let limit = parts
            .next()
            .and_then(|n| n.parse().ok())
            .filter(|n: &usize| *n > 0);
        return Command::Trending(limit);
    }
    Command::Ask(input.to_string())
}

fn print_event(event: SessionEvent) {
    match event {
        SessionEvent::RetryWarning(w) => eprintln!("  [Warning] {}", w),
        SessionEvent::Fallback { attempts, .. } => {
            eprintln!("  [Gave up after {} attempts]", attempts)
        }
    }
}

/// Submit `question`, printing retry notices while it is in flight.
///
/// Every event raised by this question is printed before the answer is returned.
async fn ask(
    session: &mut Session,
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    question: &str,
) -> Option<String> {
    let answer = {
        let submit = session.submit(question);
        tokio::pin!(submit);
        loop {
            tokio::select! {
                answer = &mut submit => break answer,
                Some(event) = rx.recv() => print_event(event),
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_event(event);
    }
    answer
}

pub async fn run_chat_loop(session: Session, config: &AppConfig) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = session.with_events(tx);
    let name = config.assistant.name.as_str();

    let mut rl = DefaultEditor::new()?;
    println!("Ask {} anything about clinical practice, nursing, and patient care.", name);
    println!("Commands: /history, /trending [n], /stats, /clear, quit");
    println!("{}\n", DISCLAIMER);
    loop {
        match rl.readline("You > ") {
            Ok(line) => {
                let input = line.trim().to_string();
                if input.is_empty() {
                    continue;
                }
                match parse_command(&input) {
                    Command::Quit => {
                        println!("Goodbye! Stay awesome, nurse!");
                        break;
                    }
                    Command::Clear => {
                        session = session.restart();
                        println!("[Cleared]");
                    }
                    Command::History => {
                        for msg in session.transcript() {
                            println!("[{}] {}", msg.role.as_str(), msg.content);
                        }
                    }
                    Command::Trending(limit) => {
                        let limit = limit.unwrap_or(config.ui.trending_limit);
                        let top = session.trending(limit);
                        if top.is_empty() {
                            println!("No questions yet.");
                        }
                        for (i, (question, count)) in top.iter().enumerate() {
                            println!("{:>2}. {} ({}x)", i + 1, question, count);
                        }
                    }
                    Command::Stats => {
                        let stats = session.stats();
                        println!(
                            "Session {} since {}: {} questions, {} cache hits ({} cached answers), {} provider calls, {} fallbacks",
                            session.id(),
                            session.started_at().format("%Y-%m-%d %H:%M:%S"),
                            stats.submissions,
                            stats.cache_hits,
                            session.cache_len(),
                            stats.provider_calls,
                            stats.fallbacks
                        );
                    }
                    Command::Ask(question) => {
                        let _ = rl.add_history_entry(&question);
                        if let Some(answer) = ask(&mut session, &mut rx, &question).await {
                            println!("\n{} > {}\n", name, answer);
                        }
                    }
                }
            }
            Err(_) => break,
        }
    }
    Ok(())
}
