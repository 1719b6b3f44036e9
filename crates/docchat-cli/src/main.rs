mod config;
mod repl;

use crate::config::DocchatConfig;
use crate::repl::{ReplCommand, HELP};
use clap::{Args, Parser, Subcommand};
use docchat_agent::SessionConfig;
use docchat_core::{DocchatError, Role};
use docchat_session::SessionManager;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "docchat", about = "docchat: chat with your documents", version)]
struct Cli {
    /// Path to config file (default: ./docchat.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a document and chat about it interactively
    Chat {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Index a document and answer a single question
    Ask {
        #[command(flatten)]
        session: SessionArgs,
        /// Question to ask
        #[arg(short, long)]
        question: String,
    },
    /// List the models a session can use
    Models,
}

#[derive(Args)]
struct SessionArgs {
    /// Document to index (pdf, txt, docx or csv)
    #[arg(short, long)]
    file: PathBuf,
    /// Model to answer with (overrides config)
    #[arg(short, long)]
    model: Option<String>,
    /// Sampling temperature in [0, 1] (overrides config)
    #[arg(short, long)]
    temperature: Option<f32>,
    /// System prompt (overrides config)
    #[arg(long)]
    system_prompt: Option<String>,
    /// Number of chunks retrieved per question (overrides config)
    #[arg(long)]
    top_k: Option<usize>,
}

impl SessionArgs {
    fn apply(&self, config: &mut DocchatConfig) {
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
    }

    fn session_config(&self, defaults: &SessionConfig) -> SessionConfig {
        let mut session = defaults.clone();
        if let Some(model) = &self.model {
            session.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            session.temperature = temperature;
        }
        if let Some(prompt) = &self.system_prompt {
            session.system_prompt = prompt.clone();
        }
        session
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = DocchatConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Models => {
            println!("Available models:");
            for model in config.models.models() {
                if *model == config.session.model {
                    println!("  {model} (default)");
                } else {
                    println!("  {model}");
                }
            }
        }
        Commands::Ask { session, question } => {
            session.apply(&mut config);
            let manager = config.build_manager()?;
            let id = open_session(&manager, &session, &config).await?;
            let answer = manager.ask(id, &question).await?;
            println!("{answer}");
        }
        Commands::Chat { session } => {
            session.apply(&mut config);
            let manager = config.build_manager()?;
            let id = open_session(&manager, &session, &config).await?;
            chat_loop(&manager, id).await?;
        }
    }

    Ok(())
}

/// Create a session, bind its model and index the file.
async fn open_session(
    manager: &SessionManager,
    args: &SessionArgs,
    config: &DocchatConfig,
) -> anyhow::Result<Uuid> {
    let id = manager.create();
    manager
        .configure(id, args.session_config(&config.session))
        .await?;

    eprintln!("Indexing {} ...", args.file.display());
    let report = manager.ingest_file(id, &args.file).await?;
    eprintln!(
        "Indexed {} chunk(s) from {} in {} ms",
        report.chunks, report.source, report.elapsed_ms
    );
    Ok(id)
}

async fn chat_loop(manager: &SessionManager, id: Uuid) -> anyhow::Result<()> {
    println!("Ask anything about the document. /help lists commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Invalid(reason) => println!("{reason}"),
            ReplCommand::Clear => {
                manager.clear_history(id).await?;
                println!("History cleared.");
            }
            ReplCommand::History => {
                let history = manager.history(id).await?;
                if history.is_empty() {
                    println!("(no conversation yet)");
                }
                for turn in history {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "docchat",
                        Role::System => "system",
                    };
                    println!("[{}] {who}: {}", turn.sequence, turn.content);
                }
            }
            ReplCommand::Config => match manager.config(id).await? {
                Some(bound) => println!(
                    "model: {}\ntemperature: {}\nsystem prompt: {}",
                    bound.model, bound.temperature, bound.system_prompt
                ),
                None => println!("(no model bound)"),
            },
            ReplCommand::Model(model) => {
                reconfigure(manager, id, |c| c.with_model(model)).await?;
            }
            ReplCommand::Temperature(temperature) => {
                reconfigure(manager, id, |c| c.with_temperature(temperature)).await?;
            }
            ReplCommand::Prompt(prompt) => {
                reconfigure(manager, id, |c| c.with_system_prompt(prompt)).await?;
            }
            ReplCommand::Ask(question) => match manager.ask(id, &question).await {
                Ok(answer) => println!("{answer}"),
                Err(e) => report_error(&e),
            },
        }
    }

    info!(session_id = %id, "Chat ended");
    Ok(())
}

async fn reconfigure(
    manager: &SessionManager,
    id: Uuid,
    change: impl FnOnce(SessionConfig) -> SessionConfig,
) -> anyhow::Result<()> {
    let current = manager.config(id).await?.unwrap_or_default();
    match manager.configure(id, change(current)).await {
        Ok(true) => println!("Settings updated; the conversation is kept."),
        Ok(false) => println!("Settings unchanged."),
        Err(e) => report_error(&e),
    }
    Ok(())
}

fn report_error(e: &DocchatError) {
    if e.is_retryable() {
        println!("error: {e} (you can try again)");
    } else {
        println!("error: {e}");
    }
}
