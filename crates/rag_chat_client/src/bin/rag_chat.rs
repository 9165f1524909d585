//! rag-chat: terminal front end for the documentation assistant.
//! Reads config, sends a question to the RAG backend through the chat widget controller,
//! prints the answer, sources and reference chunks to stdout.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rag_chat_client::config::{self, Config};
use rag_chat_client::{
    AnswerResponse, ChatError, ChatWidget, FileStore, HttpTransport, KeyValueStore, MemoryStore,
    SubmitOutcome, TransportClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ask the documentation assistant", long_about = None)]
struct Cli {
    /// Path to config.yaml (default: ~/.rag-chat/config.yaml)
    #[arg(long, global = true, env = "RAG_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overrides backend.base_url
    #[arg(long, global = true, env = "RAG_CHAT_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question (argument, or first line of stdin)
    Ask {
        question: Option<String>,
    },
    /// Read questions line by line from stdin; `/retry` re-sends the previous line
    Chat,
    /// Check the backend's /health endpoint
    Health,
    /// Open or close the widget and remember the choice
    Toggle,
    /// Show whether the widget is open
    Status,
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut cfg = match &cli.config {
        Some(path) => config::load(path)
            .map_err(|e| format!("failed to load config from {}: {}", path.display(), e))?,
        None => match config::default_config_path() {
            Some(path) if path.exists() => config::load(&path)
                .map_err(|e| format!("failed to load config from {}: {}", path.display(), e))?,
            _ => Config::default(),
        },
    };
    if let Some(url) = &cli.base_url {
        cfg.backend.base_url = Some(url.clone());
    }
    Ok(cfg)
}

/// Chat-mode line that re-sends the previous question.
const RETRY_COMMAND: &str = "/retry";

fn build_transport(cfg: &Config) -> Result<HttpTransport, String> {
    let timeout = cfg.timeout().map_err(|e| e.to_string())?;
    HttpTransport::with_timeout(cfg.base_url(), timeout).map_err(|e| e.to_string())
}

fn build_widget(cfg: &Config) -> Result<ChatWidget, String> {
    let transport = build_transport(cfg)?;
    let store: Arc<dyn KeyValueStore> = match cfg.state_path() {
        Some(path) => Arc::new(FileStore::new(path)),
        None => Arc::new(MemoryStore::new()),
    };
    let params = cfg.retrieval_parameters().map_err(|e| e.to_string())?;
    let retry = cfg.retry_policy().map_err(|e| e.to_string())?;
    Ok(ChatWidget::mount(Arc::new(transport), store)
        .with_parameters(params)
        .with_retry_policy(retry))
}

fn read_question(arg: Option<String>) -> String {
    if let Some(q) = arg {
        return q;
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).unwrap_or(0);
    line
}

fn print_response(out: &mut impl Write, response: &AnswerResponse) -> io::Result<()> {
    if let Some(answer) = response.answer.as_deref().filter(|a| !a.is_empty()) {
        writeln!(out, "Answer: {}", answer)?;
    }
    if let Some(sources) = response.sources.as_ref().filter(|s| !s.is_empty()) {
        writeln!(out, "\nSources:")?;
        for src in sources {
            writeln!(out, "  {}", src)?;
        }
    }
    if let Some(chunks) = response.matched_chunks.as_ref().filter(|c| !c.is_empty()) {
        writeln!(out, "\nReference Chunks:")?;
        for chunk in chunks {
            writeln!(out, "  {}", chunk.preview())?;
            let source = chunk.source.as_deref().unwrap_or("unknown");
            match chunk.similarity_score {
                Some(score) => writeln!(out, "    Source: {}  Score: {:.2}", source, score)?,
                None => writeln!(out, "    Source: {}", source)?,
            }
        }
    }
    out.flush()
}

/// Answers stdin lines until EOF. Failures are reported inline and do not end the session.
async fn chat(widget: &ChatWidget) -> Result<(), String> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        let result = if line.trim() == RETRY_COMMAND {
            widget.retry_last().await
        } else {
            widget.submit(&line).await
        };
        match result {
            Ok(SubmitOutcome::Answered(response)) => {
                print_response(&mut out, &response).map_err(|e| e.to_string())?;
                if let Some(backend_error) = response.error {
                    writeln!(out, "Backend Error: {}", backend_error).map_err(|e| e.to_string())?;
                }
            }
            Ok(SubmitOutcome::Ignored) => {}
            Err(ChatError::Transport(e)) => {
                writeln!(out, "Error: {}", e).map_err(|e| e.to_string())?;
                writeln!(out, "Type {} to send it again.", RETRY_COMMAND)
                    .map_err(|e| e.to_string())?;
            }
            Err(e) => writeln!(out, "Error: {}", e).map_err(|e| e.to_string())?,
        }
        writeln!(out).map_err(|e| e.to_string())?;
        out.flush().map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Ask { question } => {
            let widget = build_widget(&cfg)?;
            let question = read_question(question);
            let response = match widget.submit(&question).await.map_err(|e| e.to_string())? {
                SubmitOutcome::Answered(response) => response,
                SubmitOutcome::Ignored => return Err("a question is already being answered".into()),
            };
            let stdout = io::stdout();
            print_response(&mut stdout.lock(), &response).map_err(|e| e.to_string())?;
            if let Some(backend_error) = response.error {
                return Err(format!("Backend Error: {}", backend_error));
            }
        }
        Commands::Chat => {
            let widget = build_widget(&cfg)?;
            chat(&widget).await?;
        }
        Commands::Health => {
            let transport = build_transport(&cfg)?;
            let health = transport
                .health_check()
                .await
                .map_err(|e| format!("Health check failed: {}", e))?;
            let json = serde_json::to_string_pretty(&health).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        Commands::Toggle => {
            let widget = build_widget(&cfg)?;
            let is_open = widget.toggle();
            println!("{}", if is_open { "open" } else { "closed" });
        }
        Commands::Status => {
            let widget = build_widget(&cfg)?;
            let is_open = widget.state().is_open;
            println!("{}", if is_open { "open" } else { "closed" });
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
