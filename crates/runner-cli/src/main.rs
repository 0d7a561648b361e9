//! `sa-runner` — a demonstration binary that wires a default
//! (in-memory) `SessionStore`, a real or mock `ModelAdapter`, and the
//! built-in exec/process `ToolExecutor` behind the orchestrator, then
//! drives one interactive run loop end-to-end. Same
//! clap-subcommand-with-a-default-action shape and `tracing_subscriber`
//! init as a typical server bootstrap, scaled down to a single-process
//! REPL since there is no API surface left to serve.

mod config;
mod tool_source;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sa_domain::{AgentEvent, RunState};
use sa_orchestrator::runner::{Orchestrator, RunRequest};
use sa_providers::{AnthropicAdapter, MockModelAdapter};
use sa_sessions::InMemorySessionStore;
use sa_tools::{BuiltinToolExecutor, ExecConfig};
use tracing_subscriber::EnvFilter;

use tool_source::BuiltinToolSource;

#[derive(Parser)]
#[command(name = "sa-runner", about = "Drive an agent run loop against the orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a TOML config file; defaults to searching conventional locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the Anthropic adapter and echo messages back instead of calling a model.
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive REPL (the default when no subcommand is given).
    Chat {
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Send a single message non-interactively and print the final result.
    Run {
        message: String,
        #[arg(long, default_value = "default")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let (run_config, config_path) = config::load_config(cli.config.as_deref())?;
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "loaded config");
    } else {
        tracing::debug!("no config file found, using defaults");
    }

    let orchestrator = build_orchestrator(cli.offline, run_config);

    match cli.command {
        Some(Command::Run { message, session }) => run_once(&orchestrator, &session, &message).await,
        Some(Command::Chat { session }) => chat(&orchestrator, session).await,
        None => chat(&orchestrator, "default".to_string()).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn build_orchestrator(offline: bool, config: sa_domain::Config) -> Arc<Orchestrator> {
    let session_store = Arc::new(InMemorySessionStore::new());
    let tool_executor = Arc::new(BuiltinToolExecutor::new(ExecConfig::default()));

    let model_adapter: Arc<dyn sa_domain::ModelAdapter> = if offline {
        Arc::new(MockModelAdapter::echo())
    } else {
        match sa_providers::util::resolve_api_key("ANTHROPIC_API_KEY", "sa-runner-cli", "anthropic") {
            Ok(key) => Arc::new(AnthropicAdapter::new(key)),
            Err(err) => {
                tracing::warn!(%err, "no Anthropic API key configured, falling back to offline echo mode");
                Arc::new(MockModelAdapter::echo())
            }
        }
    };

    let assembler_config = sa_contextpack::AssemblerConfig {
        system_defaults: sa_contextpack::ModelParams { model_id: Some("claude-sonnet-4-5".to_string()), ..Default::default() },
        ..Default::default()
    };
    let assembler = Arc::new(
        sa_contextpack::Assembler::new(session_store.clone(), assembler_config).with_tools(Arc::new(BuiltinToolSource)),
    );

    Orchestrator::new(session_store, model_adapter, tool_executor, assembler, config)
}

async fn run_once(orchestrator: &Arc<Orchestrator>, session: &str, message: &str) -> anyhow::Result<()> {
    let mut request = RunRequest::from_text(message);
    request.session_id = Some(session.to_string());
    request.permissions = vec!["exec".to_string()];

    let mut handle = orchestrator.execute(request);
    while let Some(event) = handle.next_event().await {
        print_event(event?);
    }
    Ok(())
}

async fn chat(orchestrator: &Arc<Orchestrator>, mut session: String) -> anyhow::Result<()> {
    let history_path = dirs_home().join(".sa-runner").join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("sa-runner interactive chat");
    eprintln!("Session: {session}  |  Type /help for commands, Ctrl+D to exit");
    eprintln!();

    loop {
        let readline = rl.readline("you> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &mut session) {
                        break;
                    }
                    continue;
                }

                let mut request = RunRequest::from_text(trimmed);
                request.session_id = Some(session.clone());
                request.permissions = vec!["exec".to_string()];

                let mut handle = orchestrator.execute(request);
                while let Some(event) = handle.next_event().await {
                    match event {
                        Ok(ev) => print_event(ev),
                        Err(err) => eprintln!("\x1B[31merror: {err}\x1B[0m"),
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

fn handle_slash_command(input: &str, session: &mut String) -> bool {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim());

    match cmd {
        "/exit" | "/quit" => return true,
        "/session" => {
            if let Some(name) = arg.filter(|s| !s.is_empty()) {
                *session = name.to_string();
                eprintln!("Session switched to: {session}");
            } else {
                eprintln!("Current session: {session}");
                eprintln!("Usage: /session <name>");
            }
        }
        "/clear" => eprint!("\x1B[2J\x1B[1;1H"),
        "/reset" => {
            let ts = chrono::Utc::now().timestamp();
            *session = format!("{session}:{ts}");
            eprintln!("Session reset. New session: {session}");
        }
        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /session <name>  Switch to a named session");
            eprintln!("  /clear           Clear the screen");
            eprintln!("  /reset           Start a fresh session (new id)");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }
        other => eprintln!("Unknown command: {other}  (type /help for a list)"),
    }

    false
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn print_event(event: AgentEvent) {
    match event {
        AgentEvent::RunQueued { position, .. } => {
            if position > 1 {
                eprintln!("(queued, position {position})");
            }
        }
        AgentEvent::RunStarted { .. } => {}
        AgentEvent::ContextStart | AgentEvent::ContextComplete { .. } => {}
        AgentEvent::ModelStart => {}
        AgentEvent::ModelDelta { delta } => {
            print!("{delta}");
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
        AgentEvent::ModelThinking { delta } => eprint!("\x1B[2m{delta}\x1B[0m"),
        AgentEvent::ModelComplete { .. } => println!(),
        AgentEvent::ToolStart { tool_name, tool_call_id, .. } => {
            eprintln!("\x1B[36m→ {tool_name} ({tool_call_id})\x1B[0m");
        }
        AgentEvent::ToolComplete { tool_call_id, .. } => {
            eprintln!("\x1B[32m✓ tool {tool_call_id} complete\x1B[0m");
        }
        AgentEvent::ToolError { tool_call_id, error } => {
            eprintln!("\x1B[31m✗ tool {tool_call_id} failed: {error}\x1B[0m");
        }
        AgentEvent::RunCompleted { result, .. } => {
            if result.state == RunState::Completed {
                eprintln!("\x1B[2m(stop reason: {:?})\x1B[0m", result.stop_reason);
            }
        }
        AgentEvent::RunError { error, .. } => eprintln!("\x1B[31mrun error: {error}\x1B[0m"),
        AgentEvent::RunCancelled { reason, .. } => eprintln!("\x1B[33mrun cancelled: {reason}\x1B[0m"),
    }
}
