mod config;
mod error;
mod presenter;
mod repl;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use clap::{Args, Parser, Subcommand};
use runtime::{Agent, ChatCompletionsBackend, McpEndpoint, McpToolHost, Session, ToolHost, ToolSpec};
use storage::{Event, EventKind, EventStore, Role};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, DEFAULT_CONFIG_FILE, DOTENV_FILE, layered, load_dotenv};
use error::{Error, Result};
use presenter::TerminalPresenter;
use repl::{HELP, Input};

type ChatAgent = Agent<ChatCompletionsBackend, McpToolHost>;

#[derive(Parser)]
#[command(name = "mcp-chat")]
#[command(about = "Chat with an LLM that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./mcp-chat.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat(ChatArgs),
    /// List the tools exposed by the MCP server
    Tools {
        /// MCP server URL
        #[arg(long)]
        mcp_url: Option<String>,
    },
    /// List all sessions
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show event logs for a session
    Logs {
        /// Session ID (prefix match supported)
        #[arg(short, long)]
        session: String,
        /// Filter by event kind (message, tool_call, tool_result, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

#[derive(Args, Default)]
struct ChatArgs {
    /// Model to start with
    #[arg(long)]
    model: Option<String>,

    /// MCP server URL
    #[arg(long)]
    mcp_url: Option<String>,

    /// System directive
    #[arg(long)]
    system: Option<String>,
}

impl ChatArgs {
    fn apply(self, config: &mut Config) {
        if let Some(model) = self.model {
            config.model.name = model;
        }
        if let Some(url) = self.mcp_url {
            config.mcp.url = url;
        }
        if let Some(system) = self.system {
            config.agent.system_prompt = system;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Chat(args)) => cmd_chat(load_config(cli.config.as_deref())?, args).await,
        None => cmd_chat(load_config(cli.config.as_deref())?, ChatArgs::default()).await,
        Some(Commands::Tools { mcp_url }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(url) = mcp_url {
                config.mcp.url = url;
            }
            cmd_tools(&config).await
        }
        Some(Commands::Sessions { limit }) => cmd_sessions(limit),
        Some(Commands::Logs { session, kind }) => cmd_logs(&session, kind.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::load(DEFAULT_CONFIG_FILE)?,
        None => Config::default(),
    };
    let dotenv = load_dotenv(DOTENV_FILE)?;
    config.apply_env(layered(|name| std::env::var(name).ok(), &dotenv))?;
    Ok(config)
}

async fn cmd_chat(mut config: Config, args: ChatArgs) -> Result<()> {
    args.apply(&mut config);
    let endpoint = config.endpoint()?;
    let tools = Arc::new(connect_tools(&endpoint).await?);

    let mut model = config.model.name.clone();
    let mut system = config.agent.system_prompt.clone();

    // Initialize event store
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".mcp-chat".into());
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("events.db");
    let store = EventStore::open(&db_path)?;

    let mut session = Session::new(store, build_agent(&config, &model, &system, &tools))?;

    println!("mcp-chat v{}", env!("CARGO_PKG_VERSION"));
    println!("🤝 Ready! Send me a message\n");
    println!("• Model: {model}");
    println!("• MCP URL: {endpoint}");
    println!("• Tools: {}", tools.specs().len());
    println!("• Session: {} ({})", session.id, db_path.display());
    println!("{HELP}\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        match Input::parse(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Tools => print_tools(tools.specs()),
            Input::Models => {
                for choice in &config.model.choices {
                    let marker = if *choice == model { "*" } else { " " };
                    println!("{marker} {choice}");
                }
                println!();
            }
            Input::Model(None) => println!("Model: {model}\n"),
            Input::Model(Some(name)) => {
                model = name.to_string();
                session.reconfigure(build_agent(&config, &model, &system, &tools))?;
                println!("Switched to {model}. Conversation reset.\n");
            }
            Input::System(None) => println!("System prompt: {system}\n"),
            Input::System(Some(text)) => {
                system = text.to_string();
                session.reconfigure(build_agent(&config, &model, &system, &tools))?;
                println!("System prompt updated. Conversation reset.\n");
            }
            Input::Unknown(name) => println!("Unknown command /{name}. {HELP}\n"),
            Input::Message(text) => {
                println!();
                let mut ui = TerminalPresenter::new(io::stdout());
                match session.run_turn(text, &mut ui).await {
                    Ok(outcome) => debug!(
                        steps = outcome.steps,
                        tools = outcome.tools.len(),
                        input_tokens = outcome.usage.input_tokens,
                        output_tokens = outcome.usage.output_tokens,
                        "turn complete"
                    ),
                    Err(e) => {
                        ui.interrupt();
                        eprintln!("⚠️ Reply interrupted: {e}\n");
                    }
                }
            }
        }
    }

    session.end()?;
    shutdown_tools(tools).await;
    println!("\nSession ended.");
    Ok(())
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let endpoint = config.endpoint()?;
    let tools = connect_tools(&endpoint).await?;

    println!("MCP URL: {endpoint}\n");
    print_tools(tools.specs());

    shutdown_tools(Arc::new(tools)).await;
    Ok(())
}

fn build_agent(config: &Config, model: &str, system: &str, tools: &Arc<McpToolHost>) -> ChatAgent {
    Agent::from_shared(Arc::new(config.backend(model)), Arc::clone(tools))
        .with_system(system)
        .with_max_steps(config.agent.max_steps)
}

async fn connect_tools(endpoint: &McpEndpoint) -> Result<McpToolHost> {
    McpToolHost::connect(endpoint)
        .await
        .map_err(|e| Error::ToolProvider {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })
}

async fn shutdown_tools(tools: Arc<McpToolHost>) {
    match Arc::try_unwrap(tools) {
        Ok(host) => {
            if let Err(error) = host.shutdown().await {
                warn!(%error, "MCP session did not close cleanly");
            }
        }
        Err(_) => debug!("tool host still in use, leaving MCP session open"),
    }
}

fn print_tools(specs: &[ToolSpec]) {
    if specs.is_empty() {
        println!("No tools available.\n");
        return;
    }

    println!("Tools ({}):", specs.len());
    for spec in specs {
        if spec.description.is_empty() {
            println!("  {}", spec.name);
        } else {
            println!("  {}: {}", spec.name, spec.description);
        }
    }
    println!();
}

fn cmd_sessions(limit: usize) -> Result<()> {
    let store = open_store()?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<8}  STATUS",
        "SESSION ID", "STARTED", "MSGS"
    );
    println!("{}", "-".repeat(80));

    for summary in sessions.into_iter().take(limit) {
        let started = Local
            .from_utc_datetime(&summary.started_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        let status = if summary.ended_at.is_some() {
            "ended"
        } else {
            "active"
        };
        println!(
            "{:<36}  {:<20}  {:<8}  {status}",
            summary.id.to_string(),
            started.to_string(),
            summary.message_count
        );
    }

    Ok(())
}

fn cmd_logs(session_prefix: &str, kind_filter: Option<&str>) -> Result<()> {
    let store = open_store()?;

    // Find session by prefix
    let sessions = store.list_sessions()?;
    let matching: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.to_string().starts_with(session_prefix))
        .collect();

    let session_id = match matching.as_slice() {
        [] => {
            return Err(Error::SessionNotFound {
                prefix: session_prefix.to_string(),
            });
        }
        [only] => only.id,
        _ => {
            return Err(Error::AmbiguousSession {
                prefix: session_prefix.to_string(),
                matches: matching.iter().map(|s| s.id.to_string()).collect(),
            });
        }
    };

    let events = store.load_events(session_id, kind_filter)?;

    if events.is_empty() {
        println!("No events found for session {session_id}");
        return Ok(());
    }

    println!("Session: {session_id}\n");

    for event in events {
        println!("{}", format_event(&event));
    }

    Ok(())
}

fn format_event(event: &Event) -> String {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");

    match &event.kind {
        EventKind::SessionStart { model } => {
            format!("[{time}] === Session started ({model}) ===")
        }
        EventKind::SessionEnd => format!("[{time}] === Session ended ==="),
        EventKind::Reconfigured { model } => {
            format!("[{time}] === Reconfigured ({model}), context reset ===")
        }
        EventKind::Message { role, content } => {
            let role_str = match role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
            };
            format!("[{time}] {role_str}: {}", truncate(content, 200))
        }
        EventKind::ToolCall {
            call_id,
            name,
            input,
        } => format!("[{time}] TOOL CALL: {name} [{call_id}] {input}"),
        EventKind::ToolResult {
            call_id,
            name,
            output,
            is_error,
        } => {
            let status = if *is_error { "error" } else { "ok" };
            format!(
                "[{time}] TOOL RESULT: {name} [{call_id}] {status}: {}",
                truncate(output, 200)
            )
        }
    }
}

/// Cut to `max` characters, marking the cut.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn open_store() -> Result<EventStore> {
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".mcp-chat".into());
    let db_path = data_dir.join("events.db");

    if !db_path.exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }

    Ok(EventStore::open(&db_path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/mcp-chat"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("mcp-chat"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("mcp-chat"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storage::SessionId;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé...");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn chat_args_override_config() {
        let mut config = Config::default();
        ChatArgs {
            model: Some("gpt-4o-mini".into()),
            mcp_url: Some("http://tools:3001/mcp".into()),
            system: None,
        }
        .apply(&mut config);

        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.mcp.url, "http://tools:3001/mcp");
        assert!(config.agent.system_prompt.starts_with("You are a helpful"));
    }

    #[test]
    fn tool_events_are_formatted() {
        let id = SessionId::new();
        let call = format_event(&Event::new(
            id,
            EventKind::ToolCall {
                call_id: "call_1".into(),
                name: "add".into(),
                input: json!({"a": 1, "b": 2}),
            },
        ));
        assert!(call.ends_with("TOOL CALL: add [call_1] {\"a\":1,\"b\":2}"));

        let result = format_event(&Event::new(
            id,
            EventKind::ToolResult {
                call_id: "call_1".into(),
                name: "add".into(),
                output: "3".into(),
                is_error: false,
            },
        ));
        assert!(result.ends_with("TOOL RESULT: add [call_1] ok: 3"));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["mcp-chat", "logs", "-s", "abcd", "-k", "tool_call"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Logs { ref session, kind: Some(ref kind) })
                if session == "abcd" && kind == "tool_call"
        ));

        let cli = Cli::try_parse_from(["mcp-chat", "-v", "chat", "--model", "m"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Chat(ChatArgs { model: Some(ref m), .. })) if m == "m"));

        let cli = Cli::try_parse_from(["mcp-chat"]).unwrap();
        assert!(cli.command.is_none());
    }
}
