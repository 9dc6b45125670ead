//! # tide
//!
//! Coding agent CLI. Wires settings, the OpenAI-compatible provider, the
//! built-in tools and the turn controller, then runs one prompt or an
//! interactive loop.

#![deny(unsafe_code)]

mod confirm;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tide_llm::pricing::format_cost;
use tide_llm::{OpenAiConfig, OpenAiProvider, Provider};
use tide_runtime::stream_processor::TextSink;
use tide_runtime::{
    AuthorizationPolicy, NestedResearchAgent, SessionState, TurnConfig, TurnController, TurnOutcome,
};
use tide_settings::TideSettings;
use tide_tools::providers::{RealFileSystem, TokioProcessRunner};
use tide_tools::registry::ToolRegistry;
use tide_tools::traits::{FileSystemOps, ProcessRunner, ResearchDelegate};

use crate::confirm::StdinConfirm;

/// Tide coding agent.
#[derive(Parser, Debug)]
#[command(name = "tide", about = "Tide coding agent")]
struct Cli {
    /// Run a single prompt and exit.
    #[arg(long)]
    prompt: Option<String>,

    /// Model ID (overrides settings).
    #[arg(long)]
    model: Option<String>,

    /// Chat completions base URL (overrides settings).
    #[arg(long)]
    base_url: Option<String>,

    /// Run every tool without confirmation.
    #[arg(long)]
    yolo: bool,

    /// Model requests allowed per turn (overrides settings).
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Session file to resume from and save to.
    #[arg(long)]
    session: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut TideSettings) {
        if let Some(model) = &self.model {
            settings.provider.model.clone_from(model);
        }
        if let Some(url) = &self.base_url {
            settings.provider.base_url.clone_from(url);
        }
        if self.yolo {
            settings.agent.yolo = true;
        }
        if let Some(n) = self.max_iterations {
            settings.agent.max_iterations = n.max(1);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

fn load_session(path: Option<&Path>) -> Result<SessionState> {
    match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session: {}", path.display()))?;
            let session = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse session: {}", path.display()))?;
            tracing::info!(path = %path.display(), "session resumed");
            Ok(session)
        }
        _ => Ok(SessionState::new()),
    }
}

fn save_session(path: &Path, session: &SessionState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write session: {}", path.display()))?;
    Ok(())
}

fn build_provider(settings: &TideSettings) -> Arc<dyn Provider> {
    let api_key = std::env::var(&settings.provider.api_key_env).ok().filter(|k| !k.is_empty());
    if api_key.is_none() {
        tracing::warn!(env = settings.provider.api_key_env.as_str(), "no API key set");
    }
    let config = OpenAiConfig {
        base_url: settings.provider.base_url.clone(),
        model: settings.provider.model.clone(),
        api_key,
        max_tokens: settings.provider.max_tokens,
    };
    Arc::new(OpenAiProvider::new(config, settings.retry.clone()))
}

fn build_registry(settings: &TideSettings, provider: Arc<dyn Provider>, working_directory: &str) -> ToolRegistry {
    let fs: Arc<dyn FileSystemOps> = Arc::new(RealFileSystem);
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);

    let research = &settings.tools.research;
    let delegate: Arc<dyn ResearchDelegate> = Arc::new(NestedResearchAgent::new(
        provider,
        ToolRegistry::read_only(Arc::clone(&fs)),
        TurnConfig::from_settings(settings, working_directory),
        research.max_iterations,
    ));

    let registry = ToolRegistry::builtin(fs, runner, Some((delegate, research.max_files)));
    tracing::debug!(tool_count = registry.len(), tools = ?registry.names(), "tool registry created");
    registry
}

fn stdout_sink() -> TextSink {
    Arc::new(|delta: &str| {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(delta.as_bytes());
        let _ = out.flush();
    })
}

fn report(outcome: &Result<TurnOutcome, tide_runtime::RuntimeError>, controller: &TurnController, session: &SessionState) {
    let total = &session.usage().session_total_usage;
    match outcome {
        Ok(TurnOutcome::Complete) => {}
        Ok(TurnOutcome::Truncated) => eprintln!("\n[response truncated at the token limit]"),
        Ok(TurnOutcome::CapReached) => eprintln!(
            "\n[stopped after {} model requests; send another message to continue]",
            controller.last_iterations()
        ),
        Err(e) => eprintln!("\n[turn ended: {e}]"),
    }
    eprintln!(
        "[{} iterations, {} tokens this session, {}]",
        controller.last_iterations(),
        total.total_tokens(),
        format_cost(total.cost)
    );
}

async fn run_turn(controller: &mut TurnController, session: &mut SessionState, input: &str, path: Option<&Path>) -> Result<()> {
    let token = controller.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let outcome = controller.process_turn(session, input).await;
    watcher.abort();
    println!();
    report(&outcome, controller, session);

    if let Err(e) = &outcome {
        if e.is_interruption() {
            let _ = controller.reset_cancellation();
        }
    }
    if let Some(path) = path {
        save_session(path, session)?;
    }
    Ok(())
}

/// What the interactive prompt produced.
#[derive(Debug, PartialEq, Eq)]
enum Prompt {
    Line(String),
    End,
    Interrupted,
}

/// Wait for the next input line or an interrupt, whichever comes first.
/// End of input and an empty line both end the session.
async fn next_prompt(
    read: impl Future<Output = std::io::Result<(usize, String)>>,
    interrupt: impl Future<Output = ()>,
) -> Result<Prompt> {
    tokio::select! {
        biased;
        () = interrupt => Ok(Prompt::Interrupted),
        read = read => {
            let (n, line) = read.context("Failed to read input")?;
            let input = line.trim();
            Ok(if n == 0 || input.is_empty() {
                Prompt::End
            } else {
                Prompt::Line(input.to_string())
            })
        }
    }
}

fn read_stdin_line() -> impl Future<Output = std::io::Result<(usize, String)>> {
    let task = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|n| (n, line))
    });
    async move { task.await.map_err(std::io::Error::other)? }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = tide_settings::loader::load_settings().context("Failed to load settings")?;
    args.apply(&mut settings);

    if settings.logging.json {
        tide_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        tide_core::logging::init_subscriber(&settings.logging.level);
    }

    let working_directory = std::env::current_dir()
        .context("Failed to resolve working directory")?
        .to_string_lossy()
        .into_owned();
    tracing::info!(
        model = settings.provider.model.as_str(),
        base_url = settings.provider.base_url.as_str(),
        working_directory = working_directory.as_str(),
        yolo = settings.agent.yolo,
        "starting tide"
    );

    let provider = build_provider(&settings);
    let registry = build_registry(&settings, Arc::clone(&provider), &working_directory);
    let policy = AuthorizationPolicy::new(settings.tools.allowed_tools.clone(), settings.agent.yolo);
    let mut controller = TurnController::new(
        provider,
        registry,
        policy,
        Arc::new(StdinConfirm),
        TurnConfig::from_settings(&settings, working_directory),
    )
    .with_text_sink(stdout_sink());

    let session_path = args.session.as_deref();
    let mut session = load_session(session_path)?;

    if let Some(prompt) = &args.prompt {
        return run_turn(&mut controller, &mut session, prompt, session_path).await;
    }

    eprintln!("tide ({}). Empty line, Ctrl-D or Ctrl-C to exit.", settings.provider.model);
    loop {
        eprint!("\n> ");
        let _ = std::io::stderr().flush();
        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match next_prompt(read_stdin_line(), interrupt).await? {
            Prompt::Line(input) => run_turn(&mut controller, &mut session, &input, session_path).await?,
            Prompt::End => break,
            Prompt::Interrupted => {
                // the blocked stdin read would hold runtime shutdown; every turn is already saved
                eprintln!();
                std::process::exit(130);
            }
        }
    }
    Ok(())
}
