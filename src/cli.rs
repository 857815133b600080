use std::path::PathBuf;
use std::sync::Arc;

use action_registry::{builtin_catalog, ActionRegistry, ScriptedBrowserFacade};
use agent_core::{
    AgentCore, AgentRequest, LlmProvider, MockLlmProvider, OpenAiConfig, OpenAiLlmProvider,
    ToolCallingPreference,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::load_settings;
use crate::logging::init_logging;

#[derive(Parser)]
#[command(name = "soulbrowser-agent", version, about = "Autonomous LLM-driven browser automation agent")]
pub struct Cli {
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[arg(long, global = true)]
    pub debug: bool,
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a single task to completion against a scripted browser facade.
    Run {
        #[arg(long)]
        task: String,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long, default_value = "mock")]
        llm_provider: String,
    },
    /// Start the HTTP control surface.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8765")]
        bind: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_level, cli.debug, cli.log_file.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting soulbrowser-agent");

    match cli.command {
        Command::Run {
            task,
            config,
            max_steps,
            llm_provider,
        } => run_task(task, config, max_steps, llm_provider).await,
        Command::Serve { bind, config } => serve(bind, config).await,
    }
}

fn build_llm(kind: &str, settings: &agent_core::AgentSettings) -> Result<Arc<dyn LlmProvider>> {
    match kind {
        "mock" => Ok(Arc::new(MockLlmProvider::scripted_success_after(3))),
        "openai" => {
            let config = OpenAiConfig {
                api_keys: settings.llm.api_keys.clone(),
                model: settings.llm.model.clone(),
                api_base: settings
                    .llm
                    .api_base
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                temperature: settings.llm.temperature,
                timeout_seconds: settings.llm.timeout_seconds,
            };
            Ok(Arc::new(OpenAiLlmProvider::new(config)))
        }
        other => anyhow::bail!("unknown --llm-provider '{other}', expected 'mock' or 'openai'"),
    }
}

async fn run_task(
    task: String,
    config_path: Option<PathBuf>,
    max_steps: Option<u32>,
    llm_provider: String,
) -> Result<()> {
    let mut settings = load_settings(config_path.as_deref())?;
    if let Some(max_steps) = max_steps {
        settings.max_steps = max_steps;
    }

    let registry = Arc::new(ActionRegistry::new());
    for definition in builtin_catalog() {
        registry
            .register(definition, false)
            .context("failed to register a built-in action")?;
    }

    let facade = Arc::new(ScriptedBrowserFacade::new(vec![action_registry::single_tab(
        "about:blank",
        "New Tab",
    )]));
    facade.launch(settings.headless).await.ok();

    let llm = build_llm(&llm_provider, &settings)?;
    resolve_tool_calling_method(&llm, &settings).await;

    let request = AgentRequest::new(uuid::Uuid::new_v4().to_string(), task);
    let core = AgentCore::new(request, settings.clone(), registry, facade, llm);

    let run_result = core.run().await;
    let history = match run_result {
        Ok(history) => history,
        Err(err) => {
            eprintln!("run failed: {err}");
            std::process::exit(err.exit_code());
        }
    };
    println!("{}", serde_json::to_string_pretty(&history)?);

    if history.is_successful() == Some(false) {
        std::process::exit(1);
    }
    Ok(())
}

/// Resolves and logs the tool calling method this run will use, per
/// SPEC_FULL.md §4.5. A failure to verify any method is non-fatal here: the
/// adapter falls back to its default wire behavior and the failure surfaces
/// through ordinary decide() errors instead.
async fn resolve_tool_calling_method(llm: &Arc<dyn LlmProvider>, settings: &agent_core::AgentSettings) {
    let preference = ToolCallingPreference::parse(&settings.tool_calling_method);
    match llm.resolve_tool_calling_method(preference).await {
        Ok(method) => info!(?method, "resolved tool calling method"),
        Err(err) => warn!(error = %err, "could not verify a tool calling method, using adapter default"),
    }
}

async fn serve(bind: String, config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(config_path.as_deref())?;

    let registry = Arc::new(ActionRegistry::new());
    for definition in builtin_catalog() {
        registry.register(definition, false)?;
    }
    let facade = Arc::new(ScriptedBrowserFacade::new(vec![action_registry::single_tab(
        "about:blank",
        "New Tab",
    )]));
    facade.launch(settings.headless).await.ok();
    let llm = build_llm("mock", &settings)?;
    resolve_tool_calling_method(&llm, &settings).await;

    let router = agent_server::build_router(agent_server::AgentServerDeps {
        registry,
        facade,
        llm,
        settings,
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, "agent-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
