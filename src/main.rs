use tuition_assistant::config;
use tuition_assistant::gateway;
use tuition_assistant::orchestrator::{Orchestrator, StudentIdentity, TurnRequest};
use tuition_assistant::session::{self, SessionStore};
use tuition_assistant::tools;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::header::HeaderValue;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "tuition-assistant",
    version,
    about = "Conversational assistant for the university tuition API"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP gateway
    Serve,
    /// Run a single chat turn and print the reply
    Ask {
        /// Session key the turn belongs to
        #[arg(long, default_value = "default")]
        session: String,
        /// User message to send
        #[arg(long)]
        message: String,
        /// Authorization header value forwarded to the backend
        #[arg(long)]
        token: Option<String>,
        /// Student number of the logged-in user
        #[arg(long)]
        student_no: Option<String>,
        /// Full name of the logged-in user
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Print the tool catalog as JSON
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cli.config).await,
        Command::Ask {
            session,
            message,
            token,
            student_no,
            full_name,
        } => {
            let cfg = config::Config::load(&cli.config).await?;
            let sessions = Arc::new(SessionStore::new(cfg.sessions.capacity, cfg.sessions.ttl()));
            let orchestrator = Orchestrator::from_config(&cfg, sessions)?;
            let authorization = token
                .map(|t| HeaderValue::from_str(&t).context("--token is not a valid header value"))
                .transpose()?;
            let reply = orchestrator
                .handle_turn(TurnRequest {
                    session_key: session,
                    prompt: message,
                    authorization,
                    identity: StudentIdentity {
                        student_no,
                        full_name,
                    },
                })
                .await
                .map_err(anyhow::Error::new)?;
            println!("{reply}");
            Ok(())
        }
        Command::Tools => {
            let catalog = serde_json::to_string_pretty(tools::function_defs())
                .context("serialize tool catalog")?;
            println!("{catalog}");
            Ok(())
        }
    }
}

async fn serve(config_path: &std::path::Path) -> anyhow::Result<()> {
    info!(path = %config_path.display(), "loading configuration");
    let cfg = config::Config::load(config_path).await?;

    let sessions = Arc::new(SessionStore::new(cfg.sessions.capacity, cfg.sessions.ttl()));
    let orchestrator = Arc::new(Orchestrator::from_config(&cfg, sessions.clone())?);
    info!(
        model = %cfg.model.model,
        backend = %cfg.backend.base_url,
        capacity = cfg.sessions.capacity,
        ttl_secs = cfg.sessions.ttl_secs,
        "orchestrator ready"
    );

    let cancel = CancellationToken::new();
    let janitor = session::spawn_janitor(sessions, cancel.clone());

    let gw = gateway::start_gateway(
        cfg.server.addr,
        gateway::AppState::new(orchestrator),
        cancel.clone(),
    )
    .await
    .with_context(|| format!("failed to bind {}", cfg.server.addr))?;
    info!(addr = %gw.addr, "tuition assistant listening");

    tokio::signal::ctrl_c().await?;
    info!("received Ctrl-C, shutting down…");
    cancel.cancel();

    let _ = gw.handle.await;
    let _ = janitor.await;
    info!("shutdown complete");
    Ok(())
}
