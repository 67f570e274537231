//! `congrega`: church-group WhatsApp bot over Chatwoot.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use congrega_bot::handlers::BotContext;
use congrega_bot::{BotConfig, EventBus, IntentRouter, server};
use congrega_classifier::IntentClassifier;
use congrega_gateway::ChatwootGateway;
use congrega_store::{AttendanceStore, ConversationStore, Database, ProgramStore, UserStore};

#[derive(Parser)]
#[command(name = "congrega", version, about = "Church-group attendance and program bot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server.
    Serve {
        /// Bind address (overrides config file).
        #[arg(long)]
        bind: Option<String>,
        /// Port (overrides config file).
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info");

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind, port } => serve(bind, port).await,
    }
}

async fn serve(bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let config = BotConfig::load(bind, port)?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let db = Database::open_and_migrate(config.db_path.clone())
        .await
        .context("failed to open database")?;

    let gateway = Arc::new(ChatwootGateway::new(config.chatwoot.clone()));
    let classifier = IntentClassifier::from_config(config.llm.clone());

    let ctx = Arc::new(BotContext {
        conversations: ConversationStore::new(db.clone()),
        users: UserStore::new(db.clone()),
        attendance: AttendanceStore::new(db.clone()),
        programs: ProgramStore::new(db),
        sink: gateway,
        events: EventBus::default(),
    });

    let router = Arc::new(IntentRouter::new(ctx, classifier));

    let addr = format!("{}:{}", config.bind_addr, config.port);
    info!(
        llm = config.llm.is_some(),
        "congrega bot starting"
    );
    server::serve(router, &addr).await
}
