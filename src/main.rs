use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::mpsc;

use zylo_chat::common::Identity;
use zylo_chat::config;
use zylo_chat::storage::{self, SqliteStore};
use zylo_chat::sync::SyncClient;
use zylo_chat::ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "zylo_chat",
    version,
    about = "Console chat client with paginated, live-synced conversations"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// SQLite database file (overrides the config)
    #[arg(long, value_name = "FILE")]
    db: Option<String>,
    /// User id to sign in as (overrides the config)
    #[arg(long, env = "ZYLO_USER")]
    user: Option<String>,
    /// Display nickname; defaults to the user id
    #[arg(long, env = "ZYLO_NICKNAME")]
    nickname: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    if let Some(db) = cli.db {
        app_config.database_path = db;
    }

    let identity = match (cli.user, app_config.identity.clone()) {
        (Some(user_id), _) => {
            let identity = Identity {
                nickname: cli.nickname.unwrap_or_else(|| user_id.clone()),
                user_id,
            };
            config::persist_identity(&cli.config, &identity);
            identity
        }
        (None, Some(identity)) => identity,
        (None, None) => return Err("no identity: pass --user or set one in the config".into()),
    };

    storage::ensure_data_dir(&app_config.database_path)?;
    let store = Arc::new(SqliteStore::with_path(&app_config.database_path)?);
    log::info!(
        "Signed in as {} ({}), database {}",
        identity.nickname,
        identity.user_id,
        app_config.database_path
    );

    // UI -> sync loop
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // sync loop -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    let user_id = identity.user_id.clone();
    let client = SyncClient::new(
        store,
        identity,
        app_config.sync_config(),
        event_tx,
        cmd_rx,
    );
    let sync_task = tokio::spawn(client.run());

    ChatApp::new(user_id, cmd_tx, event_rx).run().await?;

    // Dropping the UI closed the command channel; let the loop wind down.
    if let Err(err) = sync_task.await {
        log::error!("Sync loop terminated unexpectedly: {err}");
    }
    Ok(())
}
