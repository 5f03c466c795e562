//! ttt_peer - console tic-tac-toe
//!
//! Plays against the computer, hosts a room on the LAN, or joins one.

#![warn(missing_docs)]

mod cli;
mod console;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use ttt_engine::HeuristicOpponent;
use ttt_peer::{
    Config, GameMode, HttpMatchmaker, Matchmaker, SessionHandle, SessionSettings, SessionTask,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the board on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ttt_peer=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = effective_config(&cli)?;

    match cli.command {
        Command::Ai => run_ai(config).await,
        Command::Host { name } => run_host(config, name).await,
        Command::Join { link, name } => run_join(config, link, name).await,
        Command::Match { server_url } => run_match(config, server_url).await,
    }
}

/// Loads the config file and applies command-line overrides.
#[instrument(skip(cli), fields(path = %cli.config.display()))]
fn effective_config(cli: &Cli) -> Result<Config> {
    let loaded = Config::load(&cli.config);
    let mode = match cli.command {
        Command::Ai => GameMode::HumanVsAi,
        Command::Host { .. } | Command::Join { .. } => GameMode::HumanVsHumanOnline,
        Command::Match { .. } => *loaded.mode(),
    };
    let config = Config::new(mode, cli.board_size.unwrap_or(*loaded.board_size()));

    if cli.save {
        config
            .save(&cli.config)
            .with_context(|| format!("saving {}", cli.config.display()))?;
    }
    Ok(config)
}

fn spawn_session(
    config: Config,
    matchmaker: Option<Box<dyn Matchmaker>>,
) -> (SessionHandle, SessionTask) {
    let settings = SessionSettings {
        config,
        ..SessionSettings::default()
    };
    SessionHandle::spawn(
        settings,
        Box::new(HeuristicOpponent::from_entropy()),
        matchmaker,
    )
}

async fn finish(session: SessionHandle, task: SessionTask) -> Result<()> {
    session.shutdown().await?;
    drop(session);
    task.join().await;
    Ok(())
}

/// Play against the computer
async fn run_ai(config: Config) -> Result<()> {
    info!(board_size = config.board_size(), "Starting AI game");
    let (session, task) = spawn_session(config, None);
    session.start_ai_game().await?;
    console::play(&session).await?;
    finish(session, task).await
}

/// Host a room and play once a guest joins
async fn run_host(config: Config, name: String) -> Result<()> {
    let (session, task) = spawn_session(config, None);
    let link = session.create_room(name).await?;
    info!(%link, "Room created");
    console::play(&session).await?;
    finish(session, task).await
}

/// Join a room from a shared link
async fn run_join(config: Config, link: String, name: String) -> Result<()> {
    let (session, task) = spawn_session(config, None);
    session
        .join_room(link.as_str(), name)
        .await
        .with_context(|| format!("joining {}", link))?;
    console::play(&session).await?;
    finish(session, task).await
}

/// Ask the matchmaking server for an opponent
async fn run_match(config: Config, server_url: Option<String>) -> Result<()> {
    let Some(server_url) = server_url.or_else(|| std::env::var("TTT_MATCH_SERVER_URL").ok())
    else {
        bail!("No matchmaking server: pass --server-url or set TTT_MATCH_SERVER_URL");
    };

    let matchmaker = HttpMatchmaker::new(server_url)?;
    let (session, task) = spawn_session(config, Some(Box::new(matchmaker)));
    let found = session.find_match().await;
    finish(session, task).await?;

    let found = found?;
    println!("Matched with {} (match {})", found.opponent, found.match_id);
    Ok(())
}
