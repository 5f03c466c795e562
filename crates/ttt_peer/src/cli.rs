//! Command-line interface for ttt_peer.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ttt_peer - Tic-tac-toe against the computer or a friend on the same network
#[derive(Parser, Debug)]
#[command(name = "ttt_peer")]
#[command(about = "Peer-to-peer LAN tic-tac-toe", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the saved preferences file
    #[arg(long, global = true, default_value = ttt_peer::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Board side length for new games (3 to 9)
    #[arg(long, global = true)]
    pub board_size: Option<usize>,

    /// Save the effective mode and board size back to the config file
    #[arg(long, global = true)]
    pub save: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play against the computer
    Ai,

    /// Open a room and wait for a friend to join
    Host {
        /// Your display name
        #[arg(short, long, default_value = "Host")]
        name: String,
    },

    /// Join a friend's room using the link they shared
    Join {
        /// Room link in ADDRESS:PORT:ROOM_ID form
        link: String,

        /// Your display name
        #[arg(short, long, default_value = "Guest")]
        name: String,
    },

    /// Ask a matchmaking server for an opponent
    Match {
        /// Matchmaking server base URL (falls back to TTT_MATCH_SERVER_URL)
        #[arg(long)]
        server_url: Option<String>,
    },
}
