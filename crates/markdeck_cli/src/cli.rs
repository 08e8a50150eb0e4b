use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "markdeck")]
#[command(about = "Keep a bookmark list and a flashcard deck in sync")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile a bookmark export with the deck.
    Sync(SyncArgs),
    /// Print the core version.
    Version,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Current bookmark export (JSON).
    pub snapshot: PathBuf,
    /// Previous export; only items new since it are reconciled.
    pub previous: Option<PathBuf>,
    /// Deck database file, created when missing.
    #[arg(long)]
    pub deck: PathBuf,
    /// Deck name new notes are filed under.
    #[arg(long)]
    pub deck_name: Option<String>,
    /// Only touch notes edited within this many days.
    #[arg(long, value_name = "DAYS")]
    pub edited: Option<u32>,
    /// Seed for reproducible new-card ordering.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Put archived items back in the unread list when no card was reviewed.
    #[arg(long)]
    pub readd: bool,
    /// Where to write the updated export; defaults to the input snapshot.
    #[arg(long)]
    pub remote_out: Option<PathBuf>,
    #[arg(long, env = "MARKDECK_LOGLEVEL")]
    pub log_level: Option<String>,
    /// Absolute directory for rotated log files; stderr when omitted.
    #[arg(long)]
    pub log_dir: Option<String>,
}
