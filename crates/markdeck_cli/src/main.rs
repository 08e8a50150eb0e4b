//! `markdeck` command line entry point.
//!
//! # Responsibility
//! - Wire the snapshot remote store and the SQLite deck into one sync run.
//! - Turn SIGINT/SIGTERM into cooperative cancellation.

mod cli;

use clap::Parser;
use cli::{Cli, Command, SyncArgs};
use log::{error, warn};
use markdeck_core::{
    core_version, default_log_level, init_logging, CancelToken, ReaddPolicy, ReconciliationEngine,
    Snapshot, SnapshotRemoteStore, SqliteDeckStore, SyncConfig, SyncReport,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Version => {
            println!("markdeck {}", core_version());
            ExitCode::SUCCESS
        }
        Command::Sync(args) => {
            let level = args.log_level.clone().unwrap_or_else(default_log_level);
            if let Err(err) = init_logging(&level, args.log_dir.as_deref()) {
                eprintln!("logging disabled: {err}");
            }
            match run_sync(&args) {
                Ok(report) => {
                    print_summary(&report);
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("event=cli_sync module=cli status=error error={err}");
                    eprintln!("error: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn run_sync(args: &SyncArgs) -> Result<SyncReport, Box<dyn Error>> {
    let config = build_config(args)?;

    let current = Snapshot::load(&args.snapshot)?;
    let previous_ids: Option<BTreeSet<String>> = match &args.previous {
        Some(path) => Some(Snapshot::load(path)?.ids()),
        None => None,
    };

    let mut conn = markdeck_core::db::open_db(&args.deck)?;
    let mut deck = SqliteDeckStore::try_new(&mut conn)?;
    let mut remote = SnapshotRemoteStore::new(current);

    let cancel = CancelToken::new();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, cancel.flag()) {
            warn!("event=signal_register module=cli status=error signal={signal} error={err}");
        }
    }

    let report = ReconciliationEngine::new(&config, &mut remote, &mut deck)
        .run(previous_ids.as_ref(), &cancel)?;

    if !report.early_exit {
        let out = args.remote_out.as_ref().unwrap_or(&args.snapshot);
        remote.into_snapshot().save(out)?;
    }
    Ok(report)
}

fn build_config(args: &SyncArgs) -> Result<SyncConfig, Box<dyn Error>> {
    let mut config = SyncConfig::from_env()?;
    if let Some(name) = &args.deck_name {
        config.deck = name.trim().to_string();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.edited_within_days = args.edited.or(config.edited_within_days);
    config.seed = args.seed.or(config.seed);
    if args.readd {
        config.readd_policy = ReaddPolicy::WhenUnreviewed;
    }
    config.validate()?;
    Ok(config)
}

fn print_summary(report: &SyncReport) {
    if report.early_exit {
        println!("nothing new since the previous snapshot");
        return;
    }
    println!("run {}", report.run_id);
    println!(
        "items: {} seen, {} reconciled, {} skipped",
        report.items_seen, report.items_reconciled, report.items_skipped
    );
    println!(
        "created: {} notes, {} items",
        report.notes_created, report.items_created
    );
    println!(
        "applied: {} remote ({} failed), {} local ({} failed)",
        report.remote.submitted,
        report.remote.failed_actions,
        report.local.submitted,
        report.local.failed_actions
    );
    println!(
        "scheduled {} cards, stamped {} notes",
        report.scheduled, report.stamped
    );
    if report.cancelled {
        println!("interrupted: remaining items were left for the next run");
    }
}
