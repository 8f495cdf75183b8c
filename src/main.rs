use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use inventory_sync::{
    build_service,
    clock::{Clock, SystemClock},
    config,
    events::{process_events, EventSender},
    prelude::*,
    remote::build_remote,
    services::{
        import::ImportRow,
        inventory_sync::SyncReport,
        log_book::LogFilter,
    },
};

#[derive(Parser)]
#[command(name = "inventory-sync", about = "Club equipment inventory with remote sync", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, default_value = "cli", help = "Operator id recorded on changes")]
    operator_id: String,
    #[arg(long, global = true, default_value = "CLI", help = "Operator display name")]
    operator_name: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON array of flat row objects
    Import(ImportArgs),
    /// Print every item row and the per-item totals
    Export(ExportArgs),
    /// Find items by name or subcategory
    Search { query: String },
    /// List log entries, newest first
    Logs(LogsArgs),
    /// Change the quantity of one item
    Adjust(AdjustArgs),
    /// Add a new item to every location
    Add(AddArgs),
    /// Delete an item from every location
    Delete { name: String },
    /// Follow the remote tree and keep the local copy current until Ctrl-C
    Serve,
}

#[derive(Args)]
struct ImportArgs {
    file: PathBuf,
    #[arg(long, action = ArgAction::SetTrue, help = "Start from an empty inventory instead of merging")]
    reset: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, action = ArgAction::SetTrue, help = "Export the change log instead of stock")]
    logs: bool,
}

#[derive(Args)]
struct LogsArgs {
    #[arg(long, help = "Only entries from this day (YYYY-MM-DD)")]
    date: Option<NaiveDate>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long, help = "Case-insensitive item name keyword")]
    item: Option<String>,
}

#[derive(Args)]
struct LeafArgs {
    #[arg(long)]
    location: String,
    #[arg(long)]
    category: String,
    #[arg(long)]
    subcategory: String,
    #[arg(long)]
    subcategory2: Option<String>,
}

impl LeafArgs {
    fn address(&self) -> LeafAddress {
        LeafAddress::new(
            self.location.as_str(),
            self.category.as_str(),
            self.subcategory.as_str(),
        )
        .with_subcategory2(self.subcategory2.clone().unwrap_or_default())
    }
}

#[derive(Args)]
struct AdjustArgs {
    #[command(flatten)]
    leaf: LeafArgs,
    #[arg(long)]
    item: String,
    #[arg(long, allow_hyphen_values = true)]
    delta: i64,
}

#[derive(Args)]
struct AddArgs {
    #[command(flatten)]
    leaf: LeafArgs,
    #[arg(long)]
    name: String,
    #[arg(long, default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(&cfg.log_level, cfg.log_json);

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let events = tokio::spawn(process_events(event_rx));
    let event_sender = EventSender::new(event_tx);

    let remote = build_remote(&cfg).context("failed to build remote backend")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut service = build_service(&cfg, remote, clock.clone(), Some(event_sender))
        .await
        .context("failed to start inventory service")?;
    let mut session = Session::login(
        cli.operator_id.as_str(),
        cli.operator_name.as_str(),
        Role::Editor,
        clock.now(),
    );

    let result = run(cli.command, cli.json, &mut service, &mut session).await;

    session.logout();
    drop(service);
    if tokio::time::timeout(Duration::from_secs(2), events).await.is_err() {
        warn!("event processor did not drain in time");
    }
    result
}

async fn run(
    command: Commands,
    json: bool,
    service: &mut InventoryService,
    session: &mut Session,
) -> Result<()> {
    match command {
        Commands::Import(args) => {
            let raw = fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let rows: Vec<ImportRow> = serde_json::from_str(&raw)
                .context("rows file must be a JSON array of objects")?;
            let mode = if args.reset {
                ImportMode::Reset
            } else {
                ImportMode::Merge
            };
            let applied = service
                .execute(session, &ImportRowsCommand { rows, mode })
                .await?;
            finish(applied.sync).await;
            let summary = applied.value;
            if json {
                print_json(&summary)?;
            } else {
                println!(
                    "Imported {} rows ({} new, {} increased), {} rejected",
                    summary.applied, summary.added, summary.increased, summary.rejected
                );
                for sample in &summary.rejected_samples {
                    println!("- row {}: {} ({})", sample.row, sample.reason, sample.path);
                }
            }
        }
        Commands::Export(args) if args.logs => {
            let rows = service.export_logs();
            if json {
                print_json(&rows)?;
            } else {
                for row in rows {
                    println!(
                        "{} | {} | {} > {} > {} | {} | {:+} | {}",
                        row.time,
                        row.operator_name,
                        row.location,
                        row.category,
                        row.subcategory,
                        row.item,
                        row.change,
                        row.reason
                    );
                }
            }
        }
        Commands::Export(_) => {
            let snapshot = service.export();
            if json {
                print_json(&snapshot)?;
            } else {
                for row in &snapshot.rows {
                    println!(
                        "{} > {} > {} | {} | {}",
                        row.location, row.category, row.subcategory, row.item, row.count
                    );
                }
                println!();
                for total in &snapshot.totals {
                    println!("{}: {} {:?}", total.item, total.total, total.per_location);
                }
            }
        }
        Commands::Search { query } => {
            let hits = service.search(&query);
            if json {
                print_json(&hits)?;
            } else if hits.is_empty() {
                println!("No matches for {}", query);
            } else {
                for hit in hits {
                    let sub2 = hit.subcategory2.map(|s| format!(" > {}", s)).unwrap_or_default();
                    println!(
                        "{} > {}{} | {} | total {} {:?}",
                        hit.category, hit.subcategory, sub2, hit.name, hit.total, hit.per_location
                    );
                }
            }
        }
        Commands::Logs(args) => {
            let filter = LogFilter {
                date: args.date,
                location: args.location,
                item: args.item,
            };
            let entries = service.filter_logs(&filter);
            if json {
                print_json(&entries)?;
            } else {
                for entry in entries {
                    println!(
                        "{} | {} | {} > {} > {} | {} | {:+}",
                        entry.time,
                        entry.operator_name.as_deref().unwrap_or("-"),
                        entry.location,
                        entry.category,
                        entry.subcategory,
                        entry.item,
                        entry.change
                    );
                }
            }
        }
        Commands::Adjust(args) => {
            let address = args.leaf.address();
            let index = service
                .mirror()
                .items(&address)
                .iter()
                .position(|item| item.name == args.item)
                .ok_or_else(|| anyhow!("no item named {} at {}", args.item, address))?;
            let applied = service
                .execute(
                    session,
                    &AdjustQuantityCommand {
                        address,
                        index,
                        delta: args.delta,
                    },
                )
                .await?;
            finish(applied.sync).await;
            match applied.value {
                Some(change) if json => print_json(&change)?,
                Some(change) => println!("{}: {} -> {}", change.item, change.previous, change.current),
                None => println!("Nothing to change"),
            }
        }
        Commands::Add(args) => {
            let command = AddItemCommand {
                location: args.leaf.location,
                category: args.leaf.category,
                subcategory: args.leaf.subcategory,
                subcategory2: args.leaf.subcategory2,
                name: args.name,
                initial_count: args.count,
            };
            let applied = service.execute(session, &command).await?;
            finish(applied.sync).await;
            if json {
                print_json(&applied.value)?;
            } else {
                println!("Added {} at {}", applied.value.name, applied.value.address);
            }
        }
        Commands::Delete { name } => {
            let applied = service
                .execute(session, &DeleteItemCommand { name })
                .await?;
            finish(applied.sync).await;
            if json {
                print_json(&applied.value)?;
            } else {
                println!(
                    "Deleted {} from {} places (total {})",
                    applied.value.name, applied.value.leaves, applied.value.removed_total
                );
            }
        }
        Commands::Serve => serve(service).await?,
    }
    Ok(())
}

/// A failed upstream write is reported, not returned: local state already
/// holds the change.
async fn finish(report: SyncReport) {
    if !report.removed_keys.is_empty() {
        warn!(count = report.removed_keys.len(), "invalid keys were left out of the upload");
    }
    if let Err(err) = report.wait().await {
        error!("{}", err.user_message());
    }
}

async fn serve(service: &mut InventoryService) -> Result<()> {
    let mut feeds = service.subscribe().await?;
    info!("following remote changes; press Ctrl-C to stop");
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            next = service.sync_next(&mut feeds) => match next {
                Some(Ok(outcome)) => info!(?outcome, "remote update handled"),
                Some(Err(err)) => error!(error = %err, "remote update failed"),
                None => {
                    warn!("remote subscriptions closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
