/// Fable Admin - backup, restore, and migration CLI
///
/// Operates on a library snapshot file: the snapshot is loaded into memory,
/// the requested operation runs against it, and commands that mutate the
/// library write the snapshot back.
use clap::{Parser, Subcommand, ValueEnum};
use fable_archive::{
    BackupManager, ExportOptions, MergeStrategy, RestoreMode, RestoreOptions, ValidationReport,
};
use fable_migrate::{
    ForeignBackup, IdMappings, ImportOptions, MatcherConfig, MigrationOrchestrator,
};
use fable_store_memory::{LibrarySnapshot, MemoryEventStore, MemoryStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fable-admin")]
#[command(about = "Fable library backup, restore, and migration tool", long_about = None)]
struct Cli {
    /// Library snapshot file
    #[arg(short, long, env = "FABLE_LIBRARY", default_value = "library.json")]
    library: PathBuf,

    /// Directory holding managed backups
    #[arg(short, long, env = "FABLE_BACKUPS_DIR", default_value = "backups")]
    backups_dir: PathBuf,

    /// Root directory holding cover and avatar images
    #[arg(long, env = "FABLE_ASSETS_ROOT")]
    assets_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage library backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Recompute all playback progress from the event log
    RebuildProgress,
    /// Migrate from a foreign system's export
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Create a new backup of the library
    Create {
        /// Leave cover and avatar images out of the archive
        #[arg(long)]
        no_images: bool,
        /// Leave listening history out of the archive
        #[arg(long)]
        no_history: bool,
    },
    /// List managed backups, newest first
    List,
    /// Check an archive's structure without importing it
    Validate {
        /// Backup ID (filename stem)
        id: String,
    },
    /// Delete a backup
    Delete {
        /// Backup ID (filename stem)
        id: String,
    },
    /// Restore a backup into the library
    Restore {
        /// Backup ID (filename stem)
        id: String,
        #[arg(long, value_enum, default_value_t = RestoreModeArg::Merge)]
        mode: RestoreModeArg,
        #[arg(long, value_enum, default_value_t = MergeStrategyArg::KeepLocal)]
        strategy: MergeStrategyArg,
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Match a foreign export against the library and write a review report
    Analyze {
        /// Foreign export file (JSON)
        source: PathBuf,
        /// Where to write the match report; stdout when omitted
        #[arg(long)]
        report: Option<PathBuf>,
        /// Where to write the auto-approved ID mappings, ready for editing
        #[arg(long)]
        mappings: Option<PathBuf>,
    },
    /// Import a foreign export using finalized ID mappings
    Import {
        /// Foreign export file (JSON)
        source: PathBuf,
        /// ID mappings file produced by analyze and reviewed by hand
        #[arg(long)]
        mappings: PathBuf,
        /// Do not synthesize events for bare progress snapshots
        #[arg(long)]
        no_synthesize: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RestoreModeArg {
    Merge,
    Full,
    EventsOnly,
}

impl From<RestoreModeArg> for RestoreMode {
    fn from(arg: RestoreModeArg) -> Self {
        match arg {
            RestoreModeArg::Merge => Self::Merge,
            RestoreModeArg::Full => Self::Full,
            RestoreModeArg::EventsOnly => Self::EventsOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MergeStrategyArg {
    KeepLocal,
    KeepBackup,
    NewestWins,
}

impl From<MergeStrategyArg> for MergeStrategy {
    fn from(arg: MergeStrategyArg) -> Self {
        match arg {
            MergeStrategyArg::KeepLocal => Self::KeepLocal,
            MergeStrategyArg::KeepBackup => Self::KeepBackup,
            MergeStrategyArg::NewestWins => Self::NewestWins,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fable_admin=info,fable_archive=info,fable_migrate=info,fable_progress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let manager = BackupManager::new(&cli.backups_dir);
    let (store, events) = load_library(&cli.library).await?;

    match cli.command {
        Commands::Backup { command } => match command {
            BackupCommands::Create { no_images, no_history } => {
                let options = ExportOptions {
                    include_images: !no_images,
                    include_history: !no_history,
                };
                let result = manager
                    .create_backup(&store, &events, cli.assets_root.as_deref(), &options)
                    .await?;
                println!("Created {}", result.path.display());
                println!("  size:     {} bytes", result.size_bytes);
                println!("  records:  {}", result.counts.values().sum::<u64>());
                println!("  checksum: {}", result.checksum);
            }
            BackupCommands::List => {
                let backups = manager.list_backups()?;
                if backups.is_empty() {
                    println!("No backups in {}", cli.backups_dir.display());
                }
                for b in backups {
                    println!("{}  {}  {} bytes  ({})", b.id, b.created_at, b.size_bytes, b.server_name);
                }
            }
            BackupCommands::Validate { id } => {
                let info = manager
                    .get_backup(&id)?
                    .ok_or_else(|| anyhow::anyhow!("no backup with ID {id}"))?;
                let report = manager.validate(&info.path)?;
                print_validation(&report);
                if !report.is_valid() {
                    anyhow::bail!("archive failed validation");
                }
            }
            BackupCommands::Delete { id } => {
                if manager.delete_backup(&id)? {
                    println!("Deleted {id}");
                } else {
                    anyhow::bail!("no backup with ID {id}");
                }
            }
            BackupCommands::Restore { id, mode, strategy, dry_run } => {
                let info = manager
                    .get_backup(&id)?
                    .ok_or_else(|| anyhow::anyhow!("no backup with ID {id}"))?;
                let options = RestoreOptions {
                    mode: mode.into(),
                    strategy: strategy.into(),
                    dry_run,
                };
                let result = manager
                    .restore(&info.path, &store, &events, cli.assets_root.as_deref(), &options)
                    .await?;
                for (entity, n) in &result.imported {
                    println!("imported {entity}: {n}");
                }
                for (entity, n) in &result.skipped {
                    println!("skipped {entity}: {n}");
                }
                for issue in &result.issues {
                    println!(
                        "issue [{}{}]: {}",
                        issue.entity_type,
                        issue.entity_id.as_deref().map(|id| format!(" {id}")).unwrap_or_default(),
                        issue.message
                    );
                }
                if dry_run {
                    println!("Dry run: nothing was written");
                } else {
                    save_library(&cli.library, &store, &events).await?;
                }
            }
        },
        Commands::RebuildProgress => {
            let summary = manager.rebuild_progress(&store, &events).await?;
            println!(
                "Rebuilt {} pairs from {} events ({} orphaned)",
                summary.pairs_rebuilt, summary.events_folded, summary.orphaned_events
            );
            save_library(&cli.library, &store, &events).await?;
        }
        Commands::Migrate { command } => match command {
            MigrateCommands::Analyze { source, report, mappings } => {
                let backup = ForeignBackup::load(&source)?;
                let orchestrator = MigrationOrchestrator::new(&store, &events);
                let analysis = orchestrator.analyze(&backup, &MatcherConfig::default()).await?;

                println!(
                    "users: {} auto, {} need review",
                    analysis.users_auto, analysis.users_needing_review
                );
                println!(
                    "books: {} auto, {} need review",
                    analysis.books_auto, analysis.books_needing_review
                );
                println!(
                    "sessions: {} importable, {} blocked",
                    analysis.sessions_importable, analysis.sessions_blocked
                );
                println!(
                    "progress: {} importable, {} blocked",
                    analysis.progress_importable, analysis.progress_blocked
                );

                let report_json = serde_json::to_string_pretty(&analysis)?;
                match report {
                    Some(path) => {
                        std::fs::write(&path, report_json)?;
                        println!("Report written to {}", path.display());
                    }
                    None => println!("{report_json}"),
                }
                if let Some(path) = mappings {
                    std::fs::write(&path, serde_json::to_string_pretty(&analysis.auto_mappings())?)?;
                    println!("Mappings written to {}", path.display());
                }
            }
            MigrateCommands::Import { source, mappings, no_synthesize } => {
                let backup = ForeignBackup::load(&source)?;
                let mappings: IdMappings = serde_json::from_str(&std::fs::read_to_string(&mappings)?)?;
                let options = ImportOptions {
                    synthesize_progress_events: !no_synthesize,
                };
                let orchestrator = MigrationOrchestrator::new(&store, &events);
                let result = orchestrator.import(&backup, &mappings, &options).await?;

                println!("events imported:    {}", result.events_imported);
                println!("synthetic events:   {}", result.synthetic_events);
                println!("duplicates skipped: {}", result.duplicates_skipped);
                println!("sessions unmapped:  {}", result.sessions_unmapped);
                println!("progress unmapped:  {}", result.progress_unmapped);
                println!("pairs rebuilt:      {}", result.rebuild.pairs_rebuilt);
                save_library(&cli.library, &store, &events).await?;
            }
        },
    }

    Ok(())
}

/// Load the library snapshot into fresh in-memory stores. A missing file is
/// an empty library, so first runs work without setup.
async fn load_library(path: &Path) -> anyhow::Result<(MemoryStore, MemoryEventStore)> {
    if !path.is_file() {
        tracing::info!("No library at {}, starting empty", path.display());
        return Ok(LibrarySnapshot::default().into_stores().await?);
    }
    let snapshot: LibrarySnapshot = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(snapshot.into_stores().await?)
}

/// Write the current store contents back to the library snapshot
async fn save_library(path: &Path, store: &MemoryStore, events: &MemoryEventStore) -> anyhow::Result<()> {
    let snapshot = LibrarySnapshot::capture(store, events).await?;
    std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    tracing::info!("Library saved to {}", path.display());
    Ok(())
}

fn print_validation(report: &ValidationReport) {
    println!("archive version: {}", report.manifest.version);
    println!("server:          {}", report.manifest.server_name);
    println!("created:         {}", report.manifest.created_at);
    println!("checksum:        {}", report.checksum);
    for check in &report.streams {
        let status = if check.is_ok() { "ok" } else { "MISMATCH" };
        println!(
            "  {:18} declared {:6} actual {:6} parse errors {:3}  {status}",
            check.stream, check.declared, check.actual, check.parse_errors
        );
    }
}
