mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use docket_core::{MonitorConfig, MonitoredCaseId, NotificationId, UserId};
use docket_monitor::{RefreshError, RefreshOrchestrator};
use docket_registry::{FixtureRegistry, HttpRegistryClient, RegistryClient};
use docket_store::{CaseStore, DuckStore, MonitoringStore, NotificationStore};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "docket", version, about = "Watch court cases and get notified when they move")]
struct Cli {
    /// DuckDB database file.
    #[arg(long, env = "DOCKET_DB", default_value = "docket.duckdb")]
    db: PathBuf,

    /// Base URL of the registry bridge.
    #[arg(long, env = "DOCKET_REGISTRY_URL", conflicts_with = "fixtures")]
    registry_url: Option<String>,

    /// Directory of case fixtures to use instead of the live registry.
    #[arg(long, env = "DOCKET_FIXTURES")]
    fixtures: Option<PathBuf>,

    #[arg(long, env = "DOCKET_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Maximum concurrent registry lookups during a sweep.
    #[arg(long, env = "DOCKET_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Acting user.
    #[arg(long, env = "DOCKET_USER", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start monitoring a case.
    Watch {
        case_number: String,
        /// Court, e.g. TribunalulCLUJ.
        #[arg(long, default_value = "")]
        institution: String,
        #[arg(long)]
        alias: Option<String>,
    },
    /// Stop monitoring a case.
    Unwatch { id: MonitoredCaseId },
    /// List monitored cases.
    List,
    /// Check one case against the registry now.
    Refresh { id: MonitoredCaseId },
    /// Check every active case.
    Sweep,
    /// Show recent notifications.
    Notifications {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark a notification as read.
    Read { id: NotificationId },
    /// Mark all notifications as read.
    ReadAll,
    /// Show a monitored case and its last snapshot.
    Show { id: MonitoredCaseId },
    /// Counts across all users.
    Stats,
}

impl Cli {
    fn user(&self) -> anyhow::Result<UserId> {
        self.user
            .clone()
            .map(UserId::from)
            .context("this command needs --user (or DOCKET_USER)")
    }

    fn config(&self) -> anyhow::Result<MonitorConfig> {
        let config = MonitorConfig {
            registry_timeout: Duration::from_secs(self.timeout_secs),
            max_concurrent_lookups: self.concurrency,
            ..MonitorConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn registry(&self, config: &MonitorConfig) -> anyhow::Result<Arc<dyn RegistryClient>> {
        if let Some(url) = &self.registry_url {
            let client = HttpRegistryClient::with_timeout(url.clone(), config.registry_timeout)
                .context("building registry client")?;
            return Ok(Arc::new(client));
        }
        if let Some(dir) = &self.fixtures {
            return Ok(Arc::new(FixtureRegistry::new(dir)));
        }
        bail!("no registry configured: pass --registry-url or --fixtures")
    }
}

/// Cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("docket v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let store = Arc::new(
        DuckStore::open_persistent(&cli.db)
            .with_context(|| format!("opening {}", cli.db.display()))?,
    );

    match &cli.command {
        Command::Watch {
            case_number,
            institution,
            alias,
        } => {
            let user = cli.user()?;
            let orch = orchestrator(&cli, store)?;
            let case = orch
                .subscribe(&user, case_number, institution, alias.clone())
                .await
                .context("subscribing")?;
            println!("Watching {} as {}", case.case_number, case.id);
            if case.last_snapshot.is_none() {
                println!("No snapshot yet; it will be fetched on the next refresh.");
            }
        }
        Command::Unwatch { id } => {
            let user = cli.user()?;
            if !store.deactivate(*id, &user).await? {
                bail!("no active monitored case {id} for {user}");
            }
            println!("Stopped watching {id}");
        }
        Command::List => {
            let cases = store.list_active_for_user(&cli.user()?).await?;
            display::print_case_table(&cases);
        }
        Command::Refresh { id } => {
            let user = cli.user()?;
            let orch = orchestrator(&cli, store)?;
            match orch.refresh_with_cancel(*id, &user, &interrupt_token()).await {
                Ok(outcome) if outcome.changed => {
                    println!(
                        "Changed: {}",
                        outcome.summary.as_deref().unwrap_or("new activity")
                    );
                }
                Ok(_) => println!("No changes."),
                Err(RefreshError::CaseNotFound { case_number }) => {
                    println!("Warning: {case_number} is not in the registry right now.");
                }
                Err(e) => return Err(e).context("refreshing"),
            }
        }
        Command::Sweep => {
            let orch = orchestrator(&cli, store)?;
            let report = orch.sweep(&interrupt_token()).await?;
            println!(
                "checked {}, changed {}, failed {}, conflicts {}",
                report.checked, report.changed, report.failed, report.conflicts
            );
        }
        Command::Notifications { limit } => {
            let user = cli.user()?;
            let limit = limit.unwrap_or(cli.config()?.notification_limit);
            let notifications = store.list_for_user(&user, limit).await?;
            let unread = store.unread_count(&user).await?;
            display::print_notifications(&notifications, unread);
        }
        Command::Read { id } => {
            if !store.mark_read(*id, &cli.user()?).await? {
                bail!("notification {id} not found");
            }
        }
        Command::ReadAll => {
            let n = store.mark_all_read(&cli.user()?).await?;
            println!("Marked {n} notifications as read.");
        }
        Command::Show { id } => {
            let user = cli.user()?;
            let case = store.load(*id).await?;
            if case.user_id != user {
                bail!("monitored case {id} not found");
            }
            display::print_case_card(&case);
        }
        Command::Stats => {
            let stats = store.stats().await?;
            display::print_stats(&stats);
        }
    }

    Ok(())
}

fn orchestrator(
    cli: &Cli,
    store: Arc<DuckStore>,
) -> anyhow::Result<RefreshOrchestrator<DuckStore>> {
    let config = cli.config()?;
    let registry = cli.registry(&config)?;
    Ok(RefreshOrchestrator::new(store, registry, config))
}
