use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use vpn_route_sync::api::{ApiClient, RouteApi};
use vpn_route_sync::config::{Config, ConfigError, CONFIG_FILE_NAME};
use vpn_route_sync::discover::{discover_servers, merge_discovered, record_route_group};
use vpn_route_sync::provider::{
    DesiredSetProvider, FixedSet, ServiceTagsProvider, StaticListProvider,
};
use vpn_route_sync::state::{PendingDeleteLedger, SnapshotStore};
use vpn_route_sync::sync::{backup_routes, ReconcileOptions, Reconciler, Summary, Tally};

#[derive(Parser)]
#[command(name = "vpn-route-sync")]
#[command(about = "Keep VPN server routes in sync through the management API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./vpn-route-sync.toml, then ~/.vpn-route-sync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add missing routes from a desired-set source to every server
    Sync {
        /// Where the desired networks come from
        #[arg(long, value_enum, default_value_t = Source::ServiceTags)]
        source: Source,
        /// Do not record added routes for later deletion
        #[arg(long)]
        no_track: bool,
    },
    /// Delete routes listed in the pending-delete ledger
    Delete,
    /// Save each server's live routes to its snapshot and the config
    Backup,
    /// List servers known to the API
    Servers,
    /// Add servers missing from the config's route groupings
    Discover,
    /// Show local snapshot and ledger state per server
    Status,
    /// Generate default config file
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    /// Cloud service-tag IP range document
    ServiceTags,
    /// Newline-delimited list of networks
    Static,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Init = cli.command {
        let path = cli
            .config
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if path.exists() {
            error!("{} already exists, not overwriting", path.display());
            std::process::exit(1);
        }
        Config::default().save(&path)?;
        println!("Created default config: {}", path.display());
        return Ok(());
    }

    let (config, config_path) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let success = match cli.command {
        Commands::Sync { source, no_track } => {
            let provider: Box<dyn DesiredSetProvider> = match source {
                Source::ServiceTags => Box::new(ServiceTagsProvider::new(
                    config.paths.service_tags_file.clone(),
                    config.service_tags.selectors.clone(),
                )),
                Source::Static => Box::new(StaticListProvider::new(
                    config.paths.static_routes_file.clone(),
                )),
            };
            reconcile(&config, provider.as_ref(), ReconcileOptions::add(!no_track)).await?
        }
        Commands::Delete => {
            reconcile(&config, &FixedSet::default(), ReconcileOptions::delete()).await?
        }
        Commands::Backup => backup(config, &config_path).await?,
        Commands::Servers => list_servers(&config).await?,
        Commands::Discover => discover(config, &config_path).await?,
        Commands::Status => {
            status(&config);
            true
        }
        Commands::Init => true,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf), ConfigError> {
    let path = Config::locate(explicit).ok_or_else(|| {
        ConfigError::ReadError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no config file found, run `vpn-route-sync init`",
        ))
    })?;
    let config = Config::load(&path)?;
    info!("Loaded config from {}", path.display());
    Ok((config, path))
}

async fn reconcile(
    config: &Config,
    provider: &dyn DesiredSetProvider,
    options: ReconcileOptions,
) -> Result<bool, Box<dyn std::error::Error>> {
    let targets = config.targets();
    if targets.is_empty() {
        warn!("No servers found in config");
        return Ok(true);
    }

    let client = ApiClient::new(&config.api)?;
    let snapshots = SnapshotStore::new(config.paths.backup_dir.clone());
    let ledger = PendingDeleteLedger::new(config.paths.pending_delete_file.clone());

    let reconciler = Reconciler::new(&client, &snapshots, &ledger, options);
    let summaries = reconciler.run(&targets, provider).await;
    Ok(report(&summaries))
}

fn report(summaries: &[Summary]) -> bool {
    let mut tally = Tally::default();
    for summary in summaries {
        println!("{}", summary);
        tally.record(summary);
    }
    println!("Total: {}", tally);
    tally.is_success()
}

async fn backup(mut config: Config, path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api)?;
    let snapshots = SnapshotStore::new(config.paths.backup_dir.clone());

    let mut success = true;
    let mut updated = 0;
    for server in config.targets() {
        match backup_routes(&client, &snapshots, &server.id).await {
            Ok(networks) => {
                println!(
                    "{} ({}): {} routes saved to {}",
                    server.name,
                    server.id,
                    networks.len(),
                    snapshots.path_for(&server.id).display()
                );
                record_route_group(&mut config, &server.id, networks);
                updated += 1;
            }
            Err(e) => {
                error!("{}", e);
                success = false;
            }
        }
    }

    if updated > 0 {
        config.save(path)?;
        println!("Updated route groups for {} servers in {}", updated, path.display());
    }
    Ok(success)
}

async fn list_servers(config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api)?;
    let servers = match client.list_servers().await {
        Ok(servers) => servers,
        Err(e) => {
            error!("Failed to list servers: {}", e);
            return Ok(false);
        }
    };

    for server in &servers {
        let routes = match client.list_routes(&server.id).await {
            Ok(routes) => routes.len().to_string(),
            Err(e) => {
                warn!("Failed to get routes for {}: {}", server.id, e);
                "?".to_string()
            }
        };
        println!("{}\t{}\t{} routes", server.id, server.name, routes);
    }
    Ok(true)
}

async fn discover(mut config: Config, path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api)?;
    let discovered = match discover_servers(&client).await {
        Ok(discovered) => discovered,
        Err(e) => {
            error!("Failed to list servers: {}", e);
            return Ok(false);
        }
    };

    let added = merge_discovered(&mut config, discovered);
    if added > 0 {
        config.save(path)?;
        println!("Added {} new servers to {}", added, path.display());
    } else {
        println!("No new servers found to add");
    }
    Ok(true)
}

fn status(config: &Config) {
    let snapshots = SnapshotStore::new(config.paths.backup_dir.clone());
    let pending = PendingDeleteLedger::new(config.paths.pending_delete_file.clone()).load();

    for server in config.targets() {
        println!("{} ({})", server.name, server.id);
        match snapshots.try_load(&server.id) {
            Ok(Some(map)) => println!("  Snapshot: {} routes", map.len()),
            Ok(None) => println!("  Snapshot: none"),
            Err(e) => println!("  Snapshot: unreadable ({})", e),
        }
        let networks = pending.for_server(&server.id);
        println!("  Pending delete: {}", networks.len());
        for network in &networks {
            println!("    {}", network);
        }
    }
}
