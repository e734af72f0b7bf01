use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, info};

use roomgrid_core::{
    compute_visibility, load_registry, load_roster, logging, Config, Participant, PinnedSet,
    ResolutionPath, ResolverRules, StreamHandle, StreamResolver, SuppressionSet, UserId, Viewer,
};

/// Inspect participant grid decisions from roster snapshots
#[derive(Debug, Parser)]
#[command(name = "roomgrid", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short, env = "ROOMGRID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the participants a viewer would see
    Visibility {
        /// JSON array of roster entries
        #[arg(long)]
        roster: PathBuf,

        /// User id of the viewer
        #[arg(long)]
        viewer: String,

        /// Treat the viewer as a host
        #[arg(long)]
        host: bool,

        /// Pinned user ids, oldest first
        #[arg(long = "pinned")]
        pinned: Vec<String>,
    },
    /// Print which registry stream a participant resolves to
    Resolve {
        /// JSON array of roster entries
        #[arg(long)]
        roster: PathBuf,

        /// JSON object mapping stream keys to streams
        #[arg(long)]
        registry: PathBuf,

        /// User id to resolve
        #[arg(long)]
        user: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveOutput {
    user_id: UserId,
    path: Option<ResolutionPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_id: Option<String>,
}

fn read_roster(path: &Path) -> Result<Vec<Participant>> {
    let roster = load_roster(path).with_context(|| format!("Failed to load roster {}", path.display()))?;
    debug!(participants = roster.len(), "Loaded roster");
    Ok(roster)
}

fn read_registry(path: &Path) -> Result<IndexMap<String, StreamHandle>> {
    let registry =
        load_registry(path).with_context(|| format!("Failed to load registry {}", path.display()))?;
    debug!(streams = registry.len(), "Loaded stream registry");
    Ok(registry)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Visibility {
            roster,
            viewer,
            host,
            pinned,
        } => {
            let roster = read_roster(&roster)?;
            let viewer = if host {
                Viewer::host(viewer)
            } else {
                Viewer::participant(viewer)
            };

            let mut pins = PinnedSet::new(config.grid.max_pinned);
            for id in pinned {
                pins.pin(UserId::from(id));
            }

            let decision = compute_visibility(
                &roster,
                &viewer,
                &SuppressionSet::new(config.grid.suppression_ttl()),
                Instant::now(),
            )
            .order_pinned_first(&pins);
            info!(viewer = %viewer.user_id, visible = decision.len(), "Computed visibility");
            print_json(&decision)
        }
        Command::Resolve {
            roster,
            registry,
            user,
        } => {
            let roster = read_roster(&roster)?;
            let registry = read_registry(&registry)?;
            let user_id = UserId::from(user);
            let participant = roster
                .iter()
                .find(|p| p.user_id == user_id)
                .with_context(|| format!("Participant {user_id} is not in the roster"))?;

            let resolver = StreamResolver::new(ResolverRules::from_config(&config.grid));
            let resolution = resolver.resolve(participant, None, &registry);
            info!(
                user_id = %user_id,
                resolved = resolution.is_some(),
                "Resolved participant stream"
            );

            let output = match resolution {
                Some(found) => ResolveOutput {
                    user_id,
                    path: Some(found.path),
                    stream_id: Some(found.stream.id.clone()),
                },
                None => ResolveOutput {
                    user_id,
                    path: None,
                    stream_id: None,
                },
            };
            print_json(&output)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config_path = cli.config.as_deref().map(Path::to_string_lossy);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;

    run(cli.command, &config)
}
