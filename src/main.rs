use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_metadata::config;
use pezzottify_metadata::metadata::{FieldOverride, MetadataField};
use pezzottify_metadata::{JsonCatalogProvider, MetadataService, SqliteMetadataStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing metadata.db. Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Tiers consulted after locked fields, in order (e.g. "agent,embedded").
    #[clap(long, value_delimiter = ',')]
    pub fallback_tiers: Option<Vec<String>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers a catalog item.
    AddItem { item_id: String },

    /// Deletes a catalog item with its overrides, tags and files.
    DeleteItem { item_id: String },

    /// Shows the resolved metadata of an item.
    Show { item_id: String },

    /// Shows the unmerged agent, embedded and custom tiers of an item.
    Layers { item_id: String },

    /// Shows every resolved field with the tier it came from.
    Sources { item_id: String },

    /// Locks a field, to the given value or to its current value.
    Lock {
        item_id: String,
        field: String,
        #[clap(long)]
        value: Option<String>,
    },

    /// Unlocks a field, letting the lower tiers show through again.
    Unlock { item_id: String, field: String },

    /// Sets a field to a value. Editing always locks.
    Edit {
        item_id: String,
        field: String,
        value: String,
    },

    /// Drops every override of an item.
    Clear { item_id: String },

    /// Applies a JSON object of {"field": {"value": ..., "locked": ...}} at once.
    Apply {
        item_id: String,
        #[clap(value_parser = parse_path)]
        file: PathBuf,
    },

    /// Links an item to a record of a JSON provider catalog.
    Link {
        item_id: String,
        external_id: String,
        /// JSON array of provider records.
        #[clap(long, value_parser = parse_path)]
        catalog: PathBuf,
        /// Provider name recorded as the agent source.
        #[clap(long, default_value = "catalog")]
        provider: String,
    },

    /// Lists provider records matching an item's current title and author.
    Matches {
        item_id: String,
        #[clap(long, value_parser = parse_path)]
        catalog: PathBuf,
        #[clap(long, default_value = "catalog")]
        provider: String,
    },

    /// Removes an item's provider link.
    Unlink {
        item_id: String,
        /// Keep locked fields instead of clearing them.
        #[clap(long)]
        keep_locked: bool,
    },

    /// Attaches media files to an item.
    AddFiles { item_id: String, paths: Vec<String> },

    /// Lists an item's media files in playback order.
    Files { item_id: String },

    /// Deletes provider records no item links to.
    PruneAgents,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            fallback_tiers: args.fallback_tiers.clone(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(service: &MetadataService, command: Command) -> Result<()> {
    match command {
        Command::AddItem { item_id } => {
            if service.create_item(&item_id)? {
                println!("Created {}", item_id);
            } else {
                println!("{} already exists", item_id);
            }
        }
        Command::DeleteItem { item_id } => {
            service.delete_item(&item_id)?;
            println!("Deleted {}", item_id);
        }
        Command::Show { item_id } => print_json(&service.get_resolved(&item_id)?)?,
        Command::Layers { item_id } => print_json(&service.get_layers(&item_id)?)?,
        Command::Sources { item_id } => {
            let resolution = service.get_resolution(&item_id)?;
            for field in MetadataField::ALL {
                let Some(source) = resolution.sources.get(&field) else {
                    continue;
                };
                let value = resolution
                    .metadata
                    .get(field)
                    .map(|v| v.to_custom_string())
                    .unwrap_or_default();
                println!("{:<16} {:<48} {}", field.as_str(), value, source.label());
            }
        }
        Command::Lock {
            item_id,
            field,
            value,
        } => print_json(&service.set_lock(&item_id, &field, true, value)?)?,
        Command::Unlock { item_id, field } => {
            print_json(&service.set_lock(&item_id, &field, false, None)?)?
        }
        Command::Edit {
            item_id,
            field,
            value,
        } => print_json(&service.edit(&item_id, &field, value)?)?,
        Command::Clear { item_id } => {
            service.clear_all(&item_id)?;
            println!("Cleared all overrides of {}", item_id);
        }
        Command::Apply { item_id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read batch file {:?}", file))?;
            let batch: BTreeMap<String, FieldOverride> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse batch file {:?}", file))?;
            print_json(&service.batch_apply(&item_id, &batch)?)?
        }
        Command::Link {
            item_id,
            external_id,
            catalog,
            provider,
        } => {
            let provider = JsonCatalogProvider::load(provider, &catalog)?;
            let record = service
                .link_from_provider(&item_id, &provider, &external_id)
                .await?;
            print_json(&record)?
        }
        Command::Matches {
            item_id,
            catalog,
            provider,
        } => {
            let provider = JsonCatalogProvider::load(provider, &catalog)?;
            print_json(&service.find_matches(&item_id, &provider).await?)?
        }
        Command::Unlink {
            item_id,
            keep_locked,
        } => {
            service.unlink(&item_id, keep_locked)?;
            println!("Unlinked {}", item_id);
        }
        Command::AddFiles { item_id, paths } => {
            let added = service.add_item_files(&item_id, &paths)?;
            println!("Added {} files to {}", added, item_id);
        }
        Command::Files { item_id } => {
            for (i, path) in service.ordered_files(&item_id)?.iter().enumerate() {
                println!("{:>4}  {}", i + 1, path);
            }
        }
        Command::PruneAgents => {
            let pruned = service.prune_orphan_agent_records()?;
            println!("Pruned {} agent records", pruned);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;
    info!(
        "Using {:?} with fallback tiers {:?}",
        app_config.metadata_db_path(),
        app_config.resolver.fallback_tiers()
    );

    let store = SqliteMetadataStore::new(app_config.metadata_db_path())?;
    let service = MetadataService::new(Arc::new(store), app_config.resolver);

    execute(&service, cli_args.command).await
}
