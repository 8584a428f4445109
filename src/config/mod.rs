mod file_config;

pub use file_config::{FileConfig, ResolverConfig};

use crate::metadata::{Resolver, Tier};
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const METADATA_DB_FILENAME: &str = "metadata.db";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub fallback_tiers: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub resolver: Resolver,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let resolver = match file
            .resolver
            .and_then(|r| r.fallback_tiers)
            .or_else(|| cli.fallback_tiers.clone())
        {
            Some(names) => Resolver::new(parse_tiers(&names)?)?,
            None => Resolver::default(),
        };

        Ok(Self { db_dir, resolver })
    }

    pub fn metadata_db_path(&self) -> PathBuf {
        self.db_dir.join(METADATA_DB_FILENAME)
    }
}

fn parse_tiers(names: &[String]) -> Result<Vec<Tier>> {
    names.iter().map(|name| name.parse::<Tier>()).collect()
}
