//! # Command Line Interface
//!
//! `keyplane` resolves, describes and validates secret references against
//! the providers of a configuration file.

pub mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{KeyplaneConfig, LogFormat, CONFIG_PATH_ENV};
use crate::errors::SecretsError;
use crate::observability::{init_logging, log_config_info};
use crate::secrets::{ProviderRegistry, ProviderSet, SecretReference};
use output::{OutputFormat, ProviderRow, ResolvedSecret};

#[derive(Parser)]
#[command(name = "keyplane")]
#[command(about = "Resolve secret references across secret stores")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML, TOML or JSON); defaults to $KEYPLANE_CONFIG
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a reference and print its value
    Resolve {
        /// Configured provider name
        provider: String,
        /// Reference in the provider's own syntax
        key: String,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
        output: OutputFormat,
    },

    /// Show metadata of a reference without reading its value
    Describe {
        provider: String,
        key: String,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },

    /// Check that providers can authenticate and reach their backend
    Validate {
        /// Validate only this provider
        provider: Option<String>,
    },

    /// List configured providers and their capabilities
    Providers {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
        output: OutputFormat,
    },

    /// List supported provider types
    Types,
}

/// Parse arguments and run the selected command
pub async fn run_cli() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    initialise_logging(&cli, &config)?;
    log_config_info(&config);

    let registry = ProviderRegistry::builtin();

    match cli.command {
        Commands::Types => {
            for provider_type in registry.supported_types() {
                println!("{provider_type}");
            }
        }
        Commands::Resolve { provider, key, output } => {
            let providers = ProviderSet::from_config(&config, &registry).await?;
            let reference = SecretReference::new(provider, key);
            let secret = providers.resolve(&reference).await?;

            match output {
                OutputFormat::Plain => println!("{}", secret.expose()),
                format => output::print_output(
                    &ResolvedSecret::new(reference.to_string(), &secret),
                    format,
                )?,
            }
        }
        Commands::Describe { provider, key, output } => {
            let providers = ProviderSet::from_config(&config, &registry).await?;
            let metadata = providers.describe(&SecretReference::new(provider, key)).await?;
            output::print_output(&metadata, output)?;
        }
        Commands::Validate { provider } => {
            let providers = ProviderSet::from_config(&config, &registry).await?;
            match provider {
                Some(name) => {
                    providers.validate(&name).await?;
                    println!("{name}: ok");
                }
                None => {
                    providers.validate_all().await?;
                    for name in providers.names() {
                        println!("{name}: ok");
                    }
                }
            }
        }
        Commands::Providers { output } => {
            let providers = ProviderSet::from_config(&config, &registry).await?;
            let rows: Vec<ProviderRow> = providers
                .iter()
                .map(|(name, provider)| ProviderRow {
                    name,
                    provider_type: config
                        .providers
                        .get(name)
                        .map(|p| p.provider_type.as_str())
                        .unwrap_or_default(),
                    capabilities: provider.capabilities(),
                })
                .collect();

            match output {
                OutputFormat::Plain => print_provider_table(&rows),
                format => output::print_output(&rows, format)?,
            }
        }
    }

    Ok(())
}

/// Human-readable rendering of a CLI failure, suggestion included
pub fn render_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<SecretsError>() {
        Some(secrets_error) => secrets_error.render(),
        None => format!("{error:#}"),
    }
}

fn load_dotenv() {
    // A missing .env is normal; anything else is worth a warning
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<KeyplaneConfig> {
    let path = cli.config.clone().or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
    let config = KeyplaneConfig::load(path.as_deref())?;
    debug!(path = ?path, "Configuration loaded");
    Ok(config)
}

fn initialise_logging(cli: &Cli, config: &KeyplaneConfig) -> anyhow::Result<()> {
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    init_logging(&logging).context("Failed to initialise logging")
}

fn print_provider_table(rows: &[ProviderRow]) {
    if rows.is_empty() {
        println!("No providers configured");
        return;
    }

    output::print_table_header(&[("NAME", 20), ("TYPE", 20), ("CAPABILITIES", 40)]);
    for row in rows {
        println!(
            "{:<20} {:<20} {}",
            output::truncate(row.name, 20),
            output::truncate(row.provider_type, 20),
            output::capability_flags(row.capabilities)
        );
    }
}
