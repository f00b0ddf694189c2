//! CLI command definitions and dispatch.

pub mod aggregate;
pub mod config;
pub mod list;
pub mod migrate;
pub mod show;
pub mod status;
pub mod sweep;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::output::OutputFormat;
use portal_aggregation::{AggregationCoordinator, AggregationEngine, AggregationService};
use portal_core::config::AppConfig;
use portal_core::error::AppError;
use portal_core::types::ActorId;
use portal_database::{DatabasePool, PgNotificationStore};
use portal_entity::{ActorType, Owner};

/// Operator tool for the portal notification aggregation engine
#[derive(Debug, Parser)]
#[command(name = "portal-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to the base configuration file (without extension)
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Run an aggregation pass for one actor
    Aggregate(aggregate::AggregateArgs),
    /// Reconcile orphaned parents and unlinked notifications
    Sweep(sweep::SweepArgs),
    /// Show one aggregate with its children
    Show(show::ShowArgs),
    /// List an actor's visible notifications or a parent's children
    List(list::ListArgs),
    /// Change the status of a notification
    Status(status::StatusArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

/// Identifies the owning actor of an operation.
#[derive(Debug, Clone, Args)]
pub struct OwnerArgs {
    /// Actor id
    #[arg(long)]
    pub actor_id: Uuid,
    /// Actor type: client, expert, apporteur, admin
    #[arg(long)]
    pub actor_type: ActorType,
}

impl OwnerArgs {
    /// The owner these arguments name.
    pub fn owner(&self) -> Owner {
        Owner::new(ActorId::from_uuid(self.actor_id), self.actor_type)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &self.config, self.format).await,
            Commands::Aggregate(args) => aggregate::execute(args, &self.config, self.format).await,
            Commands::Sweep(args) => sweep::execute(args, &self.config, self.format).await,
            Commands::Show(args) => show::execute(args, &self.config, self.format).await,
            Commands::List(args) => list::execute(args, &self.config, self.format).await,
            Commands::Status(args) => status::execute(args, &self.config, self.format).await,
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    let env = std::env::var("PORTAL_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load_from(config_path, &env)
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<sqlx::PgPool, AppError> {
    let pool = DatabasePool::connect(&config.database).await?;
    Ok(pool.into_pool())
}

/// Helper: build the aggregation service over PostgreSQL
pub async fn create_service(config_path: &str) -> Result<AggregationService, AppError> {
    let config = load_config(config_path)?;
    let pool = create_db_pool(&config).await?;

    let store = Arc::new(PgNotificationStore::new(pool));
    let engine = Arc::new(AggregationEngine::new(store, &config.aggregation));
    let coordinator = Arc::new(AggregationCoordinator::new(engine, &config.aggregation));
    Ok(AggregationService::new(coordinator))
}
