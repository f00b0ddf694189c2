//! Orphan reconciliation command.

use clap::Args;
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use portal_aggregation::SweepScope;
use portal_core::error::AppError;
use portal_core::types::ActorId;
use portal_entity::{ActorType, Owner};

/// Arguments for the sweep command
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Sweep a single actor (requires --actor-type)
    #[arg(long, conflicts_with = "all", requires = "actor_type")]
    pub actor_id: Option<Uuid>,
    /// Actor type; with --all, restricts the sweep to that type
    #[arg(long)]
    pub actor_type: Option<ActorType>,
    /// Sweep every actor
    #[arg(long)]
    pub all: bool,
}

impl SweepArgs {
    /// Resolve the arguments into a sweep scope.
    pub fn scope(&self) -> Result<SweepScope, AppError> {
        match (self.actor_id, self.actor_type) {
            (Some(id), Some(actor_type)) => Ok(SweepScope::Actor(Owner::new(
                ActorId::from_uuid(id),
                actor_type,
            ))),
            (None, actor_type) if self.all => Ok(SweepScope::All(actor_type)),
            _ => Err(AppError::validation(
                "Pass --actor-id with --actor-type, or --all",
            )),
        }
    }
}

/// Execute the sweep and print its report
pub async fn execute(
    args: &SweepArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let scope = args.scope()?;
    let service = super::create_service(config_path).await?;

    let result = service.sweep_orphans(scope).await?;
    if format == OutputFormat::Table {
        output::print_success("Sweep completed");
    }
    output::print_item(&result, format);

    Ok(())
}
