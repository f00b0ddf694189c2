//! Manual aggregation pass.

use clap::Args;

use super::OwnerArgs;
use crate::output::{self, OutputFormat};
use portal_aggregation::TriggerOutcome;
use portal_core::error::AppError;

/// Arguments for the aggregate command
#[derive(Debug, Args)]
pub struct AggregateArgs {
    /// Actor to aggregate
    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Run one pass for the actor and print its report
pub async fn execute(
    args: &AggregateArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::create_service(config_path).await?;
    let owner = args.owner.owner();

    match service.trigger_aggregation(owner).await? {
        TriggerOutcome::Ran(report) => {
            if format == OutputFormat::Table {
                output::print_success(&format!("Aggregation pass completed for {owner}"));
            }
            output::print_item(&report, format);
        }
        outcome @ TriggerOutcome::Coalesced => {
            if format == OutputFormat::Table {
                output::print_success(&format!(
                    "A pass for {owner} is already running; it will pick up this request"
                ));
            } else {
                output::print_item(&outcome, format);
            }
        }
    }

    Ok(())
}
