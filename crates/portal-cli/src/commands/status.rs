//! Change the lifecycle status of a notification.

use clap::Args;
use uuid::Uuid;

use super::OwnerArgs;
use crate::output::{self, OutputFormat};
use portal_core::error::AppError;
use portal_core::types::NotificationId;
use portal_entity::LifecycleStatus;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Owner of the notification
    #[command(flatten)]
    pub owner: OwnerArgs,
    /// Notification id
    #[arg(long)]
    pub id: Uuid,
    /// New status: unread, read, archived, replaced
    #[arg(long)]
    pub status: LifecycleStatus,
}

/// Apply the status and print the pass that followed
pub async fn execute(
    args: &StatusArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::create_service(config_path).await?;
    let id = NotificationId::from_uuid(args.id);

    let report = service
        .set_status(args.owner.owner(), id, args.status)
        .await?;

    if format == OutputFormat::Table {
        output::print_success(&format!("Notification {id} is now {}", args.status));
    }
    output::print_item(&report, format);

    Ok(())
}
