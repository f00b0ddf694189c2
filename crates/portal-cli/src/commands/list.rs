//! List notifications.

use clap::Args;
use uuid::Uuid;

use super::OwnerArgs;
use crate::output::{self, NotificationRow, OutputFormat};
use portal_core::error::AppError;
use portal_core::types::NotificationId;

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Owner of the notifications
    #[command(flatten)]
    pub owner: OwnerArgs,
    /// List the children of this parent instead of the visible feed
    #[arg(long)]
    pub parent: Option<Uuid>,
    /// Maximum number of visible notifications
    #[arg(long, default_value_t = 50)]
    pub limit: i64,
}

/// Print the requested notifications
pub async fn execute(
    args: &ListArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::create_service(config_path).await?;
    let store = service.coordinator().engine().store();
    let owner = args.owner.owner();

    let notifications = match args.parent {
        Some(parent) => {
            let parent_id = NotificationId::from_uuid(parent);
            let parent = store
                .find_by_id(parent_id)
                .await?
                .filter(|p| p.owner() == owner && p.is_parent())
                .ok_or_else(|| {
                    AppError::not_found(format!("Parent {parent_id} of {owner} not found"))
                })?;
            store.list_children(parent.id).await?
        }
        None => store.list_visible(&owner, args.limit).await?,
    };

    let rows: Vec<NotificationRow> = notifications.iter().map(NotificationRow::from).collect();
    output::print_list(&rows, format);

    Ok(())
}
