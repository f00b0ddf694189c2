//! Show one aggregate.

use clap::Args;

use super::OwnerArgs;
use crate::output::{self, NotificationRow, OutputFormat};
use portal_core::error::AppError;
use portal_core::types::GroupKey;

/// Arguments for the show command
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Owner of the aggregate
    #[command(flatten)]
    pub owner: OwnerArgs,
    /// Grouping key (dossier, client or prospect id)
    #[arg(long)]
    pub group_key: String,
}

/// Print the parent and its active children
pub async fn execute(
    args: &ShowArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let key = GroupKey::parse(args.group_key.as_str())
        .ok_or_else(|| AppError::validation("Group key must not be empty"))?;
    let service = super::create_service(config_path).await?;

    let Some(view) = service.get_aggregate(args.owner.owner(), &key).await? else {
        return Err(AppError::not_found(format!(
            "No active aggregate for {} and group '{key}'",
            args.owner.owner()
        )));
    };

    match format {
        OutputFormat::Json => output::print_item(&view, format),
        OutputFormat::Table => {
            output::print_kv("Parent", &view.parent.id.to_string());
            output::print_kv("Title", &view.parent.payload.title);
            output::print_kv("Message", &view.parent.payload.message);
            output::print_kv("Priority", view.parent.priority.as_str());
            output::print_kv("Status", view.parent.lifecycle_status.as_str());
            output::print_kv("Children", &view.parent.children_count.to_string());
            if let Some(url) = &view.parent.payload.action_url {
                output::print_kv("Link", url);
            }
            if let Some(summary) = &view.summary {
                output::print_kv("Grouped by", summary.grouped_by.as_str());
                output::print_kv("Oldest (days)", &summary.max_age_days.to_string());
            }
            println!();
            let rows: Vec<NotificationRow> =
                view.children.iter().map(NotificationRow::from).collect();
            output::print_list(&rows, format);
        }
    }

    Ok(())
}
