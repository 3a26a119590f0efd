//! Batch orchestration: claims a pending upload, walks its items in row
//! order, and turns each valid row into a case plus contribution.
//!
//! A failed row fails its own item only; the pass continues. Final counters
//! and the error summary are recomputed from persisted item state, so a
//! crash mid-pass leaves nothing to reconcile beyond the items themselves.

use crate::entities;
use crate::errors::AlmonerError;
use crate::rows::{self, RawRow, RowIssue, RowIntent};
use crate::storage;
use crate::tracker;
use sea_orm::DatabaseConnection;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal means the pass over the items has finished.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }
}

impl FromStr for BatchStatus {
    type Err = AlmonerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "processing" => Ok(BatchStatus::Processing),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            other => Err(AlmonerError::Other(format!(
                "unknown batch status '{other}'"
            ))),
        }
    }
}

/// Run a full processing pass over a pending batch.
///
/// Exactly one caller can win the pending -> processing transition; everyone
/// else gets [`AlmonerError::InvalidState`]. The batch ends `completed` when
/// every item succeeded, `failed` otherwise, with per-row reasons collected
/// into the error summary.
pub async fn process_batch(
    db: &DatabaseConnection,
    batch_id: i64,
) -> Result<entities::batch_upload::Model, AlmonerError> {
    let batch = storage::get_batch(db, batch_id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {batch_id}")))?;

    if !storage::claim_batch_for_processing(db, batch_id).await? {
        return Err(AlmonerError::InvalidState(format!(
            "batch upload {batch_id} is '{}', only pending batches can be processed",
            batch.status
        )));
    }

    tracing::info!(
        batch_id,
        total_items = batch.total_items,
        "Processing batch upload '{}'",
        batch.name
    );

    // One snapshot of known contributors for the whole pass; rows added
    // mid-pass are intentionally not picked up.
    let donors = storage::donor_resolution_map(db).await?;

    let items = tracker::list_items(db, batch_id).await?;
    for item in items.iter().filter(|i| i.status == "pending") {
        tracker::mark_processing(db, item.id).await?;

        let raw = RawRow {
            row_index: item.row_index,
            case_number: item.case_number.clone(),
            combined_case_number: item.combined_case_number.clone(),
            title: item.title.clone(),
            nickname: item.nickname.clone(),
            amount: item.amount.clone(),
            month: item.month.clone(),
        };

        match rows::map_row(&raw, &donors) {
            Ok(intent) => match create_records(db, batch_id, &intent).await {
                Ok((case_id, contribution_id)) => {
                    tracker::mark_success(db, item.id, case_id, contribution_id, intent.donor_id)
                        .await?;
                }
                Err(e) => {
                    tracing::warn!(
                        batch_id,
                        row_index = item.row_index,
                        error = %e,
                        "Row failed while creating records"
                    );
                    tracker::mark_failed(db, item.id, &e.to_string()).await?;
                }
            },
            Err(issue) => {
                tracker::mark_failed(db, item.id, &issue.message).await?;
            }
        }
    }

    let items = tracker::list_items(db, batch_id).await?;
    let tally = tracker::tally_items(&items);
    let status = if tally.failed == 0 {
        BatchStatus::Completed
    } else {
        BatchStatus::Failed
    };

    let issues: Vec<RowIssue> = items
        .iter()
        .filter(|i| i.status == "failed")
        .map(|i| RowIssue {
            row_index: i.row_index,
            message: i.error_message.clone().unwrap_or_default(),
        })
        .collect();
    let error_summary = if issues.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&issues)?)
    };

    storage::finalize_batch(
        db,
        batch_id,
        status.as_str(),
        tally.processed,
        tally.successful,
        tally.failed,
        error_summary,
    )
    .await?;

    tracing::info!(
        batch_id,
        status = status.as_str(),
        successful = tally.successful,
        failed = tally.failed,
        "Batch upload finished"
    );

    let batch = storage::get_batch(db, batch_id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {batch_id}")))?;

    notify_admins(db, &batch, tally).await;

    Ok(batch)
}

/// Persist the case, its contribution, and the case amount for one valid row.
async fn create_records(
    db: &DatabaseConnection,
    batch_id: i64,
    intent: &RowIntent,
) -> Result<(i64, i64), AlmonerError> {
    let case = storage::create_case(
        db,
        Some(batch_id),
        &intent.case_number,
        intent.combined_case_number.clone(),
        &intent.title,
        &intent.month,
    )
    .await?;

    let contribution = storage::create_contribution(
        db,
        Some(batch_id),
        case.id,
        intent.donor_id,
        intent.amount_cents,
        &intent.month,
    )
    .await?;

    storage::add_to_case_amount(db, case.id, intent.amount_cents).await?;

    Ok((case.id, contribution.id))
}

/// Best-effort fan-out to admin contributors. A notification failure is
/// logged and never fails the already-finalized batch.
async fn notify_admins(db: &DatabaseConnection, batch: &entities::batch_upload::Model, tally: tracker::Tally) {
    let admins = match storage::list_admin_donors(db).await {
        Ok(admins) => admins,
        Err(e) => {
            tracing::warn!(batch_id = batch.id, error = %e, "Failed to list admins for notification");
            return;
        }
    };

    let body = format!(
        "Batch upload '{}' finished as {}: {} succeeded, {} failed.",
        batch.name, batch.status, tally.successful, tally.failed
    );
    for admin in admins {
        if let Err(e) = storage::create_notification(db, admin.id, "batch_finished", &body).await {
            tracing::warn!(
                batch_id = batch.id,
                donor_id = admin.id,
                error = %e,
                "Failed to create admin notification"
            );
        }
    }
}
