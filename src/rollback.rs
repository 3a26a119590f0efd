//! Rollback: the compensating action for a processed batch upload.
//!
//! Deletes every case and contribution the batch created, resets all items
//! to pending, and returns the batch row itself to pending. Runs in a single
//! transaction, so a rolled-back batch is either fully compensated or
//! untouched. Safe to repeat.

use crate::batch::BatchStatus;
use crate::entities;
use crate::errors::AlmonerError;
use crate::storage;
use crate::tracker;
use sea_orm::{DatabaseConnection, TransactionTrait};

/// Undo everything a batch upload created.
///
/// A batch that is currently `processing` is refused unless `force` is set;
/// forcing is reserved for the operator CLI, for batches stranded mid-pass
/// by a crash.
pub async fn rollback(
    db: &DatabaseConnection,
    batch_id: i64,
    force: bool,
) -> Result<entities::batch_upload::Model, AlmonerError> {
    let batch = storage::get_batch(db, batch_id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {batch_id}")))?;

    if batch.status == BatchStatus::Processing.as_str() && !force {
        return Err(AlmonerError::InvalidState(format!(
            "batch upload {batch_id} is processing; wait for it to finish or force-reset it"
        )));
    }

    let txn = db.begin().await?;

    let contributions = storage::delete_contributions_by_batch(&txn, batch_id).await?;
    let cases = storage::delete_cases_by_batch(&txn, batch_id).await?;
    let items = tracker::reset_all(&txn, batch_id).await?;
    storage::reset_batch(&txn, batch_id).await?;

    txn.commit().await?;

    tracing::info!(
        batch_id,
        contributions,
        cases,
        items,
        "Rolled back batch upload '{}'",
        batch.name
    );

    storage::get_batch(db, batch_id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {batch_id}")))
}
