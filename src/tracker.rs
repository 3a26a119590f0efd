//! Per-item state tracking for batch uploads.
//!
//! State machine per item: pending -> processing -> {success | failed}.
//! Success and failed are terminal; only [`reset_all`] (the compensating
//! transition used by rollback) moves an item back to pending.

use crate::entities;
use crate::errors::AlmonerError;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
        }
    }
}

/// Counters folded from persisted item state. Always recomputed from the
/// store after a pass, never accumulated in mutable loop state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub processed: i32,
    pub successful: i32,
    pub failed: i32,
}

/// Fold item rows into counters.
pub fn tally_items(items: &[entities::batch_item::Model]) -> Tally {
    items.iter().fold(Tally::default(), |mut t, item| {
        match item.status.as_str() {
            "success" => {
                t.successful += 1;
                t.processed += 1;
            }
            "failed" => {
                t.failed += 1;
                t.processed += 1;
            }
            _ => {}
        }
        t
    })
}

/// All items of a batch, in stable row order.
pub async fn list_items<C: ConnectionTrait>(
    db: &C,
    batch_id: i64,
) -> Result<Vec<entities::batch_item::Model>, AlmonerError> {
    use entities::batch_item::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::BatchId.eq(batch_id))
        .order_by_asc(Column::RowIndex)
        .all(db)
        .await?)
}

pub async fn tally(db: &DatabaseConnection, batch_id: i64) -> Result<Tally, AlmonerError> {
    Ok(tally_items(&list_items(db, batch_id).await?))
}

/// Move a pending item to processing.
pub async fn mark_processing(db: &DatabaseConnection, item_id: i64) -> Result<(), AlmonerError> {
    use entities::batch_item::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value(ItemStatus::Processing.as_str()))
        .filter(Column::Id.eq(item_id))
        .filter(Column::Status.eq(ItemStatus::Pending.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AlmonerError::InvalidState(format!(
            "batch item {item_id} is not pending"
        )));
    }
    Ok(())
}

/// Terminal success transition: records the created case/contribution and the
/// resolved donor.
pub async fn mark_success(
    db: &DatabaseConnection,
    item_id: i64,
    case_id: i64,
    contribution_id: i64,
    donor_id: i64,
) -> Result<(), AlmonerError> {
    use entities::batch_item::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value(ItemStatus::Success.as_str()))
        .col_expr(Column::CaseId, Expr::value(Some(case_id)))
        .col_expr(Column::ContributionId, Expr::value(Some(contribution_id)))
        .col_expr(Column::DonorId, Expr::value(Some(donor_id)))
        .col_expr(Column::ErrorMessage, Expr::value(None::<String>))
        .filter(Column::Id.eq(item_id))
        .filter(Column::Status.eq(ItemStatus::Processing.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AlmonerError::InvalidState(format!(
            "batch item {item_id} is not processing"
        )));
    }
    Ok(())
}

/// Terminal failure transition: records the reason on the item.
pub async fn mark_failed(
    db: &DatabaseConnection,
    item_id: i64,
    reason: &str,
) -> Result<(), AlmonerError> {
    use entities::batch_item::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value(ItemStatus::Failed.as_str()))
        .col_expr(Column::ErrorMessage, Expr::value(Some(reason.to_string())))
        .filter(Column::Id.eq(item_id))
        .filter(Column::Status.eq(ItemStatus::Processing.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AlmonerError::InvalidState(format!(
            "batch item {item_id} is not processing"
        )));
    }
    Ok(())
}

/// Compensating transition used exclusively by rollback: every item of the
/// batch back to pending with all linkage and error state cleared. Idempotent.
pub async fn reset_all<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<u64, AlmonerError> {
    use entities::batch_item::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value(ItemStatus::Pending.as_str()))
        .col_expr(Column::CaseId, Expr::value(None::<i64>))
        .col_expr(Column::ContributionId, Expr::value(None::<i64>))
        .col_expr(Column::DonorId, Expr::value(None::<i64>))
        .col_expr(Column::ErrorMessage, Expr::value(None::<String>))
        .filter(Column::BatchId.eq(batch_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
