use crate::entities;
use crate::errors::AlmonerError;
use crate::rows::RawRow;
use crate::settings::Database as DbCfg;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, AlmonerError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

#[derive(Debug, Clone)]
pub struct NewBatchUpload {
    pub name: String,
    pub file_name: String,
    pub created_by: Option<String>,
}

// Donor functions

pub async fn create_donor(
    db: &DatabaseConnection,
    nickname: &str,
    display_name: Option<String>,
    is_admin: bool,
) -> Result<entities::donor::Model, AlmonerError> {
    let donor = entities::donor::ActiveModel {
        nickname: Set(nickname.to_string()),
        display_name: Set(display_name),
        is_admin: Set(if is_admin { 1 } else { 0 }),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    Ok(donor.insert(db).await?)
}

pub async fn get_donor_by_nickname(
    db: &DatabaseConnection,
    nickname: &str,
) -> Result<Option<entities::donor::Model>, AlmonerError> {
    use entities::donor::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::Nickname.eq(nickname))
        .one(db)
        .await?)
}

/// Nickname resolution table for the row mapper: lowercased nickname -> donor id.
pub async fn donor_resolution_map(
    db: &DatabaseConnection,
) -> Result<HashMap<String, i64>, AlmonerError> {
    let donors = entities::Donor::find().all(db).await?;
    Ok(donors
        .into_iter()
        .map(|d| (d.nickname.to_lowercase(), d.id))
        .collect())
}

pub async fn list_admin_donors(
    db: &DatabaseConnection,
) -> Result<Vec<entities::donor::Model>, AlmonerError> {
    use entities::donor::{Column, Entity};

    Ok(Entity::find().filter(Column::IsAdmin.eq(1)).all(db).await?)
}

// Notification functions

pub async fn create_notification(
    db: &DatabaseConnection,
    donor_id: i64,
    kind: &str,
    body: &str,
) -> Result<entities::notification::Model, AlmonerError> {
    let notification = entities::notification::ActiveModel {
        donor_id: Set(donor_id),
        kind: Set(kind.to_string()),
        body: Set(body.to_string()),
        read: Set(0),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    Ok(notification.insert(db).await?)
}

// Batch upload functions

/// Create a batch upload with one pending item per parsed CSV row.
pub async fn create_batch_with_items(
    db: &DatabaseConnection,
    input: NewBatchUpload,
    rows: &[RawRow],
    file_hash: &str,
) -> Result<entities::batch_upload::Model, AlmonerError> {
    let now = Utc::now().timestamp();

    let txn = db.begin().await?;

    let batch = entities::batch_upload::ActiveModel {
        name: Set(input.name),
        file_name: Set(input.file_name),
        file_hash: Set(file_hash.to_string()),
        status: Set("pending".to_string()),
        total_items: Set(rows.len() as i32),
        processed_items: Set(0),
        successful_items: Set(0),
        failed_items: Set(0),
        error_summary: Set(None),
        metadata: Set(None),
        created_by: Set(input.created_by),
        created_at: Set(now),
        updated_at: Set(now),
        completed_at: Set(None),
        ..Default::default()
    };
    let batch = batch.insert(&txn).await?;

    for row in rows {
        let item = entities::batch_item::ActiveModel {
            batch_id: Set(batch.id),
            row_index: Set(row.row_index),
            case_number: Set(row.case_number.clone()),
            combined_case_number: Set(row.combined_case_number.clone()),
            title: Set(row.title.clone()),
            nickname: Set(row.nickname.clone()),
            amount: Set(row.amount.clone()),
            month: Set(row.month.clone()),
            status: Set("pending".to_string()),
            case_id: Set(None),
            contribution_id: Set(None),
            donor_id: Set(None),
            error_message: Set(None),
            ..Default::default()
        };
        item.insert(&txn).await?;
    }

    txn.commit().await?;

    Ok(batch)
}

pub async fn get_batch(
    db: &DatabaseConnection,
    batch_id: i64,
) -> Result<Option<entities::batch_upload::Model>, AlmonerError> {
    Ok(entities::BatchUpload::find_by_id(batch_id).one(db).await?)
}

pub async fn list_batches(
    db: &DatabaseConnection,
) -> Result<Vec<entities::batch_upload::Model>, AlmonerError> {
    use entities::batch_upload::{Column, Entity};

    Ok(Entity::find().order_by_desc(Column::Id).all(db).await?)
}

/// Atomically claim a pending batch for processing.
///
/// Returns false if the batch was not in "pending" status — the single-writer
/// guard against double-processing and process/rollback races.
pub async fn claim_batch_for_processing(
    db: &DatabaseConnection,
    batch_id: i64,
) -> Result<bool, AlmonerError> {
    use entities::batch_upload::{Column, Entity};
    use sea_orm::sea_query::Expr;

    let now = Utc::now().timestamp();
    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value("processing"))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(batch_id))
        .filter(Column::Status.eq("pending"))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Write final counters and terminal status after a processing pass.
pub async fn finalize_batch(
    db: &DatabaseConnection,
    batch_id: i64,
    status: &str,
    processed: i32,
    successful: i32,
    failed: i32,
    error_summary: Option<String>,
) -> Result<(), AlmonerError> {
    use entities::batch_upload::{Column, Entity};
    use sea_orm::sea_query::Expr;

    let now = Utc::now().timestamp();
    Entity::update_many()
        .col_expr(Column::Status, Expr::value(status))
        .col_expr(Column::ProcessedItems, Expr::value(processed))
        .col_expr(Column::SuccessfulItems, Expr::value(successful))
        .col_expr(Column::FailedItems, Expr::value(failed))
        .col_expr(Column::ErrorSummary, Expr::value(error_summary))
        .col_expr(Column::CompletedAt, Expr::value(Some(now)))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(batch_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Reset a batch to its pre-processing state. Used by rollback.
pub async fn reset_batch<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<(), AlmonerError> {
    use entities::batch_upload::{Column, Entity};
    use sea_orm::sea_query::Expr;

    let now = Utc::now().timestamp();
    Entity::update_many()
        .col_expr(Column::Status, Expr::value("pending"))
        .col_expr(Column::ProcessedItems, Expr::value(0))
        .col_expr(Column::SuccessfulItems, Expr::value(0))
        .col_expr(Column::FailedItems, Expr::value(0))
        .col_expr(Column::ErrorSummary, Expr::value(None::<String>))
        .col_expr(Column::CompletedAt, Expr::value(None::<i64>))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(batch_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Delete a batch and its items. Callers must ensure the batch created no
/// domain records (or rolled them back first).
pub async fn delete_batch(db: &DatabaseConnection, batch_id: i64) -> Result<(), AlmonerError> {
    use entities::batch_item::{Column as ItemColumn, Entity as ItemEntity};

    let txn = db.begin().await?;

    ItemEntity::delete_many()
        .filter(ItemColumn::BatchId.eq(batch_id))
        .exec(&txn)
        .await?;
    entities::BatchUpload::delete_by_id(batch_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

// Case and contribution functions

pub async fn create_case(
    db: &DatabaseConnection,
    batch_id: Option<i64>,
    case_number: &str,
    combined_case_number: Option<String>,
    title: &str,
    month: &str,
) -> Result<entities::case::Model, AlmonerError> {
    let now = Utc::now().timestamp();

    let case = entities::case::ActiveModel {
        batch_id: Set(batch_id),
        case_number: Set(case_number.to_string()),
        combined_case_number: Set(combined_case_number),
        title: Set(title.to_string()),
        status: Set("open".to_string()),
        current_amount_cents: Set(0),
        month: Set(month.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(case.insert(db).await?)
}

pub async fn create_contribution(
    db: &DatabaseConnection,
    batch_id: Option<i64>,
    case_id: i64,
    donor_id: i64,
    amount_cents: i64,
    month: &str,
) -> Result<entities::contribution::Model, AlmonerError> {
    let contribution = entities::contribution::ActiveModel {
        batch_id: Set(batch_id),
        case_id: Set(case_id),
        donor_id: Set(donor_id),
        amount_cents: Set(amount_cents),
        status: Set("confirmed".to_string()),
        month: Set(month.to_string()),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    Ok(contribution.insert(db).await?)
}

pub async fn add_to_case_amount(
    db: &DatabaseConnection,
    case_id: i64,
    delta_cents: i64,
) -> Result<(), AlmonerError> {
    use entities::case::{Column, Entity};
    use sea_orm::sea_query::Expr;

    let now = Utc::now().timestamp();
    Entity::update_many()
        .col_expr(
            Column::CurrentAmountCents,
            Expr::col(Column::CurrentAmountCents).add(delta_cents),
        )
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(case_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Delete all contributions created by a batch. Returns rows affected.
pub async fn delete_contributions_by_batch<C: ConnectionTrait>(
    db: &C,
    batch_id: i64,
) -> Result<u64, AlmonerError> {
    use entities::contribution::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::BatchId.eq(batch_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Delete all cases created by a batch. Contributions must go first.
pub async fn delete_cases_by_batch<C: ConnectionTrait>(
    db: &C,
    batch_id: i64,
) -> Result<u64, AlmonerError> {
    use entities::case::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::BatchId.eq(batch_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;
    use tempfile::NamedTempFile;

    /// Test database helper that keeps temp file alive
    struct TestDb {
        connection: DatabaseConnection,
        _temp_file: NamedTempFile,
    }

    impl TestDb {
        async fn new() -> Self {
            let temp_file = NamedTempFile::new().expect("Failed to create temp file");
            let db_path = temp_file.path().to_str().expect("Invalid temp file path");
            let db_url = format!("sqlite://{}?mode=rwc", db_path);

            let connection = Database::connect(&db_url)
                .await
                .expect("Failed to connect to test database");

            migration::Migrator::up(&connection, None)
                .await
                .expect("Failed to run migrations");

            Self {
                connection,
                _temp_file: temp_file,
            }
        }

        fn connection(&self) -> &DatabaseConnection {
            &self.connection
        }
    }

    fn sample_rows() -> Vec<RawRow> {
        vec![
            RawRow {
                row_index: 0,
                case_number: "C-1".to_string(),
                combined_case_number: None,
                title: "Winter aid".to_string(),
                nickname: "sparrow".to_string(),
                amount: "12.50".to_string(),
                month: "2026-01".to_string(),
            },
            RawRow {
                row_index: 1,
                case_number: "C-2".to_string(),
                combined_case_number: Some("X-9".to_string()),
                title: "School fees".to_string(),
                nickname: "finch".to_string(),
                amount: "80".to_string(),
                month: "2026-01".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_create_donor_and_resolution_map() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        create_donor(db, "Sparrow", Some("S. Bird".to_string()), false)
            .await
            .expect("Failed to create donor");
        create_donor(db, "finch", None, true)
            .await
            .expect("Failed to create donor");

        let map = donor_resolution_map(db).await.expect("Failed to load map");
        assert_eq!(map.len(), 2);
        // Keys are lowercased for case-insensitive resolution
        assert!(map.contains_key("sparrow"));

        let admins = list_admin_donors(db).await.expect("Failed to list admins");
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].nickname, "finch");
    }

    #[tokio::test]
    async fn test_create_batch_with_items() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let batch = create_batch_with_items(
            db,
            NewBatchUpload {
                name: "January".to_string(),
                file_name: "january.csv".to_string(),
                created_by: Some("operator".to_string()),
            },
            &sample_rows(),
            "deadbeef",
        )
        .await
        .expect("Failed to create batch");

        assert_eq!(batch.status, "pending");
        assert_eq!(batch.total_items, 2);
        assert_eq!(batch.processed_items, 0);
        assert!(batch.completed_at.is_none());

        let items = entities::BatchItem::find().all(db).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == "pending"));
    }

    #[tokio::test]
    async fn test_claim_batch_for_processing_is_single_shot() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let batch = create_batch_with_items(
            db,
            NewBatchUpload {
                name: "January".to_string(),
                file_name: "january.csv".to_string(),
                created_by: None,
            },
            &sample_rows(),
            "deadbeef",
        )
        .await
        .unwrap();

        assert!(claim_batch_for_processing(db, batch.id).await.unwrap());
        // Second claim must lose: batch is no longer pending
        assert!(!claim_batch_for_processing(db, batch.id).await.unwrap());

        let batch = get_batch(db, batch.id).await.unwrap().unwrap();
        assert_eq!(batch.status, "processing");
    }

    #[tokio::test]
    async fn test_delete_batch_removes_items() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let batch = create_batch_with_items(
            db,
            NewBatchUpload {
                name: "January".to_string(),
                file_name: "january.csv".to_string(),
                created_by: None,
            },
            &sample_rows(),
            "deadbeef",
        )
        .await
        .unwrap();

        delete_batch(db, batch.id).await.expect("Failed to delete batch");

        assert!(get_batch(db, batch.id).await.unwrap().is_none());
        let items = entities::BatchItem::find().all(db).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_add_to_case_amount() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let case = create_case(db, None, "C-1", None, "Winter aid", "2026-01")
            .await
            .expect("Failed to create case");
        assert_eq!(case.current_amount_cents, 0);

        add_to_case_amount(db, case.id, 1250).await.unwrap();
        add_to_case_amount(db, case.id, 250).await.unwrap();

        let case = entities::Case::find_by_id(case.id)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.current_amount_cents, 1500);
    }
}
