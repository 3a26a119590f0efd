use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Create donors table
        manager
            .create_table(
                Table::create()
                    .table(Donors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Donors::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Donors::Nickname))
                    .col(string_null(Donors::DisplayName))
                    .col(
                        ColumnDef::new(Donors::IsAdmin)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(big_integer(Donors::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_donors_nickname")
                    .table(Donors::Table)
                    .col(Donors::Nickname)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create batch_uploads table
        manager
            .create_table(
                Table::create()
                    .table(BatchUploads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatchUploads::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(BatchUploads::Name))
                    .col(string(BatchUploads::FileName))
                    .col(string(BatchUploads::FileHash))
                    .col(
                        ColumnDef::new(BatchUploads::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(BatchUploads::TotalItems)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BatchUploads::ProcessedItems)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BatchUploads::SuccessfulItems)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BatchUploads::FailedItems)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(string_null(BatchUploads::ErrorSummary))
                    .col(string_null(BatchUploads::Metadata))
                    .col(string_null(BatchUploads::CreatedBy))
                    .col(big_integer(BatchUploads::CreatedAt))
                    .col(big_integer(BatchUploads::UpdatedAt))
                    .col(big_integer_null(BatchUploads::CompletedAt))
                    .to_owned(),
            )
            .await?;

        // Create batch_items table
        manager
            .create_table(
                Table::create()
                    .table(BatchItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatchItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(BatchItems::BatchId))
                    .col(integer(BatchItems::RowIndex))
                    .col(string(BatchItems::CaseNumber))
                    .col(string_null(BatchItems::CombinedCaseNumber))
                    .col(string(BatchItems::Title))
                    .col(string(BatchItems::Nickname))
                    .col(string(BatchItems::Amount))
                    .col(string(BatchItems::Month))
                    .col(
                        ColumnDef::new(BatchItems::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(big_integer_null(BatchItems::CaseId))
                    .col(big_integer_null(BatchItems::ContributionId))
                    .col(big_integer_null(BatchItems::DonorId))
                    .col(string_null(BatchItems::ErrorMessage))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_batch_items_batch")
                            .from(BatchItems::Table, BatchItems::BatchId)
                            .to(BatchUploads::Table, BatchUploads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batch_items_batch_row")
                    .table(BatchItems::Table)
                    .col(BatchItems::BatchId)
                    .col(BatchItems::RowIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create cases table
        manager
            .create_table(
                Table::create()
                    .table(Cases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Cases::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(Cases::BatchId))
                    .col(string(Cases::CaseNumber))
                    .col(string_null(Cases::CombinedCaseNumber))
                    .col(string(Cases::Title))
                    .col(
                        ColumnDef::new(Cases::Status)
                            .string()
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(Cases::CurrentAmountCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(string(Cases::Month))
                    .col(big_integer(Cases::CreatedAt))
                    .col(big_integer(Cases::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cases_batch")
                    .table(Cases::Table)
                    .col(Cases::BatchId)
                    .to_owned(),
            )
            .await?;

        // Create contributions table
        manager
            .create_table(
                Table::create()
                    .table(Contributions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contributions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(Contributions::BatchId))
                    .col(big_integer(Contributions::CaseId))
                    .col(big_integer(Contributions::DonorId))
                    .col(big_integer(Contributions::AmountCents))
                    .col(
                        ColumnDef::new(Contributions::Status)
                            .string()
                            .not_null()
                            .default("confirmed"),
                    )
                    .col(string(Contributions::Month))
                    .col(big_integer(Contributions::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contributions_case")
                            .from(Contributions::Table, Contributions::CaseId)
                            .to(Cases::Table, Cases::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contributions_donor")
                            .from(Contributions::Table, Contributions::DonorId)
                            .to(Donors::Table, Donors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contributions_batch")
                    .table(Contributions::Table)
                    .col(Contributions::BatchId)
                    .to_owned(),
            )
            .await?;

        // Create notifications table
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Notifications::DonorId))
                    .col(string(Notifications::Kind))
                    .col(string(Notifications::Body))
                    .col(
                        ColumnDef::new(Notifications::Read)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(big_integer(Notifications::CreatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contributions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BatchItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BatchUploads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Donors::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Donors {
    Table,
    Id,
    Nickname,
    DisplayName,
    IsAdmin,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BatchUploads {
    Table,
    Id,
    Name,
    FileName,
    FileHash,
    Status,
    TotalItems,
    ProcessedItems,
    SuccessfulItems,
    FailedItems,
    ErrorSummary,
    Metadata,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum BatchItems {
    Table,
    Id,
    BatchId,
    RowIndex,
    CaseNumber,
    CombinedCaseNumber,
    Title,
    Nickname,
    Amount,
    Month,
    Status,
    CaseId,
    ContributionId,
    DonorId,
    ErrorMessage,
}

#[derive(DeriveIden)]
enum Cases {
    Table,
    Id,
    BatchId,
    CaseNumber,
    CombinedCaseNumber,
    Title,
    Status,
    CurrentAmountCents,
    Month,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Contributions {
    Table,
    Id,
    BatchId,
    CaseId,
    DonorId,
    AmountCents,
    Status,
    Month,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    DonorId,
    Kind,
    Body,
    Read,
    CreatedAt,
}
