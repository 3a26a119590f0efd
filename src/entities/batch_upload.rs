use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_uploads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,
    pub name: String,
    pub file_name: String,
    pub file_hash: String,
    pub status: String, // "pending" | "processing" | "completed" | "failed" | "cancelled"
    pub total_items: i32,
    pub processed_items: i32,
    pub successful_items: i32,
    pub failed_items: i32,
    pub error_summary: Option<String>, // JSON array: [{row_index, message}]
    pub metadata: Option<String>,      // JSON object
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>, // set iff status is terminal
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
