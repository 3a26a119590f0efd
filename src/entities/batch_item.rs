use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,
    pub batch_id: i64,
    pub row_index: i32,
    pub case_number: String,
    pub combined_case_number: Option<String>,
    pub title: String,
    pub nickname: String,
    pub amount: String, // raw amount text as uploaded
    pub month: String,  // raw month text as uploaded
    pub status: String, // "pending" | "processing" | "success" | "failed"
    pub case_id: Option<i64>,
    pub contribution_id: Option<i64>,
    pub donor_id: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
