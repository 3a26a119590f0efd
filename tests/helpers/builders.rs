use almoner::entities;
use almoner::rows;
use almoner::storage::{self, NewBatchUpload};
use sea_orm::DatabaseConnection;

/// Builder for uploaded CSV content
pub struct CsvBuilder {
    lines: Vec<String>,
}

impl CsvBuilder {
    pub fn new() -> Self {
        Self {
            lines: vec!["case_number,combined_case_number,title,nickname,amount,month".to_string()],
        }
    }

    pub fn row(mut self, case_number: &str, title: &str, nickname: &str, amount: &str, month: &str) -> Self {
        self.lines
            .push(format!("{case_number},,{title},{nickname},{amount},{month}"));
        self
    }

    pub fn raw_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

impl Default for CsvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for persisted batch uploads
pub struct BatchBuilder {
    name: String,
    file_name: String,
    created_by: Option<String>,
    csv: CsvBuilder,
}

impl BatchBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: format!("{name}.csv"),
            created_by: None,
            csv: CsvBuilder::new(),
        }
    }

    pub fn created_by(mut self, who: &str) -> Self {
        self.created_by = Some(who.to_string());
        self
    }

    pub fn row(mut self, case_number: &str, title: &str, nickname: &str, amount: &str, month: &str) -> Self {
        self.csv = self.csv.row(case_number, title, nickname, amount, month);
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::batch_upload::Model {
        let content = self.csv.build();
        let parsed = rows::parse_csv(content.as_bytes(), 10_000).expect("Failed to parse test CSV");
        storage::create_batch_with_items(
            db,
            NewBatchUpload {
                name: self.name,
                file_name: self.file_name,
                created_by: self.created_by,
            },
            &parsed.rows,
            "test-hash",
        )
        .await
        .expect("Failed to create test batch")
    }
}
