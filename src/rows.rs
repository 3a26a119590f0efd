//! CSV parsing and per-row validation for batch uploads.
//!
//! Parsing rejects whole-file problems (empty file, missing headers).
//! Row-level problems never abort an upload: they surface later, when the
//! orchestrator maps each row and records failures on the item.

use crate::errors::AlmonerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Headers that must be present in an uploaded CSV.
/// `combined_case_number` is recognized but optional.
pub const REQUIRED_HEADERS: &[&str] = &["case_number", "title", "nickname", "amount", "month"];

/// One data row of an uploaded CSV, untyped. Field-level validation happens
/// in [`map_row`] so a bad row fails its item instead of the whole upload.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 0-based data row index (header excluded).
    pub row_index: i32,
    pub case_number: String,
    pub combined_case_number: Option<String>,
    pub title: String,
    pub nickname: String,
    pub amount: String,
    pub month: String,
}

/// A per-row validation failure, aggregated into the batch error summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_index: i32,
    pub message: String,
}

/// A validated row, ready to become a Case + Contribution pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIntent {
    pub case_number: String,
    pub combined_case_number: Option<String>,
    pub title: String,
    pub donor_id: i64,
    pub amount_cents: i64,
    /// Normalized `YYYY-MM`.
    pub month: String,
}

#[derive(Debug)]
pub struct CsvParseResult {
    pub rows: Vec<RawRow>,
}

/// Strip UTF-8 BOM from the beginning of data if present.
fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(UTF8_BOM) {
        &data[UTF8_BOM.len()..]
    } else {
        data
    }
}

/// Parse an uploaded CSV into raw rows.
///
/// Header row is required. Column order is free; header names are matched
/// case-insensitively. Returns an error only for whole-file problems.
pub fn parse_csv(data: &[u8], max_rows: usize) -> Result<CsvParseResult, AlmonerError> {
    let data = strip_utf8_bom(data);

    if data.is_empty() {
        return Err(AlmonerError::Validation("CSV file is empty".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AlmonerError::Validation(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        columns.entry(name.clone()).or_insert(idx);
    }

    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .filter(|h| !columns.contains_key(**h))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AlmonerError::Validation(format!(
            "Missing required CSV headers: {}",
            missing.join(", ")
        )));
    }

    let get = |record: &csv::StringRecord, name: &str| -> String {
        columns
            .get(name)
            .and_then(|&idx| record.get(idx))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        if rows.len() >= max_rows {
            return Err(AlmonerError::Validation(format!(
                "CSV file exceeds maximum row limit of {max_rows}"
            )));
        }

        let record = result
            .map_err(|e| AlmonerError::Validation(format!("Failed to parse CSV row {}: {e}", idx + 2)))?;

        let combined = get(&record, "combined_case_number");
        rows.push(RawRow {
            row_index: idx as i32,
            case_number: get(&record, "case_number"),
            combined_case_number: if combined.is_empty() { None } else { Some(combined) },
            title: get(&record, "title"),
            nickname: get(&record, "nickname"),
            amount: get(&record, "amount"),
            month: get(&record, "month"),
        });
    }

    if rows.is_empty() {
        return Err(AlmonerError::Validation(
            "CSV file contains no data rows".to_string(),
        ));
    }

    Ok(CsvParseResult { rows })
}

/// Validate one raw row against the nickname resolution table.
///
/// Pure function: no side effects, deterministic for identical inputs.
pub fn map_row(row: &RawRow, donors: &HashMap<String, i64>) -> Result<RowIntent, RowIssue> {
    let issue = |message: String| RowIssue {
        row_index: row.row_index,
        message,
    };

    for (name, value) in [
        ("case_number", &row.case_number),
        ("title", &row.title),
        ("nickname", &row.nickname),
        ("amount", &row.amount),
        ("month", &row.month),
    ] {
        if value.is_empty() {
            return Err(issue(format!("missing required field: {name}")));
        }
    }

    let donor_id = donors
        .get(&row.nickname.to_lowercase())
        .copied()
        .ok_or_else(|| issue(format!("unknown contributor nickname '{}'", row.nickname)))?;

    let amount_cents = parse_amount_cents(&row.amount).map_err(|msg| issue(msg))?;

    let month = normalize_month(&row.month).map_err(|msg| issue(msg))?;

    Ok(RowIntent {
        case_number: row.case_number.clone(),
        combined_case_number: row.combined_case_number.clone(),
        title: row.title.clone(),
        donor_id,
        amount_cents,
        month,
    })
}

/// Parse a decimal amount string into positive integer cents.
///
/// Accepts at most two fraction digits; no exponent, sign, or grouping.
pub fn parse_amount_cents(text: &str) -> Result<i64, String> {
    let text = text.trim();
    let bad = || format!("unparseable amount '{text}'");

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(bad());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    if frac.len() > 2 {
        return Err(format!("amount '{text}' has more than two decimal places"));
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| bad())?
    };
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| bad())? * 10,
        _ => frac.parse().map_err(|_| bad())?,
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac_cents))
        .ok_or_else(bad)?;

    if cents <= 0 {
        return Err(format!("amount '{text}' must be positive"));
    }
    Ok(cents)
}

/// Normalize a month string to `YYYY-MM`, validating the month range.
pub fn normalize_month(text: &str) -> Result<String, String> {
    let text = text.trim();
    let bad = || format!("unparseable month '{text}' (expected YYYY-MM)");

    let (year, month) = text.split_once('-').ok_or_else(bad)?;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    if month.is_empty() || month.len() > 2 || !month.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    let m: u32 = month.parse().map_err(|_| bad())?;
    if !(1..=12).contains(&m) {
        return Err(bad());
    }
    Ok(format!("{year}-{m:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donors() -> HashMap<String, i64> {
        let mut map = HashMap::new();
        map.insert("sparrow".to_string(), 1);
        map.insert("finch".to_string(), 2);
        map
    }

    fn valid_row() -> RawRow {
        RawRow {
            row_index: 0,
            case_number: "C-100".to_string(),
            combined_case_number: None,
            title: "Winter aid".to_string(),
            nickname: "sparrow".to_string(),
            amount: "12.50".to_string(),
            month: "2026-01".to_string(),
        }
    }

    #[test]
    fn test_parse_csv_valid() {
        let csv = b"case_number,combined_case_number,title,nickname,amount,month\n\
C-100,,Winter aid,sparrow,12.50,2026-01\n\
C-101,X-7,School fees,finch,80,2026-01";
        let result = parse_csv(csv, 1000).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].case_number, "C-100");
        assert_eq!(result.rows[0].combined_case_number, None);
        assert_eq!(result.rows[1].combined_case_number.as_deref(), Some("X-7"));
        assert_eq!(result.rows[1].row_index, 1);
    }

    #[test]
    fn test_parse_csv_missing_header() {
        let csv = b"case_number,title,amount,month\nC-100,Winter aid,12.50,2026-01";
        let err = parse_csv(csv, 1000).unwrap_err();
        assert!(err.to_string().contains("nickname"));
    }

    #[test]
    fn test_parse_csv_empty_file() {
        assert!(parse_csv(b"", 1000).is_err());
    }

    #[test]
    fn test_parse_csv_no_data_rows() {
        let csv = b"case_number,title,nickname,amount,month";
        assert!(parse_csv(csv, 1000).is_err());
    }

    #[test]
    fn test_parse_csv_utf8_bom_handling() {
        let mut csv = vec![0xEF, 0xBB, 0xBF];
        csv.extend_from_slice(b"case_number,title,nickname,amount,month\nC-1,Aid,sparrow,5,2026-02");
        let result = parse_csv(&csv, 1000).unwrap();
        assert_eq!(result.rows[0].case_number, "C-1");
    }

    #[test]
    fn test_parse_csv_header_case_insensitive() {
        let csv = b"Case_Number,TITLE,Nickname,Amount,Month\nC-1,Aid,sparrow,5,2026-02";
        let result = parse_csv(csv, 1000).unwrap();
        assert_eq!(result.rows[0].title, "Aid");
    }

    #[test]
    fn test_parse_csv_max_rows_limit() {
        let mut csv = String::from("case_number,title,nickname,amount,month\n");
        for i in 0..15 {
            csv.push_str(&format!("C-{i},Aid,sparrow,5,2026-02\n"));
        }
        let err = parse_csv(csv.as_bytes(), 10).unwrap_err();
        assert!(err.to_string().contains("maximum row limit"));
    }

    #[test]
    fn test_parse_csv_short_record_padded() {
        // flexible records: missing trailing fields become empty, caught by map_row
        let csv = b"case_number,title,nickname,amount,month\nC-1,Aid";
        let result = parse_csv(csv, 1000).unwrap();
        assert_eq!(result.rows[0].amount, "");
    }

    #[test]
    fn test_map_row_valid() {
        let intent = map_row(&valid_row(), &donors()).unwrap();
        assert_eq!(intent.donor_id, 1);
        assert_eq!(intent.amount_cents, 1250);
        assert_eq!(intent.month, "2026-01");
    }

    #[test]
    fn test_map_row_missing_field() {
        let mut row = valid_row();
        row.title = String::new();
        let issue = map_row(&row, &donors()).unwrap_err();
        assert!(issue.message.contains("title"));
        assert_eq!(issue.row_index, 0);
    }

    #[test]
    fn test_map_row_unknown_nickname() {
        let mut row = valid_row();
        row.nickname = "stranger".to_string();
        let issue = map_row(&row, &donors()).unwrap_err();
        assert!(issue.message.contains("stranger"));
    }

    #[test]
    fn test_map_row_nickname_case_insensitive() {
        let mut row = valid_row();
        row.nickname = "Sparrow".to_string();
        let intent = map_row(&row, &donors()).unwrap();
        assert_eq!(intent.donor_id, 1);
    }

    #[test]
    fn test_map_row_month_normalized() {
        let mut row = valid_row();
        row.month = "2026-3".to_string();
        let intent = map_row(&row, &donors()).unwrap();
        assert_eq!(intent.month, "2026-03");
    }

    #[test]
    fn test_parse_amount_cents() {
        assert_eq!(parse_amount_cents("123").unwrap(), 12300);
        assert_eq!(parse_amount_cents("123.4").unwrap(), 12340);
        assert_eq!(parse_amount_cents("123.45").unwrap(), 12345);
        assert_eq!(parse_amount_cents("0.01").unwrap(), 1);
        assert_eq!(parse_amount_cents(".5").unwrap(), 50);
    }

    #[test]
    fn test_parse_amount_cents_rejects() {
        assert!(parse_amount_cents("0").is_err());
        assert!(parse_amount_cents("0.00").is_err());
        assert!(parse_amount_cents("-5").is_err());
        assert!(parse_amount_cents("1.234").is_err());
        assert!(parse_amount_cents("abc").is_err());
        assert!(parse_amount_cents("1,000").is_err());
        assert!(parse_amount_cents("").is_err());
        assert!(parse_amount_cents(".").is_err());
    }

    #[test]
    fn test_normalize_month_rejects() {
        assert!(normalize_month("2026-13").is_err());
        assert!(normalize_month("2026-0").is_err());
        assert!(normalize_month("26-01").is_err());
        assert!(normalize_month("2026/01").is_err());
        assert!(normalize_month("January 2026").is_err());
    }
}
