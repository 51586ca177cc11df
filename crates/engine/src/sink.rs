//! Record assembly and ledger writes.
//!
//! On state-machine completion the sink stamps the current time, turns the
//! accumulated answers into a position-correct row, and appends it. Legacy
//! sessions write fixed fields positionally; dynamic sessions reconcile
//! against the ledger's live header first. Ledger failures are logged and
//! surfaced once; never retried.

use crate::reconcile::{reconcile, HeaderMatch, SubstringMatcher};
use chrono::Local;
use std::sync::Arc;
use tallygram_core::error::LedgerError;
use tallygram_core::ledger::{CellRef, Ledger, LedgerRow};
use tallygram_core::measurement::FixedField;
use tracing::{info, warn};

/// The timestamp format written into the first cell of every row.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The reserved first header column.
const TIMESTAMP_HEADER: &str = "Time";

pub struct RecordSink {
    ledger: Arc<dyn Ledger>,
    matcher: Box<dyn HeaderMatch>,
}

impl RecordSink {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            matcher: Box::new(SubstringMatcher),
        }
    }

    /// Swap in a different header-matching strategy.
    pub fn with_matcher(mut self, matcher: Box<dyn HeaderMatch>) -> Self {
        self.matcher = matcher;
        self
    }

    fn timestamp() -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Append a legacy-mode record: timestamp plus the fixed fields in
    /// questionnaire order, positionally, without consulting the header.
    pub async fn submit_legacy(
        &self,
        ledger_id: &str,
        fields: &[FixedField],
        answers: &[(String, String)],
    ) -> Result<LedgerRow, LedgerError> {
        let mut row = Vec::with_capacity(fields.len() + 1);
        row.push(Self::timestamp());
        for field in fields {
            let value = answers
                .iter()
                .find(|(name, _)| name == &field.name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            row.push(value);
        }

        self.append(ledger_id, row).await
    }

    /// Append a dynamic-mode record: reconcile the answers against the
    /// ledger's current header row. A ledger without a header row is a
    /// precondition failure; initializing one is a separate user-invoked
    /// operation ([`RecordSink::init_template`]), never automatic repair.
    pub async fn submit_dynamic(
        &self,
        ledger_id: &str,
        answers: &[(String, String)],
    ) -> Result<LedgerRow, LedgerError> {
        let rows = self.ledger.read_all_rows(ledger_id).await?;
        let headers = match rows.first() {
            Some(h) if !h.is_empty() => h,
            _ => {
                warn!(ledger_id = %ledger_id, "No header row at reconciliation time");
                return Err(LedgerError::NoHeader(ledger_id.to_string()));
            }
        };

        let row = reconcile(headers, answers, &Self::timestamp(), self.matcher.as_ref());
        self.append(ledger_id, row).await
    }

    async fn append(&self, ledger_id: &str, row: LedgerRow) -> Result<LedgerRow, LedgerError> {
        match self.ledger.append_row(ledger_id, &row).await {
            Ok(()) => {
                info!(ledger_id = %ledger_id, cells = row.len(), "Record appended");
                Ok(row)
            }
            Err(e) => {
                warn!(ledger_id = %ledger_id, error = %e, "Record append failed");
                Err(e)
            }
        }
    }

    /// Write a header row (timestamp column plus the given names) to a fresh
    /// ledger and bold it. Explicit user-invoked initialization; a ledger
    /// that already has content is refused, never overwritten.
    pub async fn init_template(
        &self,
        ledger_id: &str,
        columns: &[String],
    ) -> Result<usize, LedgerError> {
        let rows = self.ledger.read_all_rows(ledger_id).await?;
        if rows.iter().any(|r| !r.is_empty()) {
            warn!(ledger_id = %ledger_id, rows = rows.len(), "Template refused on non-empty ledger");
            return Err(LedgerError::NotEmpty(ledger_id.to_string()));
        }

        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(TIMESTAMP_HEADER.to_string());
        header.extend(columns.iter().cloned());

        self.ledger.append_row(ledger_id, &header).await?;
        self.ledger.format_header(ledger_id, header.len()).await?;
        info!(ledger_id = %ledger_id, columns = header.len(), "Header template written");
        Ok(header.len())
    }

    /// Create a fresh ledger, write its header template, and return its id.
    pub async fn create_with_template(
        &self,
        title: &str,
        columns: &[String],
    ) -> Result<String, LedgerError> {
        let ledger_id = self.ledger.create(title).await?;
        self.init_template(&ledger_id, columns).await?;
        Ok(ledger_id)
    }

    /// Write one new header cell named after a measurement at the next free
    /// column. No collision check against existing headers.
    pub async fn add_header_column(&self, ledger_id: &str, name: &str) -> Result<(), LedgerError> {
        let rows = self.ledger.read_all_rows(ledger_id).await?;
        let header_len = rows.first().map(Vec::len).unwrap_or(0);
        // Column 1 stays reserved for the timestamp even on an empty sheet.
        let next_col = header_len.max(1) as u32 + 1;
        self.ledger
            .set_cell(ledger_id, CellRef::new(1, next_col), name)
            .await?;
        info!(ledger_id = %ledger_id, name = %name, col = next_col, "Header column added");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallygram_core::measurement::legacy_fields;
    use tallygram_ledger::InMemoryLedger;

    fn answers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    async fn sink_with_sheet(rows: Vec<Vec<String>>) -> (RecordSink, Arc<InMemoryLedger>, String) {
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.create("Test").await.unwrap();
        ledger.seed(&id, rows).await;
        (RecordSink::new(ledger.clone()), ledger, id)
    }

    #[tokio::test]
    async fn legacy_row_is_positional() {
        let (sink, ledger, id) = sink_with_sheet(vec![]).await;

        let row = sink
            .submit_legacy(
                &id,
                &legacy_fields(),
                &answers(&[
                    ("fatigue", "5"),
                    ("mood", "7"),
                    ("sleep", "ok"),
                    ("physical_load", "3"),
                    ("mental_load", "4"),
                    ("symptoms", "none"),
                    ("notes", ""),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(row.len(), 8);
        assert_eq!(&row[1..], &["5", "7", "ok", "3", "4", "none", ""]);
        // Timestamp looks like "YYYY-MM-DD HH:MM"
        assert_eq!(row[0].len(), 16);
        assert_eq!(&row[0][4..5], "-");

        let stored = ledger.rows(&id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], row);
    }

    #[tokio::test]
    async fn legacy_missing_answers_become_empty() {
        let (sink, _, id) = sink_with_sheet(vec![]).await;
        let row = sink
            .submit_legacy(&id, &legacy_fields(), &answers(&[("mood", "7")]))
            .await
            .unwrap();
        assert_eq!(&row[1..], &["", "7", "", "", "", "", ""]);
    }

    #[tokio::test]
    async fn dynamic_row_reconciles_against_header() {
        let (sink, ledger, id) = sink_with_sheet(vec![vec![
            "Время".to_string(),
            "Energy Level".to_string(),
        ]])
        .await;

        let row = sink
            .submit_dynamic(&id, &answers(&[("Energy", "7")]))
            .await
            .unwrap();

        assert_eq!(row.len(), 2);
        assert_eq!(row[1], "7");

        let stored = ledger.rows(&id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1][1], "7");
    }

    #[tokio::test]
    async fn dynamic_row_length_matches_header() {
        let (sink, _, id) = sink_with_sheet(vec![vec![
            "Time".to_string(),
            "Energy".to_string(),
            "Mood".to_string(),
            "Mystery".to_string(),
        ]])
        .await;

        let row = sink
            .submit_dynamic(&id, &answers(&[("Mood", "6"), ("Energy", "7")]))
            .await
            .unwrap();

        assert_eq!(row.len(), 4);
        assert_eq!(row[1], "7");
        assert_eq!(row[2], "6");
        assert_eq!(row[3], "");
    }

    #[tokio::test]
    async fn dynamic_without_header_fails() {
        let (sink, _, id) = sink_with_sheet(vec![]).await;
        let result = sink.submit_dynamic(&id, &answers(&[("Energy", "7")])).await;
        assert!(matches!(result, Err(LedgerError::NoHeader(_))));
    }

    #[tokio::test]
    async fn append_failure_surfaces() {
        let (sink, ledger, id) =
            sink_with_sheet(vec![vec!["Time".to_string(), "Energy".to_string()]]).await;
        ledger.set_failing(true);

        let result = sink.submit_dynamic(&id, &answers(&[("Energy", "7")])).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn create_with_template_returns_bound_id() {
        let ledger = Arc::new(InMemoryLedger::new());
        let sink = RecordSink::new(ledger.clone());

        let id = sink
            .create_with_template("Journal", &["Energy".to_string()])
            .await
            .unwrap();

        let rows = ledger.rows(&id).await.unwrap();
        assert_eq!(rows[0], vec!["Time", "Energy"]);
    }

    #[tokio::test]
    async fn init_template_writes_and_formats_header() {
        let (sink, ledger, id) = sink_with_sheet(vec![]).await;
        let columns = sink
            .init_template(&id, &["Energy".to_string(), "Mood".to_string()])
            .await
            .unwrap();
        assert_eq!(columns, 3);

        let rows = ledger.rows(&id).await.unwrap();
        assert_eq!(rows[0], vec!["Time", "Energy", "Mood"]);
    }

    #[tokio::test]
    async fn init_template_refuses_non_empty_sheet() {
        let (sink, ledger, id) = sink_with_sheet(vec![
            vec!["Time".to_string(), "Energy".to_string()],
            vec!["2024-01-01 09:00".to_string(), "7".to_string()],
        ])
        .await;

        let result = sink.init_template(&id, &["Mood".to_string()]).await;
        assert!(matches!(result, Err(LedgerError::NotEmpty(_))));

        // Existing rows untouched, nothing appended at the bottom
        let rows = ledger.rows(&id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Time", "Energy"]);
    }

    #[tokio::test]
    async fn add_header_column_appends_after_last() {
        let (sink, ledger, id) =
            sink_with_sheet(vec![vec!["Time".to_string(), "Energy".to_string()]]).await;

        sink.add_header_column(&id, "Mood").await.unwrap();

        let rows = ledger.rows(&id).await.unwrap();
        assert_eq!(rows[0], vec!["Time", "Energy", "Mood"]);
    }

    #[tokio::test]
    async fn add_header_column_on_empty_sheet_skips_timestamp_slot() {
        let (sink, ledger, id) = sink_with_sheet(vec![]).await;

        sink.add_header_column(&id, "Energy").await.unwrap();

        let rows = ledger.rows(&id).await.unwrap();
        // Column A left free for the timestamp
        assert_eq!(rows[0], vec!["", "Energy"]);
    }
}
