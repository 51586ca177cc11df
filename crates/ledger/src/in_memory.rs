//! In-memory ledger — useful for testing and local development.
//!
//! Rows live in a map keyed by ledger id. A failure switch lets tests
//! exercise the engine's behavior when the real spreadsheet service is down.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tallygram_core::error::LedgerError;
use tallygram_core::ledger::{CellRef, Ledger, LedgerRow};
use tokio::sync::RwLock;

/// An in-memory ledger backend.
pub struct InMemoryLedger {
    sheets: Arc<RwLock<HashMap<String, Vec<LedgerRow>>>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            sheets: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
        }
    }

    /// Seed a ledger with rows (header first).
    pub async fn seed(&self, ledger_id: &str, rows: Vec<LedgerRow>) {
        self.sheets
            .write()
            .await
            .insert(ledger_id.to_string(), rows);
    }

    /// Make every subsequent operation fail with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot the rows of a ledger (for assertions).
    pub async fn rows(&self, ledger_id: &str) -> Option<Vec<LedgerRow>> {
        self.sheets.read().await.get(ledger_id).cloned()
    }

    fn check_up(&self) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_all_rows(&self, ledger_id: &str) -> Result<Vec<LedgerRow>, LedgerError> {
        self.check_up()?;
        self.sheets
            .read()
            .await
            .get(ledger_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(ledger_id.to_string()))
    }

    async fn append_row(&self, ledger_id: &str, row: &[String]) -> Result<(), LedgerError> {
        self.check_up()?;
        let mut sheets = self.sheets.write().await;
        let rows = sheets
            .get_mut(ledger_id)
            .ok_or_else(|| LedgerError::NotFound(ledger_id.to_string()))?;
        rows.push(row.to_vec());
        Ok(())
    }

    async fn set_cell(
        &self,
        ledger_id: &str,
        cell: CellRef,
        value: &str,
    ) -> Result<(), LedgerError> {
        self.check_up()?;
        let mut sheets = self.sheets.write().await;
        let rows = sheets
            .get_mut(ledger_id)
            .ok_or_else(|| LedgerError::NotFound(ledger_id.to_string()))?;

        let row_idx = (cell.row - 1) as usize;
        let col_idx = (cell.col - 1) as usize;
        while rows.len() <= row_idx {
            rows.push(Vec::new());
        }
        let row = &mut rows[row_idx];
        while row.len() <= col_idx {
            row.push(String::new());
        }
        row[col_idx] = value.to_string();
        Ok(())
    }

    async fn create(&self, _title: &str) -> Result<String, LedgerError> {
        self.check_up()?;
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sheets.write().await.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn format_header(&self, ledger_id: &str, _columns: usize) -> Result<(), LedgerError> {
        self.check_up()?;
        if !self.sheets.read().await.contains_key(ledger_id) {
            return Err(LedgerError::NotFound(ledger_id.to_string()));
        }
        // Formatting has no observable effect in memory
        Ok(())
    }
}
