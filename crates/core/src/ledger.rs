//! Ledger trait — the abstraction over the external spreadsheet service.
//!
//! A ledger is append-only row storage whose first row is a header defining
//! columns. The engine only needs read-all, append, set-cell, create, and
//! header formatting; everything else the spreadsheet service offers is out
//! of scope.

use crate::error::LedgerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An ordered sequence of cell values. The first cell of an appended row is
/// always a timestamp string; the rest correspond 1:1 to the header row.
pub type LedgerRow = Vec<String>;

/// A 1-based cell reference, rendered in A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    /// 1-based row number.
    pub row: u32,
    /// 1-based column number (1 = "A").
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Render the column number as a spreadsheet letter run ("A", "Z", "AA").
    pub fn column_letters(mut col: u32) -> String {
        debug_assert!(col >= 1);
        let mut letters = Vec::new();
        while col > 0 {
            let rem = (col - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            col = (col - 1) / 26;
        }
        letters.iter().rev().collect()
    }

    /// Render as A1 notation ("B1", "AA3").
    pub fn to_a1(self) -> String {
        format!("{}{}", Self::column_letters(self.col), self.row)
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// The core Ledger trait.
///
/// All operations address a ledger by its opaque id and operate on the
/// primary sheet. Errors surface identically to the engine; variants exist
/// for logging only.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The backend name (e.g., "sheets", "memory").
    fn name(&self) -> &str;

    /// Read every row of the primary sheet, header included.
    async fn read_all_rows(
        &self,
        ledger_id: &str,
    ) -> std::result::Result<Vec<LedgerRow>, LedgerError>;

    /// Append one row after the last non-empty row.
    async fn append_row(
        &self,
        ledger_id: &str,
        row: &[String],
    ) -> std::result::Result<(), LedgerError>;

    /// Overwrite a single cell.
    async fn set_cell(
        &self,
        ledger_id: &str,
        cell: CellRef,
        value: &str,
    ) -> std::result::Result<(), LedgerError>;

    /// Create a new ledger and return its id.
    async fn create(&self, title: &str) -> std::result::Result<String, LedgerError>;

    /// Apply header formatting (bold) to the first `columns` cells of row 1.
    async fn format_header(
        &self,
        ledger_id: &str,
        columns: usize,
    ) -> std::result::Result<(), LedgerError>;
}
