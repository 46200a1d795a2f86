//! In-memory spreadsheet for exercising reporters without the network.

use anyhow::{Result, anyhow};
use benchsheet_sheets::{SheetClient, UpdateSummary};
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetOp {
    GetRow,
    UpdateRow,
    AppendRow,
    CreateSpreadsheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetCall {
    GetRow {
        sheet_id: String,
        range: String,
    },
    UpdateRow {
        sheet_id: String,
        range: String,
        values: Vec<String>,
    },
    AppendRow {
        sheet_id: String,
        range: String,
        values: Vec<String>,
    },
    CreateSpreadsheet {
        title: String,
    },
}

impl SheetCall {
    pub fn op(&self) -> SheetOp {
        match self {
            SheetCall::GetRow { .. } => SheetOp::GetRow,
            SheetCall::UpdateRow { .. } => SheetOp::UpdateRow,
            SheetCall::AppendRow { .. } => SheetOp::AppendRow,
            SheetCall::CreateSpreadsheet { .. } => SheetOp::CreateSpreadsheet,
        }
    }
}

/// A single-tab sheet whose first row is the header.
///
/// Every call is recorded, including ones that fail through [`MemorySheet::fail_next`].
#[derive(Default)]
pub struct MemorySheet {
    rows: RefCell<Vec<Vec<String>>>,
    calls: RefCell<Vec<SheetCall>>,
    failures: RefCell<Vec<(SheetOp, String)>>,
    created: Cell<usize>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sheet whose first row already holds `header`.
    pub fn with_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sheet = Self::new();
        sheet
            .rows
            .borrow_mut()
            .push(header.into_iter().map(Into::into).collect());
        sheet
    }

    /// Makes the next `op` call fail with `message`.
    pub fn fail_next(&self, op: SheetOp, message: &str) {
        self.failures.borrow_mut().push((op, message.to_string()));
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.borrow().clone()
    }

    pub fn header(&self) -> Option<Vec<String>> {
        self.rows.borrow().first().cloned()
    }

    /// Appended data rows, header excluded.
    pub fn data_rows(&self) -> Vec<Vec<String>> {
        self.rows.borrow().iter().skip(1).cloned().collect()
    }

    pub fn calls(&self) -> Vec<SheetCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, op: SheetOp) -> usize {
        self.calls.borrow().iter().filter(|c| c.op() == op).count()
    }

    fn record(&self, call: SheetCall) -> Result<()> {
        let op = call.op();
        self.calls.borrow_mut().push(call);
        let mut failures = self.failures.borrow_mut();
        if let Some(idx) = failures.iter().position(|(failing, _)| *failing == op) {
            let (_, message) = failures.remove(idx);
            return Err(anyhow!(message));
        }
        Ok(())
    }
}

impl SheetClient for MemorySheet {
    fn get_row(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        self.record(SheetCall::GetRow {
            sheet_id: sheet_id.to_string(),
            range: range.to_string(),
        })?;
        Ok(self
            .rows
            .borrow()
            .first()
            .filter(|row| !row.is_empty())
            .map(|row| vec![row.clone()])
            .unwrap_or_default())
    }

    fn update_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary> {
        self.record(SheetCall::UpdateRow {
            sheet_id: sheet_id.to_string(),
            range: range.to_string(),
            values: values.to_vec(),
        })?;
        let mut rows = self.rows.borrow_mut();
        if rows.is_empty() {
            rows.push(values.to_vec());
        } else {
            rows[0] = values.to_vec();
        }
        Ok(UpdateSummary {
            updated_range: Some(range.to_string()),
            updated_rows: Some(1),
            updated_cells: Some(values.len() as u64),
        })
    }

    fn append_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary> {
        self.record(SheetCall::AppendRow {
            sheet_id: sheet_id.to_string(),
            range: range.to_string(),
            values: values.to_vec(),
        })?;
        let mut rows = self.rows.borrow_mut();
        rows.push(values.to_vec());
        let row = rows.len();
        Ok(UpdateSummary {
            updated_range: Some(format!("{range}!{row}:{row}")),
            updated_rows: Some(1),
            updated_cells: Some(values.len() as u64),
        })
    }

    fn create_spreadsheet(&self, title: &str) -> Result<String> {
        self.record(SheetCall::CreateSpreadsheet {
            title: title.to_string(),
        })?;
        let next = self.created.get() + 1;
        self.created.set(next);
        Ok(format!("memory-sheet-{next}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sheet_has_no_header_row() {
        let sheet = MemorySheet::new();
        assert!(sheet.get_row("s", "Sheet1!1:1").expect("get").is_empty());
    }

    #[test]
    fn update_then_append_keeps_header_first() {
        let sheet = MemorySheet::new();
        sheet
            .update_row("s", "Sheet1!1:1", &["datetime".to_string()])
            .expect("update");
        sheet
            .append_row("s", "Sheet1", &["T0".to_string()])
            .expect("append");
        assert_eq!(sheet.header(), Some(vec!["datetime".to_string()]));
        assert_eq!(sheet.data_rows(), vec![vec!["T0".to_string()]]);
        assert_eq!(sheet.call_count(SheetOp::UpdateRow), 1);
    }

    #[test]
    fn injected_failure_applies_once() {
        let sheet = MemorySheet::new();
        sheet.fail_next(SheetOp::AppendRow, "quota exceeded");
        let err = sheet
            .append_row("s", "Sheet1", &["x".to_string()])
            .expect_err("fails");
        assert_eq!(err.to_string(), "quota exceeded");
        sheet
            .append_row("s", "Sheet1", &["x".to_string()])
            .expect("second call succeeds");
        assert_eq!(sheet.rows().len(), 1);
        assert_eq!(sheet.call_count(SheetOp::AppendRow), 2);
    }

    #[test]
    fn created_ids_are_distinct() {
        let sheet = MemorySheet::new();
        let a = sheet.create_spreadsheet("a").expect("a");
        let b = sheet.create_spreadsheet("b").expect("b");
        assert_ne!(a, b);
    }
}
