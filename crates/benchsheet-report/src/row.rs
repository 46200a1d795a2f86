use crate::run_state::{FlagSnapshot, ResultMap};
use benchsheet_core::CellValue;

/// Renders a looked-up value as cell text. A missing key and a present empty
/// value both come out as an empty cell.
pub fn to_cell_string(value: Option<&CellValue>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Per-flush value for the workload column.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadCell<'a> {
    pub column: &'a str,
    pub value: &'a str,
}

/// Builds one row aligned to `header`: the workload column first, then the
/// flag snapshot, then results, else an empty cell.
pub fn synthesize_row(
    header: &[String],
    flags: &FlagSnapshot,
    results: &ResultMap,
    workload: Option<WorkloadCell<'_>>,
) -> Vec<String> {
    header
        .iter()
        .map(|column| {
            if let Some(cell) = workload
                && cell.column == column.as_str()
            {
                return cell.value.to_string();
            }
            to_cell_string(flags.get(column).or_else(|| results.get(column)))
        })
        .collect()
}
