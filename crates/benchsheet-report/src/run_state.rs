use benchsheet_core::{CellValue, DATETIME_COLUMN};
use indexmap::IndexMap;
use std::collections::VecDeque;

pub type FlagSnapshot = IndexMap<String, CellValue>;
pub type ResultMap = IndexMap<String, CellValue>;

/// Flags, results and pending workloads of the run being reported.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    flags: FlagSnapshot,
    results: ResultMap,
    workloads: VecDeque<String>,
}

impl RunState {
    /// Starts a snapshot stamped with `started_at` under the `datetime` key.
    pub fn new(started_at: impl Into<String>) -> Self {
        let mut flags = FlagSnapshot::new();
        flags.insert(
            DATETIME_COLUMN.to_string(),
            CellValue::Text(started_at.into()),
        );
        Self {
            flags,
            results: ResultMap::new(),
            workloads: VecDeque::new(),
        }
    }

    pub fn flags(&self) -> &FlagSnapshot {
        &self.flags
    }

    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    pub fn pending_workloads(&self) -> impl Iterator<Item = &str> {
        self.workloads.iter().map(String::as_str)
    }

    pub fn merge_flag(&mut self, name: &str, value: CellValue) {
        self.flags.insert(name.to_string(), value);
    }

    /// Replaces the workload queue with `workloads`, in order.
    pub fn seed_workloads(&mut self, workloads: Vec<String>) {
        self.workloads = workloads.into();
    }

    pub fn insert_result(&mut self, key: &str, value: CellValue) {
        self.results.insert(key.to_string(), value);
    }

    pub fn next_workload(&mut self) -> Option<String> {
        self.workloads.pop_front()
    }

    /// Puts a workload taken by a failed flush back at the head of the queue.
    pub fn requeue_workload(&mut self, workload: String) {
        self.workloads.push_front(workload);
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }
}
