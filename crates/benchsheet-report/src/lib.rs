//! Accumulates benchmark flags and results and writes them as rows of a shared
//! result sheet whose header grows as new names appear.
//!
//! A [`Reporter`] lives for one benchmark process:
//! `open → register_flags* → (add_result* → flush)* → close`.
//! It is single-threaded and every remote call blocks. When reporting is
//! disabled every operation returns immediately without touching the sheet or
//! the reporter's state, so call sites never need to check the setting.

use anyhow::{Result, anyhow};
use benchsheet_core::{
    CellValue, Flag, ReportEvent, ReportingConfig, WORKLOAD_SENTINEL, is_reserved_name,
    snapshot_timestamp,
};
use benchsheet_observe::Observer;
use benchsheet_sheets::SheetClient;

mod header;
mod row;
mod run_state;

pub use header::HeaderRegistry;
pub use row::{WorkloadCell, synthesize_row, to_cell_string};
pub use run_state::{FlagSnapshot, ResultMap, RunState};

/// The single switch that turns every reporting operation into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingGate(bool);

impl ReportingGate {
    pub fn new(enabled: bool) -> Self {
        Self(enabled)
    }

    pub fn is_open(self) -> bool {
        self.0
    }
}

pub struct Reporter<C: SheetClient> {
    gate: ReportingGate,
    sheet_id: String,
    cfg: ReportingConfig,
    client: C,
    header: HeaderRegistry,
    state: RunState,
    observer: Option<Observer>,
}

impl<C: SheetClient> Reporter<C> {
    pub fn open(cfg: &ReportingConfig, client: C) -> Result<Self> {
        Self::open_at(cfg, client, snapshot_timestamp())
    }

    /// Like [`Reporter::open`] with an explicit snapshot time for the `datetime` column.
    pub fn open_at(cfg: &ReportingConfig, client: C, started_at: impl Into<String>) -> Result<Self> {
        let gate = ReportingGate::new(cfg.enabled);
        let sheet_id = cfg.sheet_id.clone().unwrap_or_default();
        if gate.is_open() && sheet_id.trim().is_empty() {
            return Err(anyhow!(
                "configuration error: reporting is enabled but reporting.sheet_id is not set"
            ));
        }
        Ok(Self {
            gate,
            sheet_id,
            cfg: cfg.clone(),
            client,
            header: HeaderRegistry::new(),
            state: RunState::new(started_at),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.is_open()
    }

    pub fn header(&self) -> &[String] {
        self.header.columns()
    }

    pub fn flags(&self) -> &FlagSnapshot {
        self.state.flags()
    }

    pub fn results(&self) -> &ResultMap {
        self.state.results()
    }

    pub fn pending_workloads(&self) -> Vec<String> {
        self.state
            .pending_workloads()
            .map(ToString::to_string)
            .collect()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Replaces the in-memory header with the sheet's first row, unless the
    /// sheet has none yet.
    pub fn fetch_header(&mut self) -> Result<()> {
        if !self.gate.is_open() {
            return Ok(());
        }
        let rows = self
            .client
            .get_row(&self.sheet_id, &self.cfg.header_range())?;
        let remote = rows.into_iter().next().unwrap_or_default();
        let adopted = self.header.adopt_remote(remote);
        self.note(ReportEvent::HeaderFetched {
            columns: self.header.len(),
            remote_empty: !adopted,
        });
        Ok(())
    }

    /// Adds a column to the header if it is not there yet.
    pub fn ensure_column(&mut self, name: &str) {
        if !self.gate.is_open() {
            return;
        }
        self.header.ensure(name);
    }

    /// Overwrites the sheet's first row with the full header.
    pub fn persist_header(&mut self) -> Result<()> {
        if !self.gate.is_open() {
            return Ok(());
        }
        let summary = self.client.update_row(
            &self.sheet_id,
            &self.cfg.header_range(),
            self.header.columns(),
        )?;
        self.note(ReportEvent::HeaderPersisted {
            columns: self.header.len(),
            updated_range: summary.updated_range,
        });
        Ok(())
    }

    /// Records the explicitly given, non-reserved flags of this run.
    ///
    /// The workload flag's value becomes the queue of workloads that later
    /// flushes walk through, one per row.
    pub fn register_flags(&mut self, all_flags: &[Flag]) -> Result<()> {
        if !self.gate.is_open() {
            return Ok(());
        }
        self.fetch_header()?;
        for flag in all_flags {
            if !flag.present || is_reserved_name(&flag.name, &self.cfg.reserved_prefix) {
                continue;
            }
            self.header.ensure(&flag.name);
            if flag.name == self.cfg.workload_flag {
                self.state.seed_workloads(flag.value.to_list());
            } else {
                self.state.merge_flag(&flag.name, flag.value.clone());
            }
        }
        Ok(())
    }

    pub fn add_result(&mut self, key: &str, value: impl Into<CellValue>) {
        if !self.gate.is_open() {
            return;
        }
        self.state.insert_result(key, value.into());
        self.header.ensure(key);
    }

    /// Writes the pending results as one new row and clears them.
    ///
    /// The header is persisted first, even when there is nothing to write.
    /// Returns the appended row, or `None` when no row was written. On failure
    /// the results are kept and the workload taken for this row goes back to
    /// the head of the queue, so calling `flush` again retries the same row.
    pub fn flush(&mut self) -> Result<Option<Vec<String>>> {
        if !self.gate.is_open() {
            return Ok(None);
        }
        if let Err(err) = self.persist_header() {
            self.note(ReportEvent::FlushFailed {
                stage: "persist_header".to_string(),
                error: err.to_string(),
            });
            return Err(err);
        }
        if self.state.results().is_empty() {
            self.note(ReportEvent::FlushSkipped {
                reason: "no results recorded".to_string(),
            });
            return Ok(None);
        }

        let taken = self.state.next_workload();
        let workload = taken.as_deref().unwrap_or(WORKLOAD_SENTINEL);
        let row = synthesize_row(
            self.header.columns(),
            self.state.flags(),
            self.state.results(),
            Some(WorkloadCell {
                column: &self.cfg.workload_flag,
                value: workload,
            }),
        );

        match self
            .client
            .append_row(&self.sheet_id, &self.cfg.append_range(), &row)
        {
            Ok(summary) => {
                self.note(ReportEvent::RowAppended {
                    workload: workload.to_string(),
                    cells: row.len(),
                    updated_range: summary.updated_range,
                });
                self.state.clear_results();
                Ok(Some(row))
            }
            Err(err) => {
                if let Some(taken) = taken {
                    self.state.requeue_workload(taken);
                }
                self.note(ReportEvent::FlushFailed {
                    stage: "append_row".to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Ends the reporting lifecycle and hands back the client.
    pub fn close(self) -> C {
        if self.gate.is_open()
            && !self.state.results().is_empty()
            && let Some(observer) = &self.observer
        {
            observer.warn_log(&format!(
                "closing reporter with {} unflushed result(s)",
                self.state.results().len()
            ));
        }
        self.client
    }

    fn note(&self, event: ReportEvent) {
        if let Some(observer) = &self.observer
            && let Err(err) = observer.record_event(&event)
        {
            observer.verbose_log(&format!("failed to write observe log: {err}"));
        }
    }
}
