use crate::commands::sheets_client;
use crate::output::print_json;
use anyhow::{Result, anyhow};
use benchsheet_core::{AppConfig, CellValue, Flag};
use benchsheet_errors::errors;
use benchsheet_observe::Observer;
use benchsheet_report::Reporter;
use benchsheet_sheets::SheetClient;
use indexmap::IndexMap;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) struct ReportRequest {
    pub reporting: bool,
    pub sheet_id: Option<String>,
    pub flags: Vec<String>,
    pub workload_files: Vec<String>,
    pub results: Vec<String>,
    pub results_file: Option<PathBuf>,
}

type ResultBatch = IndexMap<String, CellValue>;

pub(crate) fn run_report(
    workspace: &Path,
    req: ReportRequest,
    json_mode: bool,
    verbose: bool,
) -> Result<()> {
    let mut cfg = AppConfig::load(workspace)?;
    if req.reporting {
        cfg.reporting.enabled = true;
    }
    if let Some(sheet_id) = &req.sheet_id {
        cfg.reporting.sheet_id = Some(sheet_id.clone());
    }

    let flags = collect_flags(&cfg, &req)?;
    let batches = collect_batches(&req)?;
    let batch_count = batches.len();

    if cfg.reporting.enabled
        && cfg
            .reporting
            .sheet_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty())
    {
        return Err(errors::missing_sheet_id().into_error());
    }
    cfg.validate()?;

    let mut observer = Observer::new(workspace)?;
    observer.set_verbose(verbose);
    let client = sheets_client(&cfg)?;
    let mut reporter = Reporter::open(&cfg.reporting, client)?.with_observer(observer);
    let rows = report_batches(&mut reporter, &flags, batches)?;

    let enabled = reporter.is_enabled();
    let header = reporter.header().to_vec();
    let pending = reporter.pending_workloads();
    let sheet_id = cfg.reporting.sheet_id.clone().unwrap_or_default();
    reporter.close();

    if json_mode {
        print_json(&json!({
            "enabled": enabled,
            "sheet_id": sheet_id,
            "header": header,
            "rows": rows,
            "batches": batch_count,
            "pending_workloads": pending,
        }))?;
    } else if !enabled {
        println!("reporting disabled; nothing sent (enable with --reporting)");
    } else {
        println!("appended {} row(s) to {sheet_id}", rows.len());
        if !pending.is_empty() {
            println!("workloads without results: {}", pending.join(","));
        }
    }
    Ok(())
}

/// Registers the flags and flushes one row per batch. A run without results
/// still flushes once so columns added by its flags reach the sheet header.
fn report_batches<C: SheetClient>(
    reporter: &mut Reporter<C>,
    flags: &[Flag],
    batches: Vec<ResultBatch>,
) -> Result<Vec<Vec<String>>> {
    reporter.register_flags(flags)?;
    if batches.is_empty() {
        reporter.flush()?;
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    for batch in batches {
        for (key, value) in batch {
            reporter.add_result(&key, value);
        }
        if let Some(row) = reporter.flush()? {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// The run's flag table. Only flags given on this command line count as
/// explicitly set; the reporting switches themselves are listed too and left
/// for the reporter to filter.
fn collect_flags(cfg: &AppConfig, req: &ReportRequest) -> Result<Vec<Flag>> {
    let mut flags = vec![Flag {
        name: "reporting".to_string(),
        value: CellValue::Bool(cfg.reporting.enabled),
        present: req.reporting,
    }];
    flags.push(Flag {
        name: "reporting_sheet_id".to_string(),
        value: CellValue::from(cfg.reporting.sheet_id.clone().unwrap_or_default()),
        present: req.sheet_id.is_some(),
    });
    for raw in &req.flags {
        let (name, value) = parse_pair(raw)?;
        flags.push(Flag::present(name, CellValue::parse(value)));
    }
    if !req.workload_files.is_empty() {
        let workloads = req
            .workload_files
            .iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>();
        flags.push(Flag::present(
            cfg.reporting.workload_flag.clone(),
            CellValue::List(workloads),
        ));
    }
    Ok(flags)
}

/// Result batches in flush order: the `--result` pairs first, then one batch
/// per line of the results file.
fn collect_batches(req: &ReportRequest) -> Result<Vec<ResultBatch>> {
    let mut batches = Vec::new();
    if !req.results.is_empty() {
        let mut batch = ResultBatch::new();
        for raw in &req.results {
            let (key, value) = parse_pair(raw)?;
            batch.insert(key.to_string(), CellValue::parse(value));
        }
        batches.push(batch);
    }
    if let Some(path) = &req.results_file {
        let raw = fs::read_to_string(path).map_err(|err| {
            errors::unreadable_results_file(&path.display().to_string(), &err.to_string())
                .into_error()
        })?;
        batches.extend(parse_results_lines(&raw, path)?);
    }
    Ok(batches)
}

fn parse_results_lines(raw: &str, path: &Path) -> Result<Vec<ResultBatch>> {
    let mut batches = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).map_err(|err| {
            anyhow!(
                "invalid result on line {} of {}: {err}",
                idx + 1,
                path.display()
            )
        })?;
        let serde_json::Value::Object(object) = value else {
            return Err(anyhow!(
                "invalid result on line {} of {}: expected a JSON object",
                idx + 1,
                path.display()
            ));
        };
        batches.push(
            object
                .into_iter()
                .map(|(key, value)| (key, CellValue::from(value)))
                .collect(),
        );
    }
    Ok(batches)
}

fn parse_pair(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(errors::invalid_pair(raw).into_error()),
    }
}
