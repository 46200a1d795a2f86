use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn benchsheet(workspace: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("benchsheet"));
    cmd.current_dir(workspace)
        .env("HOME", workspace)
        .env_remove("BENCHSHEET_ACCESS_TOKEN");
    cmd
}

fn write_settings(workspace: &Path, settings: &str) {
    let runtime = workspace.join(".benchsheet");
    fs::create_dir_all(&runtime).expect("runtime dir");
    fs::write(runtime.join("settings.local.json"), settings).expect("settings override");
}

fn run_json(workspace: &Path, args: &[&str]) -> Value {
    let output = benchsheet(workspace)
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json output")
}

fn run_json_failure(workspace: &Path, args: &[&str], code: i32) -> Value {
    let output = benchsheet(workspace)
        .args(args)
        .assert()
        .code(code)
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json error output")
}

struct SheetsStub {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SheetsStub {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for SheetsStub {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Answers each request with the next scripted JSON body and records the raw request.
fn start_sheets_stub(bodies: Vec<&'static str>) -> SheetsStub {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    listener.set_nonblocking(true).expect("nonblocking");
    let addr = listener.local_addr().expect("addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let requests_thread = Arc::clone(&requests);
    let (tx, rx) = mpsc::channel::<()>();
    let handle = thread::spawn(move || {
        loop {
            if rx.try_recv().is_ok() {
                break;
            }
            match listener.accept() {
                Ok((mut stream, _)) => {
                    let _ = stream.set_nonblocking(false);
                    let _ = stream.set_read_timeout(Some(Duration::from_millis(200)));
                    let mut raw = Vec::new();
                    let mut chunk = [0_u8; 4096];
                    loop {
                        match stream.read(&mut chunk) {
                            Ok(0) | Err(_) => break,
                            Ok(read) => {
                                raw.extend_from_slice(&chunk[..read]);
                                if request_complete(&raw) {
                                    break;
                                }
                            }
                        }
                    }
                    let idx = {
                        let mut guard = requests_thread.lock().expect("requests lock");
                        guard.push(String::from_utf8_lossy(&raw).to_string());
                        guard.len() - 1
                    };
                    let body = bodies.get(idx).copied().unwrap_or("{}");
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes());
                    let _ = stream.flush();
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(2));
                }
                Err(_) => break,
            }
        }
    });
    SheetsStub {
        base_url: format!("http://{addr}"),
        requests,
        stop_tx: Some(tx),
        handle: Some(handle),
    }
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= content_length
}

#[test]
fn config_json_redacts_access_token() {
    let workspace = TempDir::new().expect("workspace");
    write_settings(
        workspace.path(),
        r#"{"auth":{"access_token":"ya29.secret"},"reporting":{"sheet_name":"Results"}}"#,
    );
    let out = run_json(workspace.path(), &["--json", "config"]);
    assert_eq!(out["auth"]["access_token"], "***REDACTED***");
    assert_eq!(out["reporting"]["sheet_name"], "Results");
    assert_eq!(out["reporting"]["enabled"], false);
    assert_eq!(out["sheets"]["value_input_option"], "USER_ENTERED");
}

#[test]
fn report_without_reporting_is_a_no_op() {
    let workspace = TempDir::new().expect("workspace");
    let out = run_json(
        workspace.path(),
        &["--json", "report", "--flag", "threads=8", "--result", "ops=5"],
    );
    assert_eq!(out["enabled"], false);
    assert_eq!(out["batches"], 1);
    assert!(out["rows"].as_array().is_some_and(|rows| rows.is_empty()));
    assert!(!workspace.path().join(".benchsheet/observe.log").exists());
}

#[test]
fn reporting_without_sheet_id_is_a_configuration_error() {
    let workspace = TempDir::new().expect("workspace");
    let out = run_json_failure(
        workspace.path(),
        &["--json", "report", "--reporting", "--result", "ops=5"],
        2,
    );
    assert_eq!(out["type"], "configuration");
    assert!(
        out["suggestions"]
            .as_array()
            .is_some_and(|items| !items.is_empty())
    );
}

#[test]
fn malformed_result_pair_is_rejected() {
    let workspace = TempDir::new().expect("workspace");
    let out = run_json_failure(
        workspace.path(),
        &["--json", "report", "--result", "ops"],
        2,
    );
    assert_eq!(out["type"], "validation");
    assert!(out["message"].as_str().is_some_and(|m| m.contains("'ops'")));
}

#[test]
fn missing_results_file_is_an_input_error() {
    let workspace = TempDir::new().expect("workspace");
    let out = run_json_failure(
        workspace.path(),
        &["--json", "report", "--results-file", "does-not-exist.jsonl"],
        2,
    );
    assert_eq!(out["type"], "validation");
    assert!(
        out["message"]
            .as_str()
            .is_some_and(|m| m.contains("does-not-exist.jsonl"))
    );
}

#[test]
fn report_appends_one_row_per_batch() {
    let workspace = TempDir::new().expect("workspace");
    let stub = start_sheets_stub(vec![
        r#"{"range":"Sheet1!A1:Z1","majorDimension":"ROWS"}"#,
        r#"{"updatedRange":"Sheet1!A1:D1","updatedRows":1,"updatedCells":4}"#,
        r#"{"updates":{"updatedRange":"Sheet1!A2:D2","updatedRows":1,"updatedCells":4}}"#,
        r#"{"updatedRange":"Sheet1!A1:D1","updatedRows":1,"updatedCells":4}"#,
        r#"{"updates":{"updatedRange":"Sheet1!A3:D3","updatedRows":1,"updatedCells":4}}"#,
    ]);
    write_settings(
        workspace.path(),
        &format!(r#"{{"sheets":{{"api_base_url":"{}"}}}}"#, stub.base_url),
    );
    let results = workspace.path().join("results.jsonl");
    fs::write(&results, "{\"ops\": 7}\n").expect("results file");

    let output = benchsheet(workspace.path())
        .env("BENCHSHEET_ACCESS_TOKEN", "test-token")
        .args([
            "--json",
            "report",
            "--reporting",
            "--reporting-sheet-id",
            "sheet-xyz",
            "--flag",
            "threads=8",
            "--workload-files",
            "wA,wB,wC",
            "--result",
            "ops=5",
            "--results-file",
            results.to_string_lossy().as_ref(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&output).expect("json output");

    assert_eq!(out["enabled"], true);
    assert_eq!(
        out["header"],
        serde_json::json!(["datetime", "threads", "ycsb_workload_files", "ops"])
    );
    let rows = out["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], "8");
    assert_eq!(rows[0][2], "wA");
    assert_eq!(rows[0][3], "5");
    assert_eq!(rows[1][2], "wB");
    assert_eq!(rows[1][3], "7");
    assert_eq!(out["pending_workloads"], serde_json::json!(["wC"]));

    let requests = stub.requests();
    assert_eq!(requests.len(), 5);
    assert!(requests[0].starts_with("GET /v4/spreadsheets/sheet-xyz/values/"));
    assert!(requests[1].starts_with("PUT /v4/spreadsheets/sheet-xyz/values/"));
    assert!(requests[2].starts_with("POST /v4/spreadsheets/sheet-xyz/values/Sheet1:append"));
    assert!(requests[2].contains("insertDataOption=INSERT_ROWS"));
    assert!(
        requests
            .iter()
            .all(|raw| raw.to_lowercase().contains("authorization: bearer test-token"))
    );
    assert!(!requests.iter().any(|raw| raw.contains("reporting_sheet_id")));

    let log = fs::read_to_string(workspace.path().join(".benchsheet/observe.log")).expect("log");
    assert_eq!(log.matches("row_appended").count(), 2);
}

#[test]
fn flags_without_results_still_write_the_header() {
    let workspace = TempDir::new().expect("workspace");
    let stub = start_sheets_stub(vec![
        r#"{"range":"Sheet1!A1:Z1","majorDimension":"ROWS"}"#,
        r#"{"updatedRange":"Sheet1!A1:B1","updatedRows":1,"updatedCells":2}"#,
    ]);
    write_settings(
        workspace.path(),
        &format!(r#"{{"sheets":{{"api_base_url":"{}"}}}}"#, stub.base_url),
    );
    let output = benchsheet(workspace.path())
        .env("BENCHSHEET_ACCESS_TOKEN", "test-token")
        .args([
            "--json",
            "report",
            "--reporting",
            "--reporting-sheet-id",
            "sheet-xyz",
            "--flag",
            "threads=8",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(out["header"], serde_json::json!(["datetime", "threads"]));
    assert!(out["rows"].as_array().is_some_and(|rows| rows.is_empty()));

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].starts_with("PUT /v4/spreadsheets/sheet-xyz/values/"));
    assert!(requests[1].contains(r#"{"values":[["datetime","threads"]]}"#));
}

#[test]
fn create_sheet_prints_enable_hint() {
    let workspace = TempDir::new().expect("workspace");
    let stub = start_sheets_stub(vec![r#"{"spreadsheetId":"fresh-sheet"}"#]);
    write_settings(
        workspace.path(),
        &format!(r#"{{"sheets":{{"api_base_url":"{}"}}}}"#, stub.base_url),
    );
    let output = benchsheet(workspace.path())
        .env("BENCHSHEET_ACCESS_TOKEN", "test-token")
        .args(["--json", "create-sheet", "--title", "Nightly YCSB"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(out["sheet_id"], "fresh-sheet");
    assert_eq!(
        out["hint"],
        "enable reporting with --reporting --reporting-sheet-id=fresh-sheet"
    );
    let requests = stub.requests();
    assert!(requests[0].starts_with("POST /v4/spreadsheets "));
    assert!(requests[0].contains("Nightly YCSB"));
}
