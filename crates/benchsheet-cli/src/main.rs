use anyhow::Result;
use benchsheet_errors::ErrorHandler;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::auth::run_auth;
use commands::config::run_config;
use commands::report::run_report;
use commands::sheet::{run_create_sheet, run_header};
use output::print_json;

#[derive(Parser)]
#[command(name = "benchsheet")]
#[command(about = "Sync benchmark flags and results to a shared spreadsheet", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Mirror reporter events to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Directory holding `.benchsheet/` settings and logs (defaults to the current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new result spreadsheet.
    CreateSheet(CreateSheetArgs),
    /// Print the header row of the result sheet.
    Header(SheetTargetArgs),
    /// Record one run: register flags, then add and flush each result batch.
    Report(ReportArgs),
    Auth {
        #[command(subcommand)]
        command: AuthCmd,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[derive(Args)]
struct CreateSheetArgs {
    /// Spreadsheet title (defaults to `reporting.sheet_title`).
    #[arg(long)]
    title: Option<String>,
}

#[derive(Args)]
struct SheetTargetArgs {
    #[arg(long = "reporting-sheet-id")]
    reporting_sheet_id: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// Enable reporting for this run.
    #[arg(long)]
    reporting: bool,

    #[arg(long = "reporting-sheet-id")]
    reporting_sheet_id: Option<String>,

    /// Explicitly set benchmark flag, as name=value (repeatable).
    #[arg(long = "flag")]
    flags: Vec<String>,

    /// Workloads of this run, one per flushed row.
    #[arg(long = "workload-files", value_delimiter = ',')]
    workload_files: Vec<String>,

    /// Result of the run, as key=value (repeatable). All pairs form one row.
    #[arg(long = "result")]
    results: Vec<String>,

    /// JSON Lines file; every object is one row of results.
    #[arg(long = "results-file")]
    results_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AuthCmd {
    /// Print the consent URL for the configured client secret.
    Url,
    /// Exchange the code shown after consent for cached credentials.
    Exchange {
        #[arg(long)]
        code: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;
    let verbose = cli.verbose;
    let handler = ErrorHandler::new().verbose(verbose);
    if let Err(err) = run(cli) {
        let enhanced = handler.classify(&err);
        if json_mode {
            let _ = print_json(&enhanced.to_json());
        } else {
            eprint!("{}", enhanced.format(verbose));
        }
        std::process::exit(enhanced.error_type.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    match cli.command {
        Commands::CreateSheet(args) => run_create_sheet(&workspace, args.title, cli.json),
        Commands::Header(args) => run_header(&workspace, args.reporting_sheet_id, cli.json),
        Commands::Report(args) => run_report(
            &workspace,
            commands::report::ReportRequest {
                reporting: args.reporting,
                sheet_id: args.reporting_sheet_id,
                flags: args.flags,
                workload_files: args.workload_files,
                results: args.results,
                results_file: args.results_file,
            },
            cli.json,
            cli.verbose,
        ),
        Commands::Auth { command } => match command {
            AuthCmd::Url => run_auth(&workspace, commands::auth::AuthAction::Url, cli.json),
            AuthCmd::Exchange { code } => run_auth(
                &workspace,
                commands::auth::AuthAction::Exchange { code },
                cli.json,
            ),
        },
        Commands::Config => run_config(&workspace, cli.json),
    }
}
