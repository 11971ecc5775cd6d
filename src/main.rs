use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod aggregate;
mod catalog;
mod config;
mod export;
mod filter;
mod models;
mod odata;
mod pipeline;
mod report;
mod session;
#[cfg(test)]
mod testing;
mod view;

use config::ReportConfig;
use export::{Notification, Table};
use models::ValidationStatus;
use odata::ODataClient;
use pipeline::{BusyIndicator, LoadOutcome, Report, ReportPipeline};

#[derive(Parser)]
#[command(name = "edu-report")]
#[command(about = "Educational validation status report by IC", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./edu-report.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status matrix per IC
    Summary {
        /// Keep ICs whose code or name contains this text
        #[arg(long, default_value = "")]
        filter: String,
    },
    /// Print the validation records behind one cell of the summary
    Detail {
        /// IC code, or "Total" for every IC
        #[arg(long)]
        ic: String,
        /// Status code (D, PA, A, SA, R); omit for all statuses
        #[arg(long, value_parser = parse_status)]
        status: Option<ValidationStatus>,
        #[arg(long, default_value = "")]
        filter: String,
    },
    /// Write a table to a CSV file in the export directory
    Export {
        #[command(subcommand)]
        table: ExportCommand,
    },
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Export the summary table
    Summary {
        #[arg(long, default_value = "")]
        filter: String,
    },
    /// Export the detail table
    Detail {
        #[arg(long)]
        ic: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<ValidationStatus>,
        #[arg(long, default_value = "")]
        filter: String,
    },
}

fn parse_status(value: &str) -> Result<ValidationStatus, String> {
    ValidationStatus::from_code(value)
        .ok_or_else(|| format!("unknown status `{value}`, expected one of D, PA, A, SA, R"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ReportConfig::load(cli.config.as_deref())?;

    let client = ODataClient::new(&config.service).context("failed to build HTTP client")?;
    let busy = BusyIndicator::default();
    let outcome = ReportPipeline::new(&client, &client, &config)
        .load(&busy)
        .await
        .context("failed to load the educational validation report")?;

    let loaded = match outcome {
        LoadOutcome::Ready(loaded) => loaded,
        LoadOutcome::NoAccess { person_id } => {
            println!("Warning: {person_id} is not authorized to view the educational validation report.");
            return Ok(());
        }
    };

    tracing::debug!(
        dropped = loaded.aggregation.dropped_records,
        "records not attributed to any IC"
    );
    for code in loaded.aggregation.duplicate_codes() {
        println!("Warning: IC code {code} is listed more than once; only its first entry is reported.");
    }
    for text in loaded.aggregation.ambiguous_texts() {
        println!("Warning: IC name \"{text}\" is shared by several IC codes; its records are not counted.");
    }

    match cli.command {
        Commands::Summary { filter } => {
            let rows = view::filter_rows(&loaded.aggregation.rows, &filter);
            print!("{}", report::render_summary(&loaded.session, &rows));
        }
        Commands::Detail { ic, status, filter } => {
            let records = view::drill_down(&loaded.aggregation, Some(ic.as_str()), status);
            let records = view::search_details(records, &filter);
            let title = match status {
                Some(status) => format!("{ic} / {}", status.text()),
                None => ic.clone(),
            };
            print!("{}", report::render_details(&title, &records));
        }
        Commands::Export { table } => {
            let notice = run_export(&loaded, table, &config);
            println!("{notice}");
        }
    }

    Ok(())
}

fn run_export(loaded: &Report, command: ExportCommand, config: &ReportConfig) -> Notification {
    let directory = &config.export.directory;
    match command {
        ExportCommand::Summary { filter } => {
            let rows = view::filter_rows(&loaded.aggregation.rows, &filter);
            export::export_table(Table::Summary, &rows, directory)
        }
        ExportCommand::Detail { ic, status, filter } => {
            let records = view::drill_down(&loaded.aggregation, ic.as_deref(), status);
            let records = view::search_details(records, &filter);
            export::export_table(Table::Detail, &records, directory)
        }
    }
}
