//! CLI binary for converting job tables into DEFTABLE documents.

mod loader;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use deftable_core::{to_json, to_xml, transform, Transformed};
use deftable_types::{Field, ParseMode, TransformConfig};

use crate::loader::{load_csv_file, ColumnMap};

#[derive(Parser)]
#[command(name = "deftable", version, about = "Convert job spreadsheets into DEFTABLE definitions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV job table into a DEFTABLE document
    Convert {
        /// Path to the CSV table
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Xml)]
        format: OutputFormat,

        /// Emit jobs directly under the root instead of grouping by folder
        #[arg(long)]
        flat: bool,

        /// Fail on the first malformed sub-field instead of skipping it
        #[arg(long)]
        strict: bool,

        /// JSON file mapping field names to table headers
        #[arg(long)]
        columns: Option<PathBuf>,

        /// JSON file with transform settings (flags take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show what a table would produce, including skipped tokens
    Info {
        /// Path to the CSV table
        input: PathBuf,

        /// JSON file mapping field names to table headers
        #[arg(long)]
        columns: Option<PathBuf>,
    },

    /// List the fields and the table headers they bind to
    Columns {
        /// JSON file mapping field names to table headers
        #[arg(long)]
        columns: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Xml,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so rendered output on stdout stays clean
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            input,
            output,
            format,
            flat,
            strict,
            columns,
            config,
        } => {
            let mut settings = load_config(config.as_deref())?;
            if flat {
                settings.group_by_folder = false;
            }
            if strict {
                settings.mode = ParseMode::Strict;
            }
            cmd_convert(&input, output.as_deref(), format, columns.as_deref(), &settings)?;
        }
        Commands::Info { input, columns } => {
            cmd_info(&input, columns.as_deref())?;
        }
        Commands::Columns { columns } => {
            cmd_columns(columns.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TransformConfig> {
    match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(TransformConfig::default()),
    }
}

fn load_columns(path: Option<&Path>) -> anyhow::Result<ColumnMap> {
    match path {
        Some(p) => Ok(ColumnMap::load(p)?),
        None => Ok(ColumnMap::default()),
    }
}

fn run_transform(
    input: &Path,
    columns: Option<&Path>,
    settings: &TransformConfig,
) -> anyhow::Result<Transformed> {
    let columns = load_columns(columns)?;
    let rows = load_csv_file(input, &columns)?;
    Ok(transform(&rows, settings)?)
}

fn render(out: &Transformed, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Xml => Ok(to_xml(&out.document)),
        OutputFormat::Json => Ok(to_json(&out.document)?),
    }
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    columns: Option<&Path>,
    settings: &TransformConfig,
) -> anyhow::Result<()> {
    let out = run_transform(input, columns, settings)?;
    let text = render(&out, format)?;

    for (row, irr) in &out.report.irregularities {
        tracing::debug!(row, field = %irr.field, token = %irr.token, "{}", irr.reason);
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, text)?;
            tracing::info!(path = %path.display(), jobs = out.report.jobs, "Document written");
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn cmd_info(input: &Path, columns: Option<&Path>) -> anyhow::Result<()> {
    let out = run_transform(input, columns, &TransformConfig::default())?;
    let report = &out.report;

    println!("Table: {}", input.display());
    println!("Rows: {}", report.rows);
    println!("Jobs: {}", report.jobs);
    println!("Folders: {}", report.groups);

    if report.groups > 0 {
        println!("\nFolders:");
    }
    for group in out.document.groups() {
        println!(
            "  {} ({} jobs)",
            group.attr("FOLDER_NAME").unwrap_or("-"),
            group.children.len()
        );
    }

    if report.irregularities.is_empty() {
        println!("\nNo skipped tokens");
    } else {
        println!("\nSkipped tokens: {}", report.irregularities.len());
        for (row, irr) in &report.irregularities {
            println!("  row {} {}: '{}' ({})", row, irr.field, irr.token, irr.reason);
        }
    }
    Ok(())
}

fn cmd_columns(columns: Option<&Path>) -> anyhow::Result<()> {
    let map = load_columns(columns)?;
    for field in Field::ALL {
        let marker = if field.is_required() { " (required)" } else { "" };
        println!("{:<16} {}{}", field.name(), map.header(field), marker);
    }
    Ok(())
}
