//! Command-line interface for mintview
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading with CLI overrides
//! - Dispatch of the `page`, `values`, `export`, `datasets` and `config`
//!   subcommands against an [`Explorer`]

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, LogLevel};
use crate::error::{ExplorerError, Result};
use crate::explorer::{ExportRequest, Explorer};
use crate::export::ExportFormat;
use crate::formatter::{Formatter, OutputFormat};
use crate::query::FilterSelection;

/// Filtered, paginated views and bulk exports of tabular datasets
#[derive(Parser, Debug)]
#[command(
    name = "mintview",
    version,
    about = "Browse and export tabular datasets",
    long_about = "Filter and page through CSV datasets, list the distinct values of a column,
and stream filtered rows to CSV or XLSX files."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Output format for pages, values and summaries
    #[arg(long = "output-format", value_enum, global = true)]
    pub output_format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for mintview
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show one page of a dataset
    Page {
        /// CSV file to read
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Filter as COLUMN=V1,V2 (repeatable; columns are AND-ed)
        #[arg(short = 'f', long = "filter", value_name = "COLUMN=VALUES", value_parser = parse_filter)]
        filters: Vec<(String, Vec<String>)>,

        /// First matching row to show
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Rows per page
        #[arg(long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the distinct values of a column
    Values {
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        #[arg(value_name = "COLUMN")]
        column: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Export filtered rows to a file
    Export {
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// csv or xlsx
        #[arg(long, value_name = "FORMAT", value_parser = ExportFormat::parse)]
        format: ExportFormat,

        #[arg(short = 'f', long = "filter", value_name = "COLUMN=VALUES", value_parser = parse_filter)]
        filters: Vec<(String, Vec<String>)>,

        /// Stop after this many rows
        #[arg(long)]
        row_limit: Option<u64>,

        /// Output file; defaults to a timestamped name in the output directory
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// List loadable datasets in a directory
    Datasets {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Parse `COLUMN=V1,V2`; `COLUMN=` leaves the column unconstrained
fn parse_filter(raw: &str) -> std::result::Result<(String, Vec<String>), String> {
    let (column, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUES, got '{raw}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in '{raw}'"));
    }
    let values = if values.is_empty() {
        Vec::new()
    } else {
        values.split(',').map(|v| v.to_string()).collect()
    };
    Ok((column.to_string(), values))
}

/// Turn parsed `--filter` flags into a selection; repeated columns merge
pub fn build_selection(filters: &[(String, Vec<String>)]) -> FilterSelection {
    let mut merged: std::collections::BTreeMap<&str, Vec<String>> = Default::default();
    for (column, values) in filters {
        merged.entry(column.as_str()).or_default().extend(values.iter().cloned());
    }
    let mut selection = FilterSelection::new();
    for (column, values) in merged {
        selection.insert(column, values.into_iter().map(Into::into).collect());
    }
    selection
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_logging_args(&mut config, &args);
        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    fn formatter(&self, json: bool) -> Formatter {
        let format = match (json, self.args.output_format) {
            (true, Some(OutputFormat::Table)) | (true, None) => OutputFormat::JsonPretty,
            (_, Some(format)) => format,
            (false, None) => OutputFormat::Table,
        };
        Formatter::new(format, !self.args.no_color)
    }

    /// Run the selected subcommand
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Page {
                dataset,
                filters,
                offset,
                limit,
                json,
            } => {
                let explorer = self.open(dataset).await?;
                let page = explorer
                    .fetch_page(build_selection(filters), *offset, *limit)
                    .await?;
                println!("{}", self.formatter(*json).format_page(&page)?);
            }
            Commands::Values {
                dataset,
                column,
                json,
            } => {
                let explorer = self.open(dataset).await?;
                let entry = explorer.list_column_values(column).await?;
                println!("{}", self.formatter(*json).format_values(&entry)?);
            }
            Commands::Export {
                dataset,
                format,
                filters,
                row_limit,
                output,
            } => {
                self.export(dataset, *format, build_selection(filters), *row_limit, output.as_deref())
                    .await?;
            }
            Commands::Datasets { dir } => {
                let explorer = Explorer::new(self.config.clone());
                let found = explorer.list_datasets(dir).await?;
                println!("{}", self.formatter(false).format_datasets(&found)?);
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
            }
        }
        Ok(())
    }

    async fn open(&self, dataset: &Path) -> Result<Explorer> {
        let explorer = Explorer::new(self.config.clone());
        let info = explorer.load_dataset(dataset).await?;
        debug!("Loaded {} rows from {}", info.row_count, dataset.display());
        Ok(explorer)
    }

    /// Export with Ctrl+C cancellation and an atomic file write
    async fn export(
        &self,
        dataset: &Path,
        format: ExportFormat,
        filters: FilterSelection,
        row_limit: Option<u64>,
        output: Option<&Path>,
    ) -> Result<()> {
        let explorer = self.open(dataset).await?;

        let cancel_token = CancellationToken::new();
        let cancel_token_clone = cancel_token.clone();
        let ctrl_c_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    cancel_token_clone.cancel();
                }
                Err(err) => {
                    eprintln!("Failed to listen for Ctrl+C: {}", err);
                }
            }
        });

        let show_progress = self.config.export.show_progress && !self.args.quiet;
        let result = async {
            let stream = explorer
                .start_export_with(
                    ExportRequest {
                        format,
                        filters,
                        row_limit,
                    },
                    cancel_token.clone(),
                    show_progress,
                )
                .await?;

            if stream.truncated() {
                eprintln!(
                    "Warning: {} holds at most {} rows; the export will be truncated",
                    format,
                    stream.effective_row_limit()
                );
            }

            let path = match output {
                Some(p) => p.to_path_buf(),
                None => self.config.export.output_dir.join(stream.filename()),
            };
            info!("Writing export to {}", path.display());
            let summary = stream.write_to_path(&path).await?;
            Ok::<_, ExplorerError>((summary, path))
        }
        .await;

        ctrl_c_handle.abort();

        let (summary, path) = result?;
        println!(
            "{}",
            self.formatter(false).format_summary(&summary, Some(&path))?
        );
        Ok(())
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.config.validate()?;
            println!("Configuration is valid");
        }

        if show || !validate {
            let path = self
                .args
                .config_file
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("# Configuration file: {}", path.display());
            println!("{}", self.config.to_toml_string()?);
        }

        Ok(())
    }
}
