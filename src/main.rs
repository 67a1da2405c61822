//! Library Export CLI
//!
//! Incrementally exports a media library into a plain directory tree.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use library_export::config::ExportConfigBuilder;
use library_export::{ExportConfig, ExportResult, Exporter, ProgressReporter};

const ABOUT: &str = r#"
Library Export - incremental media library exporter

Examples:
  library_export export -l ~/Pictures/My.library -o /backup/photos
  library_export export -l My.library -o out --group-by-smart-folder
  library_export export -l My.library -o out --force          clean output first
  library_export export -l My.library -o out --overwrite      re-copy everything
  library_export export -l My.library -o out --progress --json
"#;

/// Incremental media library exporter
#[derive(Parser)]
#[command(name = "library_export")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a library into an output directory
    Export {
        /// Library root directory
        #[arg(short = 'l', long)]
        library: Option<PathBuf>,

        /// Output directory
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// JSON config file; flags given on the command line take precedence
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Re-copy every asset regardless of timestamps
        #[arg(long)]
        overwrite: bool,

        /// Delete the output directory before exporting
        #[arg(long)]
        force: bool,

        /// Group assets into smart-folder subdirectories
        #[arg(short = 'g', long)]
        group_by_smart_folder: bool,

        /// Worker threads (0 = available parallelism)
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Write JSON progress lines to stderr
        #[arg(long)]
        progress: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Export {
            library,
            output,
            config,
            overwrite,
            force,
            group_by_smart_folder,
            threads,
            progress,
            json,
        }) => {
            let base = match config {
                Some(path) => match ExportConfig::from_json_file(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("{}", e);
                        return ExitCode::FAILURE;
                    }
                },
                None => ExportConfig::default(),
            };

            let mut builder = ExportConfigBuilder::from_config(base.clone())
                .overwrite(base.overwrite || overwrite)
                .force(base.force || force)
                .group_by_smart_folder(base.group_by_smart_folder || group_by_smart_folder)
                .show_progress(base.show_progress || progress);
            if let Some(library) = library {
                builder = builder.library(library);
            }
            if let Some(output) = output {
                builder = builder.output(output);
            }
            if let Some(threads) = threads {
                builder = builder.num_threads(threads);
            }
            let config = builder.build();

            if config.library.as_os_str().is_empty() || config.output.as_os_str().is_empty() {
                error!("both a library (-l) and an output directory (-o) are required");
                return ExitCode::FAILURE;
            }
            info!("Config: {:?}", config);

            let reporter = Arc::new(ProgressReporter::new(
                config.show_progress,
                config.progress_interval_ms,
            ));
            reporter.report_start(&config);

            let result = match Exporter::new()
                .with_progress(reporter.clone())
                .export(&config)
            {
                Ok(result) => result,
                Err(e) => {
                    error!("Export aborted: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            reporter.report_done(&result);

            print_result(&result, json);
            if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        None => {
            println!("{}", ABOUT);
            println!("Run 'library_export export --help' for export options");
            ExitCode::SUCCESS
        }
    }
}

fn print_result(result: &ExportResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize result: {}", e),
        }
        return;
    }

    println!("Export completed:");
    println!("  Total assets: {}", result.total_assets);
    println!("  Copied: {}", result.copied);
    println!("  Up to date: {}", result.up_to_date);
    println!("  Deleted (skipped): {}", result.deleted);
    println!("  Bytes copied: {}", result.bytes_copied);
    println!("  Errors: {}", result.error_count());
    println!("  Duration: {}ms", result.duration_ms);
    for err in &result.errors {
        println!("    {}", err);
    }
}
