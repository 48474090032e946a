use crate::infra::{load_directory_snapshot, read_json_file};
use crate::render::{render_import_report, render_resolution_request};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kinerja::config::AppConfig;
use kinerja::error::AppError;
use kinerja::pipeline::{ImportOutcome, LevelMapping, PerformanceImporter, ResolutionMap};
use kinerja::telemetry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kinerja",
    about = "Import pasted performance assessments and reconcile them against the employee directory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Import a pasted assessment saved to a text file
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Text file holding the pasted spreadsheet block
    pub(crate) file: PathBuf,
    /// Employee directory CSV (defaults to KINERJA_DIRECTORY_CSV)
    #[arg(long)]
    pub(crate) directory: Option<PathBuf>,
    /// JSON object of employee name to authoritative organizational level
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// JSON object of employee name to organizational level
    #[arg(long)]
    pub(crate) levels: Option<PathBuf>,
    /// JSON object of unresolved source name to its resolution
    #[arg(long)]
    pub(crate) resolutions: Option<PathBuf>,
    /// Competency every employee must be assessed on (repeatable)
    #[arg(long = "require", value_name = "NAME")]
    pub(crate) required: Vec<String>,
    /// Take names missing from the directory as new employees instead of pausing
    #[arg(long)]
    pub(crate) accept_new: bool,
    /// Print the JSON payload instead of the summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import(args),
    }
}

fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let ImportArgs {
        file,
        directory,
        roster,
        levels,
        resolutions,
        required,
        accept_new,
        json,
    } = args;

    let mut config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    if directory.is_some() {
        config.pipeline.directory_csv = directory;
    }
    if !required.is_empty() {
        config.pipeline.required_competencies = required;
    }
    if accept_new {
        config.pipeline.accept_unmatched_as_new = true;
    }

    let snapshot = load_directory_snapshot(config.pipeline.directory_csv.as_deref())?;
    let roster: LevelMapping = read_optional_json(roster)?;
    let levels: LevelMapping = read_optional_json(levels)?;
    let resolutions: ResolutionMap = read_optional_json(resolutions)?;

    let importer = PerformanceImporter::from_config(snapshot, &config.pipeline)
        .with_roster(roster)
        .with_organization_levels(levels);

    let text = std::fs::read_to_string(&file)?;
    let outcome = importer.import_with_resolutions(&text, &resolutions)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.into_payload())?);
        return Ok(());
    }

    match outcome {
        ImportOutcome::Completed(report) => render_import_report(&report),
        ImportOutcome::NeedsResolution(pending) => {
            render_resolution_request(&pending.resolution_request())
        }
    }

    Ok(())
}

fn read_optional_json<T>(path: Option<PathBuf>) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match path {
        Some(path) => read_json_file(&path),
        None => Ok(T::default()),
    }
}
