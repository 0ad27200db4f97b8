use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use rodovia_harvester::app::Harvester;
use rodovia_harvester::config::HarvestConfig;
use rodovia_harvester::error::HarvestError;
use rodovia_harvester::fetch::HttpFetcher;
use rodovia_harvester::output::{JsonOutput, OutputMode};
use rodovia_harvester::render::BrowserlessRenderer;
use rodovia_harvester::robots::RobotsGate;
use rodovia_harvester::throttle::SleepThrottle;
use rodovia_harvester::workspace::Workspace;

#[derive(Parser)]
#[command(name = "rodovia-hv")]
#[command(about = "Harvest Brazilian road-safety open datasets (ANTT, DNIT, INMET)")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the three pipelines in sequence")]
    Run,
    #[command(about = "Download the highway accident CSVs")]
    Accidents,
    #[command(about = "Download the latest road-geometry shapefile archive")]
    Geometry,
    #[command(about = "Download, extract and organize the weather archives")]
    Weather,
    #[command(about = "Re-bucket extracted weather CSVs by year without downloading")]
    Organize,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(harvest) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(harvest));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::PermissionDenied(_) => 2,
        HarvestError::HttpStatus { .. }
        | HarvestError::Connection(_)
        | HarvestError::Render(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = HarvestConfig::default();
    let workspace = Workspace::new().into_diagnostic()?;
    let renderer =
        BrowserlessRenderer::new(&config.renderer_endpoint, None).into_diagnostic()?;
    let gate = RobotsGate::new(&config.user_agent).into_diagnostic()?;
    let fetcher = HttpFetcher::new(&config.user_agent).into_diagnostic()?;
    let harvester = Harvester::new(config, workspace, renderer, gate, fetcher, SleepThrottle);

    match cli.command {
        Commands::Run => {
            let summary = harvester.run_all().into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_summary(&summary).into_diagnostic()?
                }
                OutputMode::Interactive => {
                    print_accidents(&summary.accidents);
                    print_geometry(&summary.geometry);
                    print_weather(&summary.weather);
                }
            }
        }
        Commands::Accidents => {
            let report = harvester.run_accidents().into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_accidents(&report).into_diagnostic()?
                }
                OutputMode::Interactive => print_accidents(&report),
            }
        }
        Commands::Geometry => {
            let report = harvester.run_geometry().into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_geometry(&report).into_diagnostic()?
                }
                OutputMode::Interactive => print_geometry(&report),
            }
        }
        Commands::Weather => {
            let report = harvester.run_weather().into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_weather(&report).into_diagnostic()?
                }
                OutputMode::Interactive => print_weather(&report),
            }
        }
        Commands::Organize => {
            let report = harvester.organize_weather().into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_organize(&report).into_diagnostic()?
                }
                OutputMode::Interactive => print_organize(&report),
            }
        }
    }
    Ok(())
}

fn print_accidents(report: &rodovia_harvester::accidents::AccidentsReport) {
    println!(
        "accidents: {} links, {} downloaded, {} errors",
        report.links, report.downloaded, report.errors
    );
}

fn print_geometry(report: &rodovia_harvester::geometry::GeometryReport) {
    println!(
        "geometry: {} files listed, latest {} ({} bytes) -> {}",
        report.files_seen, report.latest, report.bytes, report.path
    );
}

fn print_weather(report: &rodovia_harvester::weather::WeatherReport) {
    println!(
        "weather: {} years, {} processed, {} errors, {} csv files bucketed",
        report.years, report.processed, report.errors, report.organize.moved
    );
}

fn print_organize(report: &rodovia_harvester::organize::OrganizeReport) {
    println!(
        "organize: {} moved, {} left in place",
        report.moved, report.left_in_place
    );
}
