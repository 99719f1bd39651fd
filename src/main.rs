//! Binary entry point: resolve configuration, start logging, open the
//! configured store and either run the terminal UI or a single command.
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bird_catalog::config::{Config, Overrides, StorageMode};
use bird_catalog::controller::{Command, Controller, NewBird, Report, Response, Severity};
use bird_catalog::db;
use bird_catalog::models::{Bird, BirdRecord, Location, Species};
use bird_catalog::repository::{JsonBirdRepository, Repository, SqliteBirdRepository};
use bird_catalog::service::BirdService;
use bird_catalog::storage::JsonStorage;
use bird_catalog::ui::{run_app, App};

#[derive(Parser, Debug)]
#[command(name = "bird-catalog")]
#[command(about = "Catalog birds, locations and sightings")]
#[command(version)]
struct Cli {
    /// Config file to read instead of <data-dir>/config.toml
    #[arg(long, global = true, env = "BIRD_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Backing store
    #[arg(long, global = true, value_enum)]
    storage: Option<StorageMode>,

    /// Directory holding the data files, config and log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Interactive terminal UI (default)
    Tui,
    /// Print one page of birds
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        size: Option<i64>,
    },
    /// Add a bird
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: Species,
        #[arg(long)]
        info: String,
    },
    /// Delete a bird by id
    Delete { id: i64 },
    /// Case-insensitive name search
    Search { text: String },
    /// Totals, species distribution and average weight
    Stats,
    /// Relational reports (SQLite store only)
    Report {
        #[command(subcommand)]
        report: ReportCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCmd {
    /// Birds by id, then name descending
    Sorted,
    /// Birds with a habitat whose location name starts with PREFIX
    LocationPrefix { prefix: String },
    /// Sightings in a given month
    ObservedIn { month: u32, year: i32 },
    /// Locations with more than MIN observations
    BusyLocations { min: i64 },
    /// Locations with a habitat link to SPECIES
    LocationsForSpecies { species: Species },
    /// Mean observation count
    AverageCount,
    /// Set the species of every bird called NAME
    SetSpecies { name: String, species: Species },
    /// Add two locations atomically, each given as NAME@LAT,LON
    AddLocations {
        #[arg(value_parser = parse_location)]
        first: Location,
        #[arg(value_parser = parse_location)]
        second: Location,
    },
    /// Delete locations with no observations in YEAR
    PruneLocations { year: i32 },
}

impl From<ReportCmd> for Report {
    fn from(value: ReportCmd) -> Self {
        match value {
            ReportCmd::Sorted => Report::BirdsSorted,
            ReportCmd::LocationPrefix { prefix } => Report::BirdsByLocationPrefix(prefix),
            ReportCmd::ObservedIn { month, year } => Report::BirdsObservedIn { month, year },
            ReportCmd::BusyLocations { min } => Report::LocationsWithMinObservations(min),
            ReportCmd::LocationsForSpecies { species } => Report::LocationsBySpecies(species),
            ReportCmd::AverageCount => Report::AverageObservationCount,
            ReportCmd::SetSpecies { name, species } => {
                Report::UpdateSpeciesForName { name, species }
            }
            ReportCmd::AddLocations { first, second } => Report::AddTwoLocations(first, second),
            ReportCmd::PruneLocations { year } => {
                Report::DeleteLocationsWithoutObservationsIn(year)
            }
        }
    }
}

/// `NAME@LAT,LON`, e.g. `Lake Como@45.98,9.26`.
fn parse_location(raw: &str) -> Result<Location, String> {
    let (name, coords) = raw
        .rsplit_once('@')
        .ok_or_else(|| format!("expected NAME@LAT,LON, got '{raw}'"))?;
    let (lat, lon) = coords
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON after '@', got '{coords}'"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude '{lat}'"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("bad longitude '{lon}'"))?;
    Ok(Location::new(name.trim(), lat, lon))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Cmd::Tui);

    let overrides = Overrides {
        config: cli.config,
        storage: cli.storage,
        data_dir: cli.data_dir,
        page_size: match &command {
            Cmd::List { size, .. } => *size,
            _ => None,
        },
        log_level: cli.log_level,
    };
    let config = Config::load(&overrides)?;
    init_tracing(&config, matches!(command, Cmd::Tui))?;
    info!(
        "Starting bird-catalog v{} ({:?} store in {})",
        env!("CARGO_PKG_VERSION"),
        config.storage,
        config.data_dir.display()
    );

    let service = BirdService::new(open_repository(&config)?);
    let mut controller = Controller::new(service);

    match command {
        Cmd::Tui => {
            let mut app = App::new(controller, config.page_size);
            run_app(&mut app)
        }
        Cmd::List { page, .. } => print_response(controller.handle(Command::Page {
            page,
            size: config.page_size,
        })),
        Cmd::Add {
            name,
            species,
            info,
        } => print_response(controller.handle(Command::Add(NewBird {
            name,
            species,
            info,
        }))),
        Cmd::Delete { id } => print_response(controller.handle(Command::Delete(id))),
        Cmd::Search { text } => print_response(controller.handle(Command::Search(text))),
        Cmd::Stats => print_response(controller.handle(Command::Statistics)),
        Cmd::Report { report } => {
            print_response(controller.handle(Command::Report(report.into())))
        }
    }
}

/// The terminal UI owns stdout, so it logs to a file; one-shot commands log
/// to stderr.
fn init_tracing(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if to_file {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;
        let path = config.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(io::stderr).init();
    }
    Ok(())
}

fn open_repository(config: &Config) -> Result<Box<dyn Repository<Bird>>> {
    match config.storage {
        StorageMode::Json => {
            let storage = JsonStorage::<BirdRecord>::new(config.json_path());
            Ok(Box::new(JsonBirdRepository::new(storage)))
        }
        StorageMode::Sqlite => {
            let conn = db::open_catalog(&config.db_path())?;
            Ok(Box::new(SqliteBirdRepository::new(conn)))
        }
    }
}

fn print_birds(birds: &[Bird]) {
    for bird in birds {
        println!(
            "{:>5}  {:<30} {:<9} {}",
            bird.id, bird.name, bird.species, bird.info
        );
    }
}

/// Print a controller response. Warning and error notices end the process
/// with a failure status.
fn print_response(response: Response) -> Result<()> {
    match response {
        Response::Birds(birds) => print_birds(&birds),
        Response::Selected(bird) => print_birds(bird.as_slice()),
        Response::Added(bird) => println!("Added {} with id {}.", bird.name, bird.id),
        Response::Updated(bird) => println!("Updated {}.", bird.name),
        Response::Deleted(id) => println!("Deleted bird {id}."),
        Response::Page(page) => {
            print_birds(&page.items);
            println!(
                "page {}/{} ({} birds)",
                page.page,
                page.total_pages.max(1),
                page.total
            );
        }
        Response::Statistics(stats) => {
            println!("Total birds:    {}", stats.total);
            let most_common = stats
                .most_common
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("Most common:    {most_common}");
            println!("Average weight: {:.1} g", stats.average_weight);
            for group in &stats.distribution {
                println!("  {:<9} {}", group.species.to_string(), group.count);
            }
        }
        Response::Report(output) => print!("{output}"),
        Response::Notice(notice) => match notice.severity {
            Severity::Info => println!("{}", notice.message),
            Severity::Warning => bail!(notice.message),
            Severity::Error => return Err(anyhow!(notice.message).context("storage failure")),
        },
    }
    Ok(())
}
