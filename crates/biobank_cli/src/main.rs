//! Biobank command-line entry point.
//!
//! # Responsibility
//! - Render the schema script for either storage engine.
//! - Bootstrap a SQLite store and inspect the relationship graph.

use biobank_core::model::catalog;
use biobank_core::schema::graph::{dependency_order, lineage_path};
use biobank_core::{
    init_from_settings, open_with_settings, schema_script, BiobankService, DatabaseLocation,
    Engine, SqliteEntityRepository, SqliteTrialRepository, StoreSettings,
};
use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "biobank")]
#[command(version)]
#[command(about = "Biobank entity store: schema rendering and SQLite bootstrap")]
struct Cli {
    /// Database URL; overrides BIOBANK_DATABASE_URL and DATABASE_URL
    #[arg(short, long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL script for an engine (mysql | sqlite)
    Schema {
        #[arg(value_parser = parse_engine)]
        engine: Engine,
    },

    /// Create or upgrade the SQLite store
    Init,

    /// List tables with parents before children
    Tables,

    /// Show the required-parent chain of a table
    Lineage {
        /// Table name, e.g. `size_record`
        table: String,
    },

    /// Trace a stored trial back to its patient
    Trace {
        /// Trial id
        trial_id: Uuid,
    },
}

fn parse_engine(value: &str) -> Result<Engine, String> {
    Engine::parse(value).ok_or_else(|| format!("unknown engine `{value}`; expected mysql|sqlite"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Schema { engine } => {
            print!("{}", schema_script(engine)?);
        }
        Commands::Tables => {
            for table in dependency_order(catalog::tables())? {
                println!("{}", table.name);
            }
        }
        Commands::Lineage { table } => {
            let path = lineage_path(catalog::tables(), &table)?;
            let names: Vec<_> = path.iter().map(|table| table.name).collect();
            println!("{}", names.join(" -> "));
        }
        Commands::Init => {
            let settings = load_settings(cli.database_url.as_deref())?;
            let _conn = open_with_settings(&settings)?;
            info!("event=cli_init module=cli status=ok");
            match &settings.database {
                DatabaseLocation::Memory => println!("initialized in-memory store"),
                DatabaseLocation::File(path) => println!("initialized {}", path.display()),
            }
        }
        Commands::Trace { trial_id } => {
            let settings = load_settings(cli.database_url.as_deref())?;
            let conn = open_with_settings(&settings)?;
            let service = BiobankService::new(
                SqliteEntityRepository::try_new(&conn)?,
                SqliteTrialRepository::try_new(&conn)?,
            );
            let lineage = service.trace_lineage(trial_id)?;
            println!("patient   {}", lineage.patient.nhc);
            println!("tumor     {}", lineage.tumor.biobank_code);
            println!("biomodel  {}", lineage.biomodel.id);
            println!("passage   {}", lineage.passage.id);
            match lineage.trial.kind() {
                Some(kind) => println!("trial     {} ({kind})", lineage.trial.trial.id),
                None => println!("trial     {}", lineage.trial.trial.id),
            }
        }
    }
    Ok(())
}

fn load_settings(database_url: Option<&str>) -> Result<StoreSettings, Box<dyn Error>> {
    let mut settings = StoreSettings::from_env()?;
    if let Some(url) = database_url {
        settings.database = DatabaseLocation::parse(url)?;
    }
    init_from_settings(&settings)?;
    Ok(settings)
}
