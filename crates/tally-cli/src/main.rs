use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Polling-station tally entry tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> election -> local overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the section sequence a typist walks through
    Sections {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Take the layout of this configured polling station
        #[arg(long)]
        polling_station: Option<u32>,

        /// Station corrects an earlier session (forces the investigation section)
        #[arg(long, default_value_t = false)]
        previous_session: bool,
    },

    /// Validate a results file and print violations per section
    Validate {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// JSON file holding one entry's results
        #[arg(long)]
        results: String,

        /// Only validate this section (e.g. voters_votes_counts)
        #[arg(long)]
        section: Option<String>,

        #[arg(long)]
        polling_station: Option<u32>,
    },

    /// Compare two entries field by field
    Reconcile {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        first: String,

        #[arg(long)]
        second: String,

        /// Check blocking errors against this station's sections
        #[arg(long)]
        polling_station: Option<u32>,
    },

    /// Print the rule catalogue
    Rules,

    /// Ask the daemon for a polling station's data-entry status
    Status {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        polling_station: u32,
    },

    /// Coordinator decision on two differing entries
    ResolveDifferences {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        polling_station: u32,

        #[arg(long, value_enum)]
        decision: DifferenceChoice,
    },

    /// Coordinator decision on a first entry finalised with accepted errors
    ResolveErrors {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        polling_station: u32,

        #[arg(long, value_enum)]
        decision: ErrorsChoice,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DifferenceChoice {
    KeepFirst,
    KeepSecond,
    DiscardBoth,
}

impl From<DifferenceChoice> for tally_reconcile::ResolveDecision {
    fn from(c: DifferenceChoice) -> Self {
        match c {
            DifferenceChoice::KeepFirst => Self::KeepFirst,
            DifferenceChoice::KeepSecond => Self::KeepSecond,
            DifferenceChoice::DiscardBoth => Self::DiscardBoth,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ErrorsChoice {
    ResumeFirst,
    DiscardFirst,
}

impl From<ErrorsChoice> for tally_reconcile::ResolveErrorsDecision {
    fn from(c: ErrorsChoice) -> Self {
        match c {
            ErrorsChoice::ResumeFirst => Self::ResumeFirst,
            ErrorsChoice::DiscardFirst => Self::DiscardFirst,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = tally_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sections {
            config_paths,
            polling_station,
            previous_session,
        } => {
            let cfg = commands::load(&config_paths)?;
            let mut station = commands::station_for(&cfg, polling_station)?;
            if previous_session && station.previous_session_id.is_none() {
                station.previous_session_id = Some(0);
            }
            commands::print_json(&commands::sections(&cfg, &station))?;
        }

        Commands::Validate {
            config_paths,
            results,
            section,
            polling_station,
        } => {
            let cfg = commands::load(&config_paths)?;
            let station = commands::station_for(&cfg, polling_station)?;
            let data = commands::read_results(&results)?;
            let out = commands::validate::run(&cfg, &station, &data, section.as_deref())?;
            commands::print_json(&out)?;
        }

        Commands::Reconcile {
            config_paths,
            first,
            second,
            polling_station,
        } => {
            let cfg = commands::load(&config_paths)?;
            let station = commands::station_for(&cfg, polling_station)?;
            let first = commands::read_results(&first)?;
            let second = commands::read_results(&second)?;
            let report = commands::reconcile::run(&cfg, &station, &first, &second);
            commands::print_json(&report)?;
        }

        Commands::Rules => {
            commands::print_json(&commands::validate::catalogue())?;
        }

        Commands::Status {
            config_paths,
            polling_station,
        } => {
            let cfg = commands::load(&config_paths)?;
            let status = commands::remote::status(&cfg, polling_station).await?;
            commands::print_json(&status)?;
        }

        Commands::ResolveDifferences {
            config_paths,
            polling_station,
            decision,
        } => {
            let cfg = commands::load(&config_paths)?;
            commands::remote::resolve_differences(&cfg, polling_station, decision.into()).await?;
            let status = commands::remote::status(&cfg, polling_station).await?;
            commands::print_json(&status)?;
        }

        Commands::ResolveErrors {
            config_paths,
            polling_station,
            decision,
        } => {
            let cfg = commands::load(&config_paths)?;
            commands::remote::resolve_errors(&cfg, polling_station, decision.into()).await?;
            let status = commands::remote::status(&cfg, polling_station).await?;
            commands::print_json(&status)?;
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries JSON only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
