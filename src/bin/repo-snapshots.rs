use chrono::Utc;
use env_logger::Builder;
use failure::{Error, ResultExt};
use log::{debug, info, log_enabled, LevelFilter};
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use structopt::StructOpt;

use repo_snapshots::config::{self, Config};
use repo_snapshots::http::Api;
use repo_snapshots::repo;
use repo_snapshots::{Driver, FsStore, GitHub, Orchestrator, Poller};

fn main() {
    let args = Args::from_args();

    if args.example_config {
        generate_example();
        return;
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);

            for cause in e.iter_chain().skip(1) {
                eprintln!("\tCaused By: {}", cause);
            }

            process::exit(1);
        }
    }
}

fn generate_example() {
    let example = Config::example();

    println!("{}", example.as_toml());
}

/// Returns whether every repository was snapshotted successfully.
fn run(args: &Args) -> Result<bool, Error> {
    initialize_logging(args)?;

    if dotenv::dotenv().is_ok() {
        debug!("Loaded environment variables from .env");
    }

    let token = config::token_from_env()?;
    let cfg = args.config()?;

    if log_enabled!(log::Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }

    let rows = repo::read_rows(&cfg.general.input).context("Couldn't load the repository list")?;

    let api = Api::from_config(&cfg.api, token)?;
    let github = GitHub::new(api, &cfg.api);
    let poller = Poller::from_config(&cfg.stats);
    let store = FsStore::new(&cfg.general.output_dir);
    info!("Saving snapshots to {}", store.root().display());

    let driver = Driver::new(Orchestrator::new(store, github, poller));
    let summary = driver.run(&rows);

    let stdout = io::stdout();
    summary.display(&mut stdout.lock())?;

    Ok(summary.is_success())
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(about = "Incrementally snapshot GitHub repositories.")]
struct Args {
    #[structopt(
        short = "c",
        long = "config",
        default_value = "~/.repo-snapshots.toml",
        help = "The configuration file to use."
    )]
    config_file: String,
    #[structopt(
        short = "i",
        long = "input",
        parse(from_os_str),
        help = "The CSV file listing repositories (overrides the config)."
    )]
    input: Option<PathBuf>,
    #[structopt(
        short = "o",
        long = "output-dir",
        parse(from_os_str),
        help = "Where to save snapshots (overrides the config)."
    )]
    output_dir: Option<PathBuf>,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output (repeat for more verbosity)"
    )]
    verbosity: u64,
    #[structopt(
        long = "example-config",
        help = "Generate an example config and immediately exit."
    )]
    example_config: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn config(&self) -> Result<Config, Error> {
        let config_file =
            shellexpand::full(&self.config_file).context("Unable to expand wildcards")?;
        let config_file = Path::new(&*config_file);

        let mut cfg = if config_file.exists() {
            Config::from_file(config_file).context("Couldn't load the config")?
        } else {
            debug!(
                "{} doesn't exist, using the default config",
                config_file.display()
            );
            Config::default()
        };

        if let Some(ref input) = self.input {
            cfg.general.input = input.clone();
        }
        if let Some(ref output_dir) = self.output_dir {
            cfg.general.output_dir = output_dir.clone();
        }

        Ok(cfg)
    }
}

/// Our own messages follow `-v`, everything else (reqwest, hyper) only
/// gets through when it's a warning. `RUST_LOG` overrides both.
fn initialize_logging(args: &Args) -> Result<(), Error> {
    let level = args.log_level();
    let with_location = level >= LevelFilter::Debug;

    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("repo_snapshots", level);

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    // timestamps are UTC, the same as a snapshot's fetched_at
    builder.format(move |out, record| {
        write!(
            out,
            "{} {:<5} {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.target()
        )?;

        if with_location {
            if let Some(line) = record.line() {
                write!(out, "#{}", line)?;
            }
        }

        writeln!(out, ": {}", record.args())
    });

    builder.try_init()?;

    Ok(())
}
