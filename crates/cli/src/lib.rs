mod check;
mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "uberize",
    version,
    about = "Merge many jars into one, relocating packages on the way",
    long_about = "Uberize extracts every input archive into a staging directory, runs an ordered \
                  pipeline of merge stages over the collected entries, settles the remaining \
                  path collisions (first source wins) and writes a single output archive."
)]
pub struct Cli {
    /// Log debug details of every stage
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the output archive described by a configuration file
    #[command(
        long_about = "Loads the JSON configuration, validates the whole pipeline, then runs it. \
                      Collision warnings are printed after the run; any fatal error aborts it."
    )]
    Run {
        /// Path to the JSON configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
        /// Print the run report as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file without touching any archive
    Check {
        /// Path to the JSON configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = uberize_core::logging::init_logging("cli", true, cli.verbose);

    match cli.command {
        Commands::Run { config, json } => run::run(&config, json),
        Commands::Check { config } => check::run(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_run_with_json() {
        let cli = Cli::try_parse_from(["uberize", "run", "uberize.json", "--json"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Run { config, json } => {
                assert_eq!(config, PathBuf::from("uberize.json"));
                assert!(json);
            }
            Commands::Check { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_verbose_flag_is_global() {
        let cli = Cli::try_parse_from(["uberize", "check", "cfg.json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Check { config } if config == PathBuf::from("cfg.json")));
    }

    #[test]
    fn test_config_argument_is_required() {
        let err = Cli::try_parse_from(["uberize", "run"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(Cli::try_parse_from(["uberize"]).is_err());
    }
}
