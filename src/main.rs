/*!
 * designer-bridge CLI
 *
 * Inspection tool for the bridge layer: look up error guidance, list the
 * known error codes, and check or generate configuration files.
 */

use anyhow::Context;
use clap::{Parser, Subcommand};
use designer_bridge::{
    config::DesignerConfig,
    error::{DesignerError, EXIT_FAILURE, EXIT_SUCCESS},
    format_suggestion, logging, ErrorCode, SuggestionCatalog,
};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "designer-bridge")]
#[command(version, about = "Template Designer bridge utilities", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show guidance for an error code
    Suggest {
        /// Error code, e.g. BRIDGE_UNAVAILABLE
        code: String,
    },

    /// List the known error codes
    Codes,

    /// Validate and print the effective configuration
    Config {
        /// Write the effective configuration to this path
        #[arg(long = "write", value_name = "PATH")]
        write: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            err.downcast_ref::<DesignerError>()
                .map(DesignerError::exit_code)
                .unwrap_or(EXIT_FAILURE)
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => DesignerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DesignerConfig::default(),
    };

    // --verbose affects this run only, never the configuration written below
    logging::init_logging(&config.logging.with_verbose(cli.verbose))?;
    debug!(config = ?cli.config, "Configuration loaded");

    match cli.command {
        Command::Suggest { code } => {
            print_suggestion(&code);
            Ok(())
        }
        Command::Codes => {
            for code in ErrorCode::KNOWN.iter() {
                println!("{}", code);
            }
            Ok(())
        }
        Command::Config { write } => {
            config.validate()?;
            match write {
                Some(path) => {
                    config
                        .to_file(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Configuration written to {}", path.display());
                }
                None => print!("{}", toml::to_string_pretty(&config)?),
            }
            Ok(())
        }
    }
}

fn print_suggestion(raw: &str) {
    let catalog = SuggestionCatalog::shared();
    let code = ErrorCode::parse(raw);

    match catalog.get_suggestion(&code) {
        Some(suggestion) => println!("{}", format_suggestion(suggestion)),
        None => {
            debug!(code = raw, "No guidance for code");
            println!("{}", format_suggestion(&catalog.suggestion_or_default(&code)));
        }
    }
}
