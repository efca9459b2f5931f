//! Matchmaker worker main executable

pub mod common;
pub mod conf;
pub mod err;
pub mod genes;
pub mod matcher;
pub mod pheno;
pub mod server;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Rare disease patient matchmaking",
    long_about = "This tool ranks patients by phenotype and gene similarity"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Patient matching commands.
    Match(Match),
    /// Phenotype ontology commands.
    Pheno(Pheno),
    /// Server related commands.
    Server(Server),
}

/// Parsing of "match *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Match {
    /// The sub command to run
    #[command(subcommand)]
    command: MatchCommands,
}

/// Enum supporting the parsing of "match *" sub commands.
#[derive(Debug, Subcommand)]
enum MatchCommands {
    Query(matcher::cli::Args),
}

/// Parsing of "pheno *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Pheno {
    /// The sub command to run
    #[command(subcommand)]
    command: PhenoCommands,
}

/// Enum supporting the parsing of "pheno *" sub commands.
#[derive(Debug, Subcommand)]
enum PhenoCommands {
    TermSim(pheno::term_sim::Args),
}

/// Parsing of "server *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Server {
    /// The sub command to run
    #[command(subcommand)]
    command: ServerCommands,
}

/// Enum supporting the parsing of "server *" sub commands.
#[derive(Debug, Subcommand)]
enum ServerCommands {
    Rest(server::rest::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Match(args) => match &args.command {
                MatchCommands::Query(args) => matcher::cli::run(&cli.common, args)?,
            },
            Commands::Pheno(args) => match &args.command {
                PhenoCommands::TermSim(args) => pheno::term_sim::run(&cli.common, args)?,
            },
            Commands::Server(args) => match &args.command {
                ServerCommands::Rest(args) => server::rest::run(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
