use crate::evaluate::{
    run_compare, run_evaluate, run_guidelines, CompareArgs, EvaluateArgs, GuidelinesArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use guideline_engine::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Guideline Decision Engine",
    about = "Compute federal sentencing total offense levels from the command line or over HTTP",
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
    /// List the guideline editions found in the rule data directory
    Guidelines(GuidelinesArgs),
    /// Replay saved answers against one edition and print the breakdown
    Evaluate(EvaluateArgs),
    /// Apply the one-book rule across every edition of an offense guideline
    Compare(CompareArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the rule data directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Guidelines(args) => run_guidelines(args),
        Command::Evaluate(args) => run_evaluate(args),
        Command::Compare(args) => run_compare(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_evaluate_command() {
        let cli = Cli::try_parse_from([
            "guideline-engine-api",
            "evaluate",
            "--year",
            "2025",
            "--offense",
            "2B1.1",
            "--mode",
            "wizard",
            "--prepared-on",
            "2025-11-03",
            "--trail",
        ])
        .expect("valid arguments");

        match cli.command {
            Some(Command::Evaluate(args)) => {
                assert_eq!(args.year, 2025);
                assert_eq!(args.offense, "2B1.1");
                assert!(args.trail);
                assert!(args.prepared_on.is_some());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn defaults_to_serve() {
        let cli = Cli::try_parse_from(["guideline-engine-api"]).expect("no arguments");

        assert!(cli.command.is_none());
    }
}
