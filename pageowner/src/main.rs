//! Entrypoint of the pageowner binary

use dotenvy::dotenv;
use pageowner_clap_blocks::tokio::TokioRuntimeConfig;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod common;
    pub(crate) mod migrate;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
name = "pageowner",
version = env!("CARGO_PKG_VERSION"),
disable_help_flag = true,
arg(
clap::Arg::new("help")
.short('h')
.long("help")
.help("Print help information")
.action(clap::ArgAction::Help)
.global(true)
),
about = "Bulk page ownership changes for wiki sites",
long_about = r#"Bulk page ownership changes for wiki sites

Examples:
    # Move every page owned by one account to another, asking for everything else
    pageowner migrate --url https://example.atlassian.net

    # Limit the change to one space and skip the prompts
    pageowner migrate --url https://example.atlassian.net --space OPS --from 5b10ac8d82e05b22cc7d4ef5 --to 712020:2c1d

    # Display all commands short form
    pageowner -h

    # Run with debug logging specified with LOG_FILTER
    LOG_FILTER=debug pageowner migrate --url https://example.atlassian.net
"#
)]
struct Config {
    #[clap(flatten)]
    runtime_config: TokioRuntimeConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Move every page owned by one account to another account
    Migrate(commands::migrate::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    let tokio_runtime = config.runtime_config.builder()?.build()?;

    tokio_runtime.block_on(async move {
        fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
            match r {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Initializing logs failed: {e}");
                    std::process::exit(ReturnCode::Failure as _);
                }
            }
        }

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::Migrate(config)) => {
                let _tracing_guard = handle_init_logs(init_logs(&config.logging_config));
                if let Err(e) = commands::migrate::command(config).await {
                    eprintln!("Migrate command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing .env file is fine, everything can come from flags or prompts
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}

fn init_logs(config: &trogging::cli::LoggingConfig) -> Result<TroggingGuard, trogging::Error> {
    // prompts and progress go to stdout, keep logs quiet unless asked for
    let log_layer = trogging::Builder::new()
        .with_default_log_filter("warn")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(log_layer);
    trogging::install_global(subscriber)
}
