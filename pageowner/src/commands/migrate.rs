use std::io::{self, Write};

use clap::Parser;
use observability_deps::tracing::{info, warn};
use pageowner_clap_blocks::migration::MigrationConfig;
use pageowner_client::Client;
use pageowner_migration::{
    MigrationError, MigrationPlan, Operator, Orchestrator, RunOutcome, ScanConfig, Scope,
};
use secrecy::{ExposeSecret, Secret};
use trogging::cli::LoggingConfig;

use super::common::WikiConfig;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] pageowner_client::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("no {0} given")]
    MissingInput(&'static str),

    #[error("error reading input: {0}")]
    Io(#[from] io::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    /// Wiki site and credentials
    #[clap(flatten)]
    wiki_config: WikiConfig,

    /// Only change pages in the space with this key
    ///
    /// If neither this nor --all-spaces is given, you are asked.
    #[clap(long = "space", env = "PAGEOWNER_SPACE_KEY", conflicts_with = "all_spaces")]
    space: Option<String>,

    /// Change pages in every space without asking
    #[clap(long = "all-spaces", action)]
    all_spaces: bool,

    /// Account id of the current owner, prompted for if not given
    #[clap(long = "from")]
    from: Option<String>,

    /// Account id of the new owner, prompted for if not given
    #[clap(long = "to")]
    to: Option<String>,

    #[clap(flatten)]
    migration_config: MigrationConfig,

    /// logging options
    #[clap(flatten)]
    pub(crate) logging_config: LoggingConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let mut operator = StdioOperator;
    let base_url = config.wiki_config.api_base_url();

    let email = match config.wiki_config.email {
        Some(email) => email,
        None => ask_required(&mut operator, "Enter Mail: ", "email")?,
    };
    let token = match config.wiki_config.token {
        Some(token) => token,
        None => Secret::new(ask_required(&mut operator, "Enter API token: ", "API token")?),
    };
    let scope = match (config.all_spaces, config.space) {
        (true, _) => Scope::AllSpaces,
        (false, Some(key)) => Scope::Space { key },
        (false, None) => ask_scope(&mut operator)?,
    };
    let source_owner = match config.from {
        Some(from) => from,
        None => ask_required(&mut operator, "Enter current owner ID: ", "current owner")?,
    };
    let target_owner = match config.to {
        Some(to) => to,
        None => ask_required(&mut operator, "Enter new owner ID: ", "new owner")?,
    };

    let client = Client::new(base_url)?.with_basic_auth(email, token.expose_secret());
    let plan = plan(source_owner, target_owner, scope, config.migration_config);
    info!(base_url = %client.base_url(), ?plan, "starting migration");

    match Orchestrator::new(&client, &plan, &mut operator).run().await? {
        RunOutcome::Aborted(reason) => info!(?reason, "no pages were changed"),
        RunOutcome::Completed(summary) if summary.failure_count > 0 => warn!(
            failed = summary.failure_count,
            results = %plan.results_path.display(),
            "some pages kept their owner, rerun to retry them"
        ),
        RunOutcome::Completed(_) => {}
    }
    Ok(())
}

fn plan(
    source_owner: String,
    target_owner: String,
    scope: Scope,
    config: MigrationConfig,
) -> MigrationPlan {
    let mut plan = MigrationPlan::new(source_owner, target_owner, scope);
    plan.scan = ScanConfig {
        page_limit: config.page_limit,
        max_pages: config.max_pages,
    };
    plan.request_delay = config.request_delay;
    plan.max_space_attempts = config.max_space_attempts;
    plan.backup_path = config.backup_file;
    plan.results_path = config.results_file;
    plan.allow_partial_scan = config.allow_partial_scan;
    plan
}

fn ask_required(operator: &mut impl Operator, question: &str, what: &'static str) -> Result<String> {
    let answer = operator.ask(question)?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(Error::MissingInput(what));
    }
    Ok(answer.to_owned())
}

fn ask_scope(operator: &mut impl Operator) -> Result<Scope> {
    loop {
        let answer = operator.ask("Should this be limited to one space? (y/n): ")?;
        match answer.trim().to_lowercase().as_str() {
            "y" => {
                let key = operator.ask("Please enter the space key: ")?;
                return Ok(Scope::Space { key });
            }
            "n" => return Ok(Scope::AllSpaces),
            "" => return Err(Error::MissingInput("space choice")),
            _ => operator.say("Invalid input. Please enter 'y' or 'n'."),
        }
    }
}

/// Talks to the person at the terminal
#[derive(Debug, Clone, Copy)]
struct StdioOperator;

impl Operator for StdioOperator {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        Ok(answer.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}
