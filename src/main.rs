use clap::{Arg, ArgAction, ArgMatches, Command};
use how::config::{self, ConfigStore, FileConfigStore, Settings};
use how::confirmation::TerminalConfirmation;
use how::controller::{Controller, Outcome};
use how::error::{HowError, Result};
use how::executor::SystemShellExecutor;
use how::http_client::ReqwestHttpClient;
use how::proposal::{MockProposalClient, OpenAiClient, ProposalClient};
use how::providers::{EnvironmentProvider, SpinnerStatus, SystemEnvironment};
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("how")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(Arg::new("query")
            .help("Enter your query in plain text. This will be used to generate a CLI command.")
            .num_args(1..))
        .arg(Arg::new("debug")
            .short('d')
            .long("debug")
            .help("Print shell and platform information")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .help("Configure API key and model")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("max-attempts")
            .long("max-attempts")
            .help("Give up after this many failed commands")
            .value_name("N")
            .value_parser(clap::value_parser!(u32).range(1..)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let matches = cli().get_matches();

    match run(&matches).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<i32> {
    let environment = SystemEnvironment;

    if matches.get_flag("debug") {
        println!("{}", environment.debug_report());
        return Ok(0);
    }

    let mut store = FileConfigStore::open_default()?;

    if matches.get_flag("config") {
        let stdin = io::stdin();
        config::configure_with_io(&mut store, &mut stdin.lock(), &mut io::stdout())?;
        println!("Configuration file: {}", store.path().display());
        return Ok(0);
    }

    let query = matches
        .get_many::<String>("query")
        .unwrap_or_default()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    if query.trim().is_empty() {
        return Err(HowError::Usage("error: missing required argument 'query'".to_string()));
    }

    let mut settings = Settings::from_env(&store)?;
    if let Some(max_attempts) = matches.get_one::<u32>("max-attempts") {
        settings.max_attempts = *max_attempts;
    }

    let client = build_client(&settings, &mut store)?;
    let target = environment.shell_target();
    info!("Target shell {} on {}", target.shell, target.platform);

    let mut controller = Controller::new(
        client,
        Box::new(SystemShellExecutor::from_env(true)),
        Box::new(TerminalConfirmation::new()),
        Box::new(SpinnerStatus::new()),
        settings.max_attempts,
    );

    let report = controller.run(&query, &target).await;
    match report.outcome {
        Outcome::Succeeded | Outcome::Declined => Ok(0),
        Outcome::Aborted(e) => Err(e),
    }
}

fn build_client(settings: &Settings, store: &mut dyn ConfigStore) -> Result<Box<dyn ProposalClient>> {
    if settings.use_mock {
        info!("Using mock proposal client ({} set)", config::MOCK_ENV);
        return Ok(Box::new(MockProposalClient::new(settings.model.clone())));
    }

    let api_key = match settings.api_key.clone() {
        Some(key) => key,
        None => {
            let stdin = io::stdin();
            config::prompt_for_api_key_with_io(store, &mut stdin.lock(), &mut io::stdout())?
        }
    };

    Ok(Box::new(OpenAiClient::new(
        Box::new(ReqwestHttpClient::new()),
        api_key,
        settings,
    )))
}
