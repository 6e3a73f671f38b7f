//! Bootstrap CLI: brings an `authd` credential store to `Active` state and,
//! the first time it runs against a fresh store, prints the one-time
//! initial password to stdout — the literal implementation of spec.md §6's
//! bootstrap contract, since nothing else in this crate's scope ever prints
//! it. Modeled on the teacher's `bin/klist.rs`: a `clap`-derived `Args`,
//! `tracing-subscriber` for operational logging, and
//! `anyhow::Result<ExitCode>` at the boundary.

use std::process::ExitCode;

use authd::config::Settings;
use authd::Controller;
use clap::Parser;

const PROGNAME: &str = "authd-bootstrap";

#[derive(Parser)]
#[command(name = PROGNAME, version)]
struct Args {
    /// path to the authd configuration file (defaults to $AUTHD_CONFIG or /etc/authd.conf)
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{PROGNAME}: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    let controller = Controller::init(settings).await?;
    let password = controller.activate().await?;

    if let Some(password) = password {
        println!("{}", password.as_str());
    } else {
        tracing::info!("credential store already bootstrapped; no initial password to print");
    }

    controller.shutdown().await?;
    Ok(())
}
