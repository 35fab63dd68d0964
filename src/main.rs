use clap::{Arg, Command};
use color_eyre::eyre::{eyre, WrapErr};
use ringleader::config::Config;
use ringleader::run::{self, Env};
use ringleader::sink::LogSink;
use ringleader::RunResult;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Diagnostic file in the working directory, truncated at every start.
const LOG_FILE: &str = "output.log";

#[tokio::main]
async fn main() -> RunResult<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let input = parse_args();
    let config = Config::from_file(&input)?;

    let sink = Arc::new(
        LogSink::to_file(LOG_FILE)
            .wrap_err_with(|| format!("failed to open '{}'", LOG_FILE))?,
    );
    let reports = run::run(&config, Env::new(sink)).await?;

    // agreement was verified at join time, so any report carries the answer
    let leader = reports
        .first()
        .and_then(|report| report.leader)
        .ok_or_else(|| eyre!("the election produced no reports"))?;
    println!("leader: {} ({} nodes agree)", leader, reports.len());
    Ok(())
}

fn parse_args() -> String {
    let matches = Command::new("ringleader")
        .version("0.1")
        .about("Elects a leader over a ring of loopback TCP links.")
        .arg(
            Arg::new("input")
                .value_name("INPUT_FILE")
                .help("file with the node count followed by one delay per node")
                .required(true),
        )
        .get_matches();

    matches
        .get_one::<String>("input")
        .expect("the input file argument is required")
        .clone()
}
