use anyhow::Error;
use clap::CommandFactory;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use s3filter::adapters::aws;
use s3filter::arg::FilterOpt;
use s3filter::query::{Predicates, build_query};
use s3filter::run::filter_execute;
use s3filter::select::{S3Select, SelectRequest};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // stdout carries the records, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s3filter=warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = FilterOpt::from_env();

    let query = match build_query(&Predicates::from(&args)) {
        Ok(query) => query,
        Err(e) => FilterOpt::command()
            .error(ErrorKind::ValueValidation, e)
            .exit(),
    };

    let client = aws::setup_client(&args).await;
    let source = S3Select::new(client);
    let request = SelectRequest::new(args.input.clone(), query);

    let mut stdout = tokio::io::stdout();
    let stats = filter_execute(&source, &request, &mut stdout).await?;

    if args.summarize {
        eprintln!("{}", stats);
    }

    Ok(())
}
