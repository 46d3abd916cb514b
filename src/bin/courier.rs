use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::args::{Cli, Mode};
use cli::exit_codes;

#[tokio::main]
async fn main() -> ExitCode {
    // logs go to stderr so message output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_stomp=warn,courier=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.mode {
        Mode::Send(args) => cli::commands::send(args).await,
        Mode::Subscribe(args) => cli::commands::subscribe(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS),
        Err((message, code)) => {
            eprintln!("{}", message);
            ExitCode::from(code)
        }
    }
}
