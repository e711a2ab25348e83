use std::process::ExitCode;

use clap::Parser;
use mpv_remote::Cli;

#[tokio::main]
async fn main() -> ExitCode {
  mpv_remote::init_logging();

  match mpv_remote::run(Cli::parse()).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      log::error!("{}", e);
      ExitCode::FAILURE
    }
  }
}
