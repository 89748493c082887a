#![warn(clippy::all, rust_2018_idioms)]

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use pubsubrelay::App;
use pubsubrelay_backend::{ConfigError, RelayConfig};

#[derive(Parser, Debug)]
struct Args {
    /// Optional override for the Pub/Sub Emulator project ID.
    #[arg(long)]
    emulator_project_id: Option<String>,

    /// Optional override for how long to listen, in seconds.
    #[arg(long)]
    timeout_secs: Option<f64>,
}

impl Args {
    fn load_config(self) -> Result<RelayConfig, ConfigError> {
        let mut config =
            RelayConfig::from_env()?.with_emulator_project_id(self.emulator_project_id);

        if let Some(secs) = self.timeout_secs {
            config = config.with_pull_timeout(secs)?;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Log to stderr, at info unless `RUST_LOG` says otherwise.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Args::parse().load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match App::new(config).run().await {
        Ok(report) => {
            info!(
                "Listen cycle ended ({:?}): {} handled, {} released",
                report.termination, report.handled, report.released
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
