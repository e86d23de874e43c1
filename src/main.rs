use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;
use fanhatd::{
    application::{self, Application},
    cli::Cli,
    config::Config,
};
use log::{LevelFilter, error, info};
use syslog::{BasicLogger, Facility, Formatter3164};

fn init_log(use_syslog: bool, level: LevelFilter) -> Result<()> {
    if !use_syslog {
        return env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init()
            .map_err(|e| anyhow!("{e}"));
    }
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "fanhatd".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.clone()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fanhatd: {e:#}");
            return ExitCode::from(application::EXIT_CONFIG);
        }
    };

    if let Err(e) = init_log(cli.syslog, config.log_level(cli.verbose)) {
        eprintln!("fanhatd: cannot initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let app = match Application::builder().with_config(config).build() {
        Ok(app) => app,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(application::exit_code(&e));
        }
    };

    if cli.check {
        let config = app.config();
        println!("bus:    /dev/i2c-{} device {:#04x}", config.bus_number, config.device_address);
        println!("sensor: {:?}", config.sensor);
        println!("policy: {}", app.policy());
        return ExitCode::SUCCESS;
    }

    info!("fanhatd {} starting", env!("CARGO_PKG_VERSION"));
    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(application::exit_code(&e))
        }
    }
}
