mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use junosync_core::Device;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the device handle; Ctrl-C stops any wait for the configuration lock.
fn connect(global: &GlobalOpts) -> Result<Device, CliError> {
    let device = Device::new(config::resolve_device_config(global)?);
    let cancel = device.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });
    Ok(device)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;
    match cli.command {
        // Local commands
        Command::Config(args) => commands::config_cmd::handle(args, global),
        Command::Kinds => commands::kinds::handle(global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "junosync", &mut std::io::stdout());
            Ok(())
        }
        Command::Plan(args) => commands::plan::handle(args, global).await,

        // Device commands
        Command::Read(args) => commands::resource::read(args, &connect(global)?, global).await,
        Command::Import(args) => commands::resource::import(args, &connect(global)?, global).await,
        Command::Exists(args) => commands::resource::exists(args, &connect(global)?, global).await,
        Command::Apply(args) => commands::resource::apply(args, &connect(global)?, global).await,
        Command::Delete(args) => commands::resource::delete(args, &connect(global)?, global).await,
    }
}
