//! Waypoint CLI and HTTP trigger entry point.
//!
//! Binary name: `waypoint`
//!
//! Exit codes: 0 when the command (or run) succeeded, 1 when a workflow run
//! failed, 2 when the definition, input or config could not be used.

mod cli;
mod http;
mod state;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;
use waypoint_observe::tracing_setup::{TracingOptions, directive_for, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = TracingOptions {
        default_directive: directive_for(cli.verbose, cli.quiet).to_string(),
        json: false,
        enable_otel: cli.otel,
    };
    if let Err(e) = init_tracing(&options) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    };

    shutdown_tracing();
    code
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            file,
            input,
            input_file,
        } => {
            cli::run::handle_run(&file, input.as_deref(), input_file.as_deref(), config, cli.json)
                .await
        }

        Commands::Validate { file } => {
            cli::inspect::handle_validate(&file, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Show { file } => {
            cli::inspect::handle_show(&file, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Serve { dir, host, port } => {
            cli::serve::handle_serve(&dir, &host, port, config).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "waypoint", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
