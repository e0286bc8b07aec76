//! `waypoint run`: execute a workflow file once and report the outcome.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use console::style;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use waypoint_core::workflow::engine::ExecutionResult;

use super::inspect::load_definition;
use crate::state::{build_engine, resolve_config};

/// Run `file` with the given trigger payload.
///
/// Returns exit code 1 when the run fails; load and config problems are
/// returned as errors.
pub async fn handle_run(
    file: &Path,
    input: Option<&str>,
    input_file: Option<&Path>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<ExitCode> {
    let workflow = load_definition(file)?;
    let payload = read_input(input, input_file).await?;
    let config = resolve_config(config_path).await?;
    let engine = build_engine(&config)?;

    let token = CancellationToken::new();
    let run = engine.run_with_token(&workflow, payload, token.clone());
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("  {} Interrupted, cancelling run...", style("!").yellow().bold());
            token.cancel();
            run.await
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result)?;
    }

    match &result.error {
        Some(error) => {
            eprintln!("error: {}", error.kind);
            Ok(ExitCode::from(1))
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

/// Parse the trigger payload; no input means an empty object.
async fn read_input(input: Option<&str>, input_file: Option<&Path>) -> Result<Value> {
    let text = match (input, input_file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input file {}", path.display()))?,
        (None, None) => return Ok(json!({})),
    };
    serde_json::from_str(&text).context("Trigger payload is not valid JSON")
}

fn print_result(result: &ExecutionResult) -> Result<()> {
    let elapsed = (result.finished_at - result.started_at).num_milliseconds();

    println!();
    match &result.error {
        None => {
            println!(
                "  {} {} succeeded in {}",
                style("✓").green().bold(),
                style(&result.workflow).cyan(),
                format_elapsed(elapsed)
            );
        }
        Some(error) => {
            println!(
                "  {} {} failed at {} after {}",
                style("✗").red().bold(),
                style(&result.workflow).cyan(),
                style(format_path(&error.path, &error.state)).yellow(),
                format_elapsed(elapsed)
            );
            println!("    {}: {}", style(&error.kind).red(), error.message);
        }
    }
    println!("  {}", style(format!("run {}", result.run_id)).dim());
    println!();
    println!("{}", serde_json::to_string_pretty(result.context.as_value())?);
    Ok(())
}

/// Render an error's scope path, e.g. `Fanout > branches[0] > RunA`.
fn format_path(path: &[String], state: &str) -> String {
    if path.is_empty() {
        state.to_string()
    } else {
        path.join(" > ")
    }
}

fn format_elapsed(ms: i64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}
