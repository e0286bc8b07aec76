//! `waypoint validate` and `waypoint show`: offline inspection of a definition.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use waypoint_core::workflow::definition::{Workflow, WorkflowError, load_workflow_file, serialize_workflow_json};
use waypoint_types::workflow::{RetryPolicy, State, WorkflowDefinition};

/// Load and validate a workflow file, with a readable error on failure.
pub fn load_definition(file: &Path) -> Result<Workflow> {
    load_workflow_file(file).map_err(|e| match e {
        WorkflowError::ParseError(msg) => {
            anyhow::anyhow!("Failed to parse {}: {msg}", file.display())
        }
        WorkflowError::IoError(err) => anyhow::anyhow!("Failed to read {}: {err}", file.display()),
        other => anyhow::anyhow!("Workflow {} is invalid: {other}", file.display()),
    })
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub fn handle_validate(file: &Path, json: bool) -> Result<()> {
    let workflow = load_definition(file)?;
    let report = workflow.report();

    if json {
        let out = serde_json::json!({
            "name": workflow.name(),
            "valid": true,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} is valid ({} states)",
        style("✓").green().bold(),
        style(workflow.name()).cyan(),
        report.state_count
    );
    println!("  Reachable:   {}", report.reachable.join(", "));
    if !report.unreachable.is_empty() {
        println!(
            "  {} Unreachable: {}",
            style("!").yellow().bold(),
            style(report.unreachable.join(", ")).yellow()
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

pub fn handle_show(file: &Path, json: bool) -> Result<()> {
    let workflow = load_definition(file)?;
    let def = workflow.definition();

    if json {
        println!("{}", serialize_workflow_json(def)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Workflow").bold(), style(def.display_name()).cyan());
    if let Some(comment) = &def.comment {
        println!("  {}", style(comment).dim());
    }
    println!();
    println!("{}", build_state_table(def));
    println!();
    Ok(())
}

/// One row per state, branch states qualified as `Parallel/branches[i]/State`.
fn build_state_table(def: &WorkflowDefinition) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("State").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Next"),
            Cell::new("Retry"),
            Cell::new("Catch"),
        ]);
    add_rows(&mut table, def, "", true);
    table
}

fn add_rows(table: &mut Table, def: &WorkflowDefinition, prefix: &str, enabled: bool) {
    for (id, state) in &def.states {
        let label = if id == &def.start_state {
            format!("{prefix}{id} (start)")
        } else {
            format!("{prefix}{id}")
        };
        let type_cell = if enabled {
            Cell::new(state.type_name())
        } else {
            Cell::new(format!("{} (disabled)", state.type_name())).fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(label),
            type_cell,
            Cell::new(state.next().unwrap_or("-")),
            Cell::new(state.retry().map(format_retry).unwrap_or_else(|| "-".to_string())),
            Cell::new(format_catches(state)),
        ]);

        if let State::Parallel(parallel) = state {
            for (index, branch) in parallel.branches.iter().enumerate() {
                let nested = format!("{prefix}{id}/branches[{index}]/");
                add_rows(table, &branch.workflow, &nested, enabled && branch.enabled);
            }
        }
    }
}

fn format_retry(policy: &RetryPolicy) -> String {
    let mut out = format!(
        "{}x every {}s x{} [{}]",
        policy.max_attempts,
        policy.interval_seconds,
        policy.backoff_rate,
        policy.error_kinds.join(", ")
    );
    if let Some(max) = policy.max_delay_seconds {
        out.push_str(&format!(" max {max}s"));
    }
    out
}

fn format_catches(state: &State) -> String {
    let catches = state.catches();
    if catches.is_empty() {
        return "-".to_string();
    }
    catches
        .iter()
        .map(|c| format!("[{}] -> {}", c.error_kinds.join(", "), c.next))
        .collect::<Vec<_>>()
        .join("; ")
}
