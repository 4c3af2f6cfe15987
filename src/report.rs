//! Daily report generator runner.
//!
//! The report pipeline is an external program; the bot only spawns it,
//! detached, with the date to summarize. Output delivery is the
//! generator's own business.

use tokio::process::Command;

/// Spawn the configured report command with `--force --date <date>`.
/// Returns as soon as the process has started.
pub fn spawn_report(command_line: &str, date: &str) -> Result<(), String> {
    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| "Report command is empty".to_string())?;

    let mut command = Command::new(program);
    command.args(parts).arg("--force").arg("--date").arg(date);

    let child = command
        .spawn()
        .map_err(|e| format!("Failed to start report generator '{}': {}", program, e))?;

    log::info!(
        "[REPORT] Generator started for {} (pid {:?})",
        date,
        child.id()
    );
    Ok(())
}
