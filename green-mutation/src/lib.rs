//! Drives `mutmut` over a task's correct implementation with the
//! generated tests, and parses its report into a [`MutationResult`].
//!
//! Workspace handling mirrors `green_sandbox`'s ephemeral-directory
//! pattern; report parsing accepts the two textual report shapes
//! `mutmut` is known to emit.

use std::path::Path;
use std::time::{Duration, Instant};

use std::sync::LazyLock;

use green_core::MutationResult;
use green_errors::MutationError;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Total wall-clock bound for a mutation-testing pass.
pub const TOTAL_TIMEOUT: Duration = Duration::from_secs(600);
/// Per-mutant timeout written into the tool's `pyproject.toml` config.
pub const PER_MUTANT_TIMEOUT_SECS: u64 = 10;

static SINGLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*/\s*(\d+)\s*mutants?\s*killed").unwrap());
static KILLED_SURVIVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)killed:\s*(\d+)").unwrap());
static SURVIVED_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)survived:\s*(\d+)").unwrap());

fn pyproject_toml() -> String {
    format!("[tool.mutmut]\ntimeout = {PER_MUTANT_TIMEOUT_SECS}\n")
}

/// Parse a mutmut report in either supported shape. Returns `None` if
/// neither shape matches.
fn parse_report(stdout: &str) -> Option<(u32, u32)> {
    if let Some(caps) = SINGLE_LINE.captures(stdout) {
        let killed: u32 = caps[1].parse().ok()?;
        let total: u32 = caps[2].parse().ok()?;
        return Some((killed, total));
    }

    if let Some(caps) = KILLED_SURVIVED.captures(stdout) {
        let killed: u32 = caps[1].parse().ok()?;
        let survived: u32 = SURVIVED_ONLY
            .captures(stdout)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);
        return Some((killed, killed + survived));
    }

    None
}

async fn write_file(path: &Path, contents: &str) -> Result<(), MutationError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(MutationError::Workspace)?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(MutationError::Workspace)?;
    Ok(())
}

/// Run mutation testing for `test_source` against `correct_implementation`.
/// Never returns `Err` for tool-unavailable/timeout/crash conditions —
/// those surface as a zeroed [`MutationResult`] with a descriptive
/// `error`, matching the original's "never raise, always score" contract.
/// `track` is accepted for interface symmetry with the other components
/// but does not change mutation-tool invocation.
pub async fn run(
    test_source: &str,
    correct_implementation: &str,
    _track: green_core::Track,
) -> Result<MutationResult, MutationError> {
    let workspace = tempfile::tempdir().map_err(MutationError::Workspace)?;

    write_file(&workspace.path().join("correct.py"), correct_implementation).await?;
    write_file(&workspace.path().join("test_generated.py"), test_source).await?;
    write_file(&workspace.path().join("pyproject.toml"), &pyproject_toml()).await?;

    let spawned = Command::new("mutmut")
        .arg("run")
        .current_dir(workspace.path())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(source) => {
            tracing::warn!(error = %source, "mutmut unavailable");
            return Ok(MutationResult::unavailable(format!(
                "mutmut is unavailable: {source}"
            )));
        }
    };

    let start = Instant::now();
    let output = match tokio::time::timeout(TOTAL_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Ok(MutationResult::unavailable(format!(
                "mutmut run failed: {source}"
            )));
        }
        Err(_) => {
            return Ok(MutationResult::unavailable(format!(
                "mutmut run exceeded {}s timeout",
                TOTAL_TIMEOUT.as_secs()
            )));
        }
    };
    let _ = start;

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_report(&stdout) {
        Some((killed, total)) => Ok(MutationResult::from_counts(killed, total)),
        None => Ok(MutationResult::unavailable(
            "could not parse mutmut output",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line_shape() {
        assert_eq!(parse_report("4/4 mutants killed\n"), Some((4, 4)));
        assert_eq!(parse_report("3/4 mutants killed\n"), Some((3, 4)));
        assert_eq!(parse_report("0/4 mutants killed\n"), Some((0, 4)));
        assert_eq!(parse_report("0/0 mutants killed\n"), Some((0, 0)));
        assert_eq!(parse_report("1/1 mutant killed\n"), Some((1, 1)));
    }

    #[test]
    fn parses_multiline_shape() {
        assert_eq!(parse_report("Killed: 3\nSurvived: 1\n"), Some((3, 4)));
        assert_eq!(parse_report("Killed: 0\nSurvived: 5\n"), Some((0, 5)));
    }

    #[test]
    fn unrecognized_output_parses_to_none() {
        assert_eq!(parse_report("mutmut: command not found"), None);
    }

    #[test]
    fn pyproject_toml_sets_per_mutant_timeout() {
        let toml = pyproject_toml();
        let parsed: toml::Value = toml.parse().unwrap();
        assert_eq!(
            parsed["tool"]["mutmut"]["timeout"].as_integer(),
            Some(PER_MUTANT_TIMEOUT_SECS as i64)
        );
    }

    #[tokio::test]
    async fn zero_total_never_divides_by_zero() {
        let result = MutationResult::from_counts(0, 0);
        assert_eq!(result.mutation_score, 0.0);
    }

    #[tokio::test]
    #[ignore = "requires mutmut on PATH"]
    async fn full_kill_run_reports_score_one() {
        let test_source = "from correct import add\n\ndef test_add():\n    assert add(1, 2) == 3\n";
        let implementation = "def add(a, b):\n    return a + b\n";

        let result = run(test_source, implementation, green_core::Track::Tdd)
            .await
            .unwrap();

        assert!(result.mutation_score >= 0.0 && result.mutation_score <= 1.0);
    }
}
