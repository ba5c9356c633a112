//! Sandboxed test execution: runs a generated test program against one
//! implementation inside a fresh, network-denied workspace and
//! classifies the outcome from its exit code alone.
//!
//! The ephemeral-workspace-plus-guaranteed-cleanup shape is grounded in
//! `sandbox_manager`'s session directories (0o700/0o600 permissions,
//! always torn down); the subprocess-with-deadline shape is the async
//! equivalent of `testing_framework::repo::cargo_test`'s manual
//! `try_wait`/deadline poll, expressed with `tokio::time::timeout`
//! instead of a blocking loop since every caller here is already async.

use std::path::Path;
use std::time::{Duration, Instant};

use green_core::{FailureType, Track, TestExecutionResult};
use green_errors::RunnerError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default per-run timeout: 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Preload module that denies outbound sockets from the test subprocess.
/// Equivalent mechanisms (seccomp-bpf, an unshared network namespace) are
/// acceptable elsewhere; this crate uses the monkeypatch approach because
/// the subprocess under test is CPython.
const NETWORK_DENY_CONFTEST: &str = r#"import socket


class _SandboxNetworkDenied(OSError):
    pass


def _deny_socket(*_args, **_kwargs):
    raise _SandboxNetworkDenied("network access denied in sandbox")


socket.socket = _deny_socket
"#;

fn build_pytest_args(test_file: &Path, track: Track) -> Vec<String> {
    let mut args = vec![test_file.display().to_string(), "-v".to_string()];
    if matches!(track, Track::Bdd) {
        args.push("-p".to_string());
        args.push("pytest_bdd.plugin".to_string());
    }
    args
}

/// Execute `test_source` against `implementation_source` (written as
/// `implementation_filename`) inside a fresh sandbox, wall-clocked at
/// `timeout`.
pub async fn run(
    test_source: &str,
    implementation_source: &str,
    implementation_filename: &str,
    track: Track,
    timeout: Duration,
) -> Result<TestExecutionResult, RunnerError> {
    let workspace = tempfile::tempdir().map_err(RunnerError::Workspace)?;
    harden_permissions(workspace.path(), 0o700)
        .await
        .map_err(RunnerError::Workspace)?;

    let impl_path = workspace.path().join(implementation_filename);
    write_file(&impl_path, implementation_source).await?;

    let test_path = workspace.path().join("test_generated.py");
    write_file(&test_path, test_source).await?;

    let conftest_path = workspace.path().join("conftest.py");
    write_file(&conftest_path, NETWORK_DENY_CONFTEST).await?;

    let args = build_pytest_args(&test_path, track);
    let start = Instant::now();

    let mut child = Command::new("pytest")
        .args(&args)
        .current_dir(workspace.path())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(RunnerError::Spawn)?;

    let result = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            TestExecutionResult::from_exit_code(exit_code, stdout, stderr, start.elapsed().as_secs_f64())
        }
        Ok(Err(source)) => return Err(RunnerError::Io(source)),
        Err(_) => TestExecutionResult::timed_out(timeout.as_secs(), start.elapsed().as_secs_f64(), String::new()),
    };

    // `workspace` drops here regardless of which branch above was taken,
    // removing the directory on every exit path.
    drop(workspace);

    Ok(result)
}

/// Run the generated tests against the correct implementation.
/// `track` is forwarded unmodified — the BDD plugin-load decision must
/// reach the same `run` call the buggy-implementation wrapper uses.
pub async fn against_correct(
    test_source: &str,
    correct_implementation: &str,
    track: Track,
) -> Result<TestExecutionResult, RunnerError> {
    run(test_source, correct_implementation, "correct.py", track, DEFAULT_TIMEOUT).await
}

/// Run the generated tests against the buggy implementation. Like
/// [`against_correct`], `track` must be forwarded unmodified.
pub async fn against_buggy(
    test_source: &str,
    buggy_implementation: &str,
    track: Track,
) -> Result<TestExecutionResult, RunnerError> {
    run(test_source, buggy_implementation, "buggy.py", track, DEFAULT_TIMEOUT).await
}

async fn write_file(path: &Path, contents: &str) -> Result<(), RunnerError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|source| RunnerError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(|source| RunnerError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    harden_permissions(path, 0o600)
        .await
        .map_err(|source| RunnerError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// Narrow a sandbox path to owner-only access, mirroring the session
/// directories `sandbox_manager` hands out (0o700 for the workspace
/// directory, 0o600 for the files written inside it). No-op on non-Unix
/// targets, where these bits don't exist.
#[cfg(unix)]
async fn harden_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(mode);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn harden_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bdd_track_adds_plugin_flag() {
        let args = build_pytest_args(Path::new("/tmp/test_generated.py"), Track::Bdd);
        assert!(args.contains(&"-p".to_string()));
        let idx = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[idx + 1], "pytest_bdd.plugin");
    }

    #[test]
    fn tdd_track_omits_plugin_flag() {
        let args = build_pytest_args(Path::new("/tmp/test_generated.py"), Track::Tdd);
        assert!(!args.iter().any(|a| a == "pytest_bdd.plugin"));
        assert!(!args.contains(&"-p".to_string()));
    }

    #[tokio::test]
    async fn against_correct_and_against_buggy_use_the_same_track() {
        // Both wrappers must build the same pytest invocation shape for a
        // given track; this guards against the historical omission where
        // `track` silently failed to reach one of the two wrappers.
        let correct_args = build_pytest_args(Path::new("/tmp/a.py"), Track::Bdd);
        let buggy_args = build_pytest_args(Path::new("/tmp/b.py"), Track::Bdd);
        assert_eq!(
            correct_args.iter().any(|a| a == "pytest_bdd.plugin"),
            buggy_args.iter().any(|a| a == "pytest_bdd.plugin")
        );
    }

    #[tokio::test]
    #[ignore = "requires pytest on PATH"]
    async fn passing_test_against_correct_implementation_reports_success() {
        let test_source = r#"
def test_example():
    from correct import example
    assert example(5) == 10
"#;
        let implementation = "def example(x):\n    return x * 2\n";

        let result = against_correct(test_source, implementation, Track::Tdd)
            .await
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.failure_type, FailureType::None);
    }

    #[tokio::test]
    #[ignore = "requires pytest on PATH"]
    async fn failing_assertion_is_classified_as_assertion_failure() {
        let test_source = r#"
def test_example():
    from correct import example
    assert example(5) == 999
"#;
        let implementation = "def example(x):\n    return x * 2\n";

        let result = against_correct(test_source, implementation, Track::Tdd)
            .await
            .unwrap();

        assert!(!result.passed);
        assert_eq!(result.failure_type, FailureType::Assertion);
    }

    #[tokio::test]
    #[ignore = "requires pytest on PATH"]
    async fn slow_test_times_out() {
        let test_source = r#"
import time

def test_slow():
    time.sleep(5)
    assert True
"#;
        let implementation = "x = 1\n";

        let result = run(
            test_source,
            implementation,
            "correct.py",
            Track::Tdd,
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        assert!(!result.passed);
        assert_eq!(result.failure_type, FailureType::Timeout);
        assert!(result.stderr.contains("timeout"));
    }
}
