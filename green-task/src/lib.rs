//! Reads a task directory (`metadata.json`, `spec.py`/`spec.feature`,
//! `implementation/correct.py`, `implementation/buggy.py`) into a
//! [`Task`], file-by-file, naming the first missing path in the error.

use std::path::Path;

use green_core::{Task, Track};
use green_errors::TaskLoadError;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
struct Metadata {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    function_name: String,
}

fn read_required(path: &Path) -> Result<String, TaskLoadError> {
    if !path.exists() {
        return Err(TaskLoadError::MissingFile(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| TaskLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a single task. `track` is passed in explicitly; it is never
/// derived from `metadata.json` — the caller decides the track once and
/// carries it through every component.
pub fn load_task(task_dir: &Path, track: Track) -> Result<Task, TaskLoadError> {
    if !task_dir.exists() {
        return Err(TaskLoadError::MissingDirectory(task_dir.to_path_buf()));
    }

    let metadata_path = task_dir.join("metadata.json");
    let metadata_text = read_required(&metadata_path)?;
    let metadata: Metadata =
        serde_json::from_str(&metadata_text).map_err(|source| TaskLoadError::MalformedMetadata {
            path: metadata_path.clone(),
            source,
        })?;

    let spec_path = match track {
        Track::Tdd => task_dir.join("spec.py"),
        Track::Bdd => task_dir.join("spec.feature"),
    };
    let spec = read_required(&spec_path)?;

    let impl_dir = task_dir.join("implementation");
    let correct_implementation = read_required(&impl_dir.join("correct.py"))?;
    let buggy_implementation = read_required(&impl_dir.join("buggy.py"))?;

    Ok(Task {
        task_id: metadata.task_id,
        function_name: metadata.function_name,
        track,
        spec,
        correct_implementation,
        buggy_implementation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn build_task_dir(root: &Path, spec_filename: &str) {
        write(
            &root.join("metadata.json"),
            r#"{"task_id": "task_001", "function_name": "add"}"#,
        );
        write(&root.join(spec_filename), "spec contents");
        write(&root.join("implementation/correct.py"), "def add(a, b): return a + b");
        write(&root.join("implementation/buggy.py"), "def add(a, b): return a - b");
    }

    #[test]
    fn loads_tdd_task() {
        let dir = tempfile::tempdir().unwrap();
        build_task_dir(dir.path(), "spec.py");

        let task = load_task(dir.path(), Track::Tdd).unwrap();
        assert_eq!(task.task_id, "task_001");
        assert_eq!(task.function_name, "add");
        assert_eq!(task.spec, "spec contents");
        assert!(task.correct_implementation.contains("a + b"));
        assert!(task.buggy_implementation.contains("a - b"));
    }

    #[test]
    fn loads_bdd_task_from_feature_file() {
        let dir = tempfile::tempdir().unwrap();
        build_task_dir(dir.path(), "spec.feature");

        let task = load_task(dir.path(), Track::Bdd).unwrap();
        assert_eq!(task.spec, "spec contents");
    }

    #[test]
    fn missing_metadata_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("spec.py"), "x").unwrap();

        let err = load_task(dir.path(), Track::Tdd).unwrap_err();
        match err {
            TaskLoadError::MissingFile(path) => {
                assert_eq!(path.file_name().unwrap(), "metadata.json");
            }
            other => panic!("expected MissingFile, got {other:?}"),
        }
    }

    #[test]
    fn missing_spec_file_for_requested_track_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("metadata.json"),
            r#"{"task_id": "task_001", "function_name": "add"}"#,
        );
        write(&dir.path().join("implementation/correct.py"), "x");
        write(&dir.path().join("implementation/buggy.py"), "x");

        let err = load_task(dir.path(), Track::Bdd).unwrap_err();
        match err {
            TaskLoadError::MissingFile(path) => {
                assert_eq!(path.file_name().unwrap(), "spec.feature");
            }
            other => panic!("expected MissingFile, got {other:?}"),
        }
    }

    #[test]
    fn nonexistent_task_directory_is_reported() {
        let err = load_task(Path::new("/nonexistent/task_999"), Track::Tdd).unwrap_err();
        assert!(matches!(err, TaskLoadError::MissingDirectory(_)));
    }
}
