//! Test-runner wrapper and ephemeral workspace for one sandboxed execution.
//!
//! The workspace directory holds three files and is mounted read-only at
//! [`WORKDIR`]:
//! - `solution.py`: the assembled program
//! - `tests.py`: the raw test script
//! - `run_tests.py`: the fixed runner below
//!
//! The runner imports the program inside a guarded block so load failures
//! (syntax errors included) are reported like any other raised fault.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::error::SandboxError;

/// Mount point of the workspace inside the container.
pub const WORKDIR: &str = "/work";

/// File name of the assembled program.
pub const SOLUTION_FILE: &str = "solution.py";

/// File name of the test script.
pub const TESTS_FILE: &str = "tests.py";

/// File name of the runner script.
pub const RUNNER_FILE: &str = "run_tests.py";

/// Runner exit code after a failed assertion.
pub const EXIT_ASSERTION: i64 = 1;

/// Runner exit code after any other raised fault.
pub const EXIT_ERROR: i64 = 2;

/// Runner script executed inside the container.
///
/// Prints `OK` and exits 0 on success, `ASSERTION: <detail>` and exits 1 on
/// a failed assertion, `ERROR: <repr>` and exits 2 on any other exception.
pub const RUNNER_SCRIPT: &str = r#"import sys
sys.path.insert(0, ".")

G = {}

try:
    import solution

    G.update(solution.__dict__)
    G["__name__"] = "__main__"
    with open("tests.py", encoding="utf-8") as fh:
        source = fh.read()
    exec(compile(source, "tests", "exec"), G, G)
    print("OK")
except AssertionError as e:
    print("ASSERTION:", e)
    sys.exit(1)
except Exception as e:
    print("ERROR:", repr(e))
    sys.exit(2)
"#;

/// Python command line run inside the container.
///
/// `-B` keeps the interpreter from writing bytecode into the read-only
/// workspace and `-s` drops the user site directory.
pub fn runner_command(python: &str) -> Vec<String> {
    vec![
        python.to_string(),
        "-B".to_string(),
        "-s".to_string(),
        RUNNER_FILE.to_string(),
    ]
}

/// An ephemeral directory owned by a single execution.
///
/// The directory and its contents are removed when the workspace is dropped,
/// whichever way the execution ends.
#[derive(Debug)]
pub struct SandboxWorkspace {
    dir: TempDir,
}

impl SandboxWorkspace {
    /// Writes the program, test script and runner into a fresh directory.
    pub fn materialize(program: &str, test_script: &str) -> Result<Self, SandboxError> {
        let dir = tempfile::Builder::new().prefix("fix-forge-").tempdir()?;

        fs::write(dir.path().join(SOLUTION_FILE), program)?;
        fs::write(dir.path().join(TESTS_FILE), test_script)?;
        fs::write(dir.path().join(RUNNER_FILE), RUNNER_SCRIPT)?;
        make_world_readable(dir.path())?;

        Ok(Self { dir })
    }

    /// Host path of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Host path as a string suitable for a bind specification.
    pub fn host_path(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }
}

// The container user may differ from the host user that owns the files.
#[cfg(unix)]
fn make_world_readable(dir: &Path) -> Result<(), SandboxError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
    for name in [SOLUTION_FILE, TESTS_FILE, RUNNER_FILE] {
        fs::set_permissions(dir.join(name), fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_world_readable(_dir: &Path) -> Result<(), SandboxError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_writes_all_files() {
        let workspace = SandboxWorkspace::materialize("def f():\n    return 1\n", "assert f() == 1")
            .expect("workspace should be created");

        let program = fs::read_to_string(workspace.path().join(SOLUTION_FILE)).unwrap();
        let tests = fs::read_to_string(workspace.path().join(TESTS_FILE)).unwrap();
        let runner = fs::read_to_string(workspace.path().join(RUNNER_FILE)).unwrap();

        assert_eq!(program, "def f():\n    return 1\n");
        assert_eq!(tests, "assert f() == 1");
        assert_eq!(runner, RUNNER_SCRIPT);
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = SandboxWorkspace::materialize("x = 1", "pass").unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.exists());
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_each_workspace_is_fresh() {
        let a = SandboxWorkspace::materialize("x = 1", "pass").unwrap();
        let b = SandboxWorkspace::materialize("x = 1", "pass").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_test_script_stored_verbatim() {
        let script = "s = \"\"\"quotes ''' and {braces}\"\"\"\nassert s";
        let workspace = SandboxWorkspace::materialize("", script).unwrap();
        let stored = fs::read_to_string(workspace.path().join(TESTS_FILE)).unwrap();
        assert_eq!(stored, script);
    }

    #[test]
    fn test_runner_markers_and_exit_codes() {
        assert!(RUNNER_SCRIPT.contains("print(\"OK\")"));
        assert!(RUNNER_SCRIPT.contains("print(\"ASSERTION:\", e)"));
        assert!(RUNNER_SCRIPT.contains("print(\"ERROR:\", repr(e))"));
        assert!(RUNNER_SCRIPT.contains(&format!("sys.exit({EXIT_ASSERTION})")));
        assert!(RUNNER_SCRIPT.contains(&format!("sys.exit({EXIT_ERROR})")));
    }

    #[test]
    fn test_runner_imports_program_inside_guard() {
        let try_pos = RUNNER_SCRIPT.find("try:").unwrap();
        let import_pos = RUNNER_SCRIPT.find("import solution").unwrap();
        assert!(import_pos > try_pos);
    }

    #[test]
    fn test_runner_command() {
        assert_eq!(
            runner_command("python"),
            vec!["python", "-B", "-s", "run_tests.py"]
        );
    }
}
