//! Task records and the JSONL task source.
//!
//! Each non-blank line of the source is one JSON object with required
//! `task_id`, `buggy_solution` and `test` fields and optional `prompt`,
//! `import`, `signature` and `entry_point` strings.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assembler;
use crate::error::LoadError;

/// One buggy-code repair unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    /// Unique identifier within a run.
    pub task_id: String,
    /// Natural-language task description, empty when absent.
    pub prompt: String,
    /// Buggy source, usually a bare function body.
    pub buggy_solution: String,
    /// Test script executed against the program.
    pub test: String,
    /// Import preamble placed before the function header.
    pub imports: Option<String>,
    /// Function header, with or without `def` and trailing colon.
    pub signature: Option<String>,
    /// Function name used when no signature is given.
    pub entry_point: Option<String>,
}

impl TaskItem {
    /// Creates a task with only the required fields.
    pub fn new(
        task_id: impl Into<String>,
        buggy_solution: impl Into<String>,
        test: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            prompt: String::new(),
            buggy_solution: buggy_solution.into(),
            test: test.into(),
            imports: None,
            signature: None,
            entry_point: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_imports(mut self, imports: impl Into<String>) -> Self {
        self.imports = Some(imports.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    /// Assembles `body` into a program using this task's metadata.
    pub fn assemble(&self, body: &str) -> String {
        assembler::assemble(
            body,
            self.imports.as_deref(),
            self.signature.as_deref(),
            self.entry_point.as_deref(),
        )
    }

    /// The buggy solution assembled into a program.
    pub fn baseline_program(&self) -> String {
        self.assemble(&self.buggy_solution)
    }

    /// Parses one JSON record. `line` is 1-based and used for diagnostics.
    pub fn from_json(value: Value, line: usize) -> Result<Self, LoadError> {
        let Value::Object(record) = value else {
            return Err(LoadError::InvalidField {
                line,
                field: "record",
                reason: "expected a JSON object".to_string(),
            });
        };

        let task_id = match record.get("task_id") {
            None | Some(Value::Null) => {
                return Err(LoadError::MissingField {
                    line,
                    field: "task_id",
                })
            }
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(LoadError::InvalidField {
                    line,
                    field: "task_id",
                    reason: format!("expected a string or number, got {}", json_type(other)),
                })
            }
        };

        Ok(Self {
            task_id,
            prompt: optional_string(&record, "prompt", line)?.unwrap_or_default(),
            buggy_solution: required_string(&record, "buggy_solution", line)?,
            test: required_string(&record, "test", line)?,
            imports: optional_string(&record, "import", line)?,
            signature: optional_string(&record, "signature", line)?,
            entry_point: optional_string(&record, "entry_point", line)?,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_string(
    record: &Map<String, Value>,
    field: &'static str,
    line: usize,
) -> Result<String, LoadError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(LoadError::MissingField { line, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(LoadError::InvalidField {
            line,
            field,
            reason: format!("expected a string, got {}", json_type(other)),
        }),
    }
}

/// Absent, null and empty values all map to `None`.
fn optional_string(
    record: &Map<String, Value>,
    field: &'static str,
    line: usize,
) -> Result<Option<String>, LoadError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(LoadError::InvalidField {
            line,
            field,
            reason: format!("expected a string, got {}", json_type(other)),
        }),
    }
}

/// Loads tasks from a JSONL file.
///
/// `limit` caps the number of physical lines read, blank lines included.
/// Any malformed record or repeated `task_id` fails the whole load.
pub fn load_jsonl(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Vec<TaskItem>, LoadError> {
    let file = File::open(path.as_ref())?;
    parse_jsonl(BufReader::new(file), limit)
}

/// Parses tasks from any buffered reader; see [`load_jsonl`].
pub fn parse_jsonl(reader: impl BufRead, limit: Option<usize>) -> Result<Vec<TaskItem>, LoadError> {
    let mut tasks = Vec::new();
    let mut seen = HashSet::new();

    for (index, line) in reader.lines().enumerate() {
        if limit.is_some_and(|limit| index >= limit) {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let line_no = index + 1;
        let value: Value = serde_json::from_str(&line).map_err(|source| LoadError::Json {
            line: line_no,
            source,
        })?;
        let task = TaskItem::from_json(value, line_no)?;

        if !seen.insert(task.task_id.clone()) {
            return Err(LoadError::DuplicateTask(task.task_id));
        }
        tasks.push(task);
    }

    tracing::debug!(count = tasks.len(), "Loaded tasks");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const ADD_RECORD: &str = r#"{"task_id": "Python/0", "prompt": "Add two numbers.", "buggy_solution": "    return a - b\n", "test": "assert add(2, 3) == 5", "entry_point": "add"}"#;

    #[test]
    fn test_parse_full_record() {
        let tasks = parse_jsonl(Cursor::new(ADD_RECORD), None).unwrap();
        assert_eq!(tasks.len(), 1);

        let task = &tasks[0];
        assert_eq!(task.task_id, "Python/0");
        assert_eq!(task.prompt, "Add two numbers.");
        assert_eq!(task.buggy_solution, "    return a - b\n");
        assert_eq!(task.entry_point.as_deref(), Some("add"));
        assert!(task.imports.is_none());
        assert!(task.signature.is_none());
    }

    #[test]
    fn test_import_field_maps_to_imports() {
        let line = r#"{"task_id": "t", "buggy_solution": "pass", "test": "", "import": "import math", "signature": "f(x)"}"#;
        let task = &parse_jsonl(Cursor::new(line), None).unwrap()[0];
        assert_eq!(task.imports.as_deref(), Some("import math"));
        assert_eq!(task.signature.as_deref(), Some("f(x)"));
        assert_eq!(task.prompt, "");
    }

    #[test]
    fn test_numeric_task_id_is_coerced() {
        let line = r#"{"task_id": 17, "buggy_solution": "pass", "test": "pass"}"#;
        let task = &parse_jsonl(Cursor::new(line), None).unwrap()[0];
        assert_eq!(task.task_id, "17");
    }

    #[test]
    fn test_empty_optional_fields_are_absent() {
        let line = r#"{"task_id": "t", "buggy_solution": "pass", "test": "pass", "import": "", "signature": null, "prompt": null}"#;
        let task = &parse_jsonl(Cursor::new(line), None).unwrap()[0];
        assert!(task.imports.is_none());
        assert!(task.signature.is_none());
        assert_eq!(task.prompt, "");
    }

    #[test]
    fn test_missing_required_field() {
        let input = format!("{ADD_RECORD}\n{{\"task_id\": \"t\", \"test\": \"pass\"}}\n");
        let err = parse_jsonl(Cursor::new(input), None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingField {
                line: 2,
                field: "buggy_solution"
            }
        ));
    }

    #[test]
    fn test_wrong_field_type() {
        let line = r#"{"task_id": "t", "buggy_solution": 3, "test": "pass"}"#;
        let err = parse_jsonl(Cursor::new(line), None).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidField {
                field: "buggy_solution",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_json_reports_line() {
        let input = format!("{ADD_RECORD}\n\n{{not json\n");
        let err = parse_jsonl(Cursor::new(input), None).unwrap_err();
        assert!(matches!(err, LoadError::Json { line: 3, .. }));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let input = format!("\n{ADD_RECORD}\n   \n");
        let tasks = parse_jsonl(Cursor::new(input), None).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_limit_counts_physical_lines() {
        let second = ADD_RECORD.replace("Python/0", "Python/1");
        let input = format!("{ADD_RECORD}\n\n{second}\n");

        assert_eq!(parse_jsonl(Cursor::new(input.clone()), Some(2)).unwrap().len(), 1);
        assert_eq!(parse_jsonl(Cursor::new(input.clone()), Some(3)).unwrap().len(), 2);
        assert!(parse_jsonl(Cursor::new(input), Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let input = format!("{ADD_RECORD}\n{ADD_RECORD}\n");
        let err = parse_jsonl(Cursor::new(input), None).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateTask(id) if id == "Python/0"));
    }

    #[test]
    fn test_non_object_record_rejected() {
        let err = parse_jsonl(Cursor::new("[1, 2]"), None).unwrap_err();
        assert!(matches!(err, LoadError::InvalidField { field: "record", .. }));
    }

    #[test]
    fn test_load_jsonl_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{ADD_RECORD}").unwrap();

        let tasks = load_jsonl(file.path(), None).unwrap();
        assert_eq!(tasks[0].task_id, "Python/0");
    }

    #[test]
    fn test_load_jsonl_missing_file() {
        let err = load_jsonl("/nonexistent/tasks.jsonl", None).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_baseline_program_uses_metadata() {
        let task = TaskItem::new("t", "return a - b", "assert add(2, 3) == 5")
            .with_signature("def add(a, b):");
        let program = task.baseline_program();
        assert!(program.contains("def add(a, b):\n    return a - b"));
    }
}
