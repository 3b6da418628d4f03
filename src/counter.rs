//! Line counting
//!
//! The line counter is an external collaborator: it is handed a repository
//! path and returns per-file `{blank, comment, code, language}` counts.
//! Abstracting it behind a trait keeps the orchestrator testable without
//! the real tool installed.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::AtlasError;
use crate::models::FileCounts;
use crate::process::run_tool;

/// Keys in the counter's JSON output that are not files.
const RESERVED_KEYS: [&str; 2] = ["header", "SUM"];

/// Per-file line counting for one repository.
pub trait LineCounter {
    /// Tool name for logs and error messages.
    fn name(&self) -> &str;

    /// Verify the underlying tool can be invoked at all.
    ///
    /// # Errors
    ///
    /// Returns [`AtlasError::ToolMissing`] when the tool is absent.
    fn ensure_available(&self) -> Result<(), AtlasError>;

    /// Count lines for every tracked file in `repo`, keyed by the path the
    /// tool reports (absolute or repository-relative).
    ///
    /// # Errors
    ///
    /// Returns an error when the tool produces no usable output for the
    /// repository; callers treat that as a per-repository failure.
    fn count(&self, repo: &Path) -> Result<BTreeMap<String, FileCounts>, AtlasError>;
}

/// `cloc`-backed line counter.
pub struct Cloc;

impl LineCounter for Cloc {
    fn name(&self) -> &str {
        "cloc"
    }

    fn ensure_available(&self) -> Result<(), AtlasError> {
        let result = run_tool(&["cloc", "--version"], "cloc", 0, None);
        if result.tool_missing() {
            return Err(AtlasError::ToolMissing {
                tool: "cloc".to_string(),
                hint: "Install it first, e.g. `brew install cloc` or `apt install cloc`."
                    .to_string(),
            });
        }
        Ok(())
    }

    fn count(&self, repo: &Path) -> Result<BTreeMap<String, FileCounts>, AtlasError> {
        let repo_str = repo.to_string_lossy();
        // Non-zero exit is tolerated: cloc still emits partial JSON when a
        // single file times out.
        let result = run_tool(
            &["cloc", "--vcs=git", "--json", "--by-file", &repo_str],
            "cloc",
            0,
            None,
        );

        if result.tool_missing() {
            return Err(AtlasError::ToolMissing {
                tool: "cloc".to_string(),
                hint: "Install it first, e.g. `brew install cloc` or `apt install cloc`."
                    .to_string(),
            });
        }
        if result.stdout.trim().is_empty() {
            return Err(AtlasError::CounterOutput(result.stderr.trim().to_string()));
        }

        parse_counter_output(&result.stdout, &result.stderr)
    }
}

/// Parse the counter's JSON, dropping reserved keys and recovering files
/// the tool gave up on.
fn parse_counter_output(
    stdout: &str,
    stderr: &str,
) -> Result<BTreeMap<String, FileCounts>, AtlasError> {
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(stdout)?;

    let mut files = BTreeMap::new();
    for (key, value) in raw {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        match serde_json::from_value::<FileCounts>(value) {
            Ok(counts) => {
                files.insert(key, counts);
            }
            Err(e) => warn!("Skipping unparseable counter entry {}: {}", key, e),
        }
    }

    for path in timed_out_files(stderr) {
        if let Some(counts) = raw_line_count(Path::new(&path)) {
            debug!("Raw line-count fallback for {}: {} lines", path, counts.code);
            files.insert(path, counts);
        }
    }

    Ok(files)
}

/// Paths the counter reported as having exceeded its per-file timeout.
fn timed_out_files(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .filter_map(|line| line.split("exceeded timeout:").nth(1))
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Fall back to a raw line count with the language inferred from the
/// extension. Unreadable files are skipped.
fn raw_line_count(path: &Path) -> Option<FileCounts> {
    let contents = std::fs::read(path).ok()?;
    let code = String::from_utf8_lossy(&contents).lines().count() as u64;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    Some(FileCounts {
        blank: 0,
        comment: 0,
        code,
        language: language_for_extension(ext).to_string(),
    })
}

/// Fixed extension table used only for the timeout fallback.
fn language_for_extension(ext: &str) -> &'static str {
    match ext {
        "ts" | "tsx" => "TypeScript",
        "js" | "jsx" => "JavaScript",
        "py" => "Python",
        "java" => "Java",
        "go" => "Go",
        "rs" => "Rust",
        "rb" => "Ruby",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_excluded() {
        let stdout = r#"{
            "header": {"cloc_version": "2.00", "n_files": 2},
            "SUM": {"blank": 3, "comment": 4, "code": 30, "nFiles": 2},
            "src/a.rs": {"blank": 1, "comment": 2, "code": 10, "language": "Rust"},
            "src/b.py": {"blank": 2, "comment": 2, "code": 20, "language": "Python"}
        }"#;
        let files = parse_counter_output(stdout, "").expect("parse");
        assert_eq!(files.len(), 2);
        assert_eq!(files["src/a.rs"].code, 10);
        assert_eq!(files["src/b.py"].language, "Python");
        assert!(!files.contains_key("SUM"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(parse_counter_output("not json", "").is_err());
    }

    #[test]
    fn test_timeout_fallback_counts_raw_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slow = dir.path().join("slow.ts");
        std::fs::write(&slow, "line1\nline2\nline3\n").expect("write");

        let stderr = format!("Skipping file, exceeded timeout: {}", slow.display());
        let files = parse_counter_output("{}", &stderr).expect("parse");

        let counts = &files[&slow.display().to_string()];
        assert_eq!(counts.code, 3);
        assert_eq!(counts.language, "TypeScript");
        assert_eq!(counts.blank, 0);
    }

    #[test]
    fn test_timeout_fallback_skips_missing_files() {
        let stderr = "Skipping file, exceeded timeout: /no/such/file.py";
        let files = parse_counter_output("{}", stderr).expect("parse");
        assert!(files.is_empty());
    }

    #[test]
    fn test_language_table() {
        assert_eq!(language_for_extension("tsx"), "TypeScript");
        assert_eq!(language_for_extension("rs"), "Rust");
        assert_eq!(language_for_extension("go"), "Go");
        assert_eq!(language_for_extension("weird"), "Unknown");
        assert_eq!(language_for_extension(""), "Unknown");
    }
}
