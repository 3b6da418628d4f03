//! Git history analysis module
//!
//! All version-control queries go through the external `git` command:
//! bulk log parsing for per-file statistics, co-change coupling, and
//! staleness/remote-divergence checks. Nothing here touches Git's object
//! model directly.

pub mod coupling;
pub mod history;
pub mod staleness;

use std::path::Path;

use crate::error::AtlasError;
use crate::process::{run_tool, ToolOutput};

pub use coupling::{detect_coupling, DEFAULT_COUPLING_THRESHOLD, DEFAULT_MAX_PAIRS};
pub use history::{file_stats, FileHistory};
pub use staleness::{check_repo, check_staleness, format_staleness_warning, DEFAULT_WORKERS};

/// Run a git subcommand inside a repository.
pub(crate) fn run_git(repo: &Path, args: &[&str], timeout_secs: u64) -> ToolOutput {
    let mut cmd = Vec::with_capacity(args.len() + 1);
    cmd.push("git");
    cmd.extend_from_slice(args);
    run_tool(&cmd, "git", timeout_secs, Some(repo))
}

/// Verify the `git` executable is present before a run starts.
///
/// # Errors
///
/// Returns [`AtlasError::ToolMissing`] when it is not.
pub fn ensure_git_available() -> Result<(), AtlasError> {
    let result = run_tool(&["git", "--version"], "git", 0, None);
    if result.tool_missing() {
        return Err(AtlasError::ToolMissing {
            tool: "git".to_string(),
            hint: "Install Git from https://git-scm.com and make sure it is on PATH."
                .to_string(),
        });
    }
    Ok(())
}

/// Parse an author-date field: ISO-8601 with an offset (`Z` included).
///
/// Returns the Unix timestamp, or `None` for malformed input; callers
/// treat that as "never recent" rather than an error.
pub(crate) fn parse_author_date(date: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(date)
        .ok()
        .map(|dt| dt.timestamp())
}
