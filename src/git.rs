//! Git subprocess boundary. Every `git` invocation the crate needs goes
//! through here; a non-zero exit or spawn failure degrades the dependent
//! feature (`TransientGitError`) rather than aborting a run, treating the
//! external process as best-effort.

use crate::error::CoreError;
use std::path::Path;
use std::process::Command;

fn run(repo_root: &Path, args: &[&str]) -> Result<String, CoreError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .map_err(|e| CoreError::TransientGitError(format!("spawn git {:?}: {e}", args)))?;

    if !output.status.success() {
        return Err(CoreError::TransientGitError(format!(
            "git {:?} exited with {}: {}",
            args,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn head_commit(repo_root: &Path) -> Result<String, CoreError> {
    run(repo_root, &["rev-parse", "HEAD"])
}

pub fn toplevel(repo_root: &Path) -> Result<String, CoreError> {
    run(repo_root, &["rev-parse", "--show-toplevel"])
}

pub fn git_dir(repo_root: &Path) -> Result<String, CoreError> {
    run(repo_root, &["rev-parse", "--git-dir"])
}

/// Files that differ between two commits, restricted to the incremental
/// re-index path.
pub fn diff_name_only(repo_root: &Path, from: &str, to: &str) -> Result<Vec<String>, CoreError> {
    let out = run(repo_root, &["diff", "--name-only", from, to])?;
    Ok(out.lines().map(|s| s.to_string()).filter(|s| !s.is_empty()).collect())
}

/// One `(commit, author, date)` tuple per commit touching `start..end` of
/// `path`, used by the risk analyzer's change-frequency/author-churn signals.
pub fn log_line_range(repo_root: &Path, path: &str, start: u32, end: u32) -> Result<Vec<(String, String, String)>, CoreError> {
    let range = format!("{start},{end}:{path}");
    let out = run(
        repo_root,
        &["log", "-L", &range, "--pretty=format:%H|%an|%ai", "--no-patch"],
    )?;
    Ok(parse_commit_lines(&out))
}

pub fn log_follow(repo_root: &Path, path: &str) -> Result<Vec<(String, String, String)>, CoreError> {
    let out = run(repo_root, &["log", "--follow", "--pretty=format:%H|%an|%ai", "--", path])?;
    Ok(parse_commit_lines(&out))
}

/// `commit -> files[]` for co-change mining.
pub fn log_name_only_since(repo_root: &Path, since: &str) -> Result<Vec<(String, Vec<String>)>, CoreError> {
    let out = run(
        repo_root,
        &["log", "--name-only", "--pretty=format:%H", "--since", since],
    )?;

    let mut commits: Vec<(String, Vec<String>)> = Vec::new();
    for line in out.lines() {
        if line.is_empty() {
            continue;
        }
        // A 40-char hex line with no `/` starts a new commit; everything
        // else until the next such line is a changed file path.
        if line.len() == 40 && line.chars().all(|c| c.is_ascii_hexdigit()) {
            commits.push((line.to_string(), Vec::new()));
        } else if let Some(last) = commits.last_mut() {
            last.1.push(line.to_string());
        }
    }
    Ok(commits)
}

fn parse_commit_lines(out: &str) -> Vec<(String, String, String)> {
    out.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '|');
            let hash = parts.next()?.to_string();
            let author = parts.next()?.to_string();
            let date = parts.next()?.to_string();
            Some((hash, author, date))
        })
        .collect()
}
