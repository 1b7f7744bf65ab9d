//! Suite and project files on disk
//!
//! Suites live directly in the project directory as `<name>.json`, next to
//! the project document `.puppetry.json`. All writes go through a temporary
//! file and a rename so a crash never leaves a truncated document behind.

use crate::types::{Project, Suite};
use crate::{Error, Result, VERSION};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Project document filename
pub const PROJECT_FILE: &str = ".puppetry.json";

/// Extension appended to normalized suite names
pub const SUITE_EXTENSION: &str = "json";

/// Turn a free-form title into a safe file stem.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9_]` into a
/// single `-` and trims dashes from both ends.
pub fn normalize_filename(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut dash = false;
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
            dash = false;
        } else if !dash {
            out.push('-');
            dash = true;
        }
    }
    let stem = out.trim_matches('-');
    if stem.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "cannot derive a filename from {:?}",
            raw
        )));
    }
    Ok(stem.to_string())
}

/// `normalize_filename` plus the suite extension
pub fn suite_filename(raw: &str) -> Result<String> {
    Ok(format!("{}.{}", normalize_filename(raw)?, SUITE_EXTENSION))
}

fn check_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(Error::InvalidArgument("filename must not be empty".to_string()));
    }
    if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(Error::InvalidArgument(format!(
            "`{}` is not a plain filename",
            filename
        )));
    }
    Ok(())
}

fn check_directory(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("project directory must not be empty".to_string()));
    }
    Ok(())
}

pub fn suite_path(project_directory: &Path, filename: &str) -> PathBuf {
    project_directory.join(filename)
}

pub fn project_path(project_directory: &Path) -> PathBuf {
    project_directory.join(PROJECT_FILE)
}

/// Write `value` as pretty JSON via a sibling temp file
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("{:?} has no file name", path)))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

    fs::write(&tmp, &data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    debug!("Wrote {:?} ({} bytes)", path, data.len());
    Ok(())
}

pub async fn read_suite(project_directory: &Path, filename: &str) -> Result<Suite> {
    check_directory(project_directory)?;
    check_filename(filename)?;
    let path = suite_path(project_directory, filename);
    let data = fs::read(&path).await?;
    let mut suite: Suite = serde_json::from_slice(&data)?;
    suite.filename = filename.to_string();
    suite.loaded_at = Some(Utc::now());
    suite.modified = false;
    debug!("Read suite {:?}", path);
    Ok(suite)
}

/// Persist `suite` as `filename`, stamping `savedAt` and the writer version.
/// Returns the document as saved.
pub async fn write_suite(project_directory: &Path, filename: &str, suite: &Suite) -> Result<Suite> {
    check_directory(project_directory)?;
    check_filename(filename)?;
    let mut saved = suite.clone();
    saved.filename = filename.to_string();
    saved.saved_at = Some(Utc::now());
    saved.puppetry = Some(VERSION.to_string());
    saved.modified = false;

    write_json_atomic(&suite_path(project_directory, filename), &saved).await?;
    info!("Saved suite {} in {:?}", filename, project_directory);
    Ok(saved)
}

pub async fn remove_suite(project_directory: &Path, filename: &str) -> Result<()> {
    check_directory(project_directory)?;
    check_filename(filename)?;
    fs::remove_file(suite_path(project_directory, filename)).await?;
    info!("Removed suite {} from {:?}", filename, project_directory);
    Ok(())
}

pub async fn read_project(project_directory: &Path) -> Result<Project> {
    check_directory(project_directory)?;
    let data = fs::read(project_path(project_directory)).await?;
    let mut project: Project = serde_json::from_slice(&data)?;
    project.project_directory = project_directory.to_path_buf();
    project.modified = false;
    Ok(project)
}

pub async fn write_project(project_directory: &Path, project: &Project) -> Result<Project> {
    check_directory(project_directory)?;
    let mut saved = project.clone();
    saved.project_directory = project_directory.to_path_buf();
    saved.puppetry = Some(VERSION.to_string());
    saved.modified = false;

    write_json_atomic(&project_path(project_directory), &saved).await?;
    info!("Saved project {:?}", project_directory);
    Ok(saved)
}

/// Suite files directly inside the project directory, sorted by name
pub async fn list_suite_files(project_directory: &Path) -> Result<Vec<String>> {
    check_directory(project_directory)?;
    let dir = project_directory.to_path_buf();
    tokio::task::spawn_blocking(move || scan_suite_files(&dir))
        .await
        .map_err(|e| Error::Internal(format!("suite scan task failed: {}", e)))?
}

fn scan_suite_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => Error::Io(io),
            None => Error::Internal("filesystem loop while scanning suites".to_string()),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping non UTF-8 filename in {:?}", dir);
            continue;
        };
        let is_suite = Path::new(name)
            .extension()
            .map(|ext| ext == SUITE_EXTENSION)
            .unwrap_or(false);
        if is_suite && name != PROJECT_FILE && !name.starts_with('.') {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// The runtime-test directory has its manifest and installed modules
pub fn runtime_test_path_ready(dir: &Path) -> bool {
    dir.join("package.json").is_file() && dir.join("node_modules").is_dir()
}
