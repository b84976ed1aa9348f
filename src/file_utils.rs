/*!
 * File system helpers for markdown translation runs.
 *
 * Covers the small amount of path handling the CLI needs: finding markdown
 * files under a directory, deriving output paths tagged with the target
 * language, and reading/writing documents.
 */

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never descended into.
const IGNORED_DIRS: [&str; 2] = [".git", "node_modules"];

/// Check whether a path looks like a markdown file.
pub fn is_markdown_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown")
    )
}

/// Recursively collect markdown files under a directory, sorted by path.
pub fn collect_markdown_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && IGNORED_DIRS.contains(&name.as_ref()))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", root.display()))?;
        if entry.file_type().is_file() && is_markdown_file(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

/// Derive the default output path for a translated file: the input path with
/// the target language code inserted before the extension
/// (`guide.md` -> `guide.zh.md`).
pub fn default_output_path(input: &Path, target_language: &str) -> PathBuf {
    let extension = input.extension().and_then(|ext| ext.to_str());
    match extension {
        Some(ext) => {
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            input.with_file_name(format!("{stem}.{target_language}.{ext}"))
        }
        None => {
            let name = input.file_name().and_then(|s| s.to_str()).unwrap_or_default();
            input.with_file_name(format!("{name}.{target_language}.md"))
        }
    }
}

/// Read a document to a string.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Write a document, creating parent directories as needed.
pub fn write_string(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
}
