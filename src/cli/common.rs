//! Common utilities shared across CLI commands.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::sources::{FileRole, Layout};
use crate::utils::path::resolve_path;

/// Collect source files from CLI paths; every source when `paths` is empty.
pub fn collect_source_files(paths: &[PathBuf], layout: &Layout) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = if paths.len() == 1 && paths[0].as_os_str() == "-" {
        read_paths_from_stdin()?
    } else {
        paths.to_vec()
    };

    if paths.is_empty() {
        return Ok(layout.collect_sources());
    }

    let mut all_files = Vec::new();
    for path in &paths {
        let resolved = resolve_path(path, &layout.source);

        if resolved.is_file() {
            if matches!(layout.classify(&resolved), FileRole::Source(_)) {
                all_files.push(resolved);
            } else {
                anyhow::bail!("Not a source file: {}", path.display());
            }
        } else if resolved.is_dir() {
            all_files.extend(sources_under(layout, &resolved));
        } else {
            anyhow::bail!(
                "Path not found: {}\n  Tried:\n    - {}\n    - {}",
                path.display(),
                path.display(),
                layout.source.join(path).display()
            );
        }
    }

    all_files.sort();
    all_files.dedup();
    Ok(all_files)
}

fn sources_under(layout: &Layout, dir: &Path) -> Vec<PathBuf> {
    layout
        .collect_sources()
        .into_iter()
        .filter(|p| p.starts_with(dir))
        .collect()
}

/// Read file paths from stdin, one per line
pub fn read_paths_from_stdin() -> Result<Vec<PathBuf>> {
    let stdin = io::stdin();
    let mut paths = Vec::new();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            paths.push(PathBuf::from(trimmed));
        }
    }

    Ok(paths)
}
