//! Project file layout.
//!
//! Decides what a path is to the runner:
//!
//! | Location              | Extension         | Role                  |
//! |-----------------------|-------------------|-----------------------|
//! | `paths.deps`          | any               | ignored (generated)   |
//! | `paths.output`        | `.js`             | compiled script       |
//! | `paths.output`        | `.css`            | compiled stylesheet   |
//! | `paths.source`        | `.js .jsx .jsf`   | source to scan        |
//!
//! `node_modules` and hidden entries are never sources.

use crate::config::PathsConfig;
use crate::utils::path::file_id;
use jwalk::WalkDir;
use std::path::{Component, Path, PathBuf};

/// Extensions of scanned source files.
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "jsf"];

const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// What a changed path means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    /// Source file, by id relative to the source root.
    Source(String),
    /// Compiled script, by id relative to the output root.
    Script(String),
    /// Compiled stylesheet, by view name.
    Stylesheet(String),
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub source: PathBuf,
    pub output: PathBuf,
    pub deps: PathBuf,
}

impl Layout {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            source: paths.source.clone(),
            output: paths.output.clone(),
            deps: paths.deps.clone(),
        }
    }

    pub fn classify(&self, path: &Path) -> FileRole {
        if path.starts_with(&self.deps) {
            return FileRole::Ignored;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        if path.starts_with(&self.output) {
            return match ext {
                "js" => FileRole::Script(file_id(&self.output, path)),
                "css" => path
                    .file_stem()
                    .map(|stem| FileRole::Stylesheet(stem.to_string_lossy().into_owned()))
                    .unwrap_or(FileRole::Ignored),
                _ => FileRole::Ignored,
            };
        }

        if path.starts_with(&self.source)
            && SOURCE_EXTENSIONS.contains(&ext)
            && !is_skipped(path.strip_prefix(&self.source).unwrap_or(path))
        {
            return FileRole::Source(file_id(&self.source, path));
        }

        FileRole::Ignored
    }

    /// Every source file below the source root, sorted.
    pub fn collect_sources(&self) -> Vec<PathBuf> {
        let output = self.output.clone();
        let deps = self.deps.clone();

        let mut files: Vec<_> = WalkDir::new(&self.source)
            .process_read_dir(move |_, _, _, children| {
                children.retain(|entry| {
                    entry.as_ref().is_ok_and(|e| {
                        let path = e.path();
                        let name = e.file_name().to_string_lossy();
                        !SKIPPED_DIRS.contains(&name.as_ref())
                            && !path.starts_with(&output)
                            && !path.starts_with(&deps)
                    })
                });
            })
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|path| matches!(self.classify(path), FileRole::Source(_)))
            .collect();
        files.sort();
        files
    }
}

fn is_skipped(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || SKIPPED_DIRS.contains(&part.as_ref())
        }
        _ => false,
    })
}
