use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

static MONTH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-\d{2}").expect("valid month prefix regex"));

/// The directory tree artifacts are written into.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the artifact called `file_name` lives.
    ///
    /// An existing file of that name anywhere in the tree wins, so artifacts
    /// moved by hand keep being updated in place. New `YYYY-MM-DD…` names go
    /// to a `YYYY-MM` folder (created on demand); anything else goes to the
    /// root.
    pub fn resolve(&self, file_name: &str) -> PathBuf {
        if let Some(existing) = self.existing(file_name) {
            return existing;
        }

        let Some(caps) = MONTH_PREFIX.captures(file_name) else {
            return self.root.join(file_name);
        };
        let month_dir = self.root.join(format!("{}-{}", &caps[1], &caps[2]));
        match fs::create_dir_all(&month_dir) {
            Ok(()) => month_dir.join(file_name),
            Err(e) => {
                warn!(dir = %month_dir.display(), "could not create month folder: {e}");
                self.root.join(file_name)
            }
        }
    }

    /// An existing file called `file_name`, hidden and `scripts` folders aside.
    pub fn existing(&self, file_name: &str) -> Option<PathBuf> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e))
            .flatten()
            .find(|e| e.file_type().is_file() && e.file_name() == file_name)
            .map(DirEntry::into_path)
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "scripts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_dated_files_go_to_month_folder() {
        let dir = TempDir::new().unwrap();
        let tree = OutputTree::new(dir.path());
        let path = tree.resolve("2026-01-22-claude.md");
        assert_eq!(path, dir.path().join("2026-01/2026-01-22-claude.md"));
        assert!(dir.path().join("2026-01").is_dir());
    }

    #[test]
    fn existing_file_is_found_wherever_it_is() {
        let dir = TempDir::new().unwrap();
        let moved = dir.path().join("archive/old");
        fs::create_dir_all(&moved).unwrap();
        fs::write(moved.join("2026-01-22-claude.md"), "x").unwrap();

        let tree = OutputTree::new(dir.path());
        assert_eq!(
            tree.resolve("2026-01-22-claude.md"),
            moved.join("2026-01-22-claude.md")
        );
    }

    #[test]
    fn hidden_and_script_dirs_are_not_searched() {
        let dir = TempDir::new().unwrap();
        for hidden in [".git", "scripts"] {
            let d = dir.path().join(hidden);
            fs::create_dir_all(&d).unwrap();
            fs::write(d.join("2026-01-22-claude.md"), "x").unwrap();
        }
        let tree = OutputTree::new(dir.path());
        assert_eq!(
            tree.resolve("2026-01-22-claude.md"),
            dir.path().join("2026-01/2026-01-22-claude.md")
        );
    }

    #[test]
    fn undated_names_go_to_root() {
        let dir = TempDir::new().unwrap();
        let tree = OutputTree::new(dir.path());
        assert_eq!(tree.resolve("notes.md"), dir.path().join("notes.md"));
    }
}
