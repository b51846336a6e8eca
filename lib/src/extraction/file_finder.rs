//! Host-file discovery with include/ignore glob sets.
//!
//! Two walks over the same matcher: a sequential walkdir walk and a
//! parallel ignore-crate walk that prunes ignored directories without
//! descending into them (the one large trees want). Both return the list
//! sorted lexicographically by path; canonical-name suffix assignment
//! depends on that order being stable across runs.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{WalkBuilder, WalkState};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

pub struct FileFinder {
    include_set: GlobSet,
    ignore_set: GlobSet,
}

impl FileFinder {
    pub fn new(include: &[String], ignore: &[String]) -> Result<Self> {
        let mut include_builder = GlobSetBuilder::new();
        for pattern in include {
            include_builder.add(Glob::new(pattern)?);
        }
        let mut ignore_builder = GlobSetBuilder::new();
        for pattern in ignore {
            ignore_builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            include_set: include_builder.build()?,
            ignore_set: ignore_builder.build()?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.include_set.is_match(path) && !self.ignore_set.is_match(path)
    }

    pub fn is_ignored_dir(&self, path: &Path) -> bool {
        self.ignore_set.is_match(path)
    }

    pub fn find_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut matching = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !(e.path().is_dir() && self.ignore_set.is_match(e.path())))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && self.matches(path) {
                matching.push(path.to_path_buf());
            }
        }
        matching.sort();
        Ok(matching)
    }

    /// Parallel walk that skips ignored directories wholesale. Collection
    /// order is nondeterministic; sorting restores the order naming depends
    /// on.
    pub fn find_files_parallel(&self, root: &Path) -> Vec<PathBuf> {
        let matching: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

        WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .build_parallel()
            .run(|| {
                let collected = &matching;
                Box::new(move |entry_res: Result<ignore::DirEntry, ignore::Error>| {
                    if let Ok(entry) = entry_res {
                        let path = entry.path();
                        if path.is_dir() && self.ignore_set.is_match(path) {
                            return WalkState::Skip;
                        } else if path.is_file() && self.matches(path) {
                            collected.lock().unwrap().push(path.to_path_buf());
                        }
                    }
                    WalkState::Continue
                })
            });

        let mut files = matching.into_inner().unwrap();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder() -> FileFinder {
        FileFinder::new(
            &["**/*.ts".to_string(), "**/*.tsx".to_string()],
            &["**/node_modules/**".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn matches_ts_and_tsx_only() {
        let f = finder();
        assert!(f.matches(Path::new("src/queries.ts")));
        assert!(f.matches(Path::new("src/components/App.tsx")));
        assert!(!f.matches(Path::new("src/readme.md")));
    }

    #[test]
    fn ignore_set_wins_over_include() {
        let f = finder();
        assert!(!f.matches(Path::new("node_modules/pkg/index.ts")));
    }

    #[test]
    fn invalid_glob_errors_before_walking() {
        let result = FileFinder::new(&["**/*.{ts".to_string()], &[]);
        assert!(result.is_err());
    }

    #[test]
    fn parallel_walk_agrees_with_sequential_walk() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("fixtures");
        let f = finder();
        let sequential = f.find_files(&root).unwrap();
        let parallel = f.find_files_parallel(&root);
        assert!(!sequential.is_empty());
        assert_eq!(sequential, parallel);
    }
}
