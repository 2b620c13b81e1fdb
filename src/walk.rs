//! Tree walker: flattens a one-sided directory into its leaves

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use rustc_hash::FxHashSet;

/// Leaves found beneath a directory, plus subtrees that could not be read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Walk {
    pub leaves: Vec<String>,
    pub unreadable: Vec<(String, String)>,
}

/// Render a relative path with `/` separators regardless of the host.
///
/// Names that are not valid UTF-8 keep their raw bytes as `\xNN` escapes and a literal
/// backslash is written as `\\`, so distinct names always render distinctly.
pub fn rel_string(rel: &Path) -> String {
    let mut out = String::new();
    for part in rel.components().filter_map(|c| match c {
        Component::Normal(part) => Some(part),
        _ => None,
    }) {
        if !out.is_empty() {
            out.push('/');
        }
        push_escaped(&mut out, part);
    }
    out
}

fn push_escaped(out: &mut String, name: &OsStr) {
    for chunk in name.as_encoded_bytes().utf8_chunks() {
        out.push_str(&chunk.valid().replace('\\', "\\\\"));
        for byte in chunk.invalid() {
            out.push_str(&format!("\\x{byte:02x}"));
        }
    }
}

/// Collect every non-directory entry and every empty directory under `root/rel`.
///
/// Returned paths are relative to `root`. Symlinks are reported as leaves and never followed.
/// A directory that holds anything is not itself a leaf.
pub fn walk_leaves(root: &Path, rel: &Path) -> Walk {
    let start = root.join(rel);
    let walker = WalkBuilder::new(&start)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut leaves = LeafCollector::new(root, rel);
    for result in walker {
        match result {
            Ok(entry) => {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                leaves.entry(entry.path(), entry.depth(), is_dir);
            }
            Err(err) => {
                log::warn!("unable to walk {}: {}", start.display(), err);
                leaves.error(&err);
            }
        }
    }
    let walk = leaves.finish();
    log::debug!("walked {}: {} leaves", start.display(), walk.leaves.len());
    walk
}

/// Accumulates walk events and decides which entries are leaves.
struct LeafCollector<'a> {
    root: &'a Path,
    rel: &'a Path,
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
    parents: FxHashSet<PathBuf>,
    failed: FxHashSet<PathBuf>,
    unreadable: Vec<(String, String)>,
}

impl<'a> LeafCollector<'a> {
    fn new(root: &'a Path, rel: &'a Path) -> Self {
        Self {
            root,
            rel,
            dirs: Vec::new(),
            files: Vec::new(),
            parents: FxHashSet::default(),
            failed: FxHashSet::default(),
            unreadable: Vec::new(),
        }
    }

    fn entry(&mut self, path: &Path, depth: usize, is_dir: bool) {
        let Ok(rel_path) = path.strip_prefix(self.root) else {
            return;
        };
        let rel_path = rel_path.to_path_buf();
        if depth > 0 {
            if let Some(parent) = rel_path.parent() {
                self.parents.insert(parent.to_path_buf());
            }
        }
        if is_dir {
            self.dirs.push(rel_path);
        } else {
            self.files.push(rel_path);
        }
    }

    fn error(&mut self, err: &ignore::Error) {
        let path = error_path(err)
            .and_then(|p| p.strip_prefix(self.root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.rel.to_path_buf());
        self.unreadable.push((rel_string(&path), err.to_string()));
        self.failed.insert(path);
    }

    /// An unreadable directory is never reported as an empty one.
    fn finish(self) -> Walk {
        let mut leaves: Vec<String> = self
            .files
            .iter()
            .chain(
                self.dirs
                    .iter()
                    .filter(|d| !self.parents.contains(*d) && !self.failed.contains(*d)),
            )
            .map(|p| rel_string(p))
            .collect();
        leaves.sort();
        Walk {
            leaves,
            unreadable: self.unreadable,
        }
    }
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}
