//! Recursive filesystem differ for rootfs-differ

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, FileType, Metadata};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;
use crate::error::{Error, PartialReadError};
use crate::hash::fingerprint;
use crate::target::Side;
use crate::walk::{rel_string, walk_leaves};

/// What a directory entry is, without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    RegularFile,
    Directory,
    Symlink,
    Other,
}

impl From<FileType> for EntryKind {
    fn from(ft: FileType) -> Self {
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::RegularFile
        } else {
            EntryKind::Other
        }
    }
}

/// Knobs for the filesystem comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Treat regular files with equal size and modification time as equal without reading them.
    pub shallow: bool,
}

/// Paths that differ between two trees, relative to their roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDelta {
    pub left_only: Vec<String>,
    pub right_only: Vec<String>,
    pub common_differing: Vec<String>,
    /// Subtrees that could not be read; their contents are missing from the lists above.
    pub errors: Vec<PartialReadError>,
}

impl FileDelta {
    /// True when no path differs. Read errors do not count as differences.
    pub fn is_empty(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty() && self.common_differing.is_empty()
    }

    pub fn only(&self, side: Side) -> &[String] {
        match side {
            Side::First => &self.left_only,
            Side::Second => &self.right_only,
        }
    }

    pub fn errors_for(&self, side: Side) -> impl Iterator<Item = &PartialReadError> {
        self.errors.iter().filter(move |e| e.side == side)
    }

    fn only_mut(&mut self, side: Side) -> &mut Vec<String> {
        match side {
            Side::First => &mut self.left_only,
            Side::Second => &mut self.right_only,
        }
    }

    fn merge(&mut self, other: FileDelta) {
        self.left_only.extend(other.left_only);
        self.right_only.extend(other.right_only);
        self.common_differing.extend(other.common_differing);
        self.errors.extend(other.errors);
    }

    fn finish(mut self) -> Self {
        for list in [
            &mut self.left_only,
            &mut self.right_only,
            &mut self.common_differing,
        ] {
            list.sort();
            list.dedup();
        }
        self.errors
            .sort_by(|a, b| (a.side as u8, &a.path).cmp(&(b.side as u8, &b.path)));
        self
    }

    fn differing(rel: &Path) -> Self {
        FileDelta {
            common_differing: vec![rel_string(rel)],
            ..Default::default()
        }
    }

    fn unreadable(err: PartialReadError) -> Self {
        log::warn!("{}", err);
        FileDelta {
            errors: vec![err],
            ..Default::default()
        }
    }
}

type Entries = BTreeMap<OsString, EntryKind>;

fn read_entries(dir: &Path) -> io::Result<Entries> {
    let mut entries = Entries::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        entries.insert(entry.file_name(), entry.file_type()?.into());
    }
    Ok(entries)
}

/// Compare two directory trees.
///
/// Both roots must be readable; failing to list either root is an error. Anything that
/// becomes unreadable further down is recorded in [`FileDelta::errors`] instead.
pub fn diff_trees(left: &Path, right: &Path, options: &DiffOptions) -> Result<FileDelta> {
    diff_trees_interruptible(left, right, options, &AtomicBool::new(false))
}

/// [`diff_trees`] that stops descending once `stop` is set and returns
/// [`Error::Interrupted`] instead of a partial delta.
pub fn diff_trees_interruptible(
    left: &Path,
    right: &Path,
    options: &DiffOptions,
    stop: &AtomicBool,
) -> Result<FileDelta> {
    let left_entries = read_entries(left).map_err(|e| Error::io(left, e))?;
    let right_entries = read_entries(right).map_err(|e| Error::io(right, e))?;
    let trees = Trees {
        left,
        right,
        options,
        stop,
    };
    let delta = trees.diff_entries(Path::new(""), &left_entries, &right_entries);
    if stop.load(Ordering::Relaxed) {
        return Err(Error::Interrupted);
    }
    Ok(delta.finish())
}

struct Trees<'a> {
    left: &'a Path,
    right: &'a Path,
    options: &'a DiffOptions,
    stop: &'a AtomicBool,
}

impl Trees<'_> {
    fn root(&self, side: Side) -> &Path {
        match side {
            Side::First => self.left,
            Side::Second => self.right,
        }
    }

    fn read_error(&self, side: Side, rel: &Path, err: io::Error) -> PartialReadError {
        PartialReadError {
            side,
            path: rel_string(rel),
            message: err.to_string(),
        }
    }

    fn diff_dir(&self, rel: &Path) -> FileDelta {
        if self.stop.load(Ordering::Relaxed) {
            return FileDelta::default();
        }
        log::debug!("comparing directory /{}", rel_string(rel));
        let left = match read_entries(&self.left.join(rel)) {
            Ok(entries) => entries,
            Err(e) => return FileDelta::unreadable(self.read_error(Side::First, rel, e)),
        };
        let right = match read_entries(&self.right.join(rel)) {
            Ok(entries) => entries,
            Err(e) => return FileDelta::unreadable(self.read_error(Side::Second, rel, e)),
        };
        self.diff_entries(rel, &left, &right)
    }

    fn diff_entries(&self, rel: &Path, left: &Entries, right: &Entries) -> FileDelta {
        let mut delta = FileDelta::default();
        for (name, &kind) in left {
            let path = rel.join(name);
            match right.get(name) {
                Some(&other) => delta.merge(self.diff_common(&path, kind, other)),
                None => delta.merge(self.one_sided(Side::First, &path, kind)),
            }
        }
        for (name, &kind) in right {
            if !left.contains_key(name) {
                delta.merge(self.one_sided(Side::Second, &rel.join(name), kind));
            }
        }
        delta
    }

    fn one_sided(&self, side: Side, rel: &Path, kind: EntryKind) -> FileDelta {
        let mut delta = FileDelta::default();
        if kind != EntryKind::Directory {
            delta.only_mut(side).push(rel_string(rel));
            return delta;
        }
        let walk = walk_leaves(self.root(side), rel);
        *delta.only_mut(side) = walk.leaves;
        delta.errors = walk
            .unreadable
            .into_iter()
            .map(|(path, message)| PartialReadError {
                side,
                path,
                message,
            })
            .collect();
        delta
    }

    fn diff_common(&self, rel: &Path, left: EntryKind, right: EntryKind) -> FileDelta {
        let same = match (left, right) {
            (EntryKind::Directory, EntryKind::Directory) => return self.diff_dir(rel),
            (l, r) if l != r => Ok(false),
            (EntryKind::RegularFile, _) => self.same_file(rel),
            (EntryKind::Symlink, _) => self.same_link(rel),
            _ => self.same_special(rel),
        };
        match same {
            Ok(true) => FileDelta::default(),
            Ok(false) => FileDelta::differing(rel),
            Err(err) => FileDelta::unreadable(err),
        }
    }

    fn open(&self, side: Side, rel: &Path) -> std::result::Result<(File, Metadata), PartialReadError> {
        let path = self.root(side).join(rel);
        let file = File::open(&path).map_err(|e| self.read_error(side, rel, e))?;
        let meta = file.metadata().map_err(|e| self.read_error(side, rel, e))?;
        Ok((file, meta))
    }

    fn same_file(&self, rel: &Path) -> std::result::Result<bool, PartialReadError> {
        let (left, left_meta) = self.open(Side::First, rel)?;
        let (right, right_meta) = self.open(Side::Second, rel)?;
        let len = left_meta.len();
        if len != right_meta.len() {
            return Ok(false);
        }
        if self.options.shallow {
            if let (Ok(l), Ok(r)) = (left_meta.modified(), right_meta.modified()) {
                if l == r {
                    return Ok(true);
                }
            }
        }
        let l = fingerprint(&left, len).map_err(|e| self.read_error(Side::First, rel, e))?;
        let r = fingerprint(&right, len).map_err(|e| self.read_error(Side::Second, rel, e))?;
        Ok(l == r)
    }

    fn same_link(&self, rel: &Path) -> std::result::Result<bool, PartialReadError> {
        let l = fs::read_link(self.left.join(rel)).map_err(|e| self.read_error(Side::First, rel, e))?;
        let r = fs::read_link(self.right.join(rel)).map_err(|e| self.read_error(Side::Second, rel, e))?;
        Ok(l == r)
    }

    fn same_special(&self, rel: &Path) -> std::result::Result<bool, PartialReadError> {
        let l = fs::symlink_metadata(self.left.join(rel))
            .map_err(|e| self.read_error(Side::First, rel, e))?;
        let r = fs::symlink_metadata(self.right.join(rel))
            .map_err(|e| self.read_error(Side::Second, rel, e))?;
        if l.file_type() != r.file_type() {
            return Ok(false);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if l.rdev() != r.rdev() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
