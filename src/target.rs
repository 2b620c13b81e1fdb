//! Comparison targets and the acquisition boundary for rootfs-differ

use std::fmt;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::error::Error;
use crate::inventory::Inventory;

/// Which half of a comparison something belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

impl Side {
    /// Prefix used for this side's keys in the structured report.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Side::First => "first",
            Side::Second => "second",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_prefix())
    }
}

/// One side of a comparison: a readable root plus an optional package inventory.
#[derive(Debug, Clone)]
pub struct ComparisonTarget {
    name: String,
    root: PathBuf,
    inventory: Option<Inventory>,
}

impl ComparisonTarget {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            inventory: None,
        }
    }

    /// Attach an inventory that was extracted ahead of time.
    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inventory(&self) -> Option<&Inventory> {
        self.inventory.as_ref()
    }
}

/// Makes a target's filesystem available under a path and tears it down again.
///
/// Implementations own mounting and cleanup; the differ only reads the returned root.
pub trait TargetProvider {
    fn acquire(&self, id: &str) -> Result<PathBuf>;
    fn release(&self, root: &Path);
}

/// Provider for targets that are already directories on the host.
///
/// Roots are returned as absolute paths so tools run against them resolve the same tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryProvider;

impl TargetProvider for DirectoryProvider {
    fn acquire(&self, id: &str) -> Result<PathBuf> {
        let path = std::path::absolute(id).map_err(|e| Error::io(id, e))?;
        let meta = std::fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        if !meta.is_dir() {
            return Err(Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        Ok(path)
    }

    fn release(&self, _root: &Path) {}
}

/// A root acquired from a provider, released again when dropped.
pub struct AcquiredTarget<'p> {
    provider: &'p dyn TargetProvider,
    id: String,
    root: PathBuf,
}

impl<'p> AcquiredTarget<'p> {
    pub fn acquire(provider: &'p dyn TargetProvider, id: &str) -> Result<Self> {
        let root = provider.acquire(id)?;
        log::debug!("acquired {} at {}", id, root.display());
        Ok(Self {
            provider,
            id: id.to_string(),
            root,
        })
    }

    /// Acquire both sides, releasing the first if the second fails.
    pub fn acquire_pair(
        provider: &'p dyn TargetProvider,
        first: &str,
        second: &str,
    ) -> Result<(Self, Self)> {
        let first = Self::acquire(provider, first)?;
        let second = Self::acquire(provider, second)?;
        Ok((first, second))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Comparison target named after the id it was acquired with.
    pub fn target(&self) -> ComparisonTarget {
        ComparisonTarget::new(&self.id, &self.root)
    }
}

impl Drop for AcquiredTarget<'_> {
    fn drop(&mut self) {
        log::debug!("releasing {}", self.id);
        self.provider.release(&self.root);
    }
}
