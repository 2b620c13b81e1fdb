//! Drives the file and package comparisons for a pair of targets

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::Result;
use crate::diff::{DiffOptions, FileDelta, diff_trees_interruptible};
use crate::error::Error;
use crate::inventory::{Inventory, PackageSource, load_inventory};
use crate::packages::{PackageDelta, diff_packages};
use crate::target::{ComparisonTarget, Side};

/// Which comparisons to run and how.
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    pub files: bool,
    pub packages: bool,
    pub names_only: bool,
    pub shallow: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            files: true,
            packages: false,
            names_only: false,
            shallow: false,
        }
    }
}

/// Everything learned about a pair of targets.
///
/// `files` and `packages` are `None` when that comparison was not requested or, for
/// packages, when it failed; the failure is then listed in `failures`.
#[derive(Debug)]
pub struct ComparisonResult {
    pub first_name: String,
    pub second_name: String,
    pub files: Option<FileDelta>,
    pub packages: Option<PackageDelta>,
    pub failures: Vec<Error>,
}

impl ComparisonResult {
    pub fn name(&self, side: Side) -> &str {
        match side {
            Side::First => &self.first_name,
            Side::Second => &self.second_name,
        }
    }

    /// True when a requested comparison could not be completed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// A configured comparison, optionally backed by a package database.
pub struct Comparison<'s> {
    options: CompareOptions,
    source: Option<&'s dyn PackageSource>,
    stop: Option<&'s AtomicBool>,
}

impl<'s> Comparison<'s> {
    pub fn new(options: CompareOptions) -> Self {
        Self {
            options,
            source: None,
            stop: None,
        }
    }

    /// Flag that cancels the comparison once set, e.g. from a signal handler.
    pub fn with_interrupt(mut self, stop: &'s AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    fn interrupted(&self) -> Result<()> {
        match self.stop {
            Some(stop) if stop.load(Ordering::Relaxed) => Err(Error::Interrupted),
            _ => Ok(()),
        }
    }

    /// Package source used for targets that carry no inventory of their own.
    pub fn with_source(mut self, source: &'s dyn PackageSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn run(
        &self,
        first: &ComparisonTarget,
        second: &ComparisonTarget,
    ) -> Result<ComparisonResult> {
        if first.name() == second.name() {
            return Err(Error::DuplicateName(first.name().to_string()));
        }
        let mut result = ComparisonResult {
            first_name: first.name().to_string(),
            second_name: second.name().to_string(),
            files: None,
            packages: None,
            failures: Vec::new(),
        };

        self.interrupted()?;
        if self.options.packages {
            match self.package_delta(first, second) {
                Ok(delta) => result.packages = Some(delta),
                Err(e) if e.is_package_failure() => {
                    log::warn!("package comparison aborted: {}", e);
                    result.failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        self.interrupted()?;
        if self.options.files {
            let start = Instant::now();
            let options = DiffOptions {
                shallow: self.options.shallow,
            };
            let never = AtomicBool::new(false);
            let stop = self.stop.unwrap_or(&never);
            let delta = diff_trees_interruptible(first.root(), second.root(), &options, stop)?;
            log::info!(
                "file comparison finished in {:.2?}: {} only in {}, {} only in {}, {} differ",
                start.elapsed(),
                delta.left_only.len(),
                first.name(),
                delta.right_only.len(),
                second.name(),
                delta.common_differing.len()
            );
            result.files = Some(delta);
        }

        Ok(result)
    }

    fn package_delta(
        &self,
        first: &ComparisonTarget,
        second: &ComparisonTarget,
    ) -> Result<PackageDelta> {
        let left = self.inventory(Side::First, first)?;
        let right = self.inventory(Side::Second, second)?;
        Ok(diff_packages(&left, &right))
    }

    fn inventory(&self, side: Side, target: &ComparisonTarget) -> Result<Inventory> {
        if let Some(inventory) = target.inventory() {
            if inventory.names_only() == self.options.names_only {
                return Ok(inventory.clone());
            }
            return Err(Error::MalformedInventory {
                side,
                name: target.name().to_string(),
                entry: String::new(),
                reason: "inventory identifier mode does not match the comparison".to_string(),
            });
        }
        match self.source {
            Some(source) => load_inventory(
                source,
                side,
                target.name(),
                target.root(),
                self.options.names_only,
            ),
            None => Err(Error::UnsupportedTarget {
                side,
                name: target.name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn options(files: bool, packages: bool) -> CompareOptions {
        CompareOptions {
            files,
            packages,
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = tempdir().unwrap();
        let a = ComparisonTarget::new("same", dir.path());
        let b = ComparisonTarget::new("same", dir.path());
        let err = Comparison::new(CompareOptions::default()).run(&a, &b).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "same"));
    }

    #[test]
    fn test_unsupported_target_keeps_file_result() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        fs::write(left.path().join("x"), b"1").unwrap();
        let a = ComparisonTarget::new("a", left.path())
            .with_inventory(Inventory::new(["bash-0-1-1"], "", false));
        let b = ComparisonTarget::new("b", right.path());
        let result = Comparison::new(options(true, true)).run(&a, &b).unwrap();
        assert!(result.packages.is_none());
        assert_eq!(result.files.unwrap().left_only, vec!["x"]);
        assert_eq!(result.failures.len(), 1);
        assert!(matches!(
            result.failures[0],
            Error::UnsupportedTarget { side: Side::Second, .. }
        ));
    }

    #[test]
    fn test_skipped_comparisons_stay_none() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let a = ComparisonTarget::new("a", left.path());
        let b = ComparisonTarget::new("b", right.path());
        let result = Comparison::new(options(false, false)).run(&a, &b).unwrap();
        assert!(result.files.is_none());
        assert!(result.packages.is_none());
        assert!(!result.has_failures());
    }

    #[test]
    fn test_mixed_identifier_modes_rejected() {
        let dir = tempdir().unwrap();
        let a = ComparisonTarget::new("a", dir.path())
            .with_inventory(Inventory::new(["bash"], "", true));
        let b = ComparisonTarget::new("b", dir.path())
            .with_inventory(Inventory::new(["bash-0-1-1"], "", false));
        let result = Comparison::new(options(false, true)).run(&a, &b).unwrap();
        assert!(matches!(
            result.failures[0],
            Error::MalformedInventory { side: Side::First, .. }
        ));
    }

    #[test]
    fn test_interrupt_stops_the_comparison() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let a = ComparisonTarget::new("a", left.path());
        let b = ComparisonTarget::new("b", right.path());
        let stop = AtomicBool::new(true);
        let err = Comparison::new(CompareOptions::default())
            .with_interrupt(&stop)
            .run(&a, &b)
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted));

        stop.store(false, Ordering::Relaxed);
        let result = Comparison::new(CompareOptions::default())
            .with_interrupt(&stop)
            .run(&a, &b)
            .unwrap();
        assert!(result.files.unwrap().is_empty());
    }
}
