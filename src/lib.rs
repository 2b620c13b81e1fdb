//! Core library for rootfs-differ: compares two container root filesystems and their package inventories.
//!
//! The filesystem differ ([`diff`]) and the package differ ([`packages`]) run independently;
//! [`compare`] drives both for a pair of targets and [`report`] renders the outcome as
//! two-column text or a structured JSON record.

pub mod compare;
pub mod diff;
pub mod error;
pub mod hash;
pub mod inventory;
pub mod packages;
pub mod report;
pub mod target;
pub mod walk;

pub use compare::{CompareOptions, Comparison, ComparisonResult};
pub use diff::{DiffOptions, EntryKind, FileDelta, diff_trees, diff_trees_interruptible};
pub use error::{Error, PartialReadError, Result};
pub use inventory::{Inventory, PackageId, PackageSource, RpmDatabase};
pub use packages::{PackageDelta, diff_packages};
pub use report::{RenderOptions, write_json, write_text};
pub use target::{AcquiredTarget, ComparisonTarget, DirectoryProvider, Side, TargetProvider};
