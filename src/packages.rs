//! Package inventory differ

use rustc_hash::FxHashSet;

use crate::inventory::{Inventory, PackageId};

/// Set comparison of two package inventories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDelta {
    pub left_only: Vec<PackageId>,
    pub right_only: Vec<PackageId>,
    pub common: Vec<PackageId>,
    pub has_difference: bool,
    pub left_release: String,
    pub right_release: String,
    pub names_only: bool,
}

impl PackageDelta {
    /// Every identifier on the left side, sorted.
    pub fn left_packages(&self) -> Vec<PackageId> {
        merge_sorted(&self.left_only, &self.common)
    }

    /// Every identifier on the right side, sorted.
    pub fn right_packages(&self) -> Vec<PackageId> {
        merge_sorted(&self.right_only, &self.common)
    }

    /// Sorted union of both inventories.
    pub fn all_packages(&self) -> Vec<PackageId> {
        let mut all = merge_sorted(&self.left_only, &self.right_only);
        all.extend(self.common.iter().cloned());
        all.sort();
        all
    }
}

fn merge_sorted(a: &[PackageId], b: &[PackageId]) -> Vec<PackageId> {
    let mut merged: Vec<PackageId> = a.iter().chain(b).cloned().collect();
    merged.sort();
    merged
}

/// Compare two inventories as sets.
///
/// Both inventories must use the same identifier mode.
pub fn diff_packages(left: &Inventory, right: &Inventory) -> PackageDelta {
    debug_assert_eq!(
        left.names_only(),
        right.names_only(),
        "inventories built with different identifier modes"
    );
    let left_set: FxHashSet<&PackageId> = left.packages().iter().collect();
    let right_set: FxHashSet<&PackageId> = right.packages().iter().collect();

    let mut left_only = Vec::new();
    let mut common = Vec::new();
    for id in left.packages() {
        if right_set.contains(id) {
            common.push(id.clone());
        } else {
            left_only.push(id.clone());
        }
    }
    let mut right_only: Vec<PackageId> = right
        .packages()
        .iter()
        .filter(|id| !left_set.contains(id))
        .cloned()
        .collect();

    left_only.sort();
    right_only.sort();
    common.sort();
    common.dedup();
    let has_difference = !left_only.is_empty() || !right_only.is_empty();
    log::debug!(
        "packages: {} only left, {} only right, {} common",
        left_only.len(),
        right_only.len(),
        common.len()
    );

    PackageDelta {
        left_only,
        right_only,
        common,
        has_difference,
        left_release: left.release().to_string(),
        right_release: right.release().to_string(),
        names_only: left.names_only(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn ids(list: &[&str]) -> Vec<PackageId> {
        list.iter().map(|s| PackageId::from(*s)).collect()
    }

    #[test]
    fn test_version_change() {
        let left = Inventory::new(["bash-1-1-1", "curl-2-2-2"], "L", false);
        let right = Inventory::new(["bash-1-1-1", "curl-3-3-3"], "R", false);
        let delta = diff_packages(&left, &right);
        assert_eq!(delta.left_only, ids(&["curl-2-2-2"]));
        assert_eq!(delta.right_only, ids(&["curl-3-3-3"]));
        assert_eq!(delta.common, ids(&["bash-1-1-1"]));
        assert!(delta.has_difference);
        assert_eq!(delta.left_release, "L");
        assert_eq!(delta.right_release, "R");
    }

    #[test]
    fn test_identical_names_only() {
        let left = Inventory::new(["bash", "curl"], "", true);
        let right = Inventory::new(["curl", "bash"], "", true);
        let delta = diff_packages(&left, &right);
        assert!(!delta.has_difference);
        assert!(delta.names_only);
        assert_eq!(delta.common, ids(&["bash", "curl"]));
    }

    #[test]
    fn test_empty_side_contributes_nothing_to_common() {
        let left = Inventory::new(Vec::<PackageId>::new(), "", false);
        let right = Inventory::new(["zlib-0-1-1"], "", false);
        let delta = diff_packages(&left, &right);
        assert!(delta.common.is_empty());
        assert_eq!(delta.right_only, ids(&["zlib-0-1-1"]));
        assert!(delta.has_difference);
    }

    #[test]
    fn test_gpg_pubkey_is_not_rejected() {
        let left = Inventory::new(["gpg-pubkey", "bash"], "", true);
        let right = Inventory::new(["bash"], "", true);
        let delta = diff_packages(&left, &right);
        assert_eq!(delta.left_only, ids(&["gpg-pubkey"]));
    }

    #[test]
    fn test_side_listings() {
        let left = Inventory::new(["a", "c", "d"], "", true);
        let right = Inventory::new(["b", "c"], "", true);
        let delta = diff_packages(&left, &right);
        assert_eq!(delta.left_packages(), ids(&["a", "c", "d"]));
        assert_eq!(delta.right_packages(), ids(&["b", "c"]));
        assert_eq!(delta.all_packages(), ids(&["a", "b", "c", "d"]));
    }

    proptest! {
        #[test]
        fn set_laws_hold(
            left in proptest::collection::btree_set("[a-e]{1,3}", 0..12),
            right in proptest::collection::btree_set("[a-e]{1,3}", 0..12),
        ) {
            let delta = diff_packages(
                &Inventory::new(left.iter().map(String::as_str), "", true),
                &Inventory::new(right.iter().map(String::as_str), "", true),
            );
            let union: BTreeSet<&str> = left.iter().chain(right.iter()).map(String::as_str).collect();
            let rebuilt: BTreeSet<&str> = delta
                .left_only
                .iter()
                .chain(&delta.common)
                .chain(&delta.right_only)
                .map(PackageId::as_str)
                .collect();
            prop_assert_eq!(rebuilt, union);
            prop_assert!(delta.left_only.iter().all(|id| !delta.right_only.contains(id)));
            prop_assert_eq!(
                delta.has_difference,
                !delta.left_only.is_empty() || !delta.right_only.is_empty()
            );
            prop_assert_eq!(delta.has_difference, left != right);
            prop_assert!(delta.left_only.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
